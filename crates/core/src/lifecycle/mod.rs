//! Process lifecycle: logging setup, shutdown/reload signals, and readiness
//! notification for service managers.

pub mod logging;
pub mod signal;

/// Points in the server's life that a supervisor may want to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Ready,
    Reloading,
    Reloaded,
    Stopping,
}

pub trait Lifecycle: Send + Sync {
    fn notify(&self, event: LifecycleEvent);
}

/// Foreground lifecycle — logs events only.
pub struct ForegroundLifecycle;

impl Lifecycle for ForegroundLifecycle {
    fn notify(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Ready => tracing::info!("Service ready"),
            LifecycleEvent::Reloading => tracing::info!("Service reloading configuration..."),
            LifecycleEvent::Reloaded => tracing::info!("Service configuration reloaded"),
            LifecycleEvent::Stopping => tracing::info!("Service stopping..."),
        }
    }
}

/// Systemd lifecycle — forwards events over the sd-notify socket, then logs.
pub struct SystemdLifecycle;

impl Lifecycle for SystemdLifecycle {
    fn notify(&self, event: LifecycleEvent) {
        let state = match event {
            LifecycleEvent::Ready | LifecycleEvent::Reloaded => sd_notify::NotifyState::Ready,
            LifecycleEvent::Reloading => sd_notify::NotifyState::Reloading,
            LifecycleEvent::Stopping => sd_notify::NotifyState::Stopping,
        };
        if let Err(e) = sd_notify::notify(false, &[state]) {
            tracing::debug!("sd-notify failed: {e}");
        }
        ForegroundLifecycle.notify(event);
    }
}

/// `SystemdLifecycle` when started under systemd (`NOTIFY_SOCKET` set),
/// otherwise `ForegroundLifecycle`.
pub fn detect_lifecycle() -> Box<dyn Lifecycle> {
    if std::env::var_os("NOTIFY_SOCKET").is_some() {
        Box::new(SystemdLifecycle)
    } else {
        Box::new(ForegroundLifecycle)
    }
}
