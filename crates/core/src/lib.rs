pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod prompt;
pub mod proxy;
pub mod types;
