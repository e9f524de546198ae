use serde::{Deserialize, Serialize};

// ─── Config ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,

    // Upstream completion API
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub model: String,
    pub temperature: f64,

    // Global outbound proxy
    pub proxy_url: Option<String>,

    // Timeouts (seconds)
    pub connect_timeout: u64,
    pub request_timeout: u64,

    // Inbound size limits (MB)
    pub max_upload_mb: usize,
    pub body_limit_mb: usize,

    // Logging
    pub logging_to_file: bool,
    pub log_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors: CorsConfig::default(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com".to_string(),
            model: "gpt-4.1-mini".to_string(),
            temperature: 0.7,
            proxy_url: None,
            connect_timeout: 30,
            request_timeout: 120,
            max_upload_mb: 12,
            body_limit_mb: 16,
            logging_to_file: false,
            log_dir: None,
        }
    }
}

impl Config {
    /// Load config from a YAML file, apply the environment overlay, sanitize, and validate.
    pub fn load(path: &str) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml_ng::from_str(&contents)?;
        config.apply_env();
        config.sanitize();
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults (plus the environment overlay)
    /// when the file is missing or invalid.
    pub fn load_or_default(path: &str) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from '{path}': {e}, using defaults");
            let mut config = Config::default();
            config.apply_env();
            config.sanitize();
            config
        })
    }

    /// Fill unset values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key().is_none()
            && let Some(key) = lookup("OPENAI_API_KEY")
        {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|u| !u.trim().is_empty()) {
            self.openai_base_url = url;
        }
    }

    /// Validate configuration.
    fn validate(&self) -> Result<(), anyhow::Error> {
        anyhow::ensure!(
            (0.0..=2.0).contains(&self.temperature),
            "temperature must be between 0.0 and 2.0, got {}",
            self.temperature
        );
        anyhow::ensure!(self.max_upload_mb > 0, "max-upload-mb must be positive");
        anyhow::ensure!(self.body_limit_mb > 0, "body-limit-mb must be positive");
        anyhow::ensure!(!self.model.is_empty(), "model must not be empty");
        if let Some(ref proxy) = self.proxy_url {
            crate::proxy::validate_proxy_url(proxy)?;
        }
        Ok(())
    }

    /// Sanitize and normalize configuration.
    fn sanitize(&mut self) {
        if let Some(ref mut key) = self.openai_api_key {
            *key = key.trim().to_string();
        }
        while self.openai_base_url.ends_with('/') {
            self.openai_base_url.pop();
        }
    }

    /// The upstream credential, if one is configured. Empty strings count as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.openai_api_key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn max_upload_bytes(&self) -> usize {
        mb_to_bytes(self.max_upload_mb)
    }

    pub fn body_limit_bytes(&self) -> usize {
        mb_to_bytes(self.body_limit_mb)
    }
}

fn mb_to_bytes(mb: usize) -> usize {
    mb.saturating_mul(1024 * 1024)
}

// ─── Sub-configs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CorsConfig {
    /// Value of `Access-Control-Allow-Origin`. `*` is intended for development.
    pub allow_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
        }
    }
}
