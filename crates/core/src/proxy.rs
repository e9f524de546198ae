use crate::config::Config;
use reqwest::{Client, Proxy};
use std::time::Duration;

/// Build the shared upstream HTTP client from config: connect and total
/// request timeouts, plus the optional outbound proxy. Without a proxy the
/// system proxy environment variables are ignored.
pub fn build_http_client(config: &Config) -> Result<Client, anyhow::Error> {
    let mut builder = Client::builder()
        .user_agent(concat!("graxy/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .timeout(Duration::from_secs(config.request_timeout));

    builder = match config.proxy_url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => builder.proxy(Proxy::all(url)?),
        None => builder.no_proxy(),
    };

    Ok(builder.build()?)
}

/// Validate that a proxy URL is well-formed. Empty means direct.
pub fn validate_proxy_url(url: &str) -> Result<(), anyhow::Error> {
    if url.is_empty() {
        return Ok(());
    }
    let parsed =
        url::Url::parse(url).map_err(|e| anyhow::anyhow!("invalid proxy URL '{url}': {e}"))?;
    match parsed.scheme() {
        "http" | "https" | "socks5" => Ok(()),
        scheme => Err(anyhow::anyhow!(
            "unsupported proxy scheme '{scheme}' in URL '{url}', expected http/https/socks5"
        )),
    }
}
