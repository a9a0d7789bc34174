use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::blocking::Client;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("chanvid/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build HTTP client")
}

/// Joins an RPC method name onto the gateway base URL, tolerating a base
/// without scheme or with a trailing path.
pub fn method_url(base: &str, method: &str) -> Result<Url> {
    let trimmed = base.trim().trim_end_matches('/');
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };
    let mut url =
        Url::parse(&candidate).with_context(|| format!("invalid API URL {}", base))?;

    let mut path = url.path().trim_end_matches('/').to_string();
    path.push('/');
    path.push_str(method.trim_start_matches('/'));
    url.set_path(&path);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::method_url;

    #[test]
    fn method_url_handles_prefix_and_scheme() {
        assert_eq!(
            method_url("https://gw.example.com/api/", "messages.getHistory")
                .unwrap()
                .as_str(),
            "https://gw.example.com/api/messages.getHistory"
        );
        assert_eq!(
            method_url("localhost:8081", "upload.getFile").unwrap().as_str(),
            "http://localhost:8081/upload.getFile"
        );
    }
}
