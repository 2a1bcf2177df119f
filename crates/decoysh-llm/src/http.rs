// Shared HTTP plumbing for the providers
// One reqwest client per generator, ring crypto provider installed once per
// process, and the retry loop for rate limits and server errors.

use std::sync::Once;
use std::time::Duration;

use decoysh::BackendError;

/// Back-off schedule for retryable statuses, in seconds.
pub(crate) const RETRY_DELAYS: [u64; 4] = [2, 4, 8, 16];

/// Whole-request deadline for one HTTP call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

static CRYPTO: Once = Once::new();

fn install_crypto_provider() {
    CRYPTO.call_once(|| {
        // Err means another provider is already installed; that one is used.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Build the HTTP client used by a generator.
pub(crate) fn client() -> Result<reqwest::Client, BackendError> {
    install_crypto_provider();
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| BackendError::Config(format!("failed to build http client: {}", e)))
}

/// Send a JSON request, retrying on 429 and 5xx.
///
/// `build` is called once per attempt since a sent request cannot be reused.
pub(crate) async fn send_json<F>(provider: &str, build: F) -> Result<serde_json::Value, BackendError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let resp = build()
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("{}: {}", provider, e)))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| BackendError::Transport(format!("{}: {}", provider, e)))?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| {
                BackendError::InvalidResponse(format!("{}: response is not JSON: {}", provider, e))
            });
        }
        // error bodies from proxies and gateways are often HTML
        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);

        let retryable = status.as_u16() == 429 || status.is_server_error();
        if retryable {
            if let Some(&delay) = RETRY_DELAYS.get(attempt) {
                tracing::warn!(
                    provider,
                    %status,
                    attempt = attempt + 1,
                    of = RETRY_DELAYS.len(),
                    "retrying in {}s",
                    delay
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
                attempt += 1;
                continue;
            }
        }

        return Err(BackendError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
}

/// Error text from an API error body. Both providers use `error.message`.
pub(crate) fn error_message(body: &serde_json::Value) -> String {
    body["error"]["message"]
        .as_str()
        .unwrap_or("unknown error")
        .to_string()
}
