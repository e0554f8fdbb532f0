//! HTTP probes against tunnelled services.

use std::time::Duration;

use chartcheck_core::{Attempt, do_with_retry};
use tracing::{debug, info};

use crate::EngineError;

/// Per-request timeout. A probe that hangs counts as a failed attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body excerpt length kept in retry error messages.
const BODY_EXCERPT: usize = 200;

fn client(url: &str) -> Result<reqwest::Client, EngineError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| EngineError::Http {
            url: url.to_owned(),
            reason: e.to_string(),
        })
}

/// `GET url`, returning status code and body. Non-2xx statuses are not errors.
pub async fn http_get(url: &str) -> Result<(u16, String), EngineError> {
    let http_err = |e: reqwest::Error| EngineError::Http {
        url: url.to_owned(),
        reason: e.to_string(),
    };

    let response = client(url)?.get(url).send().await.map_err(http_err)?;
    let status = response.status().as_u16();
    let body = response.text().await.map_err(http_err)?;
    debug!(url, status, bytes = body.len(), "http response");
    Ok((status, body))
}

/// `GET url` until `validate(status, body)` holds, at most `retries + 1` times.
pub async fn http_get_with_retry_with_custom_validation<F>(
    url: &str,
    retries: u32,
    sleep: Duration,
    validate: F,
) -> Result<(u16, String), EngineError>
where
    F: Fn(u16, &str) -> bool,
{
    let description = format!("HTTP GET to URL {url}");
    let validate = &validate;
    let result = do_with_retry(&description, retries, sleep, || async move {
        let (status, body) = http_get(url).await.map_err(Attempt::retry)?;
        if validate(status, &body) {
            Ok((status, body))
        } else {
            let excerpt: String = body.chars().take(BODY_EXCERPT).collect();
            Err(Attempt::Retry(format!(
                "validation failed for URL {url}: status {status}, body {excerpt:?}"
            )))
        }
    })
    .await?;

    info!(url, status = result.0, "http probe passed");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_url_is_http_error() {
        // port 9 (discard) is closed on test machines
        let err = http_get("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, EngineError::Http { .. }));
    }

    #[tokio::test]
    async fn invalid_url_is_http_error() {
        let err = http_get("not a url").await.unwrap_err();
        assert!(err.to_string().contains("not a url"));
    }

    #[tokio::test]
    async fn retry_gives_up_on_unreachable_url() {
        let err = http_get_with_retry_with_custom_validation(
            "http://127.0.0.1:9/v1/",
            1,
            Duration::from_millis(10),
            |status, _| status == 200,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Retry(_)));
    }
}
