//! Shared per-hour isolation and HTTP download helpers used by every
//! concrete `ModelFetcher` impl.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use tracing::warn;

use crate::error::{FetchError, Result};

/// Downloads a URL's full body, treating a non-2xx status or transport
/// error as `SourceUnavailable` and a timeout the same way.
pub async fn download(
    client: &Client,
    model: &str,
    url: &str,
    timeout: Duration,
) -> Result<Bytes> {
    let fut = async {
        let resp = client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::SourceUnavailable {
                model: model.to_string(),
                reason: format!("request to {url} failed: {e}"),
            })?;
        if !resp.status().is_success() {
            return Err(FetchError::SourceUnavailable {
                model: model.to_string(),
                reason: format!("{url} returned {}", resp.status()),
            });
        }
        resp.bytes()
            .await
            .map_err(|e| FetchError::SourceUnavailable {
                model: model.to_string(),
                reason: format!("reading body of {url} failed: {e}"),
            })
    };

    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::SourceUnavailable {
            model: model.to_string(),
            reason: format!("timed out after {:?} fetching {url}", timeout),
        }),
    }
}

/// Runs `decode_hour` over every requested lead hour in ascending order,
/// catching and logging a per-hour failure instead of propagating it.
/// Returns `SourceUnavailable` only when zero hours decoded — otherwise
/// a partial fetch is returned to the caller.
pub async fn fetch_per_hour<F, Fut, T>(
    model: &str,
    lead_hours: &[u32],
    decode_hour: F,
) -> Result<Vec<(u32, T)>>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut out = Vec::new();
    let mut last_err: Option<FetchError> = None;

    let mut sorted = lead_hours.to_vec();
    sorted.sort_unstable();

    for lh in sorted {
        match decode_hour(lh).await {
            Ok(v) => out.push((lh, v)),
            Err(e) => {
                let skipped = FetchError::Skipped {
                    lead_hour: lh,
                    reason: e.to_string(),
                };
                warn!(model, lead_hour = lh, error = %skipped, "lead hour skipped");
                last_err = Some(e);
            }
        }
    }

    if out.is_empty() {
        return Err(last_err.unwrap_or_else(|| FetchError::SourceUnavailable {
            model: model.to_string(),
            reason: "no lead hours were requested".to_string(),
        }));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_per_hour_skips_failing_hours_and_preserves_order() {
        let result = fetch_per_hour("TEST", &[12, 0, 6], |lh| async move {
            if lh == 6 {
                Err(FetchError::DecodeFailure {
                    model: "TEST".into(),
                    lead_hour: lh,
                    reason: "boom".into(),
                })
            } else {
                Ok(lh * 10)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, vec![(0, 0), (12, 120)]);
    }

    #[tokio::test]
    async fn fetch_per_hour_errors_when_every_hour_fails() {
        let result = fetch_per_hour::<_, _, u32>("TEST", &[0, 6], |lh| async move {
            Err(FetchError::DecodeFailure {
                model: "TEST".into(),
                lead_hour: lh,
                reason: "boom".into(),
            })
        })
        .await;
        assert!(result.is_err());
    }
}
