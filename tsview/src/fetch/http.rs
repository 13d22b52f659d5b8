//! HTTP client for the preview rendering service.

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use super::{FetchError, PreviewFetcher, SeriesFrames};
use crate::cache::PreviewKey;

/// Where the preview service listens by default.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Rendering a large frame can be slow.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const USER_AGENT: &str = concat!("tsview/", env!("CARGO_PKG_VERSION"));

/// Fetches previews from `GET {base}/api/preview/{series}/{frame}`.
#[derive(Debug, Clone)]
pub struct HttpPreviewFetcher {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct TiltSeriesDto {
    id: String,
    frames: Vec<FrameDto>,
}

#[derive(Debug, Deserialize)]
struct FrameDto {
    #[serde(rename = "zIndex")]
    z_index: u32,
}

impl HttpPreviewFetcher {
    /// Create a fetcher for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of one preview, with path segments escaped.
    pub fn preview_url(&self, key: &PreviewKey) -> Url {
        let mut url = self.endpoint(&["api", "preview", key.series_id(), &key.frame().to_string()]);
        url.query_pairs_mut()
            .append_pair("bin", &key.bin().to_string())
            .append_pair("quality", &key.quality().to_string());
        url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// List every tilt series the service knows, with its frame z-indices.
    pub async fn list_series(&self) -> Result<Vec<SeriesFrames>, FetchError> {
        let url = self.endpoint(&["api", "ts"]);
        let body = get_bytes(&self.client, url.clone()).await?;

        let series: Vec<TiltSeriesDto> =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(series
            .into_iter()
            .map(|ts| SeriesFrames {
                series_id: ts.id,
                frames: ts.frames.into_iter().map(|f| f.z_index).collect(),
            })
            .collect())
    }
}

async fn get_bytes(client: &reqwest::Client, url: Url) -> Result<Bytes, FetchError> {
    trace!(url = %url, "HTTP GET request starting");

    let response = match client.get(url.clone()).send().await {
        Ok(resp) => {
            debug!(url = %url, status = resp.status().as_u16(), "HTTP response received");
            resp
        }
        Err(e) => {
            warn!(
                url = %url,
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "HTTP request failed"
            );
            return Err(FetchError::Transport(e.to_string()));
        }
    };

    let status = response.status();
    if !status.is_success() {
        warn!(url = %url, status = status.as_u16(), "HTTP error status");
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    response
        .bytes()
        .await
        .map_err(|e| FetchError::Transport(format!("Failed to read response: {}", e)))
}

impl PreviewFetcher for HttpPreviewFetcher {
    fn fetch(&self, key: &PreviewKey) -> BoxFuture<'static, Result<Bytes, FetchError>> {
        let client = self.client.clone();
        let url = self.preview_url(key);

        Box::pin(async move {
            let body = get_bytes(&client, url.clone()).await?;
            if body.is_empty() {
                return Err(FetchError::EmptyBody(url.to_string()));
            }
            trace!(url = %url, bytes = body.len(), "Preview fetched");
            Ok(body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(base: &str) -> HttpPreviewFetcher {
        HttpPreviewFetcher::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_preview_url() {
        let key = PreviewKey::new("TS_01.mdoc", 12, 4, 75).unwrap();
        let url = fetcher("http://localhost:8000").preview_url(&key);
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/preview/TS_01.mdoc/12?bin=4&quality=75"
        );
    }

    #[test]
    fn test_preview_url_escapes_series() {
        let key = PreviewKey::new("TS 01#a", 0, 8, 90).unwrap();
        let url = fetcher("http://localhost:8000").preview_url(&key);
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/preview/TS%2001%23a/0?bin=8&quality=90"
        );
    }

    #[test]
    fn test_base_url_with_prefix() {
        let key = PreviewKey::with_defaults("TS", 3).unwrap();
        let url = fetcher("http://host/viewer/").preview_url(&key);
        assert_eq!(url.path(), "/viewer/api/preview/TS/3");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(matches!(
            HttpPreviewFetcher::new("not a url", Duration::from_secs(1)),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpPreviewFetcher::new("mailto:someone@example.com", Duration::from_secs(1)),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_tilt_series_json_shape() {
        let json = r#"[
            {"id": "TS_01.mdoc", "mdocPath": "/data/TS_01.mdoc", "angleRange": [-60.0, 60.0],
             "frames": [
                {"zIndex": 0, "angle": -60.0, "mrcPath": "a.mrc", "selected": true},
                {"zIndex": 1, "angle": -57.0, "mrcPath": "b.mrc", "selected": false}
             ]}
        ]"#;
        let parsed: Vec<TiltSeriesDto> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed[0].id, "TS_01.mdoc");
        assert_eq!(
            parsed[0].frames.iter().map(|f| f.z_index).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }
}
