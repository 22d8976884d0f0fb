//! HTTP batch transport: `POST /updates/` with a gzip (optionally sealed)
//! JSON array.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;

use telemon_core::protocol::compress::gzip;
use telemon_core::protocol::json::encode_batch;
use telemon_core::protocol::{Sealer, Signer};
use telemon_core::{Metric, MetricsError, Result, ServerResponse};

use super::Transport;

pub struct RestTransport {
    client: Client,
    url: String,
    signer: Option<Signer>,
    sealer: Option<Sealer>,
}

fn batch_url(address: &str) -> String {
    let base = if address.starts_with("http://") || address.starts_with("https://") {
        address.trim_end_matches('/').to_string()
    } else {
        format!("http://{}", address.trim_end_matches('/'))
    };
    format!("{base}/updates/")
}

impl RestTransport {
    pub fn new(address: &str, timeout: Duration, signer: Option<Signer>, sealer: Option<Sealer>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MetricsError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: batch_url(address),
            signer,
            sealer,
        })
    }

    fn body(&self, metrics: &[Metric]) -> Result<Vec<u8>> {
        let compressed = gzip(&encode_batch(metrics, self.signer.as_ref())?)?;
        match &self.sealer {
            Some(sealer) => sealer.seal(&compressed),
            None => Ok(compressed),
        }
    }
}

#[async_trait]
impl Transport for RestTransport {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn deliver(&self, metrics: &[Metric]) -> Result<Vec<usize>> {
        let body = self.body(metrics)?;

        let resp = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, "gzip")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| MetricsError::Unavailable(format!("POST {}: {e}", self.url)))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| MetricsError::Unavailable(format!("read reply: {e}")))?;

        if !status.is_success() {
            return Err(MetricsError::Unavailable(format!(
                "server replied {status}: {}",
                String::from_utf8_lossy(&bytes).trim()
            )));
        }

        // A signed reply must verify; an unsigned or non-JSON one is accepted.
        if let (Some(signer), Ok(reply)) = (&self.signer, serde_json::from_slice::<ServerResponse>(&bytes)) {
            if !reply.hash.is_empty() {
                signer.verify_response(&reply)?;
            }
        }
        debug!(url = %self.url, size = metrics.len(), "batch accepted");
        Ok((0..metrics.len()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::batch_url;

    #[test]
    fn url_forms() {
        assert_eq!(batch_url("localhost:8080"), "http://localhost:8080/updates/");
        assert_eq!(batch_url("http://h:1/"), "http://h:1/updates/");
    }
}
