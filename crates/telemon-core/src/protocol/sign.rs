//! HMAC-SHA256 signatures over metrics and result envelopes.
//!
//! Canonical strings:
//! - counter: `{id}:counter:{delta}`
//! - gauge: `{id}:gauge:{value:.6}`
//! - response: `msg:{message};err:{error}`
//!
//! Digests are lowercase hex.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{MetricsError, Result};
use crate::metric::{Metric, MetricKind, ServerResponse};

type HmacSha256 = Hmac<Sha256>;

/// Canonical string for a metric sample.
pub fn canonical_metric(metric: &Metric) -> Result<String> {
    match metric.kind {
        MetricKind::Counter => {
            let delta = metric
                .delta
                .ok_or_else(|| MetricsError::NullAttr(format!("delta of counter {}", metric.id)))?;
            Ok(format!("{}:counter:{}", metric.id, delta))
        }
        MetricKind::Gauge => {
            let value = metric
                .value
                .ok_or_else(|| MetricsError::NullAttr(format!("value of gauge {}", metric.id)))?;
            Ok(format!("{}:gauge:{:.6}", metric.id, value))
        }
    }
}

pub fn canonical_response(resp: &ServerResponse) -> String {
    format!("msg:{};err:{}", resp.message, resp.error)
}

/// Shared-key signer. Cheap to clone.
#[derive(Clone)]
pub struct Signer {
    key: Arc<[u8]>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

impl Signer {
    /// `None` for an empty key: signing is disabled.
    pub fn new(key: impl AsRef<[u8]>) -> Option<Self> {
        let key = key.as_ref();
        if key.is_empty() {
            return None;
        }
        Some(Self { key: Arc::from(key) })
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|e| MetricsError::Internal(format!("hmac key: {e}")))
    }

    fn digest(&self, data: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(data.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn check(&self, data: &str, hash: &str) -> Result<()> {
        let tag = hex::decode(hash)
            .map_err(|_| MetricsError::AuthFailed("invalid hash value".into()))?;
        let mut mac = self.mac()?;
        mac.update(data.as_bytes());
        mac.verify_slice(&tag)
            .map_err(|_| MetricsError::AuthFailed("invalid hash value".into()))
    }

    pub fn metric_hash(&self, metric: &Metric) -> Result<String> {
        self.digest(&canonical_metric(metric)?)
    }

    pub fn sign_metric(&self, metric: &mut Metric) -> Result<()> {
        metric.hash = Some(self.metric_hash(metric)?);
        Ok(())
    }

    /// A missing hash fails the same way a wrong one does.
    pub fn verify_metric(&self, metric: &Metric) -> Result<()> {
        let hash = metric
            .hash
            .as_deref()
            .ok_or_else(|| MetricsError::AuthFailed(format!("metric {} is not signed", metric.id)))?;
        self.check(&canonical_metric(metric)?, hash)
    }

    pub fn sign_response(&self, resp: &mut ServerResponse) -> Result<()> {
        resp.hash = self.digest(&canonical_response(resp))?;
        Ok(())
    }

    pub fn verify_response(&self, resp: &ServerResponse) -> Result<()> {
        if resp.hash.is_empty() {
            return Err(MetricsError::AuthFailed("response is not signed".into()));
        }
        self.check(&canonical_response(resp), &resp.hash)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn canonical_forms() {
        assert_eq!(
            canonical_metric(&Metric::gauge("Alloc", 1.5)).unwrap(),
            "Alloc:gauge:1.500000"
        );
        assert_eq!(
            canonical_metric(&Metric::counter("PollCount", 5)).unwrap(),
            "PollCount:counter:5"
        );
        assert_eq!(
            canonical_response(&ServerResponse::message("metric was saved")),
            "msg:metric was saved;err:"
        );
    }

    #[test]
    fn empty_key_disables_signing() {
        assert!(Signer::new("").is_none());
    }

    #[test]
    fn sign_then_verify_and_tamper() {
        let signer = Signer::new("secret").unwrap();
        let mut m = Metric::gauge("Alloc", 12.25);
        signer.sign_metric(&mut m).unwrap();
        assert_eq!(m.hash.as_ref().map(String::len), Some(64));
        signer.verify_metric(&m).unwrap();

        m.value = Some(12.5);
        let err = signer.verify_metric(&m).unwrap_err();
        assert_eq!(err.client_code().as_str(), "AUTH_FAILED");

        let other = Signer::new("other").unwrap();
        let mut c = Metric::counter("PollCount", 1);
        other.sign_metric(&mut c).unwrap();
        assert!(signer.verify_metric(&c).is_err());
    }

    #[test]
    fn unsigned_or_garbage_hash_fails() {
        let signer = Signer::new("secret").unwrap();
        assert!(signer.verify_metric(&Metric::counter("c", 1)).is_err());
        let mut m = Metric::counter("c", 1);
        m.hash = Some("zz-not-hex".into());
        assert!(signer.verify_metric(&m).is_err());
    }

    #[test]
    fn response_signature() {
        let signer = Signer::new("secret").unwrap();
        let mut resp = ServerResponse::message("metrics batch was updated");
        signer.sign_response(&mut resp).unwrap();
        signer.verify_response(&resp).unwrap();
        resp.message.push('!');
        assert!(signer.verify_response(&resp).is_err());
    }
}
