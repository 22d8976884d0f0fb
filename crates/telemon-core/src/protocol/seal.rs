//! Asymmetric sealing of request bodies.
//!
//! RSA-OAEP (SHA-256, label `metrics`) over fixed-size chunks: each plaintext
//! chunk is at most `k - 2*32 - 2` bytes and each ciphertext block is exactly
//! `k` bytes, where `k` is the modulus size. Blocks are concatenated.

use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::{MetricsError, Result};

pub const SEAL_LABEL: &str = "metrics";

/// OAEP overhead for SHA-256: two hash lengths plus two bytes.
const OAEP_OVERHEAD: usize = 2 * 32 + 2;

fn padding() -> Oaep {
    Oaep::new_with_label::<Sha256, _>(SEAL_LABEL)
}

fn read_pem(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| MetricsError::Internal(format!("read key {}: {e}", path.display())))
}

/// Public half: used by the agent.
#[derive(Debug, Clone)]
pub struct Sealer {
    key: RsaPublicKey,
}

impl Sealer {
    pub fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Accepts PKCS#1 (`RSA PUBLIC KEY`) or SPKI (`PUBLIC KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        RsaPublicKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
            .map(Self::new)
            .map_err(|e| MetricsError::Internal(format!("invalid public key: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_pem(&read_pem(path.as_ref())?)
    }

    fn chunk_len(&self) -> Result<usize> {
        self.key
            .size()
            .checked_sub(OAEP_OVERHEAD)
            .filter(|n| *n > 0)
            .ok_or_else(|| MetricsError::Internal("public key too small for OAEP".into()))
    }

    pub fn seal(&self, data: &[u8]) -> Result<Vec<u8>> {
        let chunk = self.chunk_len()?;
        let mut rng = rand::thread_rng();
        let mut out = Vec::with_capacity((data.len() / chunk + 1) * self.key.size());
        for part in data.chunks(chunk) {
            let block = self
                .key
                .encrypt(&mut rng, padding(), part)
                .map_err(|e| MetricsError::Internal(format!("seal failed: {e}")))?;
            out.extend_from_slice(&block);
        }
        Ok(out)
    }
}

/// Private half: used by the server.
#[derive(Debug, Clone)]
pub struct Unsealer {
    key: RsaPrivateKey,
}

impl Unsealer {
    pub fn new(key: RsaPrivateKey) -> Self {
        Self { key }
    }

    /// Accepts PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map(Self::new)
            .map_err(|e| MetricsError::Internal(format!("invalid private key: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_pem(&read_pem(path.as_ref())?)
    }

    /// Matching sealer for this key pair.
    pub fn sealer(&self) -> Sealer {
        Sealer::new(self.key.to_public_key())
    }

    pub fn unseal(&self, data: &[u8]) -> Result<Vec<u8>> {
        let block = self.key.size();
        if block == 0 || data.len() % block != 0 {
            return Err(MetricsError::BadRequest(format!(
                "sealed body length {} is not a multiple of {block}",
                data.len()
            )));
        }
        let mut out = Vec::with_capacity(data.len());
        for part in data.chunks(block) {
            let plain = self
                .key
                .decrypt(padding(), part)
                .map_err(|e| MetricsError::BadRequest(format!("failed to decrypt body: {e}")))?;
            out.extend_from_slice(&plain);
        }
        Ok(out)
    }
}
