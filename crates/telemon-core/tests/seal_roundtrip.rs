//! Chunked OAEP sealing and gzip framing as the agent sends bodies.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::RsaPrivateKey;

use telemon_core::protocol::compress::{gunzip, gzip};
use telemon_core::protocol::{Sealer, Unsealer};

fn keypair() -> RsaPrivateKey {
    RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("keygen")
}

#[test]
fn multi_chunk_body_survives_seal_and_unseal() {
    let key = keypair();
    let unsealer = Unsealer::new(key.clone());
    let sealer = unsealer.sealer();

    // 1024-bit key: 62-byte chunks, so this spans several blocks.
    let body: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();
    let sealed = sealer.seal(&body).unwrap();
    assert_eq!(sealed.len() % 128, 0);
    assert_eq!(sealed.len(), 128 * body.len().div_ceil(62));
    assert_eq!(unsealer.unseal(&sealed).unwrap(), body);
}

#[test]
fn pem_files_load_from_disk() {
    let key = keypair();
    let dir = tempfile::tempdir().unwrap();
    let priv_path = dir.path().join("private.pem");
    let pub_path = dir.path().join("public.pem");
    std::fs::write(&priv_path, key.to_pkcs1_pem(LineEnding::LF).unwrap().as_bytes()).unwrap();
    std::fs::write(
        &pub_path,
        key.to_public_key().to_pkcs1_pem(LineEnding::LF).unwrap(),
    )
    .unwrap();

    let sealer = Sealer::load(&pub_path).unwrap();
    let unsealer = Unsealer::load(&priv_path).unwrap();

    let body = br#"[{"id":"PollCount","type":"counter","delta":1}]"#;
    let wire = sealer.seal(&gzip(body).unwrap()).unwrap();
    let plain = gunzip(&unsealer.unseal(&wire).unwrap()).unwrap();
    assert_eq!(plain, body);
}

#[test]
fn truncated_ciphertext_is_rejected() {
    let unsealer = Unsealer::new(keypair());
    let sealed = unsealer.sealer().seal(b"hello").unwrap();
    let err = unsealer.unseal(&sealed[..sealed.len() - 1]).unwrap_err();
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn wrong_key_fails_to_unseal() {
    let a = Unsealer::new(keypair());
    let b = Unsealer::new(keypair());
    let sealed = a.sealer().seal(b"hello").unwrap();
    assert!(b.unseal(&sealed).is_err());
}
