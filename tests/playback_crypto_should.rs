use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde_json::json;
use streamrelay::server::utils::playback_crypto::{
    DecryptError, EncryptedPlayback, decode_base64url,
};

const KEY: [u8; 32] = [7u8; 32];
const IV: [u8; 12] = [3u8; 12];

fn seal(plaintext: &[u8]) -> EncryptedPlayback {
    let cipher = Aes256Gcm::new_from_slice(&KEY).unwrap();
    let sealed = cipher.encrypt(Nonce::from_slice(&IV), plaintext).unwrap();

    EncryptedPlayback {
        iv: URL_SAFE_NO_PAD.encode(IV),
        key_parts: vec![
            URL_SAFE_NO_PAD.encode(&KEY[..16]),
            URL_SAFE_NO_PAD.encode(&KEY[16..]),
        ],
        payload: URL_SAFE_NO_PAD.encode(sealed),
    }
}

fn flip_byte(encoded: &str, index: usize) -> String {
    let mut bytes = decode_base64url(encoded).unwrap();
    bytes[index] ^= 0x01;
    URL_SAFE_NO_PAD.encode(bytes)
}

#[test]
fn round_trip_base64url_without_padding() {
    for len in 0..40u8 {
        let bytes: Vec<u8> = (0..len).map(|i| i.wrapping_mul(37).wrapping_add(250)).collect();
        let encoded = URL_SAFE_NO_PAD.encode(&bytes);

        assert_eq!(decode_base64url(&encoded).unwrap(), bytes);
    }
}

#[test]
fn accept_padded_and_standard_alphabet_input() {
    let bytes = vec![0xfb, 0xff, 0xbf, 0x01];
    assert_eq!(decode_base64url(&STANDARD.encode(&bytes)).unwrap(), bytes);
}

#[test]
fn recover_the_sealed_source_list() {
    let plaintext = json!({"sources": [{"file": "https://cdn.example/master.m3u8"}]});
    let envelope = seal(plaintext.to_string().as_bytes());

    assert_eq!(envelope.decrypt().unwrap(), plaintext);
}

#[test]
fn fail_when_any_payload_byte_is_flipped() {
    let envelope = seal(br#"{"sources":[]}"#);
    let payload_len = decode_base64url(&envelope.payload).unwrap().len();

    for index in 0..payload_len {
        let tampered = EncryptedPlayback {
            payload: flip_byte(&envelope.payload, index),
            ..envelope.clone()
        };
        assert!(
            matches!(tampered.decrypt(), Err(DecryptError::Authentication)),
            "flipping payload byte {} should fail",
            index
        );
    }
}

#[test]
fn fail_when_any_iv_byte_is_flipped() {
    let envelope = seal(br#"{"sources":[]}"#);

    for index in 0..IV.len() {
        let tampered = EncryptedPlayback {
            iv: flip_byte(&envelope.iv, index),
            ..envelope.clone()
        };
        assert!(tampered.decrypt().is_err());
    }
}

#[test]
fn reject_a_short_key() {
    let envelope = EncryptedPlayback {
        key_parts: vec![URL_SAFE_NO_PAD.encode(&KEY[..16])],
        ..seal(b"{}")
    };

    assert!(matches!(envelope.decrypt(), Err(DecryptError::KeyLength(16))));
}

#[test]
fn reject_non_json_plaintext() {
    let envelope = seal(b"definitely not json");
    assert!(matches!(envelope.decrypt(), Err(DecryptError::Json(_))));
}
