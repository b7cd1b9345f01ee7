mod helpers;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use fieldmap::domain::entities::StateToken;
use fieldmap::services::InvalidState;
use helpers::*;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_issued_token_verifies_immediately() {
    let clock = manual_clock();
    let codec = codec(clock);

    let token = assert_ok!(codec.issue());
    let verified = assert_ok!(codec.verify(&token.encode()));
    assert_eq!(verified, token);
}

#[test]
fn test_token_lives_exactly_max_age() {
    let clock = manual_clock();
    let codec = codec(clock.clone());
    let encoded = codec.issue().unwrap().encode();

    clock.advance(MAX_AGE);
    assert_ok!(codec.verify(&encoded));

    clock.advance(1);
    assert_eq!(codec.verify(&encoded), Err(InvalidState::Expired));
}

#[test]
fn test_any_signature_bit_flip_is_rejected() {
    let clock = manual_clock();
    let codec = codec(clock);
    let token = codec.issue().unwrap();

    for byte in 0..token.signature.len() {
        for bit in 0..8 {
            let mut tampered = token.clone();
            tampered.signature[byte] ^= 1 << bit;
            assert_eq!(
                codec.verify(&tampered.encode()),
                Err(InvalidState::BadSignature),
                "flip of byte {} bit {} was accepted",
                byte,
                bit
            );
        }
    }
}

#[test]
fn test_wire_form_is_url_safe() {
    let clock = manual_clock();
    let encoded = codec(clock).issue().unwrap().encode();

    assert!(encoded
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')));

    let parts: Vec<&str> = encoded.split('.').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[1], START.to_string());
    assert_eq!(URL_SAFE_NO_PAD.decode(parts[2]).unwrap().len(), 32);
}

#[test]
fn test_reissued_signature_with_new_timestamp_is_rejected() {
    let clock = manual_clock();
    let codec = codec(clock);
    let token = codec.issue().unwrap();

    // Extending a token's life by editing issued_at breaks the signature
    let extended = StateToken {
        issued_at: token.issued_at + 1000,
        ..token.clone()
    };
    assert_err!(codec.verify(&extended.encode()));
}

#[test]
fn test_other_deployment_key_is_rejected() {
    let clock = manual_clock();
    let ours = codec(clock.clone());
    let theirs = fieldmap::services::StateTokenCodec::new(
        "another-deployment-secret-0123456789abcd",
        MAX_AGE,
        clock,
    );

    let foreign = theirs.issue().unwrap().encode();
    assert_eq!(ours.verify(&foreign), Err(InvalidState::BadSignature));
}
