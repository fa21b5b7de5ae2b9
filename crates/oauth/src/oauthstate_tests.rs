// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;

use super::*;

fn codec() -> anyhow::Result<StateCodec> {
    StateCodec::new(b"test-signing-secret")
}

fn keyed() -> KeyedFlowState {
    KeyedFlowState {
        state: AnonymousFlowState {
            token_name: "my-token".into(),
            token_namespace: "team-a".into(),
            scopes: vec!["repo".into(), "user".into()],
            issued_at: 1_700_000_000,
        },
        flow_key: "0b4ef6d8-5b3c-4c6e-9f4e-1f2a3b4c5d6e".into(),
    }
}

/// Replace the character at `index` with a different base64url character.
fn flip(encoded: &str, index: usize) -> String {
    encoded
        .char_indices()
        .map(|(i, c)| {
            if i != index {
                c
            } else if c == 'A' {
                'B'
            } else {
                'A'
            }
        })
        .collect()
}

#[test]
fn keyed_state_decodes_to_what_was_encoded() -> anyhow::Result<()> {
    let codec = codec()?;
    let encoded = codec.encode_keyed(&keyed())?;
    assert_eq!(codec.decode_keyed(&encoded), Ok(keyed()));
    Ok(())
}

#[test]
fn encoded_state_is_url_safe() -> anyhow::Result<()> {
    let encoded = codec()?.encode_keyed(&keyed())?;
    assert!(encoded
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
    assert_eq!(encoded.matches('.').count(), 1);
    Ok(())
}

#[test]
fn empty_secret_is_rejected() {
    assert!(StateCodec::new(b"").is_err());
}

#[test]
fn other_secret_fails_signature() -> anyhow::Result<()> {
    let encoded = codec()?.encode_keyed(&keyed())?;
    let other = StateCodec::new(b"another-secret")?;
    assert_eq!(other.decode_keyed(&encoded), Err(StateError::BadSignature));
    Ok(())
}

#[test]
fn anonymous_state_does_not_decode_as_keyed() -> anyhow::Result<()> {
    let codec = codec()?;
    let encoded = codec.encode_anonymous(&keyed().state)?;
    assert_eq!(codec.decode_keyed(&encoded), Err(StateError::BadPayload));
    Ok(())
}

#[test]
fn keyed_state_does_not_decode_as_anonymous() -> anyhow::Result<()> {
    let codec = codec()?;
    let encoded = codec.encode_keyed(&keyed())?;
    assert_eq!(codec.decode_anonymous(&encoded), Err(StateError::BadPayload));
    Ok(())
}

#[test]
fn signed_payload_with_extra_field_is_rejected() -> anyhow::Result<()> {
    let codec = codec()?;
    let value = serde_json::json!({
        "tokenName": "t",
        "tokenNamespace": "ns",
        "scopes": [],
        "issuedAt": 1,
        "admin": true,
    });
    let encoded = codec.encode(&value)?;
    assert_eq!(codec.decode_anonymous(&encoded), Err(StateError::BadPayload));
    Ok(())
}

#[test]
fn signed_payload_missing_field_is_rejected() -> anyhow::Result<()> {
    let codec = codec()?;
    let value = serde_json::json!({ "tokenName": "t", "tokenNamespace": "ns", "issuedAt": 1 });
    let encoded = codec.encode(&value)?;
    assert_eq!(codec.decode_anonymous(&encoded), Err(StateError::BadPayload));
    Ok(())
}

#[yare::parameterized(
    empty = { "", StateError::Missing },
    no_separator = { "abc", StateError::Malformed },
    two_separators = { "abc.def.ghi", StateError::Malformed },
    padded = { "YWJj.YWJj==", StateError::Malformed },
    not_base64 = { "a*c.def", StateError::Malformed },
    unsigned = { "eyJ0b2tlbk5hbWUiOiJ0In0.AAAA", StateError::BadSignature },
)]
fn malformed_inputs(input: &str, expected: StateError) {
    let codec = StateCodec { key: hmac::Key::new(hmac::HMAC_SHA256, b"test-signing-secret") };
    assert_eq!(codec.decode_keyed(input), Err(expected));
}

#[test]
fn every_single_character_flip_is_detected() -> anyhow::Result<()> {
    let codec = codec()?;
    let encoded = codec.encode_keyed(&keyed())?;
    for index in 0..encoded.len() {
        let tampered = flip(&encoded, index);
        assert!(codec.decode_keyed(&tampered).is_err(), "flip at {index} went undetected");
    }
    Ok(())
}

proptest! {
    #[test]
    fn tampering_is_always_detected(
        token_name in "[a-z0-9-]{1,40}",
        token_namespace in "[a-z0-9-]{1,40}",
        scopes in proptest::collection::vec("[a-z:_]{1,12}", 0..4),
        issued_at in any::<u64>(),
        flow_key in "[a-f0-9-]{36}",
        position in any::<proptest::sample::Index>(),
    ) {
        let codec = StateCodec::new(b"property-secret").map_err(|e| TestCaseError::fail(e.to_string()))?;
        let state = KeyedFlowState {
            state: AnonymousFlowState { token_name, token_namespace, scopes, issued_at },
            flow_key,
        };
        let encoded = codec.encode_keyed(&state).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(codec.decode_keyed(&encoded), Ok(state));

        let tampered = flip(&encoded, position.index(encoded.len()));
        prop_assert!(codec.decode_keyed(&tampered).is_err());
    }
}
