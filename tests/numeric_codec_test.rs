use decibel_indexer::{NumericError, Uint128, Uint256, Uint64};
use num_bigint::BigUint;
use num_traits::One;

#[test]
fn test_boundaries_survive_json_round_trip() {
    for x in [0u64, 1, 9, 10, u64::from(u32::MAX) + 1, u64::MAX - 1, u64::MAX] {
        let encoded = Uint64::new(x).to_json_text();
        assert!(encoded.starts_with('"') && encoded.ends_with('"'));
        assert_eq!(Uint64::from_json_text(&encoded).unwrap().get(), x);
    }

    for x in [0u128, u128::from(u64::MAX) + 1, u128::MAX - 1, u128::MAX] {
        let encoded = Uint128::new(x).to_json_text();
        assert_eq!(Uint128::from_json_text(&encoded).unwrap().get(), x);
    }

    let max256 = Uint256::max_value();
    for x in [
        Uint256::default(),
        Uint256::from(u128::MAX),
        Uint256::from_biguint(max256.as_biguint() - 1u32).unwrap(),
        max256,
    ] {
        let encoded = x.to_json_text();
        assert_eq!(Uint256::from_json_text(&encoded).unwrap(), x);
    }
}

#[test]
fn test_serde_emits_quoted_strings() {
    let value = serde_json::to_string(&Uint128::new(u128::MAX)).unwrap();
    assert_eq!(value, "\"340282366920938463463374607431768211455\"");

    let decoded: Vec<Uint64> =
        serde_json::from_str(r#"[" 42 ", 7, "18446744073709551615"]"#).unwrap();
    assert_eq!(
        decoded,
        vec![Uint64::new(42), Uint64::new(7), Uint64::new(u64::MAX)]
    );
}

#[test]
fn test_decode_failures_are_distinct() {
    assert_eq!(
        Uint64::from_json_text("\"-1\""),
        Err(NumericError::Negative {
            bits: 64,
            value: "-1".to_string()
        })
    );
    assert_eq!(Uint64::from_json_text("\"\""), Err(NumericError::Empty { bits: 64 }));
    assert_eq!(Uint64::from_json_text("null"), Err(NumericError::Null { bits: 64 }));
    assert!(matches!(
        Uint64::from_json_text("\"abc\""),
        Err(NumericError::Invalid { bits: 64, .. })
    ));
    assert!(matches!(
        Uint64::from_json_text("\"18446744073709551616\""),
        Err(NumericError::Overflow { bits: 64, .. })
    ));
    assert!(matches!(
        Uint128::from_json_text("340282366920938463463374607431768211456"),
        Err(NumericError::Overflow { bits: 128, .. })
    ));

    let over256 = (BigUint::one() << 256u32).to_string();
    assert!(matches!(
        Uint256::from_json_text(&format!("\"{}\"", over256)),
        Err(NumericError::Overflow { bits: 256, .. })
    ));
}

#[test]
fn test_serde_rejects_null_field() {
    #[derive(serde::Deserialize)]
    struct Holder {
        #[allow(dead_code)]
        amount: Uint64,
    }

    let err = serde_json::from_str::<Holder>(r#"{"amount": null}"#)
        .err()
        .expect("null must not decode");
    assert!(err.to_string().contains("null"));
}
