use crate::*;
use serde_json::json;

// -------------------- Encoding --------------------

#[test]
fn encode_ascii_record() -> Result<()> {
    let mut out = Vec::new();
    encode_record("a", &[json!(1)], &mut out)?;
    assert_eq!(out, b"7|1|a|[1]");
    Ok(())
}

#[test]
fn encode_measures_key_in_bytes() -> Result<()> {
    let mut out = Vec::new();
    encode_record("é", &[], &mut out)?;
    // body = "2|é|[]" = 1 + 1 + 2 + 1 + 2 bytes
    assert_eq!(out, "7|2|é|[]".as_bytes());
    Ok(())
}

#[test]
fn encode_appends_back_to_back() -> Result<()> {
    let mut out = Vec::new();
    encode_record("a", &[json!(1)], &mut out)?;
    encode_record("b", &[json!("x")], &mut out)?;
    assert_eq!(out, b"7|1|a|[1]9|1|b|[\"x\"]");
    Ok(())
}

// -------------------- Decoding --------------------

#[test]
fn decode_roundtrip_with_separator_in_key() -> Result<()> {
    let values = vec![json!({"n": [1, 2]}), json!(null), json!("a|b")];
    let mut out = Vec::new();
    encode_record("k|e|y", &values, &mut out)?;

    let (rec, used) = decode_record(&out, 0)?;
    assert_eq!(used, out.len());
    assert_eq!(rec, Record::new("k|e|y", values));
    Ok(())
}

#[test]
fn decode_empty_key() -> Result<()> {
    let mut out = Vec::new();
    encode_record("", &[json!(true)], &mut out)?;
    let (rec, _) = decode_record(&out, 0)?;
    assert_eq!(rec.key, "");
    assert_eq!(rec.values, vec![json!(true)]);
    Ok(())
}

#[test]
fn decode_truncated_record_is_corrupt() -> Result<()> {
    let mut out = Vec::new();
    encode_record("abc", &[json!(1)], &mut out)?;
    out.pop();
    let err = decode_record(&out, 0).unwrap_err();
    assert!(matches!(err, SpillError::Corrupt { .. }), "got {err:?}");
    Ok(())
}

#[test]
fn decode_malformed_json_is_decode_error() {
    let body = b"1|a|[1,";
    let err = decode_body(body, 40).unwrap_err();
    assert!(matches!(err, SpillError::Decode { offset: 40, .. }), "got {err:?}");
}

#[test]
fn decode_non_array_json_is_decode_error() {
    let err = decode_body(b"1|a|{\"x\":1}", 0).unwrap_err();
    assert!(matches!(err, SpillError::Decode { .. }));
}

#[test]
fn decode_deeply_nested_value() -> Result<()> {
    let mut deep = json!(1);
    for _ in 0..500 {
        deep = json!([deep]);
    }
    let mut out = Vec::new();
    encode_record("d", std::slice::from_ref(&deep), &mut out)?;

    let (rec, _) = decode_record(&out, 0)?;
    assert_eq!(rec.values, vec![deep]);
    Ok(())
}

#[test]
fn decode_trailing_bytes_after_json_is_decode_error() {
    let err = decode_body(b"1|a|[1] x", 0).unwrap_err();
    assert!(matches!(err, SpillError::Decode { .. }), "got {err:?}");
}

#[test]
fn decode_key_past_end_is_corrupt() {
    let err = decode_body(b"9|ab|[]", 0).unwrap_err();
    assert!(matches!(err, SpillError::Corrupt { .. }));
}

#[test]
fn decode_missing_separator_after_key_is_corrupt() {
    let err = decode_body(b"1|ab[]", 0).unwrap_err();
    assert!(matches!(err, SpillError::Corrupt { .. }));
}

// -------------------- Length prefix --------------------

#[test]
fn parse_length_prefix_ok() -> Result<()> {
    assert_eq!(parse_length_prefix(b"123|rest", 0)?, (123, 4));
    assert_eq!(parse_length_prefix(b"0|", 0)?, (0, 2));
    Ok(())
}

#[test]
fn parse_length_prefix_rejects_garbage() {
    for bad in [&b"|x"[..], b"12a|", b"-1|", b"", b"123456789012345678901234|"] {
        let err = parse_length_prefix(bad, 7).unwrap_err();
        assert!(
            matches!(err, SpillError::Corrupt { offset: 7, .. }),
            "{:?} -> {err:?}",
            String::from_utf8_lossy(bad)
        );
    }
}
