//! Deterministic version digests for render content documents.
//!
//! Encoding (scheme 1): compact JSON, object keys sorted by byte order,
//! numbers in serde_json's shortest round-trip form, strings escaped by
//! serde_json. The digest is lowercase hex SHA-256 of that text. Changing
//! any of this invalidates every stored artifact name.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Canonical text form of a JSON value.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Version of a render content document.
pub fn version_of(content: &Value) -> String {
    let canonical = canonical_json(content);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Number(number) => out.push_str(&number.to_string()),
        Value::String(text) => write_string(text, out),
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));

            out.push('{');
            for (index, (key, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

fn write_string(text: &str, out: &mut String) {
    // Serializing a &str cannot fail.
    match serde_json::to_string(text) {
        Ok(escaped) => out.push_str(&escaped),
        Err(_) => out.push_str("\"\""),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn key_order_does_not_change_the_version() {
        let a: Value = serde_json::from_str(
            r#"{"name":"Demo","bbox":[1,2,3,4],"meta":{"b":1,"a":[true,null]}}"#,
        )
        .expect("json");
        let b: Value = serde_json::from_str(
            r#"{"meta":{"a":[true,null],"b":1},"bbox":[1,2,3,4],"name":"Demo"}"#,
        )
        .expect("json");

        assert_eq!(version_of(&a), version_of(&b));
        assert_eq!(version_of(&a), version_of(&a.clone()));
    }

    #[test]
    fn canonical_form_is_compact_and_sorted() {
        let value = json!({"z": 1, "a": {"y": "x\"y", "b": [1.5, -2]}, "m": null});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"b":[1.5,-2],"y":"x\"y"},"m":null,"z":1}"#
        );
    }

    #[test]
    fn different_content_changes_the_version() {
        let a = json!({"name": "Demo", "bbox": [1, 2, 3, 4]});
        let b = json!({"name": "Demo", "bbox": [1, 2, 3, 5]});
        assert_ne!(version_of(&a), version_of(&b));
    }

    #[test]
    fn version_is_lowercase_sha256_hex() {
        let version = version_of(&json!({}));
        // sha256("{}")
        assert_eq!(
            version,
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }
}
