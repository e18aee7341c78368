//! The `$util` helper object.
//!
//! Every function is pure: a null argument yields null, and malformed input
//! to the decoders is returned unchanged instead of failing the render.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::Value as JsonValue;
use tracing::warn;

use mapsim_vtl::{MethodError, TemplateObject, Value};

use crate::convert::json_to_value;

/// Decoder accepting input with or without trailing `=` padding.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Escape a string for embedding in a JavaScript or JSON string literal.
pub fn escape_javascript(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            '\u{8}' => out.push_str("\\b"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 || (c as u32) > 0x7f => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04X}", unit));
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Form-encode a string as UTF-8, with `+` for spaces.
pub fn url_encode(input: &str) -> String {
    url::form_urlencoded::byte_serialize(input.as_bytes()).collect()
}

/// Decode a form-encoded string. Malformed escapes return the input as is.
pub fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return input.to_string();
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = input.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

/// Encode a string's UTF-8 bytes with the standard base64 alphabet.
pub fn base64_encode(input: &str) -> String {
    STANDARD.encode(input.as_bytes())
}

/// Decode standard base64. Invalid input is returned unchanged.
pub fn base64_decode(input: &str) -> String {
    match LENIENT_STANDARD.decode(input) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => input.to_string(),
    }
}

/// Parse a JSON object or array into a template value.
///
/// Blank input, scalars and invalid JSON all give null.
pub fn parse_json(input: &str) -> Value {
    if input.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str::<JsonValue>(input) {
        Ok(json @ (JsonValue::Object(_) | JsonValue::Array(_))) => json_to_value(&json),
        Ok(_) => {
            warn!("JSON is neither an object nor an array");
            Value::Null
        }
        Err(e) => {
            warn!("Error parsing JSON string: {}", e);
            Value::Null
        }
    }
}

/// `$util` as seen by templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtilityFunctions;

impl UtilityFunctions {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateObject for UtilityFunctions {
    fn type_name(&self) -> &str {
        "Util"
    }

    fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, MethodError> {
        let function: fn(&str) -> Value = match method {
            "escapeJavaScript" => |s: &str| Value::String(escape_javascript(s)),
            "urlEncode" => |s: &str| Value::String(url_encode(s)),
            "urlDecode" => |s: &str| Value::String(url_decode(s)),
            "base64Encode" => |s: &str| Value::String(base64_encode(s)),
            "base64Decode" => |s: &str| Value::String(base64_decode(s)),
            "parseJson" => parse_json,
            _ => return Err(MethodError::NotFound),
        };

        match args {
            [Value::Null] => Ok(Value::Null),
            [Value::String(s)] => Ok(function(s)),
            _ => Err(MethodError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_javascript() {
        assert_eq!(escape_javascript(r#"He said "hi" it's"#), r#"He said \"hi\" it\'s"#);
        assert_eq!(escape_javascript("a/b\\c\n\t"), "a\\/b\\\\c\\n\\t");
        assert_eq!(escape_javascript("\u{1}é"), "\\u0001\\u00E9");
        assert_eq!(escape_javascript("😀"), "\\uD83D\\uDE00");
    }

    #[test]
    fn test_url_round_trip() {
        let original = "a b&c=d/é*~";
        let encoded = url_encode(original);
        assert_eq!(encoded, "a+b%26c%3Dd%2F%C3%A9*%7E");
        assert_eq!(url_decode(&encoded), original);
    }

    #[test]
    fn test_url_decode_malformed_passes_through() {
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
        assert_eq!(url_decode("a%20b+c"), "a b c");
    }

    #[test]
    fn test_base64() {
        assert_eq!(base64_encode("hello"), "aGVsbG8=");
        assert_eq!(base64_decode("aGVsbG8="), "hello");
        assert_eq!(base64_decode("aGVsbG8"), "hello");
        assert_eq!(base64_decode("not base64!"), "not base64!");
        assert_eq!(base64_decode(&base64_encode("héllo wörld")), "héllo wörld");
    }

    #[test]
    fn test_parse_json() {
        assert_eq!(parse_json(r#"{"a": [1, 2]}"#).render(), "{a=[1, 2]}");
        assert_eq!(parse_json("42"), Value::Null);
        assert_eq!(parse_json("  "), Value::Null);
        assert_eq!(parse_json("{broken"), Value::Null);
    }

    #[test]
    fn test_dispatch() {
        let util = UtilityFunctions::new();
        assert_eq!(util.invoke("urlEncode", &[Value::from("a b")]), Ok(Value::from("a+b")));
        assert_eq!(util.invoke("base64Decode", &[Value::Null]), Ok(Value::Null));
        assert_eq!(util.invoke("urlEncode", &[]), Err(MethodError::NotFound));
        assert_eq!(util.invoke("nope", &[Value::from("x")]), Err(MethodError::NotFound));
    }
}
