//! Raw HTTP text parsing.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{HttpError, HttpResult};
use crate::message::ParsedMessage;

/// Parser for messages of the form
/// `METHOD PATH[?QUERY]\r?\n(Header: Value\r?\n)*\r?\n(BODY)?`.
///
/// Only the request line is required. Malformed query pairs and header lines
/// degrade to best-effort values instead of failing the parse.
pub struct MessageParser;

impl MessageParser {
    /// Parse a raw message.
    pub fn parse(raw: &str) -> HttpResult<ParsedMessage> {
        let lines = split_lines(raw);
        let request_line = lines.first().ok_or(HttpError::Empty)?;

        let tokens = split_dropping_trailing_empty(request_line, ' ');
        if tokens.len() < 2 {
            return Err(HttpError::Malformed(request_line.to_string()));
        }

        let method = tokens[0].to_string();
        let (path, query) = match tokens[1].split_once('?') {
            Some((path, query)) => (path.to_string(), query),
            None => (tokens[1].to_string(), ""),
        };
        let query_params = Self::parse_query(query);

        let mut index = 1;
        let mut headers = IndexMap::new();
        while index < lines.len() && !lines[index].trim().is_empty() {
            if let Some((name, value)) = Self::parse_header(lines[index]) {
                headers.insert(name, value);
            }
            index += 1;
        }

        // Skip the blank separator line; everything after it is the body.
        let body = if index < lines.len() {
            lines[index + 1..].join("\n").trim().to_string()
        } else {
            String::new()
        };

        debug!(
            "Parsed {} {} ({} query params, {} headers, {} body bytes)",
            method,
            path,
            query_params.len(),
            headers.len(),
            body.len()
        );

        Ok(ParsedMessage {
            method: Some(method),
            path,
            query_params,
            headers,
            path_params: IndexMap::new(),
            body,
        })
    }

    /// Parse a query string into ordered key/value pairs.
    ///
    /// A pair without `=` maps to an empty value; later duplicates win.
    pub fn parse_query(query: &str) -> IndexMap<String, String> {
        let mut params = IndexMap::new();
        if query.is_empty() {
            return params;
        }

        for pair in split_dropping_trailing_empty(query, '&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params.insert(key.to_string(), value.to_string());
        }

        params
    }

    /// Parse one header line. Lines without a colon, or starting with one,
    /// are not headers.
    pub fn parse_header(line: &str) -> Option<(String, String)> {
        match line.find(':') {
            Some(colon) if colon > 0 => Some((
                line[..colon].trim().to_string(),
                line[colon + 1..].trim().to_string(),
            )),
            _ => None,
        }
    }
}

/// Split on LF or CRLF, dropping trailing empty lines.
fn split_lines(raw: &str) -> Vec<&str> {
    if raw.is_empty() {
        return vec![""];
    }
    let lines = raw
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    drop_trailing_empty(lines)
}

fn split_dropping_trailing_empty(text: &str, separator: char) -> Vec<&str> {
    if text.is_empty() {
        return vec![""];
    }
    drop_trailing_empty(text.split(separator).collect())
}

/// A text made only of separators ends up with no parts at all.
fn drop_trailing_empty(mut parts: Vec<&str>) -> Vec<&str> {
    while parts.last().map_or(false, |p| p.is_empty()) {
        parts.pop();
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scenario() {
        let message =
            MessageParser::parse("GET /items?limit=5\nAuthorization: token\n\n{\"id\":1}").unwrap();

        assert_eq!(message.method.as_deref(), Some("GET"));
        assert_eq!(message.path, "/items");
        assert_eq!(message.query_params.len(), 1);
        assert_eq!(message.query_params["limit"], "5");
        assert_eq!(message.headers.len(), 1);
        assert_eq!(message.headers["Authorization"], "token");
        assert!(message.path_params.is_empty());
        assert_eq!(message.body, "{\"id\":1}");
    }

    #[test]
    fn test_crlf_line_endings() {
        let message =
            MessageParser::parse("POST /orders HTTP/1.1\r\nHost: example.com\r\n\r\n{\"a\":1}\r\n")
                .unwrap();

        assert_eq!(message.method.as_deref(), Some("POST"));
        assert_eq!(message.path, "/orders");
        assert_eq!(message.headers["Host"], "example.com");
        assert_eq!(message.body, "{\"a\":1}");
    }

    #[test]
    fn test_missing_body_is_empty() {
        let message = MessageParser::parse("GET /health\nAccept: */*").unwrap();
        assert_eq!(message.body, "");
        assert_eq!(message.headers["Accept"], "*/*");
    }

    #[test]
    fn test_request_line_only() {
        let message = MessageParser::parse("DELETE /items/1").unwrap();
        assert_eq!(message.path, "/items/1");
        assert!(message.headers.is_empty());
        assert!(message.query_params.is_empty());
        assert_eq!(message.body, "");
    }

    #[test]
    fn test_query_without_value() {
        let params = MessageParser::parse_query("flag&name=joe&empty=&=orphan");
        assert_eq!(params["flag"], "");
        assert_eq!(params["name"], "joe");
        assert_eq!(params["empty"], "");
        assert_eq!(params[""], "orphan");
    }

    #[test]
    fn test_query_value_keeps_later_equals() {
        let params = MessageParser::parse_query("filter=a=b");
        assert_eq!(params["filter"], "a=b");
    }

    #[test]
    fn test_header_lines_without_colon_are_skipped() {
        let message =
            MessageParser::parse("GET /\nnot a header\n: leading colon\nX-Id: 7\n\nbody").unwrap();
        assert_eq!(message.headers.len(), 1);
        assert_eq!(message.headers["X-Id"], "7");
        assert_eq!(message.body, "body");
    }

    #[test]
    fn test_header_value_keeps_inner_colons() {
        let (name, value) = MessageParser::parse_header("Referer: https://example.com:8443/a").unwrap();
        assert_eq!(name, "Referer");
        assert_eq!(value, "https://example.com:8443/a");
    }

    #[test]
    fn test_multiline_body_is_trimmed() {
        let message = MessageParser::parse("PUT /x\n\n\n  line one\nline two  \n\n").unwrap();
        assert_eq!(message.body, "line one\nline two");
    }

    #[test]
    fn test_empty_input_fails() {
        assert_eq!(MessageParser::parse("\n\n"), Err(HttpError::Empty));
    }

    #[test]
    fn test_single_token_fails() {
        assert_eq!(
            MessageParser::parse("GET"),
            Err(HttpError::Malformed("GET".to_string()))
        );
        assert!(MessageParser::parse("").is_err());
    }
}
