//! Integration tests for message parsing.

use mapsim_http::{HttpError, MessageParser, ParsedMessage};

/// Every message with a well-formed request line parses.
#[test]
fn test_well_formed_first_line_never_fails() {
    let tails = [
        "",
        "\n",
        "\n\n",
        "\nX: y",
        "\nbroken header\n\nbody",
        "\n\n\n\n",
        "\r\nA: b\r\n\r\n",
        "\n:\n=\n&\n",
    ];

    for tail in tails {
        let raw = format!("GET /a?b=c&d{}", tail);
        let message = MessageParser::parse(&raw)
            .unwrap_or_else(|e| panic!("failed to parse {:?}: {}", raw, e));
        assert_eq!(message.path, "/a");
        assert_eq!(message.query_params["b"], "c");
        assert_eq!(message.query_params["d"], "");
    }
}

/// Response status lines parse the same way as request lines.
#[test]
fn test_status_line_parses() {
    let raw = "HTTP/1.1 200 OK\nContent-Type: application/json\n\n{\"items\":[1,2,3]}";
    let message = MessageParser::parse(raw).unwrap();

    assert_eq!(message.method.as_deref(), Some("HTTP/1.1"));
    assert_eq!(message.path, "200");
    assert_eq!(message.headers["Content-Type"], "application/json");
    assert_eq!(message.body, "{\"items\":[1,2,3]}");
}

#[test]
fn test_header_case_is_preserved() {
    let message = MessageParser::parse("GET /\nx-API-key: abc\nX-Api-Key: def\n").unwrap();
    assert_eq!(message.headers["x-API-key"], "abc");
    assert_eq!(message.headers["X-Api-Key"], "def");
    assert_eq!(message.headers.len(), 2);
}

#[test]
fn test_header_order_is_preserved() {
    let message = MessageParser::parse("GET /\nB: 2\nA: 1\nC: 3\n").unwrap();
    let names: Vec<_> = message.headers.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["B", "A", "C"]);
}

#[test]
fn test_serialized_shape() {
    let message = MessageParser::parse("GET /items?limit=5\nAuthorization: token\n\n{\"id\":1}").unwrap();
    let json = serde_json::to_value(&message).unwrap();

    assert_eq!(json["method"], "GET");
    assert_eq!(json["queryParams"]["limit"], "5");
    assert_eq!(json["headers"]["Authorization"], "token");
    assert_eq!(json["pathParams"], serde_json::json!({}));

    let back: ParsedMessage = serde_json::from_value(json).unwrap();
    assert_eq!(back, message);
}

#[test]
fn test_malformed_request_line_message() {
    let err = MessageParser::parse("NOPATH\nA: b").unwrap_err();
    assert_eq!(err, HttpError::Malformed("NOPATH".to_string()));
    assert_eq!(err.to_string(), "Invalid HTTP request line: NOPATH");
}
