//! End-to-end tests of the `mapsim` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn mapsim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mapsim"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("MAPSIM_CONFIG")
        .output()
        .expect("failed to run mapsim")
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path.display().to_string()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_render_success() {
    let dir = TempDir::new().unwrap();
    let message = write(dir.path(), "req.http", "GET /items?limit=5\nAuthorization: token\n\n{\"id\":1}");
    let template = write(dir.path(), "t.vtl", "{\"id\": ${input.path('$.id')}, \"limit\": $input.params('limit')}");

    let output = mapsim(&["-q", "render", "--message", &message, "--template", &template]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output).trim(), "{\"id\": 1, \"limit\": 5}");
}

#[test]
fn test_render_failure_prints_diagnostic() {
    let dir = TempDir::new().unwrap();
    let message = write(dir.path(), "req.http", "GET /\n\n");
    let template = write(dir.path(), "t.vtl", "$undefinedVar");

    let output = mapsim(&["-q", "render", "--message", &message, "--template", &template]);
    assert_eq!(output.status.code(), Some(3));
    let diagnostic: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(diagnostic["type"], "REFERENCE_ERROR");
    assert_eq!(diagnostic["context"], "Variable: $undefinedVar");
}

#[test]
fn test_render_lenient_and_resource() {
    let dir = TempDir::new().unwrap();
    let message = write(dir.path(), "req.http", "GET /\n\n");
    let header = write(dir.path(), "header.vtl", "#set($greeting = 'hi')");
    let template = write(dir.path(), "t.vtl", "#parse('header')$greeting $missing");
    let resource = format!("header={}", header);

    let output = mapsim(&[
        "-q", "--lenient", "--resource", &resource, "render", "--message", &message, "--template", &template,
    ]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output).trim(), "hi $missing");
}

#[test]
fn test_scenario_exit_codes() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "ok/request.http", "POST /foo\n\n{\"a\": 1}");
    write(dir.path(), "ok/template.vtl", "{\"a\": $input.path('$.a'), \"m\": \"$context.httpMethod\"}");
    write(dir.path(), "ok/expected.json", "{\"m\": \"POST\", \"a\": 1}");
    let root = dir.path().display().to_string();

    let output = mapsim(&["-q", "scenario", &root]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("1 passed, 0 failed"));

    write(dir.path(), "bad/response.http", "HTTP/1.1 200 OK\n\n[]");
    write(dir.path(), "bad/template.vtl", "[1]");
    write(dir.path(), "bad/expected.json", "[2]");
    let output = mapsim(&["-q", "scenario", &root]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_query() {
    let dir = TempDir::new().unwrap();
    let body = write(dir.path(), "body.json", "{\"items\": [{\"n\": \"a\"}, {\"n\": \"b\"}]}");

    let output = mapsim(&["-q", "query", "--body", &body, "--path", "$.items[1].n"]);
    assert_eq!(stdout(&output).trim(), "\"b\"");

    let output = mapsim(&["-q", "query", "--body", &body, "--json-path", "$.items[*].n"]);
    let result: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(result, serde_json::json!(["a", "b"]));
}

#[test]
fn test_handle_event_file() {
    let dir = TempDir::new().unwrap();
    let event = serde_json::json!({
        "processingType": "REQUEST_ONLY",
        "httpRequest": "GET /pets\n\n",
        "requestTemplate": "$context.resourcePath",
    });
    let path = write(dir.path(), "event.json", &event.to_string());

    let output = mapsim(&["-q", "handle", "--event", &path, "--body-only"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output).trim(), "/pets");
}

#[test]
fn test_invalid_arguments() {
    let output = mapsim(&["render", "--mode", "sideways"]);
    assert_eq!(output.status.code(), Some(2));
}
