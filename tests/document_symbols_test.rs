use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::Value;

const SERVER_TIMEOUT: Duration = Duration::from_secs(5);
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(200);

#[test]
fn document_symbols_basic() {
    let mut server = spawn_server();

    // Initialize server
    let init_request = create_initialize_request();
    send_lsp_message(&mut server, &init_request);

    // Read initialization response and continue with full workflow
    let stdout = server
        .stdout
        .take()
        .expect("Child stdout should be available");
    let mut reader = BufReader::new(stdout);

    // Read init response
    let init_response = read_next_response_with_id(&mut reader, 1);

    // Validate that document symbol capability is advertised
    validate_document_symbol_capability(&init_response);

    send_initialized(&mut server);

    let sample = "# Project\n\nIntro\n\n## Install\n\ntext\n\n## Usage\n";
    open_document(&mut server, "file:///README.mdx", sample);

    // Request document symbols
    let symbols_request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "textDocument/documentSymbol",
        "params": {
            "textDocument": {
                "uri": "file:///README.mdx"
            }
        }
    });
    send_lsp_message(&mut server, &symbols_request);

    // Read symbols response (may need to skip log messages)
    let symbols_response = read_next_response_with_id(&mut reader, 2);

    validate_symbols_response(&symbols_response);

    // Clean shutdown
    shutdown_server(server);
}

#[test]
fn document_symbols_empty_file() {
    let mut server = spawn_server();

    // Initialize server
    let init_request = create_initialize_request();
    send_lsp_message(&mut server, &init_request);

    // Read initialization response
    let stdout = server
        .stdout
        .take()
        .expect("Child stdout should be available");
    let mut reader = BufReader::new(stdout);

    let _init_response = read_next_response_with_id(&mut reader, 1);
    send_initialized(&mut server);

    open_document(&mut server, "file:///empty.mdx", "");

    // Request document symbols
    let symbols_request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "textDocument/documentSymbol",
        "params": {
            "textDocument": {
                "uri": "file:///empty.mdx"
            }
        }
    });
    send_lsp_message(&mut server, &symbols_request);

    let symbols_response = read_next_response_with_id(&mut reader, 2);
    assert_eq!(symbols_response.get("id").and_then(Value::as_u64), Some(2));

    let symbols = symbols_response
        .get("result")
        .and_then(Value::as_array)
        .expect("Result should be an array");
    assert!(symbols.is_empty(), "Empty file should have no symbols");

    shutdown_server(server);
}

#[test]
fn preview_after_compile() {
    let mut server = spawn_server();
    send_lsp_message(&mut server, &create_initialize_request());

    let stdout = server
        .stdout
        .take()
        .expect("Child stdout should be available");
    let mut reader = BufReader::new(stdout);
    let _init_response = read_next_response_with_id(&mut reader, 1);
    send_initialized(&mut server);

    let uri = "file:///README.mdx";
    open_document(&mut server, uri, "<div align=\"center\">\n\n# Hello\n");

    let diagnostics = read_diagnostics_for(&mut reader, uri);
    assert!(diagnostics.is_empty(), "Normalized document should compile");

    send_lsp_message(&mut server, &execute_command(3, "mdx.preview", &[uri]));
    let preview = read_next_response_with_id(&mut reader, 3);
    let result = preview.get("result").expect("Response should have result");
    let html = result
        .get("html")
        .and_then(Value::as_str)
        .expect("Preview should carry html");
    assert!(html.contains("<h1 class=\"mdx-h1\" id=\"hello\">Hello</h1>"));
    assert_eq!(result.get("theme").and_then(Value::as_str), Some("dark"));

    send_lsp_message(&mut server, &execute_command(4, "mdx.normalize", &[uri]));
    let normalized = read_next_response_with_id(&mut reader, 4);
    let text = normalized
        .get("result")
        .and_then(Value::as_str)
        .expect("Normalized text");
    assert!(text.starts_with("<div style={{ textAlign: \"center\" }}>"));
    assert!(text.ends_with("</div>"));

    shutdown_server(server);
}

#[test]
fn compile_error_is_published() {
    let mut server = spawn_server();
    send_lsp_message(&mut server, &create_initialize_request());

    let stdout = server
        .stdout
        .take()
        .expect("Child stdout should be available");
    let mut reader = BufReader::new(stdout);
    let _init_response = read_next_response_with_id(&mut reader, 1);
    send_initialized(&mut server);

    let uri = "file:///broken.mdx";
    open_document(&mut server, uri, "Intro\n\nLook <span>open\n");

    let diagnostics = read_diagnostics_for(&mut reader, uri);
    assert_eq!(diagnostics.len(), 1);
    let diagnostic = &diagnostics[0];
    assert_eq!(diagnostic.get("source").and_then(Value::as_str), Some("mdx-ls"));
    assert_eq!(diagnostic.get("severity").and_then(Value::as_u64), Some(1));
    assert_eq!(
        diagnostic
            .get("range")
            .and_then(|range| range.get("start"))
            .and_then(|start| start.get("line"))
            .and_then(Value::as_u64),
        Some(2)
    );

    send_lsp_message(&mut server, &execute_command(3, "mdx.preview", &[uri]));
    let preview = read_next_response_with_id(&mut reader, 3);
    let result = preview.get("result").expect("Response should have result");
    assert!(result
        .get("error")
        .and_then(Value::as_str)
        .is_some_and(|message| message.contains("`<span>`")));
    assert_eq!(result.get("line").and_then(Value::as_u64), Some(3));

    shutdown_server(server);
}

// Helper functions (same as in initialize_smoke.rs)
fn spawn_server() -> std::process::Child {
    let bin_path = std::env::var("CARGO_BIN_EXE_mdx-ls")
        .unwrap_or_else(|_| "target/debug/mdx-ls".to_string());

    // A short debounce keeps compiles well inside the test exit window
    Command::new(bin_path)
        .args(["--no-persist", "--debounce-ms", "10"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("MDX_LS_TEST_EXIT", "1")
        .spawn()
        .expect("Failed to spawn language server")
}

fn create_initialize_request() -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "processId": null,
            "rootUri": null,
            "capabilities": {
                "textDocument": {
                    "documentSymbol": { "dynamicRegistration": false }
                }
            },
            "clientInfo": { "name": "test-client", "version": "1.0" }
        }
    })
}

fn send_initialized(child: &mut std::process::Child) {
    let initialized_notification = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "initialized",
        "params": {}
    });
    send_lsp_message(child, &initialized_notification);
}

fn open_document(child: &mut std::process::Child, uri: &str, text: &str) {
    let did_open = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "textDocument/didOpen",
        "params": {
            "textDocument": {
                "uri": uri,
                "languageId": "mdx",
                "version": 1,
                "text": text
            }
        }
    });
    send_lsp_message(child, &did_open);
}

fn execute_command(id: u64, command: &str, arguments: &[&str]) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "workspace/executeCommand",
        "params": {
            "command": command,
            "arguments": arguments
        }
    })
}

fn send_lsp_message(child: &mut std::process::Child, message: &Value) {
    let body = message.to_string();
    let request = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);

    let stdin = child
        .stdin
        .as_mut()
        .expect("Child stdin should be available");
    stdin
        .write_all(request.as_bytes())
        .expect("Failed to write request");
    stdin.flush().expect("Failed to flush stdin");
}

fn read_content_length_header(reader: &mut BufReader<std::process::ChildStdout>) -> usize {
    let start_time = Instant::now();
    let mut content_length = None;

    loop {
        if start_time.elapsed() > SERVER_TIMEOUT {
            panic!("Timeout waiting for response headers");
        }

        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => panic!("Unexpected EOF while reading headers"),
            Ok(_) => {
                if line.trim().is_empty() {
                    // End of headers - we've consumed the empty line
                    break;
                }

                if let Some(length_str) = line.strip_prefix("Content-Length:") {
                    content_length = Some(
                        length_str
                            .trim()
                            .parse::<usize>()
                            .expect("Invalid Content-Length header"),
                    );
                }
            }
            Err(e) => panic!("Error reading headers: {}", e),
        }
    }

    content_length.expect("Missing Content-Length header")
}

fn read_message_body(
    reader: &mut BufReader<std::process::ChildStdout>,
    content_length: usize,
) -> String {
    let mut body_bytes = vec![0u8; content_length];
    std::io::Read::read_exact(reader, &mut body_bytes).expect("Failed to read response body");

    String::from_utf8(body_bytes).expect("Response body should be valid UTF-8")
}

fn read_next_response_with_id(
    reader: &mut BufReader<std::process::ChildStdout>,
    expected_id: u64,
) -> Value {
    // Keep reading responses until we find one with the expected id
    loop {
        let content_length = read_content_length_header(reader);
        let body = read_message_body(reader, content_length);
        let response: Value = serde_json::from_str(&body).expect("Valid JSON response");

        // Check if this is the response we're looking for
        if let Some(id) = response.get("id") {
            if id.as_u64() == Some(expected_id) {
                return response;
            }
        }

        // Otherwise, this might be a notification/log message, skip it
    }
}

fn read_diagnostics_for(
    reader: &mut BufReader<std::process::ChildStdout>,
    uri: &str,
) -> Vec<Value> {
    loop {
        let content_length = read_content_length_header(reader);
        let body = read_message_body(reader, content_length);
        let message: Value = serde_json::from_str(&body).expect("Valid JSON message");

        if message.get("method").and_then(Value::as_str) != Some("textDocument/publishDiagnostics")
        {
            continue;
        }
        let params = message.get("params").expect("Notification should have params");
        if params.get("uri").and_then(Value::as_str) == Some(uri) {
            return params
                .get("diagnostics")
                .and_then(Value::as_array)
                .cloned()
                .expect("Diagnostics array");
        }
    }
}

fn validate_document_symbol_capability(response: &Value) {
    // Validate that document symbol capability is advertised
    let capabilities = response
        .get("result")
        .and_then(|r| r.get("capabilities"))
        .expect("Response should have server capabilities");

    let document_symbol_provider = capabilities.get("documentSymbolProvider");
    assert!(
        document_symbol_provider.is_some() && !document_symbol_provider.unwrap().is_null(),
        "Server should advertise document symbol provider capability"
    );
}

fn validate_symbols_response(response: &Value) {
    assert_eq!(response.get("jsonrpc").and_then(Value::as_str), Some("2.0"));
    assert_eq!(response.get("id").and_then(Value::as_u64), Some(2));

    let result = response.get("result").expect("Response should have result");
    let symbols = result.as_array().expect("Result should be an array");

    // One top-level heading with its two sections nested below it
    assert_eq!(symbols.len(), 1, "got {:?}", symbols);
    let project = &symbols[0];
    assert_eq!(project.get("name").and_then(Value::as_str), Some("Project"));
    assert_eq!(project.get("detail").and_then(Value::as_str), Some("#project"));
    assert!(project.get("kind").is_some(), "Symbol should have kind");
    assert!(project.get("range").is_some(), "Symbol should have range");
    assert!(
        project.get("selectionRange").is_some(),
        "Symbol should have selectionRange"
    );

    let children = project
        .get("children")
        .and_then(Value::as_array)
        .expect("Nested sections");
    let names: Vec<&str> = children
        .iter()
        .filter_map(|child| child.get("name").and_then(Value::as_str))
        .collect();
    assert_eq!(names, vec!["Install", "Usage"]);
}

fn shutdown_server(mut child: std::process::Child) {
    // Close stdin to signal we're done
    drop(child.stdin.take());

    // Give the server a moment to exit gracefully
    std::thread::sleep(SHUTDOWN_GRACE_PERIOD);

    match child.try_wait() {
        Ok(Some(status)) => {
            if !status.success() {
                eprintln!("Server exited with non-zero status: {:?}", status);
            }
        }
        Ok(None) => {
            // Still running, force termination
            eprintln!("Server didn't exit gracefully, forcing termination");
            let _ = child.kill();
            let _ = child.wait();
        }
        Err(e) => panic!("Error checking server status: {}", e),
    }
}
