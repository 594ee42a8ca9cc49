#![cfg(feature = "gateway-http")]

use std::time::Duration;

use rgateway::{
    CancellationToken, ContentPart, GatewayClient, GatewayErrorKind, HttpGatewayClient,
    HttpGatewayConfig, Message, MessageContent, ModelRequest, SecretString, StreamEvent,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

async fn serve_once(response: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener.local_addr().expect("local address");

    let task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("client connects");
        let request = read_request(&mut socket).await;
        socket
            .write_all(response.as_bytes())
            .await
            .expect("response written");
        let _ = socket.shutdown().await;
        request
    });

    (format!("http://{address}"), task)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];

    loop {
        let read = socket.read(&mut chunk).await.expect("request readable");
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        if let Some(end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buffer[..end]).to_ascii_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buffer.len() >= end + 4 + length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

fn json_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn sse_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{body}"
    )
}

fn client(base_url: &str) -> HttpGatewayClient {
    HttpGatewayClient::new(
        HttpGatewayConfig::new(SecretString::new("sk-test"))
            .with_base_url(base_url)
            .with_timeout(Duration::from_secs(5)),
    )
    .expect("client should build")
}

fn request() -> ModelRequest {
    ModelRequest::new(
        "openai/gpt-4o-mini",
        vec![Message::system("be brief"), Message::user("hello")],
    )
}

#[tokio::test]
async fn complete_sends_bearer_auth_and_parses_choices() {
    let body = r#"{"id":"chatcmpl-9","model":"openai/gpt-4o-mini","choices":[{"index":0,"message":{"role":"assistant","content":"hi there"},"finish_reason":"stop"}],"usage":{"prompt_tokens":4,"completion_tokens":2,"total_tokens":6}}"#;
    let (base_url, server) = serve_once(json_response("200 OK", body)).await;

    let response = client(&base_url)
        .complete(request())
        .await
        .expect("completion should succeed");
    let captured = server.await.expect("server task");

    assert!(captured.starts_with("POST /v1/chat/completions HTTP/1.1"));
    assert!(
        captured
            .to_ascii_lowercase()
            .contains("authorization: bearer sk-test")
    );
    assert!(captured.contains(r#""model":"openai/gpt-4o-mini""#));
    assert!(!captured.contains(r#""stream""#));
    assert_eq!(response.id, "chatcmpl-9");
    assert_eq!(
        response.first_choice().map(|choice| choice.text.as_str()),
        Some("hi there")
    );
    assert_eq!(response.total_tokens(), Some(6));
}

#[tokio::test]
async fn complete_surfaces_upstream_error_envelope() {
    let body = r#"{"error":{"message":"model not found","type":"invalid_request_error","code":"model_not_found"}}"#;
    let (base_url, _server) = serve_once(json_response("404 Not Found", body)).await;

    let error = client(&base_url)
        .complete(request())
        .await
        .expect_err("404 must fail");

    assert_eq!(error.kind, GatewayErrorKind::InvalidRequest);
    assert_eq!(error.message, "model not found");
    assert_eq!(error.error_type.as_deref(), Some("invalid_request_error"));
    assert_eq!(error.code.as_deref(), Some("model_not_found"));
    assert_eq!(error.status, Some(404));
}

#[tokio::test]
async fn complete_with_unparseable_error_body_reports_status_only() {
    let (base_url, _server) =
        serve_once(json_response("502 Bad Gateway", "upstream exploded")).await;

    let error = client(&base_url)
        .complete(request())
        .await
        .expect_err("502 must fail");

    assert_eq!(error.kind, GatewayErrorKind::Unavailable);
    assert_eq!(error.message, "API error (status 502)");
}

#[tokio::test]
async fn stream_relays_fragments_and_requests_event_stream() {
    let sse = [
        r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
        r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#,
        ": keep-alive",
        r#"data: {"choices":[{"delta":{"content":", world"}}]}"#,
        "data: [DONE]",
        "",
    ]
    .join("\n");
    let (base_url, server) = serve_once(sse_response(&sse)).await;

    let image = MessageContent::Multimodal(vec![
        ContentPart::text("describe"),
        ContentPart::image(vec![1, 2, 3], "image/png"),
    ]);
    let request = ModelRequest::new("openai/gpt-4o-mini", vec![Message::user(image)]);
    let mut handle = client(&base_url).stream(request, CancellationToken::new());

    let mut text = String::new();
    while let Some(event) = handle.events.recv().await {
        if let StreamEvent::TextDelta(delta) = event {
            text.push_str(&delta);
        }
    }
    assert!(handle.errors.recv().await.is_none());
    assert_eq!(text, "Hello, world");

    let captured = server.await.expect("server task");
    assert!(
        captured
            .to_ascii_lowercase()
            .contains("accept: text/event-stream")
    );
    assert!(captured.contains(r#""stream":true"#));
    assert!(captured.contains("data:image/png;base64,AQID"));
}

#[tokio::test]
async fn stream_reports_http_errors_on_error_channel() {
    let body = r#"{"error":{"message":"bad key","type":"auth_error"}}"#;
    let (base_url, _server) = serve_once(json_response("401 Unauthorized", body)).await;

    let mut handle = client(&base_url).stream(request(), CancellationToken::new());

    assert_eq!(handle.events.recv().await, None);
    let error = handle.errors.recv().await.expect("error reported");
    assert_eq!(error.kind, GatewayErrorKind::Authentication);
    assert_eq!(error.message, "bad key");
}

#[tokio::test]
async fn stream_cancelled_before_headers_reports_cancellation() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let base_url = format!("http://{}", listener.local_addr().expect("address"));
    let _server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("client connects");
        let _ = read_request(&mut socket).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let cancel = CancellationToken::new();
    let mut handle = client(&base_url).stream(request(), cancel.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let error = tokio::time::timeout(Duration::from_secs(2), handle.errors.recv())
        .await
        .expect("cancellation must be prompt")
        .expect("error reported");
    assert!(error.is_cancelled());
}

#[tokio::test]
async fn list_models_returns_ids() {
    let body = r#"{"object":"list","data":[{"id":"openai/gpt-4o-mini"},{"id":"anthropic/claude-sonnet"}]}"#;
    let (base_url, server) = serve_once(json_response("200 OK", body)).await;

    let models = client(&base_url)
        .list_models()
        .await
        .expect("models should list");

    assert_eq!(models, vec!["openai/gpt-4o-mini", "anthropic/claude-sonnet"]);
    assert!(
        server
            .await
            .expect("server task")
            .starts_with("GET /v1/models HTTP/1.1")
    );
}
