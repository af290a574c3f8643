use anyhow::Result;
use llm_server_benchmark::{BenchmarkSpec, ChatMessage, IssuerFactory, OpenAiIssuerFactory, Prompt};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const COMPLETION_BODY: &str = r#"{
  "id": "chatcmpl-1",
  "object": "chat.completion",
  "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello there"}}],
  "usage": {"prompt_tokens": 12, "completion_tokens": 34, "total_tokens": 46}
}"#;

/// Read one HTTP request (headers plus `Content-Length` body) from `stream`.
async fn read_request(stream: &mut tokio::net::TcpStream) -> Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                return Ok(text);
            }
        }
    }
    Ok(String::from_utf8_lossy(&buf).to_string())
}

/// Serve exactly one request with `status` and `body`, returning what was received.
async fn serve_once(
    status: &'static str,
    body: &'static str,
) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/v1", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await.unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        request
    });

    (base_url, handle)
}

fn spec_for(base_url: String) -> BenchmarkSpec {
    let mut spec = BenchmarkSpec::new("http", "sk-secret", "served-model");
    spec.base_url = Some(base_url);
    spec
}

fn prompt() -> Prompt {
    Prompt::new(vec![ChatMessage::new("user", "Say hello")])
}

#[tokio::test]
async fn completion_reports_usage_and_content() -> Result<()> {
    let (base_url, server) = serve_once("200 OK", COMPLETION_BODY).await;
    let factory = OpenAiIssuerFactory::from_spec(&spec_for(base_url))?;
    let mut issuer = factory.create(1, 1)?;

    let outcome = issuer.complete(&prompt(), Duration::from_secs(5)).await?;

    assert_eq!(outcome.sample.output_tokens, 34);
    assert_eq!(outcome.sample.input_tokens, 12);
    assert!(outcome.sample.latency_seconds > 0.0);
    assert_eq!(outcome.content.as_deref(), Some("Hello there"));

    let request = server.await?;
    assert!(request.starts_with("POST /v1/chat/completions"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-secret"));
    assert!(request.contains("\"model\":\"served-model\""));
    assert!(request.contains("Say hello"));
    Ok(())
}

#[tokio::test]
async fn non_success_status_is_an_error() -> Result<()> {
    let (base_url, server) =
        serve_once("503 Service Unavailable", r#"{"error":"overloaded"}"#).await;
    let factory = OpenAiIssuerFactory::from_spec(&spec_for(base_url))?;
    let mut issuer = factory.create(1, 1)?;

    let err = issuer
        .complete(&prompt(), Duration::from_secs(5))
        .await
        .unwrap_err();

    let message = format!("{:#}", err);
    assert!(message.contains("503"), "unexpected error: {}", message);
    server.await?;
    Ok(())
}

#[tokio::test]
async fn missing_usage_is_an_error() -> Result<()> {
    let (base_url, server) = serve_once("200 OK", r#"{"choices": []}"#).await;
    let factory = OpenAiIssuerFactory::from_spec(&spec_for(base_url))?;
    let mut issuer = factory.create(1, 1)?;

    assert!(issuer
        .complete(&prompt(), Duration::from_secs(5))
        .await
        .is_err());
    server.await?;
    Ok(())
}
