use devpulse_core::services::DeliveryChannel;
use devpulse_core::{DevpulseError, RenderedImage, SlackConfig};
use devpulse_report::slack::SlackChannel;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A captured HTTP request.
#[derive(Debug)]
struct Captured {
    request_line: String,
    headers: String,
    body: Vec<u8>,
}

/// Serve one canned response per incoming connection, in order, and return
/// what each request looked like. Responses are built from the server's base
/// URL so they can point back at it.
async fn serve<F>(responses: F) -> (String, JoinHandle<Vec<Captured>>)
where
    F: FnOnce(&str) -> Vec<String>,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let responses = responses(&base);
    let handle = tokio::spawn(async move {
        let mut captured = Vec::new();
        for body in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            captured.push(read_request(&mut socket).await);
            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
        captured
    });
    (base, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let length = head
        .lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let (request_line, headers) = head.split_once("\r\n").unwrap();
    Captured {
        request_line: request_line.to_string(),
        headers: headers.to_lowercase(),
        body: buf[header_end..].to_vec(),
    }
}

fn channel(base: &str) -> SlackChannel {
    named_channel(base, "C0123456")
}

fn named_channel(base: &str, name: &str) -> SlackChannel {
    let config = SlackConfig {
        bot_token: Some("xoxb-test".into()),
        channel: name.into(),
    };
    SlackChannel::new(&config).unwrap().with_api_base(base)
}

#[tokio::test]
async fn text_only_uses_post_message() {
    let (base, server) = serve(|_| vec![r#"{"ok":true}"#.into()]).await;
    channel(&base).post("hello team", None).await.unwrap();

    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].request_line.starts_with("POST /chat.postMessage"));
    assert!(requests[0].headers.contains("authorization: bearer xoxb-test"));
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["channel"], "C0123456");
    assert_eq!(body["text"], "hello team");
}

#[tokio::test]
async fn image_goes_through_external_upload() {
    let (base, server) = serve(|base| {
        vec![
            format!(r#"{{"ok":true,"upload_url":"{base}/upload/F1","file_id":"F1"}}"#),
            "OK".to_string(),
            r#"{"ok":true,"files":[{"id":"F1"}]}"#.to_string(),
        ]
    })
    .await;
    let image = RenderedImage::svg("churn_chart.svg", "<svg/>".into());
    channel(&base)
        .post("*Dev Insight Report*", Some(&image))
        .await
        .unwrap();

    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].request_line.starts_with("POST /files.getUploadURLExternal"));
    let form = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(form.contains("filename=churn_chart.svg"));
    assert!(form.contains("length=6"));

    assert!(requests[1].request_line.starts_with("POST /upload/F1"));
    assert_eq!(requests[1].body, b"<svg/>");

    assert!(requests[2].request_line.starts_with("POST /files.completeUploadExternal"));
    let body: serde_json::Value = serde_json::from_slice(&requests[2].body).unwrap();
    assert_eq!(body["channel_id"], "C0123456");
    assert_eq!(body["initial_comment"], "*Dev Insight Report*");
    assert_eq!(body["files"][0]["id"], "F1");
}

#[tokio::test]
async fn slack_error_is_delivery_error() {
    let (base, server) = serve(|_| vec![r#"{"ok":false,"error":"not_in_channel"}"#.into()]).await;
    let err = channel(&base).post("hello", None).await.unwrap_err();
    assert!(matches!(err, DevpulseError::Delivery(_)));
    assert!(err.to_string().contains("not_in_channel"));
    server.await.unwrap();
}

#[tokio::test]
async fn channel_name_falls_back_to_text_post() {
    let (base, server) = serve(|_| vec![r#"{"ok":true}"#.into()]).await;
    let image = RenderedImage::svg("churn_chart.svg", "<svg/>".into());
    named_channel(&base, "#general")
        .post("*Dev Insight Report*", Some(&image))
        .await
        .unwrap();

    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].request_line.starts_with("POST /chat.postMessage"));
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["channel"], "#general");
    assert_eq!(body["text"], "*Dev Insight Report*");
}
