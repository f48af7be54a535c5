// tests/control_http.rs
//
// FeedControl requests against a throwaway HTTP/1.1 server, plus the session
// firing them when the feed is toggled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use livestock_feed::{
    ClientConfig, EventSink, FeedControl, FeedSession, FeedStatus, NewsSubmission,
    StreamTransport, TransportError,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Answer one request with `response`; resolves to the full request (head + body).
async fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let task = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let req = read_request(&mut sock).await;
        sock.write_all(response.as_bytes()).await.unwrap();
        sock.shutdown().await.ok();
        req
    });
    (base, task)
}

async fn read_request(sock: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = sock.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client hung up mid-request");
        buf.extend_from_slice(&chunk[..n]);
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let body_len = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + body_len {
        let n = sock.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8_lossy(&buf).to_string()
}

const OK_EMPTY: &str = "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

#[tokio::test]
async fn start_and_stop_post_to_their_paths() {
    let (base, server) = serve_once(OK_EMPTY).await;
    let ctrl = FeedControl::from_config(&ClientConfig::with_base_url(&base));
    ctrl.start_feed().await.unwrap();
    let req = server.await.unwrap();
    assert!(req.starts_with("POST /api/feed/start HTTP/1.1"), "req: {req}");

    let (base, server) = serve_once(OK_EMPTY).await;
    let ctrl = FeedControl::from_config(&ClientConfig::with_base_url(&base));
    ctrl.stop_feed().await.unwrap();
    let req = server.await.unwrap();
    assert!(req.starts_with("POST /api/feed/stop HTTP/1.1"), "req: {req}");
}

#[tokio::test]
async fn server_error_is_reported_to_the_caller() {
    let (base, _server) = serve_once(
        "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    )
    .await;
    let ctrl = FeedControl::from_config(&ClientConfig::with_base_url(&base));
    let err = ctrl.start_feed().await.unwrap_err();
    assert!(format!("{err:#}").contains("feed start"), "err: {err:#}");
}

#[tokio::test]
async fn status_reads_running_flag() {
    let (base, server) = serve_once(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 16\r\nConnection: close\r\n\r\n{\"running\":true}",
    )
    .await;
    let ctrl = FeedControl::from_config(&ClientConfig::with_base_url(&base));
    let status = ctrl.status().await.unwrap();
    assert_eq!(status, FeedStatus { running: true });
    let req = server.await.unwrap();
    assert!(req.starts_with("GET /api/feed/status HTTP/1.1"), "req: {req}");
}

#[tokio::test]
async fn submit_posts_json_news_item() {
    let (base, server) = serve_once(OK_EMPTY).await;
    let ctrl = FeedControl::from_config(&ClientConfig::with_base_url(&base));
    let item = NewsSubmission {
        source: "CNBC".into(),
        headline: "Regulator signals possible rate cuts".into(),
        url: None,
        content: "Comments hinted at easing policy.".into(),
    };
    ctrl.submit(&item).await.unwrap();

    let req = server.await.unwrap();
    assert!(req.starts_with("POST /api/news HTTP/1.1"), "req: {req}");
    let body = req.split("\r\n\r\n").nth(1).unwrap_or_default();
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["headline"], "Regulator signals possible rate cuts");
    assert!(json.get("url").is_none());
}

struct IdleTransport;

#[async_trait]
impl StreamTransport for IdleTransport {
    async fn run(&self, _sink: EventSink) -> Result<(), TransportError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn session_fires_stop_trigger_without_waiting_for_it() {
    let (base, server) = serve_once(OK_EMPTY).await;
    let cfg = ClientConfig::with_base_url(&base);
    let (session, handle) =
        FeedSession::new(&cfg, Arc::new(IdleTransport), Some(FeedControl::from_config(&cfg)));
    let task = tokio::spawn(session.run());

    handle.stop_feed().await.unwrap();
    let req = tokio::time::timeout(Duration::from_secs(3), server)
        .await
        .expect("no control request arrived")
        .unwrap();
    assert!(req.starts_with("POST /api/feed/stop HTTP/1.1"), "req: {req}");

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn unreachable_backend_does_not_disturb_the_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let cfg = ClientConfig {
        auto_start: false,
        ..ClientConfig::with_base_url(&base)
    };
    let (session, handle) =
        FeedSession::new(&cfg, Arc::new(IdleTransport), Some(FeedControl::from_config(&cfg)));
    let task = tokio::spawn(session.run());

    handle.start_feed().await.unwrap();
    let mut views = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(2), views.wait_for(|v| v.feed_active))
        .await
        .unwrap()
        .unwrap();

    handle.stop_feed().await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), views.wait_for(|v| !v.feed_active))
        .await
        .unwrap()
        .unwrap();

    handle.shutdown().await;
    task.await.unwrap();
}
