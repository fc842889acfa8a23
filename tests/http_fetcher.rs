// tests/http_fetcher.rs

use std::error::Error;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use lazyload::engine::{DenialReason, FetchOutcome};
use lazyload::fetch::{fetch_with_timeout, HttpFetcher, ResourceFetcher};
use lazyload::queue::Origin;

type TestResult = Result<(), Box<dyn Error>>;

/// Minimal HTTP/1.1 server answering by request path.
async fn serve() -> Result<String, Box<dyn Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => read += n,
                    }
                }
                let request = String::from_utf8_lossy(&buf[..read]);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let (status, body) = match path.as_str() {
                    "/js/ok.js" => ("200 OK", "var ok = true;"),
                    "/cached.css" => ("304 Not Modified", ""),
                    "/slow.js" => {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        ("200 OK", "late")
                    }
                    _ => ("404 Not Found", "missing"),
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    if status.starts_with("304") { 0 } else { body.len() }
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn relative_locator_is_fetched_against_page_origin() -> TestResult {
    let base = serve().await?;
    let fetcher = HttpFetcher::new(Origin::parse(&base))?;

    let outcome = fetcher.fetch("js/ok.js".to_string()).await;
    assert_eq!(outcome, FetchOutcome::Success("var ok = true;".to_string()));
    Ok(())
}

#[tokio::test]
async fn not_modified_counts_as_success() -> TestResult {
    let base = serve().await?;
    let fetcher = HttpFetcher::new(None)?;

    let outcome = fetcher.fetch(format!("{base}/cached.css")).await;
    assert_eq!(outcome, FetchOutcome::Success(String::new()));
    Ok(())
}

#[tokio::test]
async fn error_status_is_a_transport_error() -> TestResult {
    let base = serve().await?;
    let fetcher = HttpFetcher::new(Origin::parse(&base))?;

    let outcome = fetcher.fetch("/nope.js".to_string()).await;
    assert_eq!(outcome, FetchOutcome::TransportError("HTTP 404".to_string()));
    Ok(())
}

#[tokio::test]
async fn refused_connection_is_denied() -> TestResult {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let fetcher = HttpFetcher::new(None)?;
    let outcome = fetcher.fetch(format!("http://{addr}/a.js")).await;
    assert_eq!(outcome, FetchOutcome::Denied(DenialReason::Refused));
    Ok(())
}

#[tokio::test]
async fn relative_locator_without_origin_is_denied() -> TestResult {
    let fetcher = HttpFetcher::new(None)?;
    let outcome = fetcher.fetch("js/ok.js".to_string()).await;
    assert_eq!(outcome, FetchOutcome::Denied(DenialReason::Refused));
    Ok(())
}

#[tokio::test]
async fn slow_server_hits_the_fetch_timeout() -> TestResult {
    let base = serve().await?;
    let fetcher = HttpFetcher::new(Origin::parse(&base))?;

    let outcome =
        fetch_with_timeout(&fetcher, "slow.js".to_string(), Duration::from_millis(100)).await;
    assert_eq!(outcome, FetchOutcome::TimedOut(Duration::from_millis(100)));
    Ok(())
}
