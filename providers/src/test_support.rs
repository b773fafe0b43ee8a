//! Raw HTTP/1.1 server for transport failures wiremock cannot produce
//! (bodies that stall or end early).

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What to write on one connection, and how long to keep it open afterwards.
pub(crate) struct RawReply {
    pub bytes: Vec<u8>,
    pub hold: Duration,
}

impl RawReply {
    /// Complete response that closes the connection.
    pub(crate) fn complete(status: u16, body: &str) -> Self {
        Self {
            bytes: format!(
                "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            )
            .into_bytes(),
            hold: Duration::ZERO,
        }
    }

    /// Headers announcing `declared_len` body bytes, followed by only `partial`.
    pub(crate) fn truncated(status: u16, declared_len: usize, partial: &str, hold: Duration) -> Self {
        Self {
            bytes: format!(
                "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {declared_len}\r\n\r\n{partial}"
            )
            .into_bytes(),
            hold,
        }
    }
}

pub(crate) struct RawServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
}

impl RawServer {
    /// Serve connection `n` (zero-based) with `reply(n)`.
    pub(crate) async fn start<F>(reply: F) -> Self
    where
        F: Fn(usize) -> RawReply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connections);
        let reply = Arc::new(reply);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let reply = Arc::clone(&reply);
                tokio::spawn(async move { serve(stream, reply(n)).await });
            }
        });

        Self { addr, connections }
    }

    pub(crate) fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn serve(mut stream: TcpStream, reply: RawReply) {
    if read_request(&mut stream).await.is_none() {
        return;
    }
    if stream.write_all(&reply.bytes).await.is_err() {
        return;
    }
    let _ = stream.flush().await;
    tokio::time::sleep(reply.hold).await;
    let _ = stream.shutdown().await;
}

/// Consume one request (headers plus `content-length` body bytes).
async fn read_request(stream: &mut TcpStream) -> Option<()> {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let body_len = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + body_len {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(())
}
