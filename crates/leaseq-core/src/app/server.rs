//! Server - TCP listener と接続ごとの行ループ
//!
//! 1 接続 = 1 tokio task。1 行読んで QueueService に渡し、応答を 1 行返す。
//! store の排他は QueueService のロックが担うので、接続同士は並行に動きます。
//!
//! リクエストの区切りは `\n`。ただし改行を送らずに応答を待つクライアントもいるので、
//! 途中までのリクエストは `idle_timeout` の間バイトが来なければ 1 件として扱います。

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use super::QueueService;
use crate::protocol::{Command, Response};

/// How long a partial request may sit without new bytes before it is
/// answered as if it had been terminated.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(100);

const READ_CHUNK: usize = 8 * 1024;

pub struct Server {
    listener: TcpListener,
    service: QueueService,
    max_line_len: usize,
    idle_timeout: Duration,
}

impl Server {
    pub async fn bind(addr: &str, service: QueueService, max_line_len: usize) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            service,
            max_line_len,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.listener.accept() => match result {
                    Ok((stream, peer)) => {
                        debug!(%peer, "connection accepted");
                        let service = self.service.clone();
                        let max_line_len = self.max_line_len;
                        let idle_timeout = self.idle_timeout;
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, service, max_line_len, idle_timeout).await
                            {
                                warn!(%peer, error = %e, "connection error");
                            }
                            debug!(%peer, "connection closed");
                        });
                    }
                    Err(e) => error!(error = %e, "accept error"),
                },
                _ = &mut shutdown => {
                    info!("shutting down listener");
                    break;
                }
            }
        }
        Ok(())
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    service: QueueService,
    max_line_len: usize,
    idle_timeout: Duration,
) -> io::Result<()> {
    let (mut reader, mut writer) = stream.split();
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    // Bytes of `buf` already known to hold no '\n'.
    let mut scanned = 0;

    loop {
        while let Some(at) = buf[scanned..].iter().position(|&b| b == b'\n') {
            let at = scanned + at;
            if at > max_line_len {
                return reject_oversized(&mut writer, at).await;
            }
            let line: Vec<u8> = buf.drain(..=at).collect();
            respond(&mut writer, &service, &line[..at]).await?;
            scanned = 0;
        }
        scanned = buf.len();
        if buf.len() > max_line_len {
            return reject_oversized(&mut writer, buf.len()).await;
        }

        let read = if buf.is_empty() {
            reader.read(&mut chunk).await?
        } else {
            // A partial request followed by silence is taken as complete.
            match tokio::time::timeout(idle_timeout, reader.read(&mut chunk)).await {
                Ok(read) => read?,
                Err(_) => {
                    let line = std::mem::take(&mut buf);
                    scanned = 0;
                    respond(&mut writer, &service, &line).await?;
                    continue;
                }
            }
        };

        if read == 0 {
            if !buf.is_empty() {
                respond(&mut writer, &service, &buf).await?;
            }
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..read]);
    }
}

async fn respond(
    writer: &mut (impl AsyncWrite + Unpin),
    service: &QueueService,
    raw: &[u8],
) -> io::Result<()> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let response = match std::str::from_utf8(raw) {
        Ok(line) => match Command::parse(line) {
            Ok(command) => service.handle(command).await,
            Err(e) => {
                warn!(error = %e, "bad request");
                Response::Error
            }
        },
        Err(_) => {
            warn!("request is not valid UTF-8");
            Response::Error
        }
    };

    let mut out = response.to_string().into_bytes();
    out.push(b'\n');
    writer.write_all(&out).await
}

async fn reject_oversized(writer: &mut (impl AsyncWrite + Unpin), bytes: usize) -> io::Result<()> {
    warn!(bytes, "request line too long, closing connection");
    writer.write_all(b"ERROR\n").await?;
    writer.shutdown().await
}
