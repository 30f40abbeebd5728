//! Newline-delimited JSON upstream over TCP
//!
//! Protocol: after connecting, the client writes one JSON line with the
//! filter and credentials. The server then streams one JSON item per line.
//! Blank lines are keep-alives. EOF ends the stream.

use bytes::Bytes;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use crate::error::{Result, WallError};

use super::config::{Credentials, UpstreamConfig};
use super::connector::{FilterParams, StreamConnector, UpstreamEvent, UpstreamStream};

#[derive(Serialize)]
struct FilterRequest<'a> {
    track: String,
    credentials: &'a Credentials,
}

/// Connector for newline-delimited JSON streams
#[derive(Debug, Clone)]
pub struct TcpJsonConnector {
    config: UpstreamConfig,
}

impl TcpJsonConnector {
    /// Create a connector
    pub fn new(config: UpstreamConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    async fn handshake(&self, filter: &FilterParams) -> Result<TcpJsonStream> {
        let socket = TcpStream::connect(&self.config.endpoint).await?;
        socket.set_nodelay(true)?;

        let (read_half, mut write_half) = socket.into_split();

        let request = FilterRequest {
            track: filter.track_param(),
            credentials: &self.config.credentials,
        };
        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');

        write_half.write_all(&line).await?;
        write_half.flush().await?;

        Ok(TcpJsonStream {
            reader: BufReader::new(read_half),
            writer: write_half,
            line: Vec::with_capacity(4096),
            stall_timeout: self.config.stall_timeout,
            max_line: self.config.max_item_bytes.max(1),
        })
    }
}

impl StreamConnector for TcpJsonConnector {
    type Stream = TcpJsonStream;

    async fn open(&self, filter: &FilterParams) -> Result<TcpJsonStream> {
        tracing::debug!(endpoint = %self.config.endpoint, "Opening upstream stream");

        timeout(self.config.connect_timeout, self.handshake(filter))
            .await
            .map_err(|_| WallError::Timeout("upstream connect"))?
    }
}

/// An open newline-delimited JSON stream
#[derive(Debug)]
pub struct TcpJsonStream {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Partial line; survives a cancelled read
    line: Vec<u8>,
    stall_timeout: Duration,
    max_line: usize,
}

impl UpstreamStream for TcpJsonStream {
    async fn next_event(&mut self) -> UpstreamEvent {
        loop {
            // One byte past the limit, so an oversized record is detectable
            let budget = (self.max_line + 1).saturating_sub(self.line.len()) as u64;
            let read = timeout(
                self.stall_timeout,
                (&mut self.reader)
                    .take(budget)
                    .read_until(b'\n', &mut self.line),
            )
            .await;

            match read {
                Err(_) => return UpstreamEvent::Error(WallError::Timeout("upstream stalled")),
                Ok(Err(e)) => return UpstreamEvent::Error(e.into()),
                Ok(Ok(0)) => return UpstreamEvent::End,
                Ok(Ok(_)) => {
                    if self.line.last() != Some(&b'\n') && self.line.len() > self.max_line {
                        self.line.clear();
                        return UpstreamEvent::Error(WallError::Upstream(format!(
                            "item record exceeds {} bytes",
                            self.max_line
                        )));
                    }

                    let line = std::mem::take(&mut self.line);
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return UpstreamEvent::Item(Bytes::from(line));
                }
            }
        }
    }

    async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_stream_items_and_end() {
        let (listener, addr) = listener().await;

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);

            let mut request = String::new();
            reader.read_line(&mut request).await.unwrap();

            let socket = reader.get_mut();
            socket
                .write_all(b"{\"text\": \"one\"}\r\n\r\n{\"text\": \"two\"}\n")
                .await
                .unwrap();
            request
        });

        let connector = TcpJsonConnector::new(UpstreamConfig::new(&addr, ["barcamp", "bcb13"]));
        let mut stream = connector
            .open(&FilterParams::new(["barcamp", "bcb13"]))
            .await
            .unwrap();

        match stream.next_event().await {
            UpstreamEvent::Item(raw) => assert_eq!(&raw[..], b"{\"text\": \"one\"}\r\n"),
            other => panic!("unexpected event: {:?}", other),
        }
        // Keep-alive line is skipped
        match stream.next_event().await {
            UpstreamEvent::Item(raw) => assert_eq!(&raw[..], b"{\"text\": \"two\"}\n"),
            other => panic!("unexpected event: {:?}", other),
        }

        let request = server.await.unwrap();
        let request: serde_json::Value = serde_json::from_str(&request).unwrap();
        assert_eq!(request["track"], "barcamp,bcb13");
        assert!(request["credentials"].is_object());

        assert!(matches!(stream.next_event().await, UpstreamEvent::End));
        stream.close().await;
    }

    #[tokio::test]
    async fn test_stall_timeout() {
        let (listener, addr) = listener().await;

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 512];
            let _ = socket.read(&mut buf).await;
            // Hold the connection open without sending anything
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let config = UpstreamConfig::new(&addr, ["barcamp"]).stall_timeout(Duration::from_millis(50));
        let mut stream = TcpJsonConnector::new(config)
            .open(&FilterParams::new(["barcamp"]))
            .await
            .unwrap();

        assert!(matches!(
            stream.next_event().await,
            UpstreamEvent::Error(WallError::Timeout(_))
        ));

        server.abort();
    }

    #[tokio::test]
    async fn test_oversized_record_is_rejected() {
        let (listener, addr) = listener().await;

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut request = String::new();
            reader.read_line(&mut request).await.unwrap();

            let socket = reader.get_mut();
            socket.write_all(b"{\"text\": \"ok\"}\n").await.unwrap();
            // A record that never ends
            loop {
                if socket.write_all(&[b'x'; 64]).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });

        let config = UpstreamConfig::new(&addr, ["barcamp"]).max_item_bytes(32);
        let mut stream = TcpJsonConnector::new(config)
            .open(&FilterParams::new(["barcamp"]))
            .await
            .unwrap();

        assert!(matches!(stream.next_event().await, UpstreamEvent::Item(_)));
        match stream.next_event().await {
            UpstreamEvent::Error(WallError::Upstream(msg)) => assert!(msg.contains("32")),
            other => panic!("unexpected event: {:?}", other),
        }

        stream.close().await;
        server.abort();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (listener, addr) = listener().await;
        drop(listener);

        let connector = TcpJsonConnector::new(UpstreamConfig::new(&addr, ["barcamp"]));
        let result = connector.open(&FilterParams::new(["barcamp"])).await;

        assert!(matches!(result, Err(WallError::Io(_))));
    }
}
