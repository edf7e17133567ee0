//! TCP stream transport.
//!
//! Bytes pass through unchanged: TCP already delivers an ordered byte stream,
//! so there is no chunking layer. Both halves are buffered.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use super::{Received, Transport, TransportReader, TransportWriter};
use crate::config::StreamConfig;
use crate::error::{Result, SignerError};

/// Buffer size of both stream halves.
const BUFFER_SIZE: usize = 1024;

/// TCP link to a signer or emulator.
#[derive(Debug, Clone)]
pub struct StreamTransport {
    config: StreamConfig,
}

impl StreamTransport {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    /// Link to `host:port` with the default connect timeout.
    pub fn to(host: impl Into<String>, port: u16) -> Self {
        Self::new(StreamConfig::new(host, port))
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

impl Default for StreamTransport {
    fn default() -> Self {
        Self::new(StreamConfig::default())
    }
}

#[async_trait]
impl Transport for StreamTransport {
    type Reader = StreamReader;
    type Writer = StreamWriter;

    fn target(&self) -> String {
        self.config.address()
    }

    async fn open(&mut self) -> Result<(StreamReader, StreamWriter)> {
        let target = self.target();
        let host = self.config.host.trim_start_matches('[').trim_end_matches(']');
        let connect = TcpStream::connect((host, self.config.port));

        let stream = match tokio::time::timeout(self.config.connect_timeout(), connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(SignerError::Connect { target, source }),
            Err(_) => {
                return Err(SignerError::Connect {
                    target,
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                })
            }
        };
        stream.set_nodelay(true)?;
        debug!("TCP link open to {}", target);

        let (read_half, write_half) = stream.into_split();
        Ok((
            StreamReader {
                reader: BufReader::with_capacity(BUFFER_SIZE, read_half),
                buf: vec![0u8; BUFFER_SIZE],
            },
            StreamWriter {
                writer: BufWriter::with_capacity(BUFFER_SIZE, write_half),
            },
        ))
    }
}

/// Reading half of a TCP link.
pub struct StreamReader {
    reader: BufReader<OwnedReadHalf>,
    buf: Vec<u8>,
}

#[async_trait]
impl TransportReader for StreamReader {
    async fn receive(&mut self) -> Result<Received> {
        let n = self.reader.read(&mut self.buf).await?;
        if n == 0 {
            return Ok(Received::EndOfStream);
        }
        Ok(Received::Data(Bytes::copy_from_slice(&self.buf[..n])))
    }
}

/// Writing half of a TCP link.
pub struct StreamWriter {
    writer: BufWriter<OwnedWriteHalf>,
}

#[async_trait]
impl TransportWriter for StreamWriter {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        debug!("stream writer shut down");
        Ok(())
    }
}
