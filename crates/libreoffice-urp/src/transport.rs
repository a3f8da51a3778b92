//! URP block framing over TCP.
//!
//! Every block starts with an 8-byte header: payload size (u32 BE) followed
//! by the number of messages in the block (u32 BE). LibreOffice writes one
//! message per block and so do we.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Result, UrpError};

const BLOCK_HEADER_LEN: usize = 8;

/// Framed TCP stream.
pub struct Transport {
    stream: TcpStream,
}

impl Transport {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Write `data` as a single-message block.
    pub async fn send_message(&mut self, data: &[u8]) -> Result<()> {
        let mut header = [0u8; BLOCK_HEADER_LEN];
        header[0..4].copy_from_slice(&(data.len() as u32).to_be_bytes());
        header[4..8].copy_from_slice(&1u32.to_be_bytes());

        self.stream.write_all(&header).await?;
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one block and return its payload.
    ///
    /// Blocks carrying several messages are returned whole; the peers this
    /// client talks to never batch.
    pub async fn recv_message(&mut self) -> Result<Bytes> {
        let mut header = [0u8; BLOCK_HEADER_LEN];
        match self.stream.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(UrpError::ConnectionClosed);
            }
            Err(e) => return Err(UrpError::Io(e)),
        }

        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        if size == 0 {
            return Ok(Bytes::new());
        }

        let mut payload = BytesMut::zeroed(size);
        match self.stream.read_exact(&mut payload).await {
            Ok(_) => Ok(payload.freeze()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(UrpError::ConnectionClosed)
            }
            Err(e) => Err(UrpError::Io(e)),
        }
    }

    /// Close the write half; the office sees EOF and disposes the bridge.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
