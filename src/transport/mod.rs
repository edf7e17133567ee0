//! Transport module - byte links to the signer.
//!
//! A [`Transport`] opens a link and splits it into a [`TransportReader`] and a
//! [`TransportWriter`], so that the engine's read loop and outbound sends never
//! contend for one handle. Transports move raw frame bytes; framing lives in
//! [`crate::protocol`].
//!
//! Implementations:
//! - [`StreamTransport`] - TCP socket, buffered, bytes passed through
//! - [`HidTransport`] - USB HID device, bytes chunked into 64-byte reports

mod hid;
mod stream;

use async_trait::async_trait;
use bytes::Bytes;

pub use self::hid::HidTransport;
#[cfg(feature = "hidapi")]
pub use self::hid::UsbHidTransport;
pub use self::stream::{StreamReader, StreamTransport, StreamWriter};

use crate::config::TransportConfig;
use crate::error::{Result, SignerError};

/// Outcome of one receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Bytes arrived. Not aligned to frame boundaries.
    Data(Bytes),
    /// Nothing arrived within the transport's read window.
    Idle,
    /// The peer closed the link cleanly.
    EndOfStream,
}

impl Received {
    /// Data bytes, `None` when idle, [`SignerError::EndOfStream`] at end.
    pub fn into_data(self) -> Result<Option<Bytes>> {
        match self {
            Received::Data(bytes) => Ok(Some(bytes)),
            Received::Idle => Ok(None),
            Received::EndOfStream => Err(SignerError::EndOfStream),
        }
    }
}

/// Receiving half of an open link.
#[async_trait]
pub trait TransportReader: Send + 'static {
    /// Wait for the next bytes from the device.
    async fn receive(&mut self) -> Result<Received>;
}

/// Sending half of an open link.
#[async_trait]
pub trait TransportWriter: Send + 'static {
    /// Write `data` and flush it to the device.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Release the link.
    async fn close(&mut self) -> Result<()>;
}

/// A link that can be opened once.
#[async_trait]
pub trait Transport: Send + 'static {
    type Reader: TransportReader;
    type Writer: TransportWriter;

    /// Human readable target, used in logs and connect errors.
    fn target(&self) -> String;

    /// Open the link and split it into its two halves.
    async fn open(&mut self) -> Result<(Self::Reader, Self::Writer)>;
}

/// Type-erased reader half.
pub type BoxedReader = Box<dyn TransportReader>;
/// Type-erased writer half.
pub type BoxedWriter = Box<dyn TransportWriter>;

#[async_trait]
impl TransportReader for BoxedReader {
    async fn receive(&mut self) -> Result<Received> {
        (**self).receive().await
    }
}

#[async_trait]
impl TransportWriter for BoxedWriter {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        (**self).send(data).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

#[async_trait]
trait DynTransport: Send + 'static {
    fn dyn_target(&self) -> String;
    async fn open_boxed(&mut self) -> Result<(BoxedReader, BoxedWriter)>;
}

#[async_trait]
impl<T: Transport> DynTransport for T {
    fn dyn_target(&self) -> String {
        self.target()
    }

    async fn open_boxed(&mut self) -> Result<(BoxedReader, BoxedWriter)> {
        let (reader, writer) = self.open().await?;
        Ok((Box::new(reader), Box::new(writer)))
    }
}

/// Transport chosen at runtime.
pub struct BoxedTransport {
    inner: Box<dyn DynTransport>,
}

impl BoxedTransport {
    pub fn new<T: Transport>(transport: T) -> Self {
        Self {
            inner: Box::new(transport),
        }
    }
}

#[async_trait]
impl Transport for BoxedTransport {
    type Reader = BoxedReader;
    type Writer = BoxedWriter;

    fn target(&self) -> String {
        self.inner.dyn_target()
    }

    async fn open(&mut self) -> Result<(BoxedReader, BoxedWriter)> {
        self.inner.open_boxed().await
    }
}

/// Build the transport described by `config`.
pub fn from_config(config: &TransportConfig) -> Result<BoxedTransport> {
    match config {
        TransportConfig::Stream(stream) => Ok(BoxedTransport::new(StreamTransport::new(
            stream.clone(),
        ))),
        #[cfg(feature = "hidapi")]
        TransportConfig::Hid(hid) => {
            let backend = crate::hid::HidApiBackend::new()?;
            Ok(BoxedTransport::new(HidTransport::new(backend, hid.clone())))
        }
        #[cfg(not(feature = "hidapi"))]
        TransportConfig::Hid(_) => Err(SignerError::Hid(
            "USB support requires the `hidapi` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;

    #[test]
    fn test_received_into_data() {
        let data = Received::Data(Bytes::from_static(b"x")).into_data().unwrap();
        assert_eq!(data, Some(Bytes::from_static(b"x")));
        assert_eq!(Received::Idle.into_data().unwrap(), None);
        assert!(matches!(
            Received::EndOfStream.into_data(),
            Err(SignerError::EndOfStream)
        ));
    }

    #[test]
    fn test_from_config_stream() {
        let transport =
            from_config(&TransportConfig::Stream(StreamConfig::new("127.0.0.1", 4000))).unwrap();
        assert_eq!(transport.target(), "127.0.0.1:4000");
    }

    #[cfg(not(feature = "hidapi"))]
    #[test]
    fn test_from_config_hid_without_feature() {
        let result = from_config(&TransportConfig::Hid(Default::default()));
        assert!(matches!(result, Err(SignerError::Hid(_))));
    }
}
