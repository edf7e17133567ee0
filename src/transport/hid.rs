//! USB HID transport.
//!
//! Opens the configured device, enables the UART bridge and purges both of
//! its FIFOs. Outbound bytes are split into 64-byte reports; inbound reports
//! are joined until the device goes quiet for one read timeout.
//!
//! Device calls block, so they run on tokio's blocking pool. The device handle
//! is shared by both halves and locked per report, never across a whole
//! message.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{trace, warn};

use super::{Received, Transport, TransportReader, TransportWriter};
use crate::config::HidConfig;
use crate::error::Result;
use crate::hid::{
    chunk, open_device, reassemble, HidBackend, HidIo, Purge, Reassembly, UartBridge, REPORT_SIZE,
};

/// HID link over the system hidapi library.
#[cfg(feature = "hidapi")]
pub type UsbHidTransport = HidTransport<crate::hid::HidApiBackend>;

/// HID link to a signer behind a UART bridge.
pub struct HidTransport<B: HidBackend> {
    backend: Arc<B>,
    config: HidConfig,
}

impl<B: HidBackend> HidTransport<B> {
    pub fn new(backend: B, config: HidConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
        }
    }

    pub fn config(&self) -> &HidConfig {
        &self.config
    }
}

#[cfg(feature = "hidapi")]
impl HidTransport<crate::hid::HidApiBackend> {
    /// USB transport with the default vendor and product ids.
    pub fn usb(config: HidConfig) -> Result<Self> {
        Ok(Self::new(crate::hid::HidApiBackend::new()?, config))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(io::Error::from)?
}

/// Device handle shared by the reader and the writer.
struct SharedDevice<D>(Arc<Mutex<D>>);

impl<D> Clone for SharedDevice<D> {
    fn clone(&self) -> Self {
        SharedDevice(Arc::clone(&self.0))
    }
}

impl<D: HidIo> HidIo for SharedDevice<D> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.0.lock().write(data)
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.0.lock().read_timeout(buf, timeout)
    }

    fn send_feature_report(&mut self, data: &[u8]) -> Result<()> {
        self.0.lock().send_feature_report(data)
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.0.lock().get_feature_report(buf)
    }
}

#[async_trait]
impl<B: HidBackend> Transport for HidTransport<B> {
    type Reader = HidReader<B::Device>;
    type Writer = HidWriter<B::Device>;

    fn target(&self) -> String {
        match &self.config.serial_number {
            Some(serial) => format!(
                "hid {:04x}:{:04x} serial {}",
                self.config.vendor_id, self.config.product_id, serial
            ),
            None => format!(
                "hid {:04x}:{:04x}",
                self.config.vendor_id, self.config.product_id
            ),
        }
    }

    async fn open(&mut self) -> Result<(Self::Reader, Self::Writer)> {
        let backend = Arc::clone(&self.backend);
        let config = self.config.clone();

        let device = run_blocking(move || {
            let (_, mut device) = open_device(backend.as_ref(), &config)?;
            let mut bridge = UartBridge::new(&mut device);
            bridge.enable(true)?;
            bridge.purge(Purge::Both)?;
            Ok(device)
        })
        .await?;

        let device = SharedDevice(Arc::new(Mutex::new(device)));
        Ok((
            HidReader {
                device: device.clone(),
                timeout: self.config.read_timeout(),
            },
            HidWriter { device },
        ))
    }
}

/// Receiving half of a HID link.
pub struct HidReader<D> {
    device: SharedDevice<D>,
    timeout: Duration,
}

#[async_trait]
impl<D: HidIo> TransportReader for HidReader<D> {
    async fn receive(&mut self) -> Result<Received> {
        let mut device = self.device.clone();
        let timeout = self.timeout;

        match run_blocking(move || reassemble(&mut device, timeout)).await? {
            Reassembly::Complete(bytes) => Ok(Received::Data(bytes)),
            Reassembly::Idle => Ok(Received::Idle),
        }
    }
}

/// Sending half of a HID link.
pub struct HidWriter<D> {
    device: SharedDevice<D>,
}

#[async_trait]
impl<D: HidIo> TransportWriter for HidWriter<D> {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut device = self.device.clone();
        let reports = chunk(data);

        run_blocking(move || {
            for report in &reports {
                let written = device.write(report)?;
                if written != REPORT_SIZE {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!(
                            "Unable to send report to device. Expected: {} Actual: {}",
                            REPORT_SIZE, written
                        ),
                    )
                    .into());
                }
                trace!("> report {} valid bytes", report[0]);
            }
            Ok(())
        })
        .await
    }

    async fn close(&mut self) -> Result<()> {
        let mut device = self.device.clone();
        let result = run_blocking(move || UartBridge::new(&mut device).enable(false)).await;
        if let Err(e) = &result {
            warn!("Failed to disable UART bridge: {}", e);
        }
        result
    }
}
