//! HID module - report chunking, UART bridge control and device access.
//!
//! Provides:
//! - [`chunk`] / [`reassemble`] - 64-byte report framing of byte payloads
//! - [`UartBridge`] - enable, reset, purge and status of the HID-to-UART bridge
//! - [`HidBackend`] / [`HidIo`] - enumeration and blocking report I/O

mod bridge;
mod chunker;
mod device;

pub use bridge::{Purge, UartBridge, UartError, UartStatus, STATUS_REPORT_SIZE};
pub use chunker::{chunk, reassemble, Reassembly, Report, MAX_CHUNK_PAYLOAD, REPORT_SIZE};
pub use device::{
    list_devices, open_device, select_device, DeviceDescriptor, HidBackend, HidIo,
};

#[cfg(feature = "hidapi")]
pub use device::HidApiBackend;
