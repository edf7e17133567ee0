//! UART bridge control over HID feature reports.
//!
//! The USB signer tunnels its serial link through a HID-to-UART bridge. The
//! bridge is driven with vendor feature reports:
//!
//! | Command | Report                    |
//! |---------|---------------------------|
//! | Reset   | `0x40 0x00`               |
//! | Enable  | `0x41 0x01` / `0x41 0x00` |
//! | Purge   | `0x43 <type>`             |
//! | Status  | `0x42` + 9 bytes (read)   |

use tracing::{debug, info};

use super::device::HidIo;
use crate::error::{Result, SignerError};

const RESET_DEVICE: u8 = 0x40;
const UART_ENABLE: u8 = 0x41;
const UART_STATUS: u8 = 0x42;
const PURGE_FIFOS: u8 = 0x43;

/// Length of the status feature report, report id included.
pub const STATUS_REPORT_SIZE: usize = 10;

/// FIFOs to discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Purge {
    /// Transmit FIFO (bit 0).
    Transmit = 0x01,
    /// Receive FIFO (bit 1).
    Receive = 0x02,
    /// Both FIFOs.
    Both = 0x03,
}

/// Latched line error reported by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartError {
    None,
    Parity,
    Overrun,
    /// Any value the bridge documents no meaning for.
    Other(u8),
}

impl From<u8> for UartError {
    fn from(value: u8) -> Self {
        match value {
            0 => UartError::None,
            1 => UartError::Parity,
            2 => UartError::Overrun,
            other => UartError::Other(other),
        }
    }
}

/// Snapshot of the bridge's UART state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartStatus {
    /// Bytes waiting in the transmit FIFO.
    pub tx_fifo: u16,
    /// Bytes waiting in the receive FIFO.
    pub rx_fifo: u16,
    /// Latched error, cleared by reading the status.
    pub error: UartError,
    /// Line break is being received.
    pub line_break: bool,
}

impl UartStatus {
    /// Parse a status feature report.
    pub fn parse(report: &[u8]) -> Result<Self> {
        if report.len() < 7 {
            return Err(SignerError::Hid(format!(
                "status report too short: {} bytes",
                report.len()
            )));
        }
        if report[0] != UART_STATUS {
            return Err(SignerError::Hid(format!(
                "unexpected status report id {:#04x}",
                report[0]
            )));
        }
        Ok(Self {
            tx_fifo: u16::from_be_bytes([report[1], report[2]]),
            rx_fifo: u16::from_be_bytes([report[3], report[4]]),
            error: UartError::from(report[5]),
            line_break: report[6] != 0,
        })
    }
}

/// Control channel of a HID-to-UART bridge.
pub struct UartBridge<'a, D: HidIo + ?Sized> {
    device: &'a mut D,
}

impl<'a, D: HidIo + ?Sized> UartBridge<'a, D> {
    pub fn new(device: &'a mut D) -> Self {
        Self { device }
    }

    /// Reset the bridge. The device re-enumerates afterwards.
    pub fn reset(&mut self) -> Result<()> {
        info!("UART bridge reset");
        self.device.send_feature_report(&[RESET_DEVICE, 0x00])
    }

    /// Enable or disable the UART.
    pub fn enable(&mut self, enabled: bool) -> Result<()> {
        info!("UART bridge {}", if enabled { "enable" } else { "disable" });
        self.device
            .send_feature_report(&[UART_ENABLE, u8::from(enabled)])
    }

    /// Discard the selected FIFOs.
    pub fn purge(&mut self, which: Purge) -> Result<()> {
        info!("UART bridge purge {:?}", which);
        self.device.send_feature_report(&[PURGE_FIFOS, which as u8])
    }

    /// Read the UART status. Reading clears the latched error flag.
    pub fn status(&mut self) -> Result<UartStatus> {
        let mut report = [0u8; STATUS_REPORT_SIZE];
        report[0] = UART_STATUS;
        let read = self.device.get_feature_report(&mut report)?;
        let status = UartStatus::parse(&report[..read.min(STATUS_REPORT_SIZE)])?;
        debug!("UART status {:?}", status);
        Ok(status)
    }
}
