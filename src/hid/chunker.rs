//! HID report chunking.
//!
//! A HID link moves fixed 64-byte reports. The first byte of every report
//! carries the number of valid payload bytes that follow (at most 63); the
//! rest is zero padding.
//!
//! ```text
//! ┌────────┬──────────────────────────┬─────────┐
//! │ length │ payload (length bytes)   │ padding │
//! │ 1 byte │ 0..=63 bytes             │ zeroes  │
//! └────────┴──────────────────────────┴─────────┘
//! ```
//!
//! There is no end-of-message marker. A report read that times out with
//! nothing received means the device has finished sending.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use super::device::HidIo;
use crate::error::{Result, SignerError};

/// Size of one HID report.
pub const REPORT_SIZE: usize = 64;

/// Largest number of payload bytes one report can carry.
pub const MAX_CHUNK_PAYLOAD: usize = REPORT_SIZE - 1;

/// One outbound HID report.
pub type Report = [u8; REPORT_SIZE];

/// Outcome of reassembling one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reassembly {
    /// Reports arrived and were joined into this payload.
    Complete(Bytes),
    /// The first read timed out; the device has nothing to send.
    Idle,
}

/// Split `payload` into zero-padded reports.
///
/// Every report except possibly the last carries 63 payload bytes. An empty
/// payload produces no reports, so nothing is written and the peer sees no
/// message at all: [`reassemble`] on the far side returns
/// [`Reassembly::Idle`], not an empty [`Reassembly::Complete`].
pub fn chunk(payload: &[u8]) -> Vec<Report> {
    payload
        .chunks(MAX_CHUNK_PAYLOAD)
        .map(|piece| {
            let mut report = [0u8; REPORT_SIZE];
            report[0] = piece.len() as u8;
            report[1..=piece.len()].copy_from_slice(piece);
            report
        })
        .collect()
}

/// Read reports from `device` until a read times out and join their payloads.
///
/// # Errors
///
/// [`SignerError::FrameTooLong`] if a report claims more than 63 valid bytes.
/// Only the current reassembly is abandoned; the device stays usable.
pub fn reassemble<D: HidIo + ?Sized>(device: &mut D, timeout: Duration) -> Result<Reassembly> {
    let mut message = BytesMut::new();
    let mut reports = 0usize;
    let mut report = [0u8; REPORT_SIZE];

    loop {
        report.fill(0);
        let read = device.read_timeout(&mut report, timeout)?;
        if read == 0 {
            break;
        }

        let length = report[0];
        if usize::from(length) > MAX_CHUNK_PAYLOAD {
            return Err(SignerError::FrameTooLong(length));
        }

        trace!("< report {} bytes, {} valid", read, length);
        // BytesMut grows geometrically.
        message.extend_from_slice(&report[1..=usize::from(length)]);
        reports += 1;
    }

    if reports == 0 {
        return Ok(Reassembly::Idle);
    }
    trace!("reassembled {} bytes from {} reports", message.len(), reports);
    Ok(Reassembly::Complete(message.freeze()))
}
