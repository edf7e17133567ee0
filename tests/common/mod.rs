//! Fake signers shared by the integration tests.
//!
//! - [`scripted`] - TCP peer that writes canned bytes and optionally hangs up
//! - [`responder`] - TCP peer that answers every request frame
//! - [`FakeHidBackend`] - in-memory HID device that echoes requests as SUCCESS

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use signer_link::hid::{chunk, DeviceDescriptor, HidBackend, HidIo};
use signer_link::protocol::{Frame, FrameBuffer, FrameCodec, MessageType, DEFAULT_MAX_PAYLOAD_SIZE};
use signer_link::Result;

pub const WAIT: Duration = Duration::from_secs(2);

/// Frame bytes for `message_type` with `payload`.
pub fn frame(message_type: MessageType, payload: &[u8]) -> Vec<u8> {
    FrameCodec::encode(message_type, payload).unwrap()
}

/// Accept one connection, write each chunk with a short pause in between,
/// then close the socket if `hang_up` is set.
pub async fn scripted(chunks: Vec<Vec<u8>>, hang_up: bool) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        for chunk in chunks {
            socket.write_all(&chunk).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        if hang_up {
            drop(socket);
        } else {
            // keep the link open until the test ends
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    });

    port
}

/// Accept one connection and answer every request frame with `reply`.
/// Received requests are forwarded to the returned channel.
pub async fn responder<F>(reply: F) -> (u16, mpsc::UnboundedReceiver<Frame>)
where
    F: Fn(&Frame) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        while let Ok(Some(request)) =
            FrameCodec::read_frame(&mut socket, DEFAULT_MAX_PAYLOAD_SIZE).await
        {
            let bytes = reply(&request);
            let _ = tx.send(request);
            if socket.write_all(&bytes).await.is_err() {
                break;
            }
        }
    });

    (port, rx)
}

/// SUCCESS frame carrying the request's payload.
pub fn echo(request: &Frame) -> Vec<u8> {
    frame(MessageType::Success, request.payload())
}

/// State of the in-memory HID device.
#[derive(Default)]
pub struct HidState {
    pub inbound: VecDeque<Vec<u8>>,
    pub written: Vec<Vec<u8>>,
    pub features: Vec<Vec<u8>>,
    pub requests: Vec<Frame>,
    parser: FrameBuffer,
}

/// Device that parses written reports as frames and queues a chunked
/// SUCCESS echo for each one.
pub struct FakeHidDevice(Arc<Mutex<HidState>>);

impl HidIo for FakeHidDevice {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut state = self.0.lock();
        state.written.push(data.to_vec());

        let valid = usize::from(data[0]);
        let frames = state.parser.push(&data[1..=valid])?;
        for request in frames {
            for report in chunk(&echo(&request)) {
                state.inbound.push_back(report.to_vec());
            }
            state.requests.push(request);
        }
        Ok(data.len())
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let report = self.0.lock().inbound.pop_front();
        match report {
            Some(report) => {
                buf[..report.len()].copy_from_slice(&report);
                Ok(report.len())
            }
            None => {
                std::thread::sleep(timeout);
                Ok(0)
            }
        }
    }

    fn send_feature_report(&mut self, data: &[u8]) -> Result<()> {
        self.0.lock().features.push(data.to_vec());
        Ok(())
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        buf.fill(0);
        Ok(buf.len())
    }
}

/// Backend exposing one fake signer.
pub struct FakeHidBackend {
    pub state: Arc<Mutex<HidState>>,
}

impl FakeHidBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HidState::default())),
        }
    }
}

impl HidBackend for FakeHidBackend {
    type Device = FakeHidDevice;

    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        Ok(vec![DeviceDescriptor {
            path: "fake-hid-0".to_string(),
            vendor_id: 0x10c4,
            product_id: 0xea80,
            serial_number: Some("EMU0001".to_string()),
            manufacturer: Some("Silicon Labs".to_string()),
            product: Some("CP2110 HID USB-to-UART Bridge".to_string()),
        }])
    }

    fn open(&self, _descriptor: &DeviceDescriptor) -> Result<FakeHidDevice> {
        Ok(FakeHidDevice(Arc::clone(&self.state)))
    }
}
