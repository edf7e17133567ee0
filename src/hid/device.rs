//! HID device access.
//!
//! [`HidIo`] is the blocking report interface the chunker and the UART bridge
//! need. A [`HidBackend`] enumerates and opens devices. With the `hidapi`
//! feature enabled, [`HidApiBackend`] drives real USB devices through the
//! system hidapi library; tests use in-memory backends.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::HidConfig;
use crate::error::{Result, SignerError};

/// Blocking report I/O on an open HID device.
pub trait HidIo: Send + 'static {
    /// Write one output report. Returns the number of bytes written.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Read one input report, waiting at most `timeout`.
    ///
    /// Returns `Ok(0)` when the timeout elapses with nothing to read.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Send a feature report. `data[0]` is the report id.
    fn send_feature_report(&mut self, data: &[u8]) -> Result<()>;

    /// Read a feature report. `buf[0]` must hold the report id on entry.
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl<T: HidIo + ?Sized> HidIo for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read_timeout(buf, timeout)
    }

    fn send_feature_report(&mut self, data: &[u8]) -> Result<()> {
        (**self).send_feature_report(data)
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).get_feature_report(buf)
    }
}

/// An attached HID device as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Platform path used to open the device.
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl DeviceDescriptor {
    /// Check vendor, product and (if configured) serial number.
    pub fn matches(&self, config: &HidConfig) -> bool {
        self.vendor_id == config.vendor_id
            && self.product_id == config.product_id
            && match &config.serial_number {
                Some(serial) => self.serial_number.as_deref() == Some(serial.as_str()),
                None => true,
            }
    }
}

/// Pick the device to open.
///
/// The first device matching vendor and product id wins, unless a serial
/// number is configured, in which case it must match exactly.
pub fn select_device<'a>(
    devices: &'a [DeviceDescriptor],
    config: &HidConfig,
) -> Option<&'a DeviceDescriptor> {
    devices.iter().find(|d| d.matches(config))
}

/// Source of HID devices.
pub trait HidBackend: Send + Sync + 'static {
    type Device: HidIo;

    /// List every attached HID device.
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>>;

    /// Open a device found by [`enumerate`](Self::enumerate).
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Self::Device>;
}

/// List every attached HID device.
pub fn list_devices<B: HidBackend + ?Sized>(backend: &B) -> Result<Vec<DeviceDescriptor>> {
    let devices = backend.enumerate()?;
    for device in &devices {
        debug!(
            "HID {:04x}:{:04x} serial {:?} {} {}",
            device.vendor_id,
            device.product_id,
            device.serial_number,
            device.manufacturer.as_deref().unwrap_or("Unknown"),
            device.product.as_deref().unwrap_or("Unknown")
        );
    }
    Ok(devices)
}

/// Find the configured device and open it.
pub fn open_device<B: HidBackend + ?Sized>(
    backend: &B,
    config: &HidConfig,
) -> Result<(DeviceDescriptor, B::Device)> {
    let devices = list_devices(backend)?;
    let descriptor = select_device(&devices, config)
        .cloned()
        .ok_or_else(|| SignerError::DeviceNotFound {
            vendor_id: config.vendor_id,
            product_id: config.product_id,
            serial_number: config.serial_number.clone(),
        })?;

    info!(
        "Found signer: {} {} ({})",
        descriptor.manufacturer.as_deref().unwrap_or("Unknown"),
        descriptor.product.as_deref().unwrap_or("Unknown"),
        descriptor.path
    );
    let device = backend.open(&descriptor)?;
    Ok((descriptor, device))
}

#[cfg(feature = "hidapi")]
pub use self::hidapi_backend::HidApiBackend;

#[cfg(feature = "hidapi")]
mod hidapi_backend {
    use std::ffi::CString;
    use std::time::Duration;

    use hidapi::{HidApi, HidDevice, HidError};
    use parking_lot::Mutex;

    use super::{DeviceDescriptor, HidBackend, HidIo};
    use crate::error::{Result, SignerError};

    fn hid_error(e: HidError) -> SignerError {
        SignerError::Hid(e.to_string())
    }

    /// USB backend on top of the system hidapi library.
    pub struct HidApiBackend {
        api: Mutex<HidApi>,
    }

    impl HidApiBackend {
        pub fn new() -> Result<Self> {
            let api = HidApi::new().map_err(hid_error)?;
            Ok(Self {
                api: Mutex::new(api),
            })
        }
    }

    impl HidBackend for HidApiBackend {
        type Device = HidDevice;

        fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
            let mut api = self.api.lock();
            api.refresh_devices().map_err(hid_error)?;
            Ok(api
                .device_list()
                .map(|d| DeviceDescriptor {
                    path: d.path().to_string_lossy().into_owned(),
                    vendor_id: d.vendor_id(),
                    product_id: d.product_id(),
                    serial_number: d.serial_number().map(str::to_string),
                    manufacturer: d.manufacturer_string().map(str::to_string),
                    product: d.product_string().map(str::to_string),
                })
                .collect())
        }

        fn open(&self, descriptor: &DeviceDescriptor) -> Result<HidDevice> {
            let path = CString::new(descriptor.path.as_str())
                .map_err(|e| SignerError::Hid(format!("invalid device path: {}", e)))?;
            let device = self.api.lock().open_path(&path).map_err(hid_error)?;
            device.set_blocking_mode(true).map_err(hid_error)?;
            Ok(device)
        }
    }

    impl HidIo for HidDevice {
        fn write(&mut self, data: &[u8]) -> Result<usize> {
            HidDevice::write(self, data).map_err(hid_error)
        }

        fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
            let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
            HidDevice::read_timeout(self, buf, millis).map_err(hid_error)
        }

        fn send_feature_report(&mut self, data: &[u8]) -> Result<()> {
            HidDevice::send_feature_report(self, data).map_err(hid_error)
        }

        fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
            HidDevice::get_feature_report(self, buf).map_err(hid_error)
        }
    }
}
