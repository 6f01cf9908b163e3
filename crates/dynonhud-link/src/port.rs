use std::io::Read;
use std::time::Duration;

use crate::error::{LinkError, Result};

/// Serial parameters for one physical Dynon feed.
///
/// The D10/D100 series talks 115200 baud, no parity, one stop bit, eight data
/// bits; only the device path, read timeout, and idle threshold vary between
/// installations.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub device: String,
    /// Baud rate. Default: 115200.
    pub baud_rate: u32,
    /// Upper bound on a single blocking read.
    pub read_timeout: Duration,
    /// Silence on an open port longer than this forces a full reconnect.
    pub idle_reconnect: Duration,
}

impl LinkConfig {
    /// Baud rate the EFIS/EMS serial output runs at.
    pub const DEFAULT_BAUD: u32 = 115_200;
    /// Default per-read timeout.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default idle threshold before an unconditional reconnect.
    pub const DEFAULT_IDLE_RECONNECT: Duration = Duration::from_secs(30);

    /// Config for `device` with default baud, timeout, and idle threshold.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            baud_rate: Self::DEFAULT_BAUD,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
            idle_reconnect: Self::DEFAULT_IDLE_RECONNECT,
        }
    }
}

/// Open capability for a physical serial device.
///
/// [`SerialLink`](crate::SerialLink) reaches hardware only through this seam,
/// so link-management behavior can be exercised against scripted ports.
///
/// Implementations must hand back a port with any buffered input discarded —
/// bytes queued while the device was unattended belong to torn frames.
pub trait PortOpener: Send {
    /// Open the device described by `config` and flush its input buffer.
    fn open(&mut self, config: &LinkConfig) -> Result<Box<dyn Read + Send>>;
}

/// Opens real serial devices via the `serialport` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(&mut self, config: &LinkConfig) -> Result<Box<dyn Read + Send>> {
        let open_err = |source| LinkError::Open {
            device: config.device.clone(),
            source,
        };

        let port = serialport::new(&config.device, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(config.read_timeout)
            .open()
            .map_err(open_err)?;

        port.clear(serialport::ClearBuffer::Input).map_err(open_err)?;

        Ok(Box::new(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = LinkConfig::new("/dev/ttyUSB0");
        assert_eq!(config.device, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.read_timeout, Duration::from_secs(10));
        assert_eq!(config.idle_reconnect, Duration::from_secs(30));
    }

    #[test]
    fn system_opener_reports_missing_device() {
        let mut opener = SystemPortOpener;
        let config = LinkConfig::new("/dev/does-not-exist-dynonhud");
        let err = opener.open(&config).err().unwrap();
        assert!(matches!(err, LinkError::Open { device, .. } if device.contains("does-not-exist")));
    }
}
