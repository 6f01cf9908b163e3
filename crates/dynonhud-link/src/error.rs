/// Errors that can occur when opening or reading a serial link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Failed to open the serial device.
    #[error("failed to open {device}: {source}")]
    Open {
        device: String,
        source: serialport::Error,
    },

    /// An I/O error occurred on the open port.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
