use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("device {device} rejected write: {what}")]
    WriteRejected { device: i32, what: &'static str },
    #[error("sensor read failed: {0}")]
    SensorRead(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
