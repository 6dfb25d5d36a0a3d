//! Network error type

use core::fmt;

use delix_driver_traits::DriverError;

/// Errors reported by the network stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    /// No supported NIC was found at bring-up
    DeviceNotFound,
    /// The transmit ring had no free slot
    Busy,
    /// A frame failed length, header or checksum validation
    MalformedFrame,
    /// Host text is not a dotted-quad IPv4 address
    InvalidAddress,
    /// No ARP reply arrived within the attempt budget
    ResolutionFailed,
    /// No echo reply arrived within the poll budget
    Timeout,
    /// Any other driver failure
    Driver(DriverError),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::DeviceNotFound => f.write_str("no network device"),
            NetError::Busy => f.write_str("transmit ring full"),
            NetError::MalformedFrame => f.write_str("malformed frame"),
            NetError::InvalidAddress => f.write_str("invalid IP address"),
            NetError::ResolutionFailed => f.write_str("ARP resolution failed"),
            NetError::Timeout => f.write_str("timeout"),
            NetError::Driver(err) => write!(f, "driver error: {}", err),
        }
    }
}

impl From<DriverError> for NetError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Busy => NetError::Busy,
            DriverError::DeviceNotFound => NetError::DeviceNotFound,
            other => NetError::Driver(other),
        }
    }
}

pub type NetResult<T> = Result<T, NetError>;
