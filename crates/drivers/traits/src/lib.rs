//! Hardware Driver Traits for DELIX
//!
//! This crate defines the trait interfaces that hardware drivers implement.
//! The network subsystem uses these traits to talk to the NIC and the bus
//! without knowing which driver (or which simulation) sits behind them.
//!
//! # Debug Features
//!
//! Enable debug output for specific subsystems at compile time:
//! ```toml
//! delix-driver-traits = { path = "...", features = ["debug-network"] }
//! ```
//!
//! Available features:
//! - `debug-all`: Enable all debug output
//! - `debug-network`: NicDevice operations
//! - `debug-bus`: Bus enumeration

#![cfg_attr(not(test), no_std)]

pub mod bus;
mod debug;
pub mod mmio;
pub mod nic;

pub use bus::*;
#[cfg(any(feature = "debug-network", feature = "debug-bus"))]
pub use debug::*;
pub use mmio::*;
pub use nic::*;

#[doc(hidden)]
pub use log as __log;

/// Common error type for driver operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// Device not found or not responding
    DeviceNotFound,
    /// Invalid parameter
    InvalidParameter,
    /// Invalid state for this operation
    InvalidState,
    /// Device busy
    Busy,
    /// Buffer too small
    BufferTooSmall,
}

impl core::fmt::Display for DriverError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            DriverError::DeviceNotFound => "device not found",
            DriverError::InvalidParameter => "invalid parameter",
            DriverError::InvalidState => "invalid driver state",
            DriverError::Busy => "device busy",
            DriverError::BufferTooSmall => "buffer too small",
        };
        f.write_str(msg)
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Driver lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Driver is bound to a device but not initialized
    Loaded,
    /// Driver is initialized and operational
    Ready,
}

/// Static driver information
#[derive(Debug, Clone, Copy)]
pub struct DriverInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub author: &'static str,
    pub description: &'static str,
}

/// Base trait for all drivers
pub trait Driver {
    /// Get driver information
    fn info(&self) -> DriverInfo;

    /// Get current driver state
    fn state(&self) -> DriverState;

    /// Initialize the driver
    ///
    /// May be called again to re-run the bring-up sequence; there is no teardown.
    fn init(&mut self) -> Result<(), DriverError>;
}
