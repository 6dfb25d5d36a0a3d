//! Network Interface Card Trait
//!
//! Implemented by network drivers (e1000, simulated NICs)
//! Used by the network stack (ARP, ICMP)

use crate::DriverResult;

/// MAC address type
pub type MacAddress = [u8; 6];

/// Network interface card trait
///
/// All calls are non-blocking; the caller drives the device by polling.
pub trait NicDevice {
    /// Get the MAC address of this interface
    fn mac_address(&self) -> MacAddress;

    /// Send a raw Ethernet frame
    ///
    /// # Arguments
    /// * `frame` - Complete Ethernet frame including header
    ///
    /// # Returns
    /// * `Err(DriverError::Busy)` - No free transmit descriptor; nothing was queued
    fn send_frame(&mut self, frame: &[u8]) -> DriverResult<()>;

    /// Receive a raw Ethernet frame (non-blocking)
    ///
    /// # Arguments
    /// * `buf` - Buffer to receive into
    ///
    /// # Returns
    /// * `Ok(Some(len))` - Frame received, len bytes written to buf
    /// * `Ok(None)` - No frame available
    /// * `Err(...)` - A completed descriptor was dropped
    fn receive_frame(&mut self, buf: &mut [u8]) -> DriverResult<Option<usize>>;
}

/// Format MAC address as string
pub fn format_mac(mac: &MacAddress) -> [u8; 17] {
    let hex = b"0123456789ABCDEF";
    let mut buf = [0u8; 17];
    for i in 0..6 {
        buf[i * 3] = hex[(mac[i] >> 4) as usize];
        buf[i * 3 + 1] = hex[(mac[i] & 0xF) as usize];
        if i < 5 {
            buf[i * 3 + 2] = b':';
        }
    }
    buf
}

/// `Display` adapter for a MAC address, `52:54:00:12:34:56` style
pub struct DisplayMac<'a>(pub &'a MacAddress);

impl core::fmt::Display for DisplayMac<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = format_mac(self.0);
        // format_mac only emits ASCII hex digits and ':'
        f.write_str(core::str::from_utf8(&text).map_err(|_| core::fmt::Error)?)
    }
}
