//! Bus interface traits and types
//!
//! Provides the PCI configuration-space capability used by bus enumeration.

/// PCI device address (bus:device.function)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PciAddress {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciAddress {
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        PciAddress { bus, device, function }
    }

    /// Build the configuration address word for the index port
    pub const fn config_address(self, offset: u8) -> u32 {
        0x8000_0000
            | ((self.bus as u32) << 16)
            | ((self.device as u32) << 11)
            | ((self.function as u32) << 8)
            | ((offset as u32) & 0xFC)
    }
}

impl core::fmt::Display for PciAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02x}:{:02x}.{}", self.bus, self.device, self.function)
    }
}

/// Where a discovered device lives and where its registers are mapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLocation {
    pub address: PciAddress,
    /// BAR0 with the low flag bits masked off
    pub bar0: u64,
}

/// Access to PCI configuration space
///
/// Real hardware goes through the 0xCF8/0xCFC port pair; tests substitute
/// an in-memory table.
pub trait ConfigSpace {
    /// Read a 32-bit dword from configuration space
    fn read32(&self, addr: PciAddress, offset: u8) -> u32;

    /// Write a 32-bit dword to configuration space
    fn write32(&self, addr: PciAddress, offset: u8, value: u32);
}

/// PCI configuration space offsets
pub mod pci_config {
    pub const VENDOR_DEVICE: u8 = 0x00;
    pub const COMMAND_STATUS: u8 = 0x04;
    pub const BAR0: u8 = 0x10;
    pub const BAR1: u8 = 0x14;
}

/// PCI command register bits
pub mod pci_command {
    pub const MEMORY_SPACE: u16 = 0x0002;
    pub const BUS_MASTER: u16 = 0x0004;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_address() {
        let addr = PciAddress::new(1, 3, 0);
        assert_eq!(addr.config_address(0x10), 0x8001_1810);
        // low two bits of the offset are never forwarded
        assert_eq!(addr.config_address(0x13), 0x8001_1810);
        assert_eq!(addr.to_string(), "01:03.0");
    }
}
