//! PCI Bus Driver for DELIX
//!
//! Provides PCI configuration space access and device lookup.

#![cfg_attr(not(test), no_std)]

#[cfg(any(feature = "sim", test))]
extern crate alloc;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod port;
#[cfg(any(feature = "sim", test))]
pub mod sim;

use delix_driver_traits::bus::{pci_command, pci_config};
use delix_driver_traits::{
    debug_bus, ConfigSpace, DeviceLocation, Driver, DriverError, DriverInfo, DriverState,
    PciAddress,
};
use log::info;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use port::PortConfigSpace;

/// Buses scanned during lookup
pub const PCI_MAX_BUS: u8 = 8;
/// Slots per bus
pub const PCI_MAX_SLOT: u8 = 32;

/// PCI bus driver implementation
pub struct PciDriver<C: ConfigSpace> {
    state: DriverState,
    config: C,
}

impl<C: ConfigSpace> PciDriver<C> {
    pub const fn new(config: C) -> Self {
        PciDriver {
            state: DriverState::Loaded,
            config,
        }
    }

    /// Find a device by vendor and device ID
    ///
    /// Only function 0 of each slot is probed. Returns `None` when nothing
    /// matches; that means "no such device", not a failure.
    pub fn find_device(&self, vendor: u16, device: u16) -> Option<DeviceLocation> {
        for bus in 0..PCI_MAX_BUS {
            for slot in 0..PCI_MAX_SLOT {
                let addr = PciAddress::new(bus, slot, 0);
                let id = self.config.read32(addr, pci_config::VENDOR_DEVICE);
                if (id & 0xFFFF) as u16 == vendor && (id >> 16) as u16 == device {
                    let bar0 = self.read_bar0(addr);
                    debug_bus!("{:04x}:{:04x} at {} bar0={:#x}", vendor, device, addr, bar0);
                    return Some(DeviceLocation { address: addr, bar0 });
                }
            }
        }
        None
    }

    /// Find the first present device among several device IDs of one vendor
    pub fn find_any(&self, vendor: u16, devices: &[u16]) -> Option<(u16, DeviceLocation)> {
        devices
            .iter()
            .find_map(|&device| self.find_device(vendor, device).map(|loc| (device, loc)))
    }

    /// Read BAR0, masking the flag bits; 64-bit memory BARs take BAR1 as the high half
    fn read_bar0(&self, addr: PciAddress) -> u64 {
        let bar = self.config.read32(addr, pci_config::BAR0);
        let is_io = bar & 1 == 1;
        let is_64bit = !is_io && (bar >> 1) & 3 == 2;
        let low = (bar & 0xFFFF_FFF0) as u64;
        if is_64bit {
            let high = self.config.read32(addr, pci_config::BAR1) as u64;
            (high << 32) | low
        } else {
            low
        }
    }

    /// Turn on memory-space decoding and bus mastering for a device
    pub fn enable_memory_and_bus_master(&self, location: &DeviceLocation) {
        let addr = location.address;
        let cmd = self.config.read32(addr, pci_config::COMMAND_STATUS);
        // only the low 16 bits are the command register
        let cmd16 = cmd as u16 | pci_command::MEMORY_SPACE | pci_command::BUS_MASTER;
        self.config.write32(
            addr,
            pci_config::COMMAND_STATUS,
            (cmd & 0xFFFF_0000) | cmd16 as u32,
        );
        debug_bus!("{} command {:#06x}", addr, cmd16);
    }

    /// Read from PCI configuration space
    pub fn config_read(&self, addr: PciAddress, offset: u8) -> u32 {
        self.config.read32(addr, offset)
    }
}

impl<C: ConfigSpace> Driver for PciDriver<C> {
    fn info(&self) -> DriverInfo {
        DriverInfo {
            name: "pci",
            version: "0.1.0",
            author: "DELIX Team",
            description: "PCI bus driver",
        }
    }

    fn state(&self) -> DriverState {
        self.state
    }

    fn init(&mut self) -> Result<(), DriverError> {
        // Configuration space needs no setup; lookups scan on demand.
        self.state = DriverState::Ready;
        info!("pci: configuration space ready ({} buses)", PCI_MAX_BUS);
        Ok(())
    }
}
