//! Configuration space through the x86 index/data port pair

use core::arch::asm;
use delix_driver_traits::{ConfigSpace, PciAddress};

// PCI configuration ports
const PCI_CONFIG_ADDRESS: u16 = 0xCF8;
const PCI_CONFIG_DATA: u16 = 0xCFC;

/// Port-I/O configuration mechanism #1
pub struct PortConfigSpace {
    _private: (),
}

impl PortConfigSpace {
    /// # Safety
    /// The caller must be running at a privilege level allowed to touch the
    /// configuration ports, and nothing else may use them concurrently.
    pub const unsafe fn new() -> Self {
        PortConfigSpace { _private: () }
    }
}

impl ConfigSpace for PortConfigSpace {
    fn read32(&self, addr: PciAddress, offset: u8) -> u32 {
        let address = addr.config_address(offset);
        unsafe {
            asm!("out dx, eax", in("dx") PCI_CONFIG_ADDRESS, in("eax") address, options(nostack));
            let value: u32;
            asm!("in eax, dx", in("dx") PCI_CONFIG_DATA, out("eax") value, options(nostack));
            value
        }
    }

    fn write32(&self, addr: PciAddress, offset: u8, value: u32) {
        let address = addr.config_address(offset);
        unsafe {
            asm!("out dx, eax", in("dx") PCI_CONFIG_ADDRESS, in("eax") address, options(nostack));
            asm!("out dx, eax", in("dx") PCI_CONFIG_DATA, in("eax") value, options(nostack));
        }
    }
}
