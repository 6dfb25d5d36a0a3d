//! In-memory configuration space
//!
//! Functions that were never added read back as all ones, like an empty slot.

use alloc::vec::Vec;
use core::cell::RefCell;
use delix_driver_traits::{ConfigSpace, PciAddress};

const CONFIG_DWORDS: usize = 64;

struct SimFunction {
    address: PciAddress,
    regs: [u32; CONFIG_DWORDS],
}

/// Simulated PCI configuration space
pub struct SimConfigSpace {
    functions: RefCell<Vec<SimFunction>>,
}

impl SimConfigSpace {
    pub fn new() -> Self {
        SimConfigSpace {
            functions: RefCell::new(Vec::new()),
        }
    }

    /// Add a function with the given IDs and raw BAR0 value
    pub fn add_device(&self, address: PciAddress, vendor: u16, device: u16, bar0: u32) {
        let mut regs = [0u32; CONFIG_DWORDS];
        regs[0] = vendor as u32 | ((device as u32) << 16);
        regs[0x10 / 4] = bar0;
        self.functions.borrow_mut().push(SimFunction { address, regs });
    }

    /// Overwrite one configuration dword of an existing function
    pub fn set_register(&self, address: PciAddress, offset: u8, value: u32) {
        self.write32(address, offset, value);
    }
}

impl Default for SimConfigSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSpace for SimConfigSpace {
    fn read32(&self, addr: PciAddress, offset: u8) -> u32 {
        self.functions
            .borrow()
            .iter()
            .find(|f| f.address == addr)
            .map(|f| f.regs[(offset as usize & 0xFC) / 4])
            .unwrap_or(0xFFFF_FFFF)
    }

    fn write32(&self, addr: PciAddress, offset: u8, value: u32) {
        if let Some(f) = self
            .functions
            .borrow_mut()
            .iter_mut()
            .find(|f| f.address == addr)
        {
            f.regs[(offset as usize & 0xFC) / 4] = value;
        }
    }
}
