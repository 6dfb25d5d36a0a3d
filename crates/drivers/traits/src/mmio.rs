//! Register window abstraction
//!
//! Drivers never touch MMIO addresses directly; they go through a
//! `RegisterWindow` so the same ring logic runs against a simulated device.

use core::ptr::{read_volatile, write_volatile};

/// A device's 32-bit register file
pub trait RegisterWindow {
    /// Read a 32-bit register at `offset` from the window base
    fn read32(&self, offset: u32) -> u32;

    /// Write a 32-bit register at `offset` from the window base
    fn write32(&mut self, offset: u32, value: u32);
}

/// Memory-mapped register window over a BAR
pub struct MmioWindow {
    base: usize,
}

impl MmioWindow {
    /// # Safety
    /// `base` must be the virtual address of a mapped, device-backed register
    /// region large enough for every offset the driver uses.
    pub const unsafe fn new(base: usize) -> Self {
        MmioWindow { base }
    }

    pub fn base(&self) -> usize {
        self.base
    }
}

impl RegisterWindow for MmioWindow {
    fn read32(&self, offset: u32) -> u32 {
        unsafe { read_volatile((self.base + offset as usize) as *const u32) }
    }

    fn write32(&mut self, offset: u32, value: u32) {
        unsafe { write_volatile((self.base + offset as usize) as *mut u32, value) }
    }
}
