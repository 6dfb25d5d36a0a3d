//! DELIX Intel e1000 Network Driver
//!
//! Polled driver for the Intel 82540EM (QEMU default) and 82545EM NICs.
//! Receive and transmit go through fixed descriptor rings living in a
//! `'static` [`DmaArena`]; there are no interrupts and nothing blocks.

#![cfg_attr(not(test), no_std)]

#[cfg(any(feature = "sim", test))]
extern crate alloc;

pub mod regs;
pub mod ring;
#[cfg(any(feature = "sim", test))]
pub mod sim;

use core::ptr::{read_volatile, write_volatile};
use core::sync::atomic::{fence, Ordering};

use delix_driver_pci::PciDriver;
use delix_driver_traits::{
    debug_network, ConfigSpace, DeviceLocation, DisplayMac, Driver, DriverError, DriverInfo,
    DriverResult, DriverState, MacAddress, NicDevice, RegisterWindow,
};
use log::{info, warn};

use regs::*;
use ring::*;

pub use ring::{DmaArena, BUFFER_SIZE, NUM_RX_DESC, NUM_TX_DESC};

/// Intel vendor ID
pub const VENDOR_INTEL: u16 = 0x8086;
/// 82540EM, the QEMU default
pub const DEVICE_82540EM: u16 = 0x100E;
/// 82545EM
pub const DEVICE_82545EM: u16 = 0x100F;

/// Device IDs this driver binds to, in probe order
pub const SUPPORTED_DEVICES: [u16; 2] = [DEVICE_82540EM, DEVICE_82545EM];

/// MAC used when the receive-address registers are blank
pub const DEFAULT_MAC: MacAddress = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];

/// Intel e1000 Network Driver
pub struct E1000Driver<W: RegisterWindow> {
    state: DriverState,
    regs: W,
    dma: &'static mut DmaArena,
    bar0: u64,
    mac_addr: MacAddress,
    rx_cur: RingIndex<NUM_RX_DESC>,
    tx_cur: RingIndex<NUM_TX_DESC>,
}

impl<W: RegisterWindow> E1000Driver<W> {
    /// Probe for an e1000 NIC
    ///
    /// Enables memory decoding and bus mastering on the device and maps its
    /// BAR0 through `map`. The driver still needs [`Driver::init`].
    pub fn probe<C, F>(pci: &PciDriver<C>, dma: &'static mut DmaArena, map: F) -> DriverResult<Self>
    where
        C: ConfigSpace,
        F: FnOnce(&DeviceLocation) -> W,
    {
        let (device_id, location) = pci
            .find_any(VENDOR_INTEL, &SUPPORTED_DEVICES)
            .ok_or(DriverError::DeviceNotFound)?;

        if location.bar0 == 0 {
            warn!("e1000: {:04x} at {} has no memory BAR", device_id, location.address);
            return Err(DriverError::DeviceNotFound);
        }

        pci.enable_memory_and_bus_master(&location);
        debug_network!("e1000: {:04x} at {}", device_id, location.address);

        let mut driver = Self::new(map(&location), dma);
        driver.bar0 = location.bar0;
        Ok(driver)
    }

    /// Bind to an already-mapped register window
    pub fn new(regs: W, dma: &'static mut DmaArena) -> Self {
        Self {
            state: DriverState::Loaded,
            regs,
            dma,
            bar0: 0,
            mac_addr: [0; 6],
            rx_cur: RingIndex::new(0),
            tx_cur: RingIndex::new(0),
        }
    }

    /// Whether the PHY reports link up
    pub fn link_up(&self) -> bool {
        self.regs.read32(REG_STATUS) & STATUS_LU != 0
    }

    fn read_mac(&mut self) {
        let ral = self.regs.read32(REG_RAL0);
        let rah = self.regs.read32(REG_RAH0);

        if ral != 0 && ral != 0xFFFF_FFFF {
            self.mac_addr[0] = ral as u8;
            self.mac_addr[1] = (ral >> 8) as u8;
            self.mac_addr[2] = (ral >> 16) as u8;
            self.mac_addr[3] = (ral >> 24) as u8;
            self.mac_addr[4] = rah as u8;
            self.mac_addr[5] = (rah >> 8) as u8;
        } else {
            self.mac_addr = DEFAULT_MAC;
            self.program_mac();
        }
    }

    fn program_mac(&mut self) {
        let mac = self.mac_addr;
        let ral = (mac[0] as u32)
            | ((mac[1] as u32) << 8)
            | ((mac[2] as u32) << 16)
            | ((mac[3] as u32) << 24);
        let rah = (mac[4] as u32) | ((mac[5] as u32) << 8) | RAH_AV;

        self.regs.write32(REG_RAL0, ral);
        self.regs.write32(REG_RAH0, rah);
    }

    fn init_rx(&mut self) {
        for i in 0..NUM_RX_DESC {
            let desc = RxDesc {
                addr: self.dma.rx_buffer_addr(i),
                ..RxDesc::default()
            };
            unsafe { write_volatile(&mut self.dma.rx_descs[i], desc) };
        }

        let base = self.dma.rx_ring_addr();
        self.regs.write32(REG_RDBAL, base as u32);
        self.regs.write32(REG_RDBAH, (base >> 32) as u32);
        self.regs.write32(REG_RDLEN, (NUM_RX_DESC * DESC_SIZE) as u32);
        self.regs.write32(REG_RDH, 0);
        self.regs.write32(REG_RDT, (NUM_RX_DESC - 1) as u32);

        self.regs.write32(REG_RCTL, RCTL_EN | RCTL_BAM | RCTL_SECRC);
        self.rx_cur = RingIndex::new(0);
    }

    fn init_tx(&mut self) {
        for i in 0..NUM_TX_DESC {
            let desc = TxDesc {
                addr: self.dma.tx_buffer_addr(i),
                // free until the first send claims it
                status: DESC_DD,
                ..TxDesc::default()
            };
            unsafe { write_volatile(&mut self.dma.tx_descs[i], desc) };
        }

        let base = self.dma.tx_ring_addr();
        self.regs.write32(REG_TDBAL, base as u32);
        self.regs.write32(REG_TDBAH, (base >> 32) as u32);
        self.regs.write32(REG_TDLEN, (NUM_TX_DESC * DESC_SIZE) as u32);
        self.regs.write32(REG_TDH, 0);
        self.regs.write32(REG_TDT, 0);

        self.regs.write32(REG_TCTL, TCTL_EN | TCTL_PSP | TCTL_CT | TCTL_COLD);
        self.tx_cur = RingIndex::new(0);
    }

    fn set_link_up(&mut self) {
        let ctrl = self.regs.read32(REG_CTRL);
        self.regs.write32(REG_CTRL, ctrl | CTRL_SLU);
    }

    /// Hand a consumed receive descriptor back to the device
    fn recycle_rx(&mut self, idx: RingIndex<NUM_RX_DESC>) {
        let i = idx.get();
        unsafe { write_volatile(&mut self.dma.rx_descs[i].status, 0) };
        fence(Ordering::SeqCst);
        self.regs.write32(REG_RDT, i as u32);
        self.rx_cur = idx.next();
    }
}

impl<W: RegisterWindow> Driver for E1000Driver<W> {
    fn info(&self) -> DriverInfo {
        DriverInfo {
            name: "e1000",
            version: "0.1.0",
            author: "DELIX Team",
            description: "Intel e1000 network driver",
        }
    }

    fn state(&self) -> DriverState {
        self.state
    }

    fn init(&mut self) -> Result<(), DriverError> {
        self.regs.write32(REG_CTRL, 0);
        self.init_rx();
        self.init_tx();
        self.read_mac();
        self.set_link_up();

        self.state = DriverState::Ready;
        info!("e1000: initialized (BAR0={:#010x})", self.bar0);
        info!("e1000: MAC={}", DisplayMac(&self.mac_addr));
        if !self.link_up() {
            warn!("e1000: link down");
        }
        Ok(())
    }
}

impl<W: RegisterWindow> NicDevice for E1000Driver<W> {
    fn mac_address(&self) -> MacAddress {
        self.mac_addr
    }

    fn send_frame(&mut self, frame: &[u8]) -> DriverResult<()> {
        if self.state != DriverState::Ready {
            return Err(DriverError::InvalidState);
        }

        if frame.len() > BUFFER_SIZE {
            return Err(DriverError::InvalidParameter);
        }

        let i = self.tx_cur.get();
        let status = unsafe { read_volatile(&self.dma.tx_descs[i].status) };
        if status & DESC_DD == 0 {
            // still owned by the device
            return Err(DriverError::Busy);
        }

        self.dma.tx_buffers[i][..frame.len()].copy_from_slice(frame);
        let desc = TxDesc {
            addr: self.dma.tx_buffer_addr(i),
            length: frame.len() as u16,
            cmd: TDESC_CMD_EOP | TDESC_CMD_IFCS | TDESC_CMD_RS,
            status: 0,
            ..TxDesc::default()
        };
        unsafe { write_volatile(&mut self.dma.tx_descs[i], desc) };
        fence(Ordering::SeqCst);

        self.tx_cur = self.tx_cur.next();
        self.regs.write32(REG_TDT, self.tx_cur.get() as u32);
        debug_network!("e1000: tx slot {} len {}", i, frame.len());

        Ok(())
    }

    fn receive_frame(&mut self, buffer: &mut [u8]) -> DriverResult<Option<usize>> {
        if self.state != DriverState::Ready {
            return Ok(None);
        }

        let start = self.rx_cur;
        for step in 0..NUM_RX_DESC {
            let idx = start.offset(step);
            let i = idx.get();
            let desc = unsafe { read_volatile(&self.dma.rx_descs[i]) };
            if desc.status & DESC_DD == 0 {
                continue;
            }
            fence(Ordering::SeqCst);

            if desc.status & DESC_EOP == 0 {
                // Partial packet, skip
                debug_network!("e1000: rx slot {} without EOP dropped", i);
                self.recycle_rx(idx);
                continue;
            }

            let len = desc.length as usize;
            if len > buffer.len() || len > BUFFER_SIZE {
                self.recycle_rx(idx);
                return Err(DriverError::BufferTooSmall);
            }

            buffer[..len].copy_from_slice(&self.dma.rx_buffers[i][..len]);
            self.recycle_rx(idx);
            debug_network!("e1000: rx slot {} len {}", i, len);
            return Ok(Some(len));
        }

        Ok(None)
    }
}
