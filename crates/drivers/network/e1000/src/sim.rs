//! Register-level model of an e1000 for host-side tests
//!
//! `SimNic` is a [`RegisterWindow`] that behaves like the device on the
//! other side of the rings: a tail write makes it DMA-read the transmit
//! descriptors, and injected frames are DMA-written into the receive ring.
//! Handles are cheap clones sharing one device, so a test can keep one
//! while the driver owns another.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::ptr::{addr_of_mut, read_volatile, write_volatile};

use delix_driver_traits::{MacAddress, RegisterWindow};

use crate::regs::*;
use crate::ring::{RxDesc, TxDesc, BUFFER_SIZE, DESC_DD, DESC_EOP, DESC_SIZE};

/// Answers transmitted frames with frames to receive
pub type Peer = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>>>;

struct SimState {
    regs: BTreeMap<u32, u32>,
    last_tdt: u32,
    hold_tx: bool,
    pending_tx: VecDeque<usize>,
    transmitted: Vec<Vec<u8>>,
    peer: Option<Peer>,
}

/// Simulated e1000
#[derive(Clone)]
pub struct SimNic {
    state: Rc<RefCell<SimState>>,
}

impl SimNic {
    /// A device whose EEPROM-loaded receive address is `mac`
    pub fn new(mac: MacAddress) -> Self {
        let mut regs = BTreeMap::new();
        let ral = u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]]);
        let rah = u32::from_le_bytes([mac[4], mac[5], 0, 0]);
        regs.insert(REG_RAL0, ral);
        regs.insert(REG_RAH0, if ral == 0 { rah } else { rah | RAH_AV });
        regs.insert(REG_STATUS, STATUS_LU);

        SimNic {
            state: Rc::new(RefCell::new(SimState {
                regs,
                last_tdt: 0,
                hold_tx: false,
                pending_tx: VecDeque::new(),
                transmitted: Vec::new(),
                peer: None,
            })),
        }
    }

    /// Current value of a register
    pub fn register(&self, offset: u32) -> u32 {
        self.state.borrow().reg(offset)
    }

    /// While held, transmit descriptors stay owned by the device
    pub fn hold_transmits(&self, hold: bool) {
        self.state.borrow_mut().hold_tx = hold;
    }

    /// Finish every held transmit; returns how many completed
    pub fn complete_transmits(&self) -> usize {
        let mut state = self.state.borrow_mut();
        let mut done = 0;
        while let Some(slot) = state.pending_tx.pop_front() {
            state.transmit(slot);
            done += 1;
        }
        done
    }

    /// Frames the device has put on the wire since the last call
    pub fn take_transmitted(&self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.state.borrow_mut().transmitted)
    }

    /// Deliver a frame from the wire into the receive ring
    ///
    /// Returns `false` when the receiver is off or the ring has no free slot.
    pub fn inject(&self, frame: &[u8]) -> bool {
        self.state.borrow_mut().inject(frame)
    }

    /// Install a peer that answers every transmitted frame
    pub fn set_peer<F>(&self, peer: F)
    where
        F: FnMut(&[u8]) -> Vec<Vec<u8>> + 'static,
    {
        self.state.borrow_mut().peer = Some(Box::new(peer));
    }
}

impl RegisterWindow for SimNic {
    fn read32(&self, offset: u32) -> u32 {
        self.register(offset)
    }

    fn write32(&mut self, offset: u32, value: u32) {
        let mut state = self.state.borrow_mut();
        state.regs.insert(offset, value);
        match offset {
            // the device transmits from head to tail
            REG_TDH => state.last_tdt = value,
            REG_TDT => state.tail_written(value),
            _ => {}
        }
    }
}

impl SimState {
    fn reg(&self, offset: u32) -> u32 {
        self.regs.get(&offset).copied().unwrap_or(0)
    }

    fn ring_base(&self, low: u32, high: u32) -> u64 {
        ((self.reg(high) as u64) << 32) | self.reg(low) as u64
    }

    fn ring_len(&self, len_reg: u32) -> usize {
        self.reg(len_reg) as usize / DESC_SIZE
    }

    fn tail_written(&mut self, tdt: u32) {
        let n = self.ring_len(REG_TDLEN);
        if n == 0 {
            return;
        }
        // each tail write publishes the slots between the old and new tail
        let count = (tdt as usize + n - self.last_tdt as usize) % n;
        for k in 0..count {
            let slot = (self.last_tdt as usize + k) % n;
            if self.hold_tx {
                self.pending_tx.push_back(slot);
            } else {
                self.transmit(slot);
            }
        }
        self.last_tdt = tdt;
    }

    fn transmit(&mut self, slot: usize) {
        let base = self.ring_base(REG_TDBAL, REG_TDBAH);
        let n = self.ring_len(REG_TDLEN);
        let desc_ptr = (base as usize + slot * DESC_SIZE) as *mut TxDesc;
        let frame = unsafe {
            let desc = read_volatile(desc_ptr);
            let len = (desc.length as usize).min(BUFFER_SIZE);
            let data = core::slice::from_raw_parts(desc.addr as usize as *const u8, len).to_vec();
            write_volatile(addr_of_mut!((*desc_ptr).status), desc.status | DESC_DD);
            data
        };
        self.regs.insert(REG_TDH, ((slot + 1) % n) as u32);

        if let Some(mut peer) = self.peer.take() {
            for reply in peer(&frame) {
                self.inject(&reply);
            }
            self.peer = Some(peer);
        }
        self.transmitted.push(frame);
    }

    fn inject(&mut self, frame: &[u8]) -> bool {
        let n = self.ring_len(REG_RDLEN);
        if n == 0 || self.reg(REG_RCTL) & RCTL_EN == 0 {
            return false;
        }
        let head = self.reg(REG_RDH) as usize;
        let tail = self.reg(REG_RDT) as usize;
        if head == tail {
            return false;
        }

        let base = self.ring_base(REG_RDBAL, REG_RDBAH);
        let desc_ptr = (base as usize + head * DESC_SIZE) as *mut RxDesc;
        let len = frame.len().min(BUFFER_SIZE);
        unsafe {
            let desc = read_volatile(desc_ptr);
            core::ptr::copy_nonoverlapping(frame.as_ptr(), desc.addr as usize as *mut u8, len);
            write_volatile(addr_of_mut!((*desc_ptr).length), len as u16);
            write_volatile(addr_of_mut!((*desc_ptr).status), DESC_DD | DESC_EOP);
        }
        self.regs.insert(REG_RDH, ((head + 1) % n) as u32);
        true
    }
}
