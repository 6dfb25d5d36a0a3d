//! Descriptor rings and their backing memory

/// Number of receive descriptors
pub const NUM_RX_DESC: usize = 32;
/// Number of transmit descriptors
pub const NUM_TX_DESC: usize = 8;
/// Size of each packet buffer
pub const BUFFER_SIZE: usize = 2048;

/// Size of one hardware descriptor
pub const DESC_SIZE: usize = 16;

// Descriptor status bits
pub const DESC_DD: u8 = 1 << 0;
pub const DESC_EOP: u8 = 1 << 1;

// Transmit command bits
pub const TDESC_CMD_EOP: u8 = 1 << 0;
pub const TDESC_CMD_IFCS: u8 = 1 << 1;
pub const TDESC_CMD_RS: u8 = 1 << 3;

/// RX Descriptor
#[repr(C, align(16))]
#[derive(Clone, Copy, Default, Debug)]
pub struct RxDesc {
    pub addr: u64,
    pub length: u16,
    pub checksum: u16,
    pub status: u8,
    pub errors: u8,
    pub special: u16,
}

/// TX Descriptor
#[repr(C, align(16))]
#[derive(Clone, Copy, Default, Debug)]
pub struct TxDesc {
    pub addr: u64,
    pub length: u16,
    pub cso: u8,
    pub cmd: u8,
    pub status: u8,
    pub css: u8,
    pub special: u16,
}

impl RxDesc {
    const EMPTY: RxDesc = RxDesc {
        addr: 0,
        length: 0,
        checksum: 0,
        status: 0,
        errors: 0,
        special: 0,
    };
}

impl TxDesc {
    const EMPTY: TxDesc = TxDesc {
        addr: 0,
        length: 0,
        cso: 0,
        cmd: 0,
        status: 0,
        css: 0,
        special: 0,
    };
}

/// Position in a ring of `N` descriptors; always in `0..N`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RingIndex<const N: usize>(usize);

impl<const N: usize> RingIndex<N> {
    pub const CAPACITY: usize = N;

    pub const fn new(index: usize) -> Self {
        RingIndex(index % N)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    pub const fn next(self) -> Self {
        RingIndex((self.0 + 1) % N)
    }

    /// Index `n` slots further along, wrapping
    pub const fn offset(self, n: usize) -> Self {
        RingIndex((self.0 + n) % N)
    }
}

/// Descriptor rings and packet buffers shared with the device
///
/// The device reads and writes this memory by DMA, so it must never move
/// once its addresses are programmed; drivers only take it as `&'static mut`.
/// Addresses handed to the device are the buffers' own addresses, which
/// holds in the kernel's identity-mapped single address space.
#[repr(C, align(128))]
pub struct DmaArena {
    pub(crate) rx_descs: [RxDesc; NUM_RX_DESC],
    pub(crate) tx_descs: [TxDesc; NUM_TX_DESC],
    pub(crate) rx_buffers: [[u8; BUFFER_SIZE]; NUM_RX_DESC],
    pub(crate) tx_buffers: [[u8; BUFFER_SIZE]; NUM_TX_DESC],
}

impl DmaArena {
    pub const fn new() -> Self {
        DmaArena {
            rx_descs: [RxDesc::EMPTY; NUM_RX_DESC],
            tx_descs: [TxDesc::EMPTY; NUM_TX_DESC],
            rx_buffers: [[0; BUFFER_SIZE]; NUM_RX_DESC],
            tx_buffers: [[0; BUFFER_SIZE]; NUM_TX_DESC],
        }
    }

    pub(crate) fn rx_ring_addr(&self) -> u64 {
        self.rx_descs.as_ptr() as u64
    }

    pub(crate) fn tx_ring_addr(&self) -> u64 {
        self.tx_descs.as_ptr() as u64
    }

    pub(crate) fn rx_buffer_addr(&self, i: usize) -> u64 {
        self.rx_buffers[i].as_ptr() as u64
    }

    pub(crate) fn tx_buffer_addr(&self, i: usize) -> u64 {
        self.tx_buffers[i].as_ptr() as u64
    }
}

impl Default for DmaArena {
    fn default() -> Self {
        Self::new()
    }
}
