//! The kernel's one network interface on real hardware

use core::ptr::addr_of_mut;
use core::sync::atomic::{AtomicBool, Ordering};

use delix_driver_e1000::{DmaArena, E1000Driver};
use delix_driver_pci::{PciDriver, PortConfigSpace};
use delix_driver_traits::{Driver, DriverError, MmioWindow};
use delix_network::{NetConfig, NetResult, PingReply, Spin};
use spin::Mutex;

use super::{probe_e1000, NetSubsystem};
use crate::logger::PrintFn;

type KernelNic = E1000Driver<MmioWindow>;

static NET: Mutex<NetSubsystem<KernelNic, Spin>> = Mutex::new(NetSubsystem::Uninitialized);

static DMA_TAKEN: AtomicBool = AtomicBool::new(false);
static mut DMA_ARENA: DmaArena = DmaArena::new();

fn take_dma_arena() -> Option<&'static mut DmaArena> {
    if DMA_TAKEN.swap(true, Ordering::AcqRel) {
        return None;
    }
    // SAFETY: the flag hands out the only reference, once
    Some(unsafe { &mut *addr_of_mut!(DMA_ARENA) })
}

/// Bring up the network interface
///
/// The DMA arena is bound to the first NIC probed. Once the interface is up,
/// later calls re-run the driver's init on it; after a failed bring-up they
/// fail with `InvalidState`.
pub fn init(config: NetConfig) -> NetResult<()> {
    let mut net = NET.lock();
    if net.is_up() {
        return net.reinit();
    }

    let nic = match take_dma_arena() {
        Some(dma) => {
            // SAFETY: the kernel runs in ring 0 and owns the config ports
            let mut pci = PciDriver::new(unsafe { PortConfigSpace::new() });
            pci.init().and_then(|()| {
                // SAFETY: BAR0 is identity-mapped in the kernel address space
                probe_e1000(&pci, dma, |location| unsafe { MmioWindow::new(location.bar0 as usize) })
            })
        }
        None => Err(DriverError::InvalidState),
    };
    net.attach(nic, config, Spin)
}

pub fn poll() -> usize {
    NET.lock().poll()
}

pub fn ping(host: &str) -> NetResult<PingReply> {
    NET.lock().ping(host)
}

pub fn ping_command(args: &str, print: PrintFn) {
    let _ = NET.lock().ping_command(args, print);
}

pub fn log_info() {
    NET.lock().log_info();
}
