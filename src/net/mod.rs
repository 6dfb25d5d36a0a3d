//! Network subsystem for DELIX
//!
//! Ties the e1000 driver to the network stack and exposes the kernel-facing
//! operations: bring-up, polling, and the `ping` command.

#[cfg(target_arch = "x86_64")]
pub mod hw;

use core::fmt::Write;

use delix_driver_e1000::{DmaArena, E1000Driver};
use delix_driver_pci::PciDriver;
use delix_driver_traits::{ConfigSpace, DeviceLocation, Driver, DriverResult, NicDevice, RegisterWindow};
use delix_network::{NetConfig, NetError, NetResult, NetStack, PingReply, Spin, Waiter};
use log::{info, warn};

use crate::logger::PrintWriter;

/// Find, map and initialize an e1000
pub fn probe_e1000<C, W, F>(
    pci: &PciDriver<C>,
    dma: &'static mut DmaArena,
    map: F,
) -> DriverResult<E1000Driver<W>>
where
    C: ConfigSpace,
    W: RegisterWindow,
    F: FnOnce(&DeviceLocation) -> W,
{
    let mut nic = E1000Driver::probe(pci, dma, map)?;
    nic.init()?;
    Ok(nic)
}

/// Lifecycle of the network subsystem
pub enum NetSubsystem<D: NicDevice, W: Waiter = Spin> {
    /// `attach` has not run
    Uninitialized,
    /// Bring-up failed; stays here until the kernel restarts
    Unavailable,
    Up(NetStack<D, W>),
}

impl<D: NicDevice, W: Waiter> NetSubsystem<D, W> {
    pub const fn new() -> Self {
        NetSubsystem::Uninitialized
    }

    /// Install the NIC from a bring-up attempt
    ///
    /// A failed attempt leaves an interface that is already up in place.
    pub fn attach(&mut self, nic: DriverResult<D>, config: NetConfig, waiter: W) -> NetResult<()> {
        match nic {
            Ok(nic) => {
                let stack = NetStack::with_waiter(nic, config, waiter);
                info!("net: up, IP {} MAC {}", stack.ip_addr(), stack.mac_addr());
                *self = NetSubsystem::Up(stack);
                Ok(())
            }
            Err(err) if self.is_up() => {
                warn!("net: bring-up refused ({}), keeping current interface", err);
                Err(NetError::from(err))
            }
            Err(err) => {
                warn!("net: no usable NIC ({})", err);
                *self = NetSubsystem::Unavailable;
                Err(NetError::from(err))
            }
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, NetSubsystem::Up(_))
    }

    pub fn stack(&self) -> Option<&NetStack<D, W>> {
        match self {
            NetSubsystem::Up(stack) => Some(stack),
            _ => None,
        }
    }

    pub fn stack_mut(&mut self) -> Option<&mut NetStack<D, W>> {
        match self {
            NetSubsystem::Up(stack) => Some(stack),
            _ => None,
        }
    }

    /// Service received frames; does nothing unless the subsystem is up
    pub fn poll(&mut self) -> usize {
        self.stack_mut().map_or(0, |stack| stack.poll())
    }

    pub fn ping(&mut self, host: &str) -> NetResult<PingReply> {
        match self.stack_mut() {
            Some(stack) => stack.ping(host),
            None => Err(NetError::DeviceNotFound),
        }
    }

    /// Shell `ping` command: parse `args`, ping, and report through `print`
    pub fn ping_command<P: FnMut(&str)>(&mut self, args: &str, print: P) -> NetResult<PingReply> {
        let mut out = PrintWriter(print);
        let host = args.trim();
        if host.is_empty() {
            let _ = writeln!(out, "Usage: ping <host>");
            return Err(NetError::InvalidAddress);
        }

        let _ = writeln!(out, "Pinging {}...", host);
        let result = self.ping(host);
        match &result {
            Ok(reply) => {
                let _ = writeln!(out, "Reply from {}: seq={} ttl={}", reply.from, reply.seq, reply.ttl);
                let _ = writeln!(out, "Ping successful");
            }
            Err(err) => {
                let _ = writeln!(out, "Ping failed: {}", err);
            }
        }
        result
    }

    /// Log the interface summary and counters
    pub fn log_info(&self) {
        match self {
            NetSubsystem::Up(stack) => {
                info!(
                    "net: IP {} MAC {} ARP entries {}",
                    stack.ip_addr(),
                    stack.mac_addr(),
                    stack.arp_cache().len()
                );
                for (ip, mac) in stack.arp_cache().iter() {
                    info!("net:   {} at {}", ip, mac);
                }
                info!("net: {}", stack.stats());
            }
            NetSubsystem::Unavailable => info!("net: unavailable"),
            NetSubsystem::Uninitialized => info!("net: not initialized"),
        }
    }
}

impl<D: NicDevice + Driver, W: Waiter> NetSubsystem<D, W> {
    /// Re-run driver initialization on the live interface
    ///
    /// The rings are reprogrammed; the ARP cache and echo sequence survive.
    pub fn reinit(&mut self) -> NetResult<()> {
        let stack = self.stack_mut().ok_or(NetError::DeviceNotFound)?;
        stack.nic_mut().init()?;
        info!("net: reinitialized");
        Ok(())
    }
}

impl<D: NicDevice, W: Waiter> Default for NetSubsystem<D, W> {
    fn default() -> Self {
        Self::new()
    }
}
