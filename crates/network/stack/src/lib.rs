//! Network Stack - ARP resolution and ICMP echo over a single NIC
//!
//! Frames are built and parsed with smoltcp wire types; checksums are
//! computed here so that every header the stack emits is fully formed
//! before it reaches the driver.
//!
//! The stack is single-threaded and cooperative: [`NetStack`] owns the NIC,
//! the dispatcher state and a [`Waiter`], and every operation runs to
//! completion on the caller's thread.

#![cfg_attr(not(test), no_std)]

pub mod addr;
pub mod arp;
pub mod checksum;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod icmp;
pub mod stack;
pub mod stats;
pub mod wait;

pub use addr::parse_ipv4;
pub use arp::{ArpCache, ARP_CACHE_SIZE};
pub use config::{ArpEviction, NetConfig};
pub use dispatch::Dispatcher;
pub use error::{NetError, NetResult};
pub use icmp::{EchoSession, PingReply};
pub use stack::NetStack;
pub use stats::NetStats;
pub use wait::{Spin, Waiter};

pub use smoltcp::wire::{EthernetAddress, Ipv4Address};

/// Ethernet header: destination, source, EtherType
pub const ETH_HEADER_LEN: usize = 14;
/// ARP packet for Ethernet/IPv4
pub const ARP_PACKET_LEN: usize = 28;
/// IPv4 header without options
pub const IPV4_HEADER_LEN: usize = 20;
/// ICMP echo header: type, code, checksum, identifier, sequence
pub const ICMP_HEADER_LEN: usize = 8;

/// Largest frame the stack builds
pub const TX_BUF_LEN: usize = 1536;
/// Largest frame the stack accepts from the NIC
pub const RX_BUF_LEN: usize = 2048;

#[cfg(test)]
mod testing;
