//! DELIX kernel network subsystem
//!
//! PCI discovery, the e1000 driver and a minimal ARP/ICMP stack, wired
//! together behind [`net::NetSubsystem`]. On x86_64 targets [`net::hw`]
//! holds the kernel's single interface.

#![cfg_attr(not(test), no_std)]

pub mod logger;
pub mod net;

pub use delix_network::{parse_ipv4, NetConfig, NetError, NetResult, NetStats, PingReply};
pub use logger::{init_logging, ConsoleLogger};
pub use net::{probe_e1000, NetSubsystem};
