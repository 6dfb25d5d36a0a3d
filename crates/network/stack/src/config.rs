//! Stack configuration

use smoltcp::wire::Ipv4Address;

/// What the ARP cache does with a new binding when every slot is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArpEviction {
    /// Keep the existing bindings and drop the new one
    #[default]
    DropNew,
    /// Replace the least recently used binding
    LeastRecentlyUsed,
}

/// Network configuration
///
/// The defaults match QEMU user-mode networking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetConfig {
    pub ip_addr: Ipv4Address,
    /// ICMP identifier for echo requests sent by this host
    pub echo_ident: u16,
    /// ARP requests sent before giving up on a resolution
    pub arp_attempts: u32,
    /// Poll iterations to wait for each ARP reply
    pub arp_wait_polls: u32,
    /// Poll iterations to wait for an echo reply
    pub ping_wait_polls: u32,
    pub arp_eviction: ArpEviction,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            ip_addr: Ipv4Address::new(10, 0, 2, 15),
            echo_ident: 0x1234,
            arp_attempts: 3,
            arp_wait_polls: 100_000,
            ping_wait_polls: 1_000_000,
            arp_eviction: ArpEviction::DropNew,
        }
    }
}
