//! Address Resolution Protocol: binding cache and frame builders

use smoltcp::wire::{
    ArpOperation, ArpPacket, ArpRepr, EthernetAddress, EthernetFrame, EthernetProtocol,
    EthernetRepr, Ipv4Address,
};

use crate::config::ArpEviction;
use crate::{ARP_PACKET_LEN, ETH_HEADER_LEN};

/// Number of bindings the stack keeps
pub const ARP_CACHE_SIZE: usize = 16;

/// Length of an Ethernet frame carrying one ARP packet
pub const ARP_FRAME_LEN: usize = ETH_HEADER_LEN + ARP_PACKET_LEN;

#[derive(Debug, Clone, Copy)]
struct ArpEntry {
    ip: Ipv4Address,
    mac: EthernetAddress,
    last_used: u32,
}

/// Fixed-capacity IP to MAC binding table
///
/// At most one slot holds any given IP. Slots are never aged out; a binding
/// only leaves through [`ArpCache::invalidate`] or LRU replacement.
pub struct ArpCache<const N: usize = ARP_CACHE_SIZE> {
    slots: [Option<ArpEntry>; N],
    policy: ArpEviction,
    clock: u32,
}

impl<const N: usize> ArpCache<N> {
    pub const CAPACITY: usize = N;

    pub const fn new(policy: ArpEviction) -> Self {
        ArpCache {
            slots: [None; N],
            policy,
            clock: 0,
        }
    }

    /// MAC bound to `ip`, marking the binding as used
    pub fn lookup(&mut self, ip: Ipv4Address) -> Option<EthernetAddress> {
        let now = self.tick();
        let entry = self.slots.iter_mut().flatten().find(|e| e.ip == ip)?;
        entry.last_used = now;
        Some(entry.mac)
    }

    /// MAC bound to `ip` without touching recency
    pub fn peek(&self, ip: Ipv4Address) -> Option<EthernetAddress> {
        self.iter().find(|(bound, _)| *bound == ip).map(|(_, mac)| mac)
    }

    /// Bind `ip` to `mac`
    ///
    /// Updates the existing binding for `ip`, else takes the first free slot.
    /// With the cache full, `DropNew` returns `false` and changes nothing;
    /// `LeastRecentlyUsed` replaces the stalest binding.
    pub fn insert(&mut self, ip: Ipv4Address, mac: EthernetAddress) -> bool {
        let now = self.tick();
        let entry = ArpEntry { ip, mac, last_used: now };

        if let Some(slot) = self.slots.iter_mut().flatten().find(|e| e.ip == ip) {
            *slot = entry;
            return true;
        }
        if let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) {
            *slot = Some(entry);
            return true;
        }

        match self.policy {
            ArpEviction::DropNew => false,
            ArpEviction::LeastRecentlyUsed => {
                let victim = self
                    .slots
                    .iter_mut()
                    .min_by_key(|s| s.map_or(0, |e| e.last_used));
                match victim {
                    Some(slot) => {
                        *slot = Some(entry);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// Forget the binding for `ip`; returns whether one existed
    pub fn invalidate(&mut self, ip: Ipv4Address) -> bool {
        match self.slots.iter_mut().find(|s| s.map_or(false, |e| e.ip == ip)) {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ipv4Address, EthernetAddress)> + '_ {
        self.slots.iter().flatten().map(|e| (e.ip, e.mac))
    }

    fn tick(&mut self) -> u32 {
        self.clock = self.clock.wrapping_add(1);
        self.clock
    }
}

impl<const N: usize> Default for ArpCache<N> {
    fn default() -> Self {
        Self::new(ArpEviction::default())
    }
}

/// Write an Ethernet frame carrying `repr` to `eth_dst`; returns its length
///
/// `buf` must hold at least [`ARP_FRAME_LEN`] bytes.
pub fn emit_arp(buf: &mut [u8], eth_src: EthernetAddress, eth_dst: EthernetAddress, repr: &ArpRepr) -> usize {
    let eth_repr = EthernetRepr {
        src_addr: eth_src,
        dst_addr: eth_dst,
        ethertype: EthernetProtocol::Arp,
    };

    let mut eth_frame = EthernetFrame::new_unchecked(&mut buf[..ARP_FRAME_LEN]);
    eth_repr.emit(&mut eth_frame);

    let mut arp_packet = ArpPacket::new_unchecked(eth_frame.payload_mut());
    repr.emit(&mut arp_packet);

    ARP_FRAME_LEN
}

/// Broadcast request for the hardware address of `target_ip`
pub fn request_repr(mac: EthernetAddress, ip: Ipv4Address, target_ip: Ipv4Address) -> ArpRepr {
    ArpRepr::EthernetIpv4 {
        operation: ArpOperation::Request,
        source_hardware_addr: mac,
        source_protocol_addr: ip,
        target_hardware_addr: EthernetAddress([0; 6]),
        target_protocol_addr: target_ip,
    }
}

/// Answer to a request from `target_mac`/`target_ip`
pub fn reply_repr(
    mac: EthernetAddress,
    ip: Ipv4Address,
    target_mac: EthernetAddress,
    target_ip: Ipv4Address,
) -> ArpRepr {
    ArpRepr::EthernetIpv4 {
        operation: ArpOperation::Reply,
        source_hardware_addr: mac,
        source_protocol_addr: ip,
        target_hardware_addr: target_mac,
        target_protocol_addr: target_ip,
    }
}
