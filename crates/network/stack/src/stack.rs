//! The network stack bound to one NIC

use delix_driver_traits::NicDevice;
use log::{debug, warn};
use smoltcp::wire::{EthernetAddress, Ipv4Address};

use crate::addr::parse_ipv4;
use crate::arp::ArpCache;
use crate::config::NetConfig;
use crate::dispatch::Dispatcher;
use crate::error::{NetError, NetResult};
use crate::icmp::PingReply;
use crate::stats::NetStats;
use crate::wait::{Spin, Waiter};
use crate::RX_BUF_LEN;

/// Upper bound on frames drained by one [`NetStack::poll`]
const MAX_FRAMES_PER_POLL: usize = 64;

/// Simple network stack for ARP and ping
pub struct NetStack<D: NicDevice, W: Waiter = Spin> {
    nic: D,
    waiter: W,
    config: NetConfig,
    dispatcher: Dispatcher,
    rx_buf: [u8; RX_BUF_LEN],
}

impl<D: NicDevice> NetStack<D, Spin> {
    pub fn new(nic: D, config: NetConfig) -> Self {
        Self::with_waiter(nic, config, Spin)
    }
}

impl<D: NicDevice, W: Waiter> NetStack<D, W> {
    pub fn with_waiter(nic: D, config: NetConfig, waiter: W) -> Self {
        let dispatcher = Dispatcher::new(&config, nic.mac_address());
        NetStack {
            nic,
            waiter,
            config,
            dispatcher,
            rx_buf: [0; RX_BUF_LEN],
        }
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn ip_addr(&self) -> Ipv4Address {
        self.dispatcher.ip_addr()
    }

    pub fn mac_addr(&self) -> EthernetAddress {
        self.dispatcher.mac_addr()
    }

    pub fn stats(&self) -> &NetStats {
        self.dispatcher.stats()
    }

    pub fn arp_cache(&self) -> &ArpCache {
        self.dispatcher.cache()
    }

    pub fn arp_cache_mut(&mut self) -> &mut ArpCache {
        self.dispatcher.cache_mut()
    }

    /// Sequence number the next ping will carry
    pub fn sequence(&self) -> u16 {
        self.dispatcher.session().sequence()
    }

    pub fn nic(&self) -> &D {
        &self.nic
    }

    pub fn nic_mut(&mut self) -> &mut D {
        &mut self.nic
    }

    pub fn waiter_mut(&mut self) -> &mut W {
        &mut self.waiter
    }

    /// Drain received frames through the dispatcher; returns how many
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        for _ in 0..MAX_FRAMES_PER_POLL {
            match self.nic.receive_frame(&mut self.rx_buf) {
                Ok(Some(len)) => {
                    self.dispatcher.receive(&self.rx_buf[..len], &mut self.nic);
                    handled += 1;
                }
                Ok(None) => break,
                Err(err) => {
                    self.dispatcher.stats.rx_errors += 1;
                    debug!("poll: receive failed: {}", err);
                }
            }
        }
        handled
    }

    /// Broadcast one ARP request for `ip`
    pub fn send_arp_request(&mut self, ip: Ipv4Address) -> NetResult<()> {
        self.dispatcher.send_arp_request(ip, &mut self.nic)
    }

    /// Hardware address for `ip`, asking the network if it is not cached
    pub fn resolve(&mut self, ip: Ipv4Address) -> NetResult<EthernetAddress> {
        if let Some(mac) = self.dispatcher.cache.lookup(ip) {
            return Ok(mac);
        }

        for attempt in 0..self.config.arp_attempts {
            if let Err(err) = self.send_arp_request(ip) {
                debug!("arp: request {} for {} not sent: {}", attempt + 1, ip, err);
            }
            let answered = self.wait_until(self.config.arp_wait_polls, |d| d.cache.peek(ip).is_some());
            if answered {
                if let Some(mac) = self.dispatcher.cache.lookup(ip) {
                    return Ok(mac);
                }
            }
        }

        warn!("arp: no reply from {}", ip);
        Err(NetError::ResolutionFailed)
    }

    /// Ping the host named by dotted-quad `host`
    pub fn ping(&mut self, host: &str) -> NetResult<PingReply> {
        let target = parse_ipv4(host)?;
        self.ping_addr(target)
    }

    /// Send one echo request to `target` and wait for its reply
    pub fn ping_addr(&mut self, target: Ipv4Address) -> NetResult<PingReply> {
        let mac = self.resolve(target)?;
        let seq = self.dispatcher.send_echo_request(target, mac, &mut self.nic)?;
        debug!("ping: echo request to {} seq {}", target, seq);

        self.wait_until(self.config.ping_wait_polls, |d| d.session.received());

        match self.dispatcher.session.finish() {
            Some(reply) => Ok(reply),
            None => {
                warn!("ping: no reply from {} seq {}", target, seq);
                Err(NetError::Timeout)
            }
        }
    }

    /// Poll until `done` holds; `false` once the polls run out or the waiter cancels
    fn wait_until<F>(&mut self, polls: u32, mut done: F) -> bool
    where
        F: FnMut(&Dispatcher) -> bool,
    {
        for _ in 0..polls {
            self.poll();
            if done(&self.dispatcher) {
                return true;
            }
            if !self.waiter.wait() {
                return false;
            }
        }
        false
    }
}
