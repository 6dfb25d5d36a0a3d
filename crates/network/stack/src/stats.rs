//! Stack counters

use core::fmt;

/// Running totals kept by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetStats {
    pub rx_frames: u64,
    pub tx_frames: u64,
    /// Receive calls that failed in the driver
    pub rx_errors: u64,
    /// Frames dropped for failing validation
    pub malformed: u64,
    /// Well-formed frames with nothing for us
    pub ignored: u64,
    pub arp_requests_sent: u64,
    pub arp_replies_sent: u64,
    pub echo_requests_sent: u64,
    pub echo_replies_sent: u64,
    pub echo_replies_matched: u64,
    /// Transmits refused because the ring was full
    pub tx_busy: u64,
}

impl fmt::Display for NetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rx {} tx {} rx_err {} malformed {} ignored {} arp_req {} arp_rep {} echo_req {} echo_rep {} echo_match {} busy {}",
            self.rx_frames,
            self.tx_frames,
            self.rx_errors,
            self.malformed,
            self.ignored,
            self.arp_requests_sent,
            self.arp_replies_sent,
            self.echo_requests_sent,
            self.echo_replies_sent,
            self.echo_replies_matched,
            self.tx_busy,
        )
    }
}
