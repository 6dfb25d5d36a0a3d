//! Dotted-quad address parsing

use smoltcp::wire::Ipv4Address;

use crate::error::{NetError, NetResult};

/// Parse `a.b.c.d` where each part is ASCII digits with value 0-255
///
/// Anything else, including signs, empty parts, or a fifth part, is
/// `InvalidAddress`. Leading and trailing whitespace is ignored.
pub fn parse_ipv4(text: &str) -> NetResult<Ipv4Address> {
    let mut octets = [0u8; 4];
    let mut parts = text.trim().split('.');
    for octet in octets.iter_mut() {
        let part = parts.next().ok_or(NetError::InvalidAddress)?;
        *octet = parse_octet(part)?;
    }
    if parts.next().is_some() {
        return Err(NetError::InvalidAddress);
    }
    Ok(Ipv4Address::from_bytes(&octets))
}

fn parse_octet(part: &str) -> NetResult<u8> {
    if part.is_empty() {
        return Err(NetError::InvalidAddress);
    }
    let mut value: u32 = 0;
    for b in part.bytes() {
        if !b.is_ascii_digit() {
            return Err(NetError::InvalidAddress);
        }
        value = value * 10 + (b - b'0') as u32;
        if value > 255 {
            return Err(NetError::InvalidAddress);
        }
    }
    Ok(value as u8)
}
