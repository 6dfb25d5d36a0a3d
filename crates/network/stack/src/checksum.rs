//! Internet checksum (RFC 1071)

/// One's-complement of the one's-complement sum of 16-bit big-endian words
///
/// An odd trailing byte is treated as the high byte of a final word.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u64 = 0;
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u16::from_be_bytes([word[0], word[1]]) as u64;
    }
    if let [last] = words.remainder() {
        sum += (*last as u64) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// True when `data` already carries a correct checksum
pub fn verify(data: &[u8]) -> bool {
    checksum(data) == 0
}

/// Zero the checksum field at `offset`, sum `data`, and store the result
pub fn fill(data: &mut [u8], offset: usize) {
    data[offset..offset + 2].copy_from_slice(&[0, 0]);
    let sum = checksum(data);
    data[offset..offset + 2].copy_from_slice(&sum.to_be_bytes());
}
