//! RFC 1071 Internet checksum.

/// One's complement sum of the big-endian 16-bit words of `data`, carries
/// folded back twice. A trailing odd byte counts as the high half of a word.
pub fn ones_complement_sum(data: &[u8]) -> u16 {
    let mut sum = 0u32;
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u16::from_be_bytes([word[0], word[1]]) as u32;
    }
    if let [last] = words.remainder() {
        sum += (*last as u32) << 8;
    }

    sum = (sum >> 16) + (sum & 0xFF_FF);
    sum += sum >> 16;
    sum as u16
}

pub fn checksum(data: &[u8]) -> u16 {
    !ones_complement_sum(data)
}

/// Writes the checksum of `buf` into the two bytes at `offset`.
///
/// The bytes are XORed rather than assigned, matching the classic ping
/// implementations. With a zeroed field the result is the plain checksum.
pub fn write_checksum(buf: &mut [u8], offset: usize) {
    let [hi, lo] = checksum(buf).to_be_bytes();
    buf[offset] ^= hi;
    buf[offset + 1] ^= lo;
}
