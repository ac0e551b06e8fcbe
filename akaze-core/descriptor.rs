/// Fixed-length binary descriptor, packed LSB-first into whole bytes.
///
/// Never mutated after extraction; matching is done by Hamming distance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinaryDescriptor {
    bit_len: usize,
    data: Vec<u8>,
}

impl BinaryDescriptor {
    /// Create an all-zero descriptor of the given bit length
    pub fn zeroed(bit_len: usize) -> Self {
        Self {
            bit_len,
            data: vec![0u8; bit_len.div_ceil(8)],
        }
    }

    /// Reconstruct a descriptor from packed bytes. Returns `None` when the
    /// byte count does not match the bit length.
    pub fn from_bytes(bit_len: usize, data: Vec<u8>) -> Option<Self> {
        if data.len() != bit_len.div_ceil(8) {
            return None;
        }
        Some(Self { bit_len, data })
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn bit(&self, index: usize) -> bool {
        debug_assert!(index < self.bit_len);
        self.data[index / 8] & (1 << (index % 8)) != 0
    }

    #[inline]
    pub fn set_bit(&mut self, index: usize) {
        debug_assert!(index < self.bit_len);
        self.data[index / 8] |= 1 << (index % 8);
    }

    /// Number of differing bits. Descriptors of different lengths compare
    /// over the shorter length.
    pub fn hamming_distance(&self, other: &BinaryDescriptor) -> u32 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_rounds_up_to_bytes() {
        assert_eq!(BinaryDescriptor::zeroed(486).as_bytes().len(), 61);
        assert_eq!(BinaryDescriptor::zeroed(160).as_bytes().len(), 20);
        assert_eq!(BinaryDescriptor::zeroed(1).as_bytes().len(), 1);
    }

    #[test]
    fn test_set_and_read_bits() {
        let mut d = BinaryDescriptor::zeroed(100);
        d.set_bit(0);
        d.set_bit(7);
        d.set_bit(63);
        d.set_bit(99);
        assert!(d.bit(0) && d.bit(7) && d.bit(63) && d.bit(99));
        assert!(!d.bit(1) && !d.bit(64));
    }

    #[test]
    fn test_hamming_distance() {
        let mut a = BinaryDescriptor::zeroed(64);
        let mut b = BinaryDescriptor::zeroed(64);
        assert_eq!(a.hamming_distance(&b), 0);
        a.set_bit(3);
        a.set_bit(40);
        b.set_bit(40);
        b.set_bit(41);
        assert_eq!(a.hamming_distance(&b), 2);
    }

    #[test]
    fn test_from_bytes_length_check() {
        assert!(BinaryDescriptor::from_bytes(64, vec![0; 8]).is_some());
        assert!(BinaryDescriptor::from_bytes(64, vec![0; 7]).is_none());
        assert!(BinaryDescriptor::from_bytes(61, vec![0; 8]).is_some());
    }
}
