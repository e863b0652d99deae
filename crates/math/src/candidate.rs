//! Random candidate generation

use num_bigint::BigUint;
use num_traits::Zero;
use rand::Rng;

/// Smallest bit length that still yields an odd value with the top bit set
/// distinct from 1.
pub const MIN_CANDIDATE_BITS: u64 = 2;

/// Uniformly random integer with at most `bits` bits.
pub fn random_bits<R: Rng + ?Sized>(bits: u64, rng: &mut R) -> BigUint {
    if bits == 0 {
        return BigUint::zero();
    }
    let byte_len = bits.div_ceil(8) as usize;
    let mut bytes = vec![0u8; byte_len];
    rng.fill_bytes(&mut bytes);

    // Little-endian: the last byte carries the most significant bits
    let excess = (byte_len as u64) * 8 - bits;
    if let Some(top) = bytes.last_mut() {
        *top &= 0xFFu8 >> excess;
    }
    BigUint::from_bytes_le(&bytes)
}

/// Uniformly random integer in `[0, bound)`, by rejection on the bit length
/// of `bound`. Returns zero for a zero bound.
pub fn random_below<R: Rng + ?Sized>(bound: &BigUint, rng: &mut R) -> BigUint {
    if bound.is_zero() {
        return BigUint::zero();
    }
    let bits = bound.bits();
    loop {
        let value = random_bits(bits, rng);
        if &value < bound {
            return value;
        }
    }
}

/// Odd integer of exactly `bits` bits (top and bottom bits forced).
///
/// Bit lengths below [`MIN_CANDIDATE_BITS`] are raised to it.
pub fn generate_odd_candidate<R: Rng + ?Sized>(bits: u64, rng: &mut R) -> BigUint {
    let bits = bits.max(MIN_CANDIDATE_BITS);
    let mut candidate = random_bits(bits, rng);
    candidate.set_bit(bits - 1, true);
    candidate.set_bit(0, true);
    candidate
}
