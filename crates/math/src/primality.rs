//! Miller-Rabin probabilistic primality test
//!
//! A composite survives a single round with probability at most 1/4, so the
//! false-positive rate is bounded by `4^-rounds`. Primes are never rejected.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::One;
use rand::Rng;

use crate::candidate::random_below;

/// Round count used when a caller does not pick one.
pub const DEFAULT_ROUNDS: u32 = 5;

/// `n - 1` split as `d * 2^r` with `d` odd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OddDecomposition {
    pub d: BigUint,
    pub r: u64,
}

impl OddDecomposition {
    /// Decompose `n - 1`. `n` must be odd and greater than 2.
    pub(crate) fn of(n: &BigUint) -> Self {
        let n_minus_one = n - 1u32;
        let r = n_minus_one.trailing_zeros().unwrap_or(0);
        let d = n_minus_one >> r;
        Self { d, r }
    }
}

/// Returns `true` when `a` does not witness the compositeness of `n`.
///
/// This is a single strong-probable-prime round for a fixed base.
pub(crate) fn passes_round(n: &BigUint, split: &OddDecomposition, a: &BigUint) -> bool {
    let n_minus_one = n - 1u32;
    let mut x = a.modpow(&split.d, n);
    if x.is_one() || x == n_minus_one {
        return true;
    }
    for _ in 1..split.r {
        x = (&x * &x) % n;
        if x == n_minus_one {
            return true;
        }
    }
    false
}

/// Probabilistic primality test.
///
/// Small and even inputs are decided without randomness. Otherwise each of
/// `rounds` iterations draws a uniform base in `[2, n - 2]`; the first
/// witness of compositeness ends the test. `rounds` below 1 is treated as 1.
pub fn is_probably_prime<R: Rng + ?Sized>(n: &BigUint, rounds: u32, rng: &mut R) -> bool {
    if n <= &BigUint::one() {
        return false;
    }
    if n == &BigUint::from(2u32) || n == &BigUint::from(3u32) {
        return true;
    }
    if n.is_even() {
        return false;
    }

    let split = OddDecomposition::of(n);
    // n >= 5 here, so the base range [2, n - 2] is never empty
    let span = n - 3u32;
    let two = BigUint::from(2u32);

    for _ in 0..rounds.max(1) {
        let a = &two + random_below(&span, rng);
        if !passes_round(n, &split, &a) {
            return false;
        }
    }
    true
}

/// Convenience wrapper over [`is_probably_prime`] for machine-sized input.
pub fn is_probably_prime_u64<R: Rng + ?Sized>(n: u64, rounds: u32, rng: &mut R) -> bool {
    is_probably_prime(&BigUint::from(n), rounds, rng)
}

/// Sieve of Eratosthenes, used by tests and the trial-division validator.
pub fn primes_below(limit: usize) -> Vec<u64> {
    if limit < 3 {
        return Vec::new();
    }
    let mut composite = vec![false; limit];
    let mut primes = Vec::new();
    for i in 2..limit {
        if composite[i] {
            continue;
        }
        primes.push(i as u64);
        let mut multiple = i * i;
        while multiple < limit {
            composite[multiple] = true;
            multiple += i;
        }
    }
    primes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5eed)
    }

    #[test]
    fn test_small_inputs_short_circuit() {
        let mut rng = rng();
        assert!(!is_probably_prime_u64(0, 5, &mut rng));
        assert!(!is_probably_prime_u64(1, 5, &mut rng));
        assert!(is_probably_prime_u64(2, 5, &mut rng));
        assert!(is_probably_prime_u64(3, 5, &mut rng));
        assert!(!is_probably_prime_u64(4, 5, &mut rng));
        assert!(is_probably_prime_u64(5, 5, &mut rng));
    }

    #[test]
    fn test_zero_rounds_still_tests() {
        let mut rng = rng();
        // 341 = 11 * 31 is a base-2 pseudoprime but not strong for most bases
        let hits = (0..64)
            .filter(|_| is_probably_prime_u64(341, 0, &mut rng))
            .count();
        assert!(hits < 32);
    }

    #[test]
    fn test_decomposition() {
        let split = OddDecomposition::of(&BigUint::from(97u32));
        // 96 = 3 * 2^5
        assert_eq!(split.d, BigUint::from(3u32));
        assert_eq!(split.r, 5);
    }

    #[test]
    fn test_known_large_prime() {
        let mut rng = rng();
        // 2^127 - 1
        let mersenne = (BigUint::one() << 127u32) - 1u32;
        assert!(is_probably_prime(&mersenne, 10, &mut rng));
        assert!(!is_probably_prime(&(&mersenne + 2u32), 10, &mut rng));
    }

    #[test]
    fn test_carmichael_numbers_rejected() {
        let mut rng = rng();
        for n in [561u64, 1105, 1729, 2465, 2821, 6601, 8911] {
            assert!(!is_probably_prime_u64(n, 20, &mut rng), "{n} accepted");
        }
    }

    #[test]
    fn test_sieve() {
        assert_eq!(primes_below(20), vec![2, 3, 5, 7, 11, 13, 17, 19]);
        assert!(primes_below(2).is_empty());
        assert_eq!(primes_below(1_000_000).len(), 78_498);
    }
}
