//! Independent primality cross-check
//!
//! Used to audit primes produced by the probabilistic oracle. The check below
//! 2^64 runs on native integers with a fixed base set that is known to be
//! exact in that range, so it shares no arithmetic with the oracle.

use std::time::{Duration, Instant};

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::decimal;
use crate::primality::{OddDecomposition, passes_round};

/// Bases that make Miller-Rabin exact for every n < 2^64.
const BASES_U64: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Bases used above 2^64.
const BASES_WIDE: [u32; 20] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
];

const TRIAL_DIVISION_LIMIT: u64 = 1_000_000;

/// A primality decision procedure used to audit oracle output.
pub trait PrimalityCheck: Send + Sync {
    fn name(&self) -> &str;
    fn is_prime(&self, n: &BigUint) -> bool;
}

/// Trial division below 10^6, exact Miller-Rabin below 2^64, and a
/// 20-base strong probable prime test above.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeterministicCheck;

impl PrimalityCheck for DeterministicCheck {
    fn name(&self) -> &str {
        "deterministic"
    }

    fn is_prime(&self, n: &BigUint) -> bool {
        match n.to_u64() {
            Some(small) if small < TRIAL_DIVISION_LIMIT => is_prime_trial_division(small),
            Some(word) => is_prime_u64(word),
            None => is_strong_probable_prime(n),
        }
    }
}

fn is_prime_trial_division(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut i = 3;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1u64;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

fn is_prime_u64(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for p in BASES_U64 {
        if n % p == 0 {
            return n == p;
        }
    }

    let r = (n - 1).trailing_zeros();
    let d = (n - 1) >> r;

    'bases: for a in BASES_U64 {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'bases;
            }
        }
        return false;
    }
    true
}

fn is_strong_probable_prime(n: &BigUint) -> bool {
    // Only reached for n >= 2^64, so n is larger than every base
    if !n.bit(0) {
        return false;
    }
    let split = OddDecomposition::of(n);
    BASES_WIDE
        .iter()
        .all(|&a| passes_round(n, &split, &BigUint::from(a)))
}

/// Result of auditing a batch of primes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub method: String,
    pub total: usize,
    pub valid: usize,
    /// Numbers the oracle accepted but the check rejected.
    #[serde(with = "decimal::vec")]
    pub rejected: Vec<BigUint>,
    /// Share of valid primes, in percent. Zero for an empty batch.
    pub accuracy: f64,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Audit `primes` with `check`. Mismatches are reported, never raised.
pub fn validate_primes(primes: &[BigUint], check: &dyn PrimalityCheck) -> ValidationReport {
    let started = Instant::now();
    let rejected: Vec<BigUint> = primes
        .iter()
        .filter(|p| !check.is_prime(p))
        .cloned()
        .collect();
    let elapsed = started.elapsed();

    let total = primes.len();
    let valid = total - rejected.len();
    let accuracy = if total > 0 {
        valid as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    if rejected.is_empty() {
        info!(
            method = check.name(),
            total, "validated primes in {:.4}s, accuracy {:.2}%",
            elapsed.as_secs_f64(),
            accuracy
        );
    } else {
        warn!(
            method = check.name(),
            total,
            rejected = rejected.len(),
            "oracle accepted composite numbers"
        );
    }

    ValidationReport {
        method: check.name().to_string(),
        total,
        valid,
        rejected,
        accuracy,
        elapsed,
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primality::{is_probably_prime_u64, primes_below};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_agrees_with_sieve() {
        let primes = primes_below(20_000);
        let check = DeterministicCheck;
        for n in 0..20_000u64 {
            let expected = primes.binary_search(&n).is_ok();
            assert_eq!(check.is_prime(&BigUint::from(n)), expected, "n = {n}");
        }
    }

    #[test]
    fn test_u64_range() {
        // Largest prime below 2^64 and a strong pseudoprime to several bases
        assert!(is_prime_u64(18_446_744_073_709_551_557));
        assert!(!is_prime_u64(3_215_031_751));
        assert!(!is_prime_u64(1_000_000_007 * 1_000_000_009));
        assert!(is_prime_u64(1_000_000_007));
    }

    #[test]
    fn test_wide_range() {
        let check = DeterministicCheck;
        let mersenne = (BigUint::from(1u32) << 127u32) - 1u32;
        assert!(check.is_prime(&mersenne));
        assert!(!check.is_prime(&(&mersenne * 3u32)));
        assert!(!check.is_prime(&(BigUint::from(1u32) << 80u32)));
    }

    #[test]
    fn test_agrees_with_oracle_on_large_odd_numbers() {
        let mut rng = StdRng::seed_from_u64(42);
        let check = DeterministicCheck;
        for n in (1_000_001u64..1_003_001).step_by(2) {
            assert_eq!(
                is_probably_prime_u64(n, 8, &mut rng),
                check.is_prime(&BigUint::from(n)),
                "n = {n}"
            );
        }
    }

    #[test]
    fn test_validate_primes_reports_rejections() {
        let numbers: Vec<BigUint> = [7u32, 11, 15, 13].into_iter().map(BigUint::from).collect();
        let report = validate_primes(&numbers, &DeterministicCheck);
        assert_eq!(report.total, 4);
        assert_eq!(report.valid, 3);
        assert_eq!(report.rejected, vec![BigUint::from(15u32)]);
        assert_eq!(report.accuracy, 75.0);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_validate_empty_batch() {
        let report = validate_primes(&[], &DeterministicCheck);
        assert_eq!(report.accuracy, 0.0);
        assert!(report.is_clean());
    }
}
