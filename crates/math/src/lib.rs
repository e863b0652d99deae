//! primebench number theory
//!
//! CPU-bound building blocks shared by every worker:
//! - Miller-Rabin probabilistic primality test
//! - Random odd candidates of an exact bit length
//! - Pollard's Rho factorization with a bounded retry budget
//! - An independent primality check for auditing oracle output
//!
//! Nothing here blocks, performs I/O, or returns errors for well-formed
//! input. Randomness is always passed in by the caller.

pub mod candidate;
pub mod decimal;
pub mod factor;
pub mod primality;
pub mod validator;

pub use candidate::{generate_odd_candidate, random_below, random_bits};
pub use factor::{DEFAULT_MAX_RETRIES, FactorStatus, Factorization, Factorizer};
pub use primality::{DEFAULT_ROUNDS, is_probably_prime, is_probably_prime_u64, primes_below};
pub use validator::{DeterministicCheck, PrimalityCheck, ValidationReport, validate_primes};

pub use num_bigint::BigUint;
