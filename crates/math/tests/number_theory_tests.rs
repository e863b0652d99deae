//! Property and scenario tests for the primality oracle and the factorizer

use num_bigint::BigUint;
use num_traits::One;
use primebench_math::{
    DeterministicCheck, Factorizer, PrimalityCheck, generate_odd_candidate, is_probably_prime,
    is_probably_prime_u64, primes_below,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

#[test]
fn test_every_prime_below_one_million_is_accepted() {
    let mut rng = StdRng::seed_from_u64(1);
    let primes = primes_below(1_000_000);
    for rounds in [1, 2, 5] {
        for &p in &primes {
            assert!(
                is_probably_prime_u64(p, rounds, &mut rng),
                "{p} rejected with {rounds} rounds"
            );
        }
    }
}

#[test]
fn test_composites_with_small_factors_are_rejected() {
    let mut rng = StdRng::seed_from_u64(2);
    let small_primes = primes_below(10_000);
    let rounds = 4;
    let mut trials = 0u32;
    let mut false_positives = 0u32;

    for (i, &f) in small_primes.iter().enumerate().skip(1) {
        // Odd cofactors so that the even short-circuit does not do the work
        let cofactor = small_primes[(i * 7) % small_primes.len()].max(3);
        let composite = f * cofactor;
        for _ in 0..4 {
            trials += 1;
            if is_probably_prime_u64(composite, rounds, &mut rng) {
                false_positives += 1;
            }
        }
    }

    // Bound is 4^-4 per trial; allow generous slack above the expectation
    let bound = f64::from(trials) * 0.25f64.powi(rounds as i32) * 4.0;
    assert!(
        f64::from(false_positives) <= bound.max(1.0),
        "{false_positives} false positives in {trials} trials"
    );
}

#[test]
fn test_small_scenarios() {
    let mut rng = StdRng::seed_from_u64(3);
    assert!(!is_probably_prime_u64(1, 5, &mut rng));
    assert!(!is_probably_prime_u64(0, 5, &mut rng));
    assert!(is_probably_prime_u64(2, 5, &mut rng));
}

#[test]
fn test_factor_product_of_two_large_primes() {
    let mut rng = StdRng::seed_from_u64(4);
    let p = BigUint::from(1_000_000_007u64);
    let q = BigUint::from(1_000_000_009u64);
    let n = &p * &q;

    let result = Factorizer::default().factor(&n, &mut rng);

    assert!(result.is_complete());
    assert_eq!(result.factors, vec![p, q]);
    assert_eq!(result.product(), n);
}

#[test]
fn test_factor_one_hundred() {
    let mut rng = StdRng::seed_from_u64(5);
    let result = Factorizer::default().factor(&BigUint::from(100u32), &mut rng);
    let expected: Vec<BigUint> = [2u32, 2, 5, 5].into_iter().map(BigUint::from).collect();
    assert!(result.is_complete());
    assert_eq!(result.factors, expected);
}

#[test]
fn test_every_small_number_factors_completely() {
    let mut rng = StdRng::seed_from_u64(7);
    let factorizer = Factorizer::default();

    for n in 2u64..100_000 {
        let number = BigUint::from(n);
        let result = factorizer.factor(&number, &mut rng);
        assert!(result.is_complete(), "{n} inconclusive: {:?}", result.status);
        assert_eq!(result.product(), number);
        assert!(
            result.factors.iter().all(|f| DeterministicCheck.is_prime(f)),
            "{n} has a composite factor"
        );
    }
}

#[test]
fn test_squares_of_small_primes_factor_completely() {
    for (seed, p) in [5u64, 13, 41, 1009, 65_537].into_iter().enumerate() {
        let mut rng = StdRng::seed_from_u64(seed as u64);
        let result = Factorizer::default().factor(&BigUint::from(p * p), &mut rng);
        assert!(result.is_complete(), "{p}^2 inconclusive");
        assert_eq!(result.factors, vec![BigUint::from(p), BigUint::from(p)]);
    }
}

#[test]
fn test_generated_candidates_found_prime_pass_validator() {
    let mut rng = StdRng::seed_from_u64(6);
    let mut found = 0;
    for _ in 0..2_000 {
        let candidate = generate_odd_candidate(48, &mut rng);
        if is_probably_prime(&candidate, 5, &mut rng) {
            assert!(DeterministicCheck.is_prime(&candidate), "{candidate}");
            found += 1;
        }
    }
    assert!(found > 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_factorization_round_trips(n in 2u64..5_000_000, seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let number = BigUint::from(n);
        let result = Factorizer::default().factor(&number, &mut rng);

        prop_assert_eq!(result.product(), number);
        prop_assert!(result.is_complete(), "{} inconclusive: {:?}", n, result.status);
        for factor in &result.factors {
            prop_assert!(is_probably_prime(factor, 5, &mut rng));
            prop_assert!(DeterministicCheck.is_prime(factor));
        }
    }

    #[test]
    fn prop_product_of_factors_is_never_lost(a in 2u32..100_000, b in 2u32..100_000, seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let number = BigUint::from(a) * BigUint::from(b);
        let result = Factorizer::new(1, 3).factor(&number, &mut rng);
        prop_assert_eq!(result.product(), number);
        prop_assert!(result.factors.iter().all(|f| f > &BigUint::one()));
    }
}
