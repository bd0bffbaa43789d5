// src/crypto/modpow.rs
//! Square-and-multiply modular exponentiation.

use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Compute `base^exponent mod modulus`.
///
/// Every exponent bit costs one multiplication and one squaring whether
/// the bit is set or not; there are no early exits. A modulus of 0 or 1
/// yields 0.
pub fn mod_pow(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> BigUint {
    if modulus <= &BigUint::one() {
        return BigUint::zero();
    }

    let mut result = BigUint::one();
    let mut square = base % modulus;

    for i in 0..exponent.bits() {
        let product = (&result * &square) % modulus;
        if exponent.bit(i) {
            result = product;
        }
        square = (&square * &square) % modulus;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;
    use test_case::test_case;

    #[test_case(4, 13, 497, 445)]
    #[test_case(2, 10, 1000, 24)]
    #[test_case(7, 0, 13, 1)]
    #[test_case(0, 5, 13, 0)]
    #[test_case(5, 3, 1, 0)]
    #[test_case(5, 3, 0, 0)]
    fn test_known_values(base: u64, exponent: u64, modulus: u64, expected: u64) {
        let got = mod_pow(
            &BigUint::from(base),
            &BigUint::from(exponent),
            &BigUint::from(modulus),
        );
        assert_eq!(got, BigUint::from(expected));
    }

    #[test]
    fn test_base_larger_than_modulus() {
        let got = mod_pow(&BigUint::from(1_000_003u64), &BigUint::from(3u32), &BigUint::from(97u32));
        assert_eq!(got, BigUint::from(1_000_003u64).modpow(&BigUint::from(3u32), &BigUint::from(97u32)));
    }

    quickcheck! {
        fn prop_matches_library(base: u64, exponent: u32, modulus: u64) -> bool {
            let base = BigUint::from(base);
            let exponent = BigUint::from(exponent);
            let modulus = BigUint::from(modulus);
            let expected = if modulus <= BigUint::one() {
                BigUint::zero()
            } else {
                base.modpow(&exponent, &modulus)
            };
            mod_pow(&base, &exponent, &modulus) == expected
        }
    }
}
