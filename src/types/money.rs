//! Integer money arithmetic.
//!
//! Balances and transaction amounts are stored as whole pence so that
//! repeated accrual never accumulates floating-point drift.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use thiserror::Error;

/// An amount of money in whole pence. Negative values are debits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Pence(pub i64);

/// Error returned when a string cannot be parsed as a money amount.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid amount: {0:?} (expected e.g. \"5\", \"5.25\")")]
pub struct ParsePenceError(pub String);

impl Pence {
    pub const ZERO: Pence = Pence(0);

    /// Parses a decimal pounds amount such as `"5"`, `"5.2"`, or `"5.25"`.
    ///
    /// At most two decimal places are accepted; sub-penny amounts are
    /// rejected rather than rounded.
    pub fn parse(s: &str) -> Result<Self, ParsePenceError> {
        let err = || ParsePenceError(s.to_string());
        let (sign, digits) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };

        let (pounds_str, pence_str) = match digits.split_once('.') {
            Some((p, frac)) => (p, frac),
            None => (digits, ""),
        };

        if pounds_str.is_empty() || !pounds_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        if pence_str.len() > 2 || !pence_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }

        let pounds: i64 = pounds_str.parse().map_err(|_| err())?;
        let pence: i64 = if pence_str.is_empty() {
            0
        } else {
            // "5.2" means 20p, not 2p
            let parsed: i64 = pence_str.parse().map_err(|_| err())?;
            if pence_str.len() == 1 { parsed * 10 } else { parsed }
        };

        let magnitude = pounds
            .checked_mul(100)
            .and_then(|p| p.checked_add(pence))
            .ok_or_else(err)?;
        Ok(Pence(sign * magnitude))
    }

    /// Whether the amount is strictly negative.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Pence {
    /// Formats as pounds with a currency symbol, e.g. `£5.25` or `-£0.50`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}£{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Pence {
    type Output = Pence;
    fn add(self, rhs: Pence) -> Pence {
        Pence(self.0 + rhs.0)
    }
}

impl AddAssign for Pence {
    fn add_assign(&mut self, rhs: Pence) {
        self.0 += rhs.0;
    }
}

impl Sub for Pence {
    type Output = Pence;
    fn sub(self, rhs: Pence) -> Pence {
        Pence(self.0 - rhs.0)
    }
}

impl SubAssign for Pence {
    fn sub_assign(&mut self, rhs: Pence) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for Pence {
    type Output = Pence;
    fn mul(self, rhs: i64) -> Pence {
        Pence(self.0 * rhs)
    }
}

impl Neg for Pence {
    type Output = Pence;
    fn neg(self) -> Pence {
        Pence(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_accepts_common_forms() {
        assert_eq!(Pence::parse("5").unwrap(), Pence(500));
        assert_eq!(Pence::parse("5.25").unwrap(), Pence(525));
        assert_eq!(Pence::parse("5.2").unwrap(), Pence(520));
        assert_eq!(Pence::parse("0.05").unwrap(), Pence(5));
        assert_eq!(Pence::parse("-1.50").unwrap(), Pence(-150));
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in [
            "",
            "-",
            ".",
            "5.",
            "5.255",
            "1,50",
            "five",
            "£5",
            "5 ",
            // Overflows the multiply and the add respectively
            "92233720368547759",
            "92233720368547758.99",
        ] {
            assert!(Pence::parse(bad).is_err(), "should reject {bad:?}");
        }
    }

    #[test]
    fn display_formats_pounds() {
        assert_eq!(Pence(525).to_string(), "£5.25");
        assert_eq!(Pence(5).to_string(), "£0.05");
        assert_eq!(Pence(-150).to_string(), "-£1.50");
        assert_eq!(Pence::ZERO.to_string(), "£0.00");
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(n in -1_000_000i64..1_000_000) {
            let amount = Pence(n);
            let shown = amount.to_string();
            let reparsed = Pence::parse(shown.trim_start_matches('-').trim_start_matches('£')).unwrap();
            let reparsed = if n < 0 { -reparsed } else { reparsed };
            prop_assert_eq!(reparsed, amount);
        }

        #[test]
        fn multiplication_matches_repeated_addition(n in 0i64..10_000, k in 0i64..50) {
            let base = Pence(n);
            let mut total = Pence::ZERO;
            for _ in 0..k {
                total += base;
            }
            prop_assert_eq!(base * k, total);
        }
    }
}
