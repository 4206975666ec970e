// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Exact rational time.
//!
//! Cycle positions are kept as reduced fractions so that arbitrarily nested
//! subdivision never accumulates floating point error.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::span::TimeSpan;

/// Error returned when a string cannot be parsed as a rational.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseRationalError {
    #[error("empty rational")]
    Empty,

    #[error("invalid rational '{0}'")]
    Invalid(String),

    #[error("zero denominator in '{0}'")]
    ZeroDenominator(String),

    #[error("rational '{0}' does not fit in 64 bits")]
    Overflow(String),
}

/// A point in cyclic time, stored as a reduced fraction with a positive denominator.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    numer: i64,
    denom: i64,
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Reduces a wide fraction. Returns None if the reduced parts do not fit in an i64.
fn reduce(numer: i128, denom: i128) -> Option<Rational> {
    if denom == 0 {
        return None;
    }
    let divisor = gcd(numer, denom).max(1);
    let sign = denom.signum();
    let numer = numer / divisor * sign;
    let denom = denom.abs() / divisor;
    Some(Rational {
        numer: i64::try_from(numer).ok()?,
        denom: i64::try_from(denom).ok()?,
    })
}

/// Reduces the result of an arithmetic operation. Overflow past 64 bits is treated
/// like integer overflow: a programming error.
fn narrow(numer: i128, denom: i128) -> Rational {
    match reduce(numer, denom) {
        Some(value) => value,
        None if denom == 0 => panic!("rational division by zero"),
        None => panic!("rational arithmetic overflowed 64 bits ({numer}/{denom})"),
    }
}

impl Rational {
    /// The start of the first cycle.
    pub const ZERO: Rational = Rational { numer: 0, denom: 1 };

    /// One full cycle.
    pub const ONE: Rational = Rational { numer: 1, denom: 1 };

    /// Creates a new rational, reducing it to lowest terms.
    ///
    /// Panics if `denom` is zero.
    pub fn new(numer: i64, denom: i64) -> Rational {
        narrow(numer as i128, denom as i128)
    }

    /// Creates a rational from a whole number of cycles.
    pub const fn from_integer(value: i64) -> Rational {
        Rational {
            numer: value,
            denom: 1,
        }
    }

    /// Returns the numerator (carries the sign).
    pub fn numer(&self) -> i64 {
        self.numer
    }

    /// Returns the denominator (always positive).
    pub fn denom(&self) -> i64 {
        self.denom
    }

    pub fn is_zero(&self) -> bool {
        self.numer == 0
    }

    /// Largest whole number less than or equal to this value.
    pub fn floor(&self) -> Rational {
        Rational::from_integer(self.numer.div_euclid(self.denom))
    }

    /// Smallest whole number greater than or equal to this value.
    pub fn ceil(&self) -> Rational {
        let floor = self.numer.div_euclid(self.denom);
        if self.numer.rem_euclid(self.denom) == 0 {
            Rational::from_integer(floor)
        } else {
            Rational::from_integer(floor + 1)
        }
    }

    /// The start of the cycle containing this time.
    pub fn sam(&self) -> Rational {
        self.floor()
    }

    /// The start of the cycle after the one containing this time.
    pub fn next_sam(&self) -> Rational {
        self.sam() + Rational::ONE
    }

    /// Position within the containing cycle, in `[0, 1)`.
    pub fn cycle_pos(&self) -> Rational {
        *self - self.sam()
    }

    /// The whole cycle containing this time.
    pub fn whole_cycle(&self) -> TimeSpan {
        TimeSpan::new(self.sam(), self.next_sam())
    }

    /// Returns `other` if this value is zero, otherwise self.
    pub fn or(self, other: Rational) -> Rational {
        if self.is_zero() {
            other
        } else {
            self
        }
    }

    /// Renders the value as `numerator/denominator`, sign on the numerator.
    pub fn show(&self) -> String {
        format!("{}/{}", self.numer, self.denom)
    }

    /// Lossy conversion for handing times to the audio clock.
    pub fn to_f64(&self) -> f64 {
        self.numer as f64 / self.denom as f64
    }

    /// Parses a decimal such as `-0.125` exactly.
    fn parse_decimal(input: &str) -> Result<Rational, ParseRationalError> {
        let (negative, digits) = match input.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, input.strip_prefix('+').unwrap_or(input)),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(ParseRationalError::Invalid(input.to_string()));
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(ParseRationalError::Invalid(input.to_string()));
        }

        let overflow = || ParseRationalError::Overflow(input.to_string());
        let scale = 10i128
            .checked_pow(fraction.len() as u32)
            .ok_or_else(overflow)?;
        let mut numer: i128 = 0;
        for c in whole.chars().chain(fraction.chars()) {
            numer = numer
                .checked_mul(10)
                .and_then(|n| n.checked_add(c as i128 - '0' as i128))
                .ok_or_else(overflow)?;
        }
        if negative {
            numer = -numer;
        }
        reduce(numer, scale).ok_or_else(overflow)
    }
}

impl Default for Rational {
    fn default() -> Self {
        Rational::ZERO
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Rational::from_integer(value)
    }
}

impl FromStr for Rational {
    type Err = ParseRationalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseRationalError::Empty);
        }

        match s.split_once('/') {
            Some((numer, denom)) => {
                let numer: i64 = numer
                    .trim()
                    .parse()
                    .map_err(|_| ParseRationalError::Invalid(s.to_string()))?;
                let denom: i64 = denom
                    .trim()
                    .parse()
                    .map_err(|_| ParseRationalError::Invalid(s.to_string()))?;
                if denom == 0 {
                    return Err(ParseRationalError::ZeroDenominator(s.to_string()));
                }
                reduce(numer as i128, denom as i128)
                    .ok_or_else(|| ParseRationalError::Overflow(s.to_string()))
            }
            None => Rational::parse_decimal(s),
        }
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.numer as i128 * other.denom as i128;
        let rhs = other.numer as i128 * self.denom as i128;
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for Rational {
    type Output = Rational;

    fn add(self, rhs: Rational) -> Rational {
        narrow(
            self.numer as i128 * rhs.denom as i128 + rhs.numer as i128 * self.denom as i128,
            self.denom as i128 * rhs.denom as i128,
        )
    }
}

impl Sub for Rational {
    type Output = Rational;

    fn sub(self, rhs: Rational) -> Rational {
        narrow(
            self.numer as i128 * rhs.denom as i128 - rhs.numer as i128 * self.denom as i128,
            self.denom as i128 * rhs.denom as i128,
        )
    }
}

impl Mul for Rational {
    type Output = Rational;

    fn mul(self, rhs: Rational) -> Rational {
        narrow(
            self.numer as i128 * rhs.numer as i128,
            self.denom as i128 * rhs.denom as i128,
        )
    }
}

impl Div for Rational {
    type Output = Rational;

    /// Panics when dividing by zero.
    fn div(self, rhs: Rational) -> Rational {
        narrow(
            self.numer as i128 * rhs.denom as i128,
            self.denom as i128 * rhs.numer as i128,
        )
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        Rational {
            numer: -self.numer,
            denom: self.denom,
        }
    }
}

impl AddAssign for Rational {
    fn add_assign(&mut self, rhs: Rational) {
        *self = *self + rhs;
    }
}

impl SubAssign for Rational {
    fn sub_assign(&mut self, rhs: Rational) {
        *self = *self - rhs;
    }
}

impl Sum for Rational {
    fn sum<I: Iterator<Item = Rational>>(iter: I) -> Rational {
        iter.fold(Rational::ZERO, |acc, value| acc + value)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rational({}/{})", self.numer, self.denom)
    }
}

impl Serialize for Rational {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Wire forms accepted for a rational: `3`, `0.25` or `"1/3"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RationalRepr {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Rational {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RationalRepr::deserialize(deserializer)? {
            RationalRepr::Integer(value) => Ok(Rational::from_integer(value)),
            // Go through the shortest decimal representation so 0.1 stays 1/10.
            RationalRepr::Float(value) => value.to_string().parse().map_err(serde::de::Error::custom),
            RationalRepr::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(n, d)
    }

    #[test]
    fn test_reduces_to_lowest_terms() {
        let value = r(6, -8);
        assert_eq!(value.numer(), -3);
        assert_eq!(value.denom(), 4);
        assert_eq!(r(0, 5), Rational::ZERO);
        assert_eq!(r(4, 2), Rational::from_integer(2));
    }

    #[test]
    fn test_ordering_is_exact() {
        assert!(r(1, 3) < r(34, 100));
        assert!(r(-1, 2) < r(-1, 3));
        assert_eq!(r(2, 6).cmp(&r(1, 3)), Ordering::Equal);
        assert_eq!(r(1, 3).max(r(1, 4)), r(1, 3));
        assert_eq!(r(1, 3).min(r(1, 4)), r(1, 4));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(r(1, 3) + r(1, 6), r(1, 2));
        assert_eq!(r(1, 3) - r(1, 2), r(-1, 6));
        assert_eq!(r(2, 3) * r(3, 4), r(1, 2));
        assert_eq!(r(1, 2) / r(1, 4), Rational::from_integer(2));
        assert_eq!(-r(1, 2), r(-1, 2));
        let total: Rational = (0..3).map(|_| r(1, 3)).sum();
        assert_eq!(total, Rational::ONE);
    }

    #[test]
    fn test_repeated_subdivision_does_not_drift() {
        let mut t = Rational::ZERO;
        for _ in 0..7 * 11 * 13 {
            t += r(1, 7 * 11 * 13);
        }
        assert_eq!(t, Rational::ONE);
    }

    #[test]
    #[should_panic]
    fn test_division_by_zero_panics() {
        let _ = r(1, 2) / Rational::ZERO;
    }

    #[test]
    fn test_sam_and_cycle_pos() {
        assert_eq!(r(7, 4).sam(), Rational::ONE);
        assert_eq!(r(7, 4).next_sam(), Rational::from_integer(2));
        assert_eq!(r(7, 4).cycle_pos(), r(3, 4));
        assert_eq!(r(-1, 4).sam(), Rational::from_integer(-1));
        assert_eq!(r(-1, 4).cycle_pos(), r(3, 4));
        assert_eq!(Rational::from_integer(3).cycle_pos(), Rational::ZERO);
        assert_eq!(r(5, 2).ceil(), Rational::from_integer(3));
        assert_eq!(Rational::from_integer(2).ceil(), Rational::from_integer(2));
    }

    #[test]
    fn test_cycle_pos_invariants_hold_across_range() {
        for numer in -40..=40 {
            for denom in 1..=12 {
                let t = r(numer, denom);
                let pos = t.cycle_pos();
                assert!(pos >= Rational::ZERO && pos < Rational::ONE, "{t}");
                assert_eq!(t.sam() + pos, t);
            }
        }
    }

    #[test]
    fn test_whole_cycle() {
        let cycle = r(5, 3).whole_cycle();
        assert_eq!(cycle.begin, Rational::ONE);
        assert_eq!(cycle.end, Rational::from_integer(2));
    }

    #[test]
    fn test_show() {
        assert_eq!(r(1, 2).show(), "1/2");
        assert_eq!(r(-3, 6).show(), "-1/2");
        assert_eq!(Rational::ZERO.show(), "0/1");
        assert_eq!(format!("{}", r(3, 1)), "3/1");
    }

    #[test]
    fn test_or() {
        assert_eq!(Rational::ZERO.or(r(1, 2)), r(1, 2));
        assert_eq!(r(1, 3).or(r(1, 2)), r(1, 3));
    }

    #[test]
    fn test_parse() {
        assert_eq!("1/3".parse::<Rational>(), Ok(r(1, 3)));
        assert_eq!(" -2/4 ".parse::<Rational>(), Ok(r(-1, 2)));
        assert_eq!("3".parse::<Rational>(), Ok(Rational::from_integer(3)));
        assert_eq!("0.25".parse::<Rational>(), Ok(r(1, 4)));
        assert_eq!("-1.5".parse::<Rational>(), Ok(r(-3, 2)));
        assert_eq!(".5".parse::<Rational>(), Ok(r(1, 2)));
        assert_eq!("".parse::<Rational>(), Err(ParseRationalError::Empty));
        assert!(matches!(
            "1/0".parse::<Rational>(),
            Err(ParseRationalError::ZeroDenominator(_))
        ));
        assert!(matches!(
            "abc".parse::<Rational>(),
            Err(ParseRationalError::Invalid(_))
        ));
    }

    #[test]
    fn test_serde() {
        let value: Rational = serde_json::from_str("\"3/4\"").unwrap();
        assert_eq!(value, r(3, 4));
        let value: Rational = serde_json::from_str("0.1").unwrap();
        assert_eq!(value, r(1, 10));
        let value: Rational = serde_json::from_str("2").unwrap();
        assert_eq!(value, Rational::from_integer(2));
        assert_eq!(serde_json::to_string(&r(-1, 3)).unwrap(), "\"-1/3\"");
    }
}
