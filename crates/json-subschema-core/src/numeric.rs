//! Numeric constraint reasoning over exact rationals.
//!
//! An Integer/Number atom's constraints are `(interval, multipleOf,
//! integrality)`. All arithmetic is exact: JSON decimals are read back
//! through their shortest decimal rendering rather than raw binary
//! doubles, so `multipleOf: 0.1` divides `0.2` the way the schema author
//! meant.

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed};

/// One endpoint of a numeric interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bound {
    Unbounded,
    Inclusive(BigRational),
    Exclusive(BigRational),
}

impl Bound {
    fn value(&self) -> Option<&BigRational> {
        match self {
            Bound::Unbounded => None,
            Bound::Inclusive(v) | Bound::Exclusive(v) => Some(v),
        }
    }
}

/// Constraints of a single Integer/Number atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NumericShape {
    pub min: Bound,
    pub max: Bound,
    /// Positive rational, when present.
    pub multiple_of: Option<BigRational>,
    /// `true` for Integer atoms.
    pub integral: bool,
}

impl NumericShape {
    pub fn unconstrained(integral: bool) -> Self {
        NumericShape {
            min: Bound::Unbounded,
            max: Bound::Unbounded,
            multiple_of: None,
            integral,
        }
    }

    /// Tighten bounds for integral atoms so interval comparisons against
    /// fractional endpoints are exact (`> 0.5` becomes `>= 1`).
    pub fn normalized(mut self) -> Self {
        if !self.integral {
            return self;
        }
        self.min = match self.min {
            Bound::Inclusive(v) if !v.is_integer() => Bound::Inclusive(v.ceil()),
            Bound::Exclusive(v) => {
                if v.is_integer() {
                    Bound::Inclusive(v + BigRational::one())
                } else {
                    Bound::Inclusive(v.ceil())
                }
            }
            other => other,
        };
        self.max = match self.max {
            Bound::Inclusive(v) if !v.is_integer() => Bound::Inclusive(v.floor()),
            Bound::Exclusive(v) => {
                if v.is_integer() {
                    Bound::Inclusive(v - BigRational::one())
                } else {
                    Bound::Inclusive(v.floor())
                }
            }
            other => other,
        };
        self
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The admissible values form a lattice of multiples when integrality
    /// or `multipleOf` applies: integers that are multiples of `p/q`
    /// (reduced) are exactly the multiples of `p`.
    fn step(&self) -> Option<BigRational> {
        match (&self.multiple_of, self.integral) {
            (Some(m), true) => Some(BigRational::from(m.numer().clone())),
            (Some(m), false) => Some(m.clone()),
            (None, true) => Some(BigRational::one()),
            (None, false) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        if let (Some(lo), Some(hi)) = (self.min.value(), self.max.value()) {
            if lo > hi {
                return true;
            }
            if lo == hi
                && (matches!(self.min, Bound::Exclusive(_))
                    || matches!(self.max, Bound::Exclusive(_)))
            {
                return true;
            }
        }
        // With a step lattice, the interval must contain a multiple.
        if let Some(step) = self.step() {
            if let (Some(_), Some(_)) = (self.min.value(), self.max.value()) {
                let t_min = match &self.min {
                    Bound::Inclusive(a) => (a / &step).ceil().to_integer(),
                    Bound::Exclusive(a) => (a / &step).floor().to_integer() + 1,
                    Bound::Unbounded => unreachable!("both endpoints bounded"),
                };
                let t_max = match &self.max {
                    Bound::Inclusive(b) => (b / &step).floor().to_integer(),
                    Bound::Exclusive(b) => (b / &step).ceil().to_integer() - 1,
                    Bound::Unbounded => unreachable!("both endpoints bounded"),
                };
                return t_min > t_max;
            }
        }
        false
    }

    pub fn contains(&self, v: &BigRational) -> bool {
        let lower_ok = match &self.min {
            Bound::Unbounded => true,
            Bound::Inclusive(a) => v >= a,
            Bound::Exclusive(a) => v > a,
        };
        let upper_ok = match &self.max {
            Bound::Unbounded => true,
            Bound::Inclusive(b) => v <= b,
            Bound::Exclusive(b) => v < b,
        };
        let integral_ok = !self.integral || v.is_integer();
        let multiple_ok = self
            .multiple_of
            .as_ref()
            .map_or(true, |m| (v / m).is_integer());
        lower_ok && upper_ok && integral_ok && multiple_ok
    }

    /// `self <: other`: interval nesting, `m_other | m_self`, and
    /// integrality implication.
    pub fn is_subset(&self, other: &NumericShape) -> bool {
        if !lower_within(&other.min, &self.min) || !upper_within(&other.max, &self.max) {
            return false;
        }
        // Every multiple the other demands must divide what we guarantee.
        // An integral side implicitly guarantees multiples of 1.
        if let Some(m_other) = &other.multiple_of {
            let guaranteed = match (&self.multiple_of, self.integral) {
                (Some(m), true) => BigRational::from(m.numer().clone()),
                (Some(m), false) => m.clone(),
                (None, true) => BigRational::one(),
                (None, false) => return false,
            };
            if !(guaranteed / m_other).is_integer() {
                return false;
            }
        }
        if other.integral && !self.effectively_integral() {
            return false;
        }
        true
    }

    /// Integral either explicitly or because every multiple of
    /// `multiple_of` is an integer.
    fn effectively_integral(&self) -> bool {
        self.integral
            || self
                .multiple_of
                .as_ref()
                .is_some_and(|m| m.is_integer())
    }

    // -----------------------------------------------------------------------
    // Lattice operations
    // -----------------------------------------------------------------------

    pub fn intersect(&self, other: &NumericShape) -> NumericShape {
        NumericShape {
            min: tighter_lower(&self.min, &other.min),
            max: tighter_upper(&self.max, &other.max),
            multiple_of: match (&self.multiple_of, &other.multiple_of) {
                (Some(a), Some(b)) => Some(rational_lcm(a, b)),
                (Some(a), None) => Some(a.clone()),
                (None, Some(b)) => Some(b.clone()),
                (None, None) => None,
            },
            integral: self.integral || other.integral,
        }
        .normalized()
    }

    /// Enumerate the admissible values of a finitely-enumerable shape:
    /// a bounded step lattice (integral or `multipleOf`) or a point
    /// interval. Stops after `limit + 1` values so callers can compare
    /// against a finite set without walking huge lattices. `None` when the
    /// admissible set is not enumerable this way.
    pub fn enumerate(&self, limit: usize) -> Option<Vec<BigRational>> {
        if let (Bound::Inclusive(lo), Bound::Inclusive(hi)) = (&self.min, &self.max) {
            if lo == hi {
                return Some(if self.contains(lo) {
                    vec![lo.clone()]
                } else {
                    Vec::new()
                });
            }
        }
        let step = self.step()?;
        let (Some(_), Some(_)) = (self.min.value(), self.max.value()) else {
            return None;
        };
        let t_min = match &self.min {
            Bound::Inclusive(a) => (a / &step).ceil().to_integer(),
            Bound::Exclusive(a) => (a / &step).floor().to_integer() + 1,
            Bound::Unbounded => unreachable!("both endpoints bounded"),
        };
        let t_max = match &self.max {
            Bound::Inclusive(b) => (b / &step).floor().to_integer(),
            Bound::Exclusive(b) => (b / &step).ceil().to_integer() - 1,
            Bound::Unbounded => unreachable!("both endpoints bounded"),
        };
        let mut out = Vec::new();
        let mut t = t_min;
        while t <= t_max {
            out.push(BigRational::from(t.clone()) * &step);
            if out.len() > limit {
                break;
            }
            t = t + BigInt::from(1);
        }
        Some(out)
    }

    /// Exact join when one side absorbs the other or the constraints agree
    /// and the intervals touch. `None` means the disjunction must be kept.
    pub fn try_join(&self, other: &NumericShape) -> Option<NumericShape> {
        if self.is_subset(other) {
            return Some(other.clone());
        }
        if other.is_subset(self) {
            return Some(self.clone());
        }
        if self.multiple_of == other.multiple_of
            && self.integral == other.integral
            && intervals_touch(self, other)
        {
            return Some(NumericShape {
                min: looser_lower(&self.min, &other.min),
                max: looser_upper(&self.max, &other.max),
                multiple_of: self.multiple_of.clone(),
                integral: self.integral,
            });
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Bound comparisons
// ---------------------------------------------------------------------------

/// Does the `outer` lower bound admit everything the `inner` lower bound
/// admits (outer ≤ inner as constraints)?
fn lower_within(outer: &Bound, inner: &Bound) -> bool {
    match (outer, inner) {
        (Bound::Unbounded, _) => true,
        (_, Bound::Unbounded) => false,
        (Bound::Inclusive(a), Bound::Inclusive(b) | Bound::Exclusive(b)) => b >= a,
        (Bound::Exclusive(a), Bound::Inclusive(b)) => b > a,
        (Bound::Exclusive(a), Bound::Exclusive(b)) => b >= a,
    }
}

fn upper_within(outer: &Bound, inner: &Bound) -> bool {
    match (outer, inner) {
        (Bound::Unbounded, _) => true,
        (_, Bound::Unbounded) => false,
        (Bound::Inclusive(a), Bound::Inclusive(b) | Bound::Exclusive(b)) => b <= a,
        (Bound::Exclusive(a), Bound::Inclusive(b)) => b < a,
        (Bound::Exclusive(a), Bound::Exclusive(b)) => b <= a,
    }
}

fn tighter_lower(a: &Bound, b: &Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        _ => {
            let (av, bv) = (a.value().expect("bounded"), b.value().expect("bounded"));
            if av > bv {
                a.clone()
            } else if bv > av {
                b.clone()
            } else if matches!(a, Bound::Exclusive(_)) {
                a.clone()
            } else {
                b.clone()
            }
        }
    }
}

fn tighter_upper(a: &Bound, b: &Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        _ => {
            let (av, bv) = (a.value().expect("bounded"), b.value().expect("bounded"));
            if av < bv {
                a.clone()
            } else if bv < av {
                b.clone()
            } else if matches!(a, Bound::Exclusive(_)) {
                a.clone()
            } else {
                b.clone()
            }
        }
    }
}

fn looser_lower(a: &Bound, b: &Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => Bound::Unbounded,
        _ => {
            let (av, bv) = (a.value().expect("bounded"), b.value().expect("bounded"));
            if av < bv {
                a.clone()
            } else if bv < av {
                b.clone()
            } else if matches!(a, Bound::Inclusive(_)) {
                a.clone()
            } else {
                b.clone()
            }
        }
    }
}

fn looser_upper(a: &Bound, b: &Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => Bound::Unbounded,
        _ => {
            let (av, bv) = (a.value().expect("bounded"), b.value().expect("bounded"));
            if av > bv {
                a.clone()
            } else if bv > av {
                b.clone()
            } else if matches!(a, Bound::Inclusive(_)) {
                a.clone()
            } else {
                b.clone()
            }
        }
    }
}

/// Do the two intervals overlap or sit flush (no gap between them)?
fn intervals_touch(a: &NumericShape, b: &NumericShape) -> bool {
    no_gap_between(&a.max, &b.min) && no_gap_between(&b.max, &a.min)
}

/// No gap between an upper bound and the other interval's lower bound.
fn no_gap_between(upper: &Bound, lower: &Bound) -> bool {
    match (upper, lower) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
        (Bound::Inclusive(u), Bound::Inclusive(l)) => l <= u,
        // One open endpoint still joins flush: `[1,5) ∪ [5,9]` covers 5.
        (Bound::Exclusive(u), Bound::Inclusive(l)) | (Bound::Inclusive(u), Bound::Exclusive(l)) => {
            l <= u
        }
        // Two open endpoints at the same value leave a hole.
        (Bound::Exclusive(u), Bound::Exclusive(l)) => l < u,
    }
}

// ---------------------------------------------------------------------------
// Rational helpers
// ---------------------------------------------------------------------------

/// `lcm(a/b, c/d) = lcm(a, c) / gcd(b, d)` for reduced fractions.
fn rational_lcm(x: &BigRational, y: &BigRational) -> BigRational {
    let numer = x.numer().lcm(y.numer());
    let denom = x.denom().gcd(y.denom());
    BigRational::new(numer, denom)
}

/// Exact rational for a JSON number.
///
/// Integers convert directly. Doubles are re-read through their shortest
/// round-trip decimal rendering: the author who wrote `0.1` meant one
/// tenth, not the nearest binary double.
pub fn rational_from_number(n: &serde_json::Number) -> Option<BigRational> {
    if let Some(i) = n.as_i64() {
        return Some(BigRational::from(BigInt::from(i)));
    }
    if let Some(u) = n.as_u64() {
        return Some(BigRational::from(BigInt::from(u)));
    }
    let f = n.as_f64()?;
    if !f.is_finite() {
        return None;
    }
    rational_from_decimal(&format!("{}", f))
}

/// Parse a decimal string (optionally with exponent) into a rational.
fn rational_from_decimal(text: &str) -> Option<BigRational> {
    let (mantissa, exp) = match text.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i64>().ok()?),
        None => (text, 0),
    };
    let (sign, digits) = match mantissa.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, mantissa),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    let all_digits = format!("{}{}", int_part, frac_part);
    let numer: BigInt = all_digits.parse().ok()?;
    let scale = frac_part.len() as i64 - exp;

    let ten = BigInt::from(10);
    let value = if scale >= 0 {
        BigRational::new(numer, ten.pow(scale as u32))
    } else {
        BigRational::from(numer * ten.pow((-scale) as u32))
    };
    Some(if sign < 0 { -value } else { value })
}

/// Render a rational back to a JSON number (exact when the denominator is
/// a power of ten times a power of two; best-effort double otherwise).
pub fn number_from_rational(r: &BigRational) -> serde_json::Number {
    use num_traits::ToPrimitive;
    if r.is_integer() {
        let int = r.to_integer();
        if let Some(i) = int.to_i64() {
            return serde_json::Number::from(i);
        }
    }
    let approx = r.to_f64().unwrap_or(if r.is_negative() {
        f64::MIN
    } else {
        f64::MAX
    });
    serde_json::Number::from_f64(approx).unwrap_or_else(|| serde_json::Number::from(0))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(n: i64) -> BigRational {
        BigRational::from(BigInt::from(n))
    }

    fn dec(s: &str) -> BigRational {
        rational_from_decimal(s).unwrap()
    }

    fn shape(min: Option<i64>, max: Option<i64>, integral: bool) -> NumericShape {
        NumericShape {
            min: min.map_or(Bound::Unbounded, |v| Bound::Inclusive(rat(v))),
            max: max.map_or(Bound::Unbounded, |v| Bound::Inclusive(rat(v))),
            multiple_of: None,
            integral,
        }
    }

    #[test]
    fn test_interval_subset() {
        let narrow = shape(Some(0), Some(100), false);
        let wide = shape(Some(-1), Some(101), false);
        assert!(narrow.is_subset(&wide));
        assert!(!wide.is_subset(&narrow));
    }

    #[test]
    fn test_open_endpoints() {
        let open = NumericShape {
            min: Bound::Exclusive(rat(0)),
            max: Bound::Exclusive(rat(10)),
            multiple_of: None,
            integral: false,
        };
        let closed = shape(Some(0), Some(10), false);
        assert!(open.is_subset(&closed));
        assert!(!closed.is_subset(&open));
    }

    #[test]
    fn test_integer_refines_number() {
        let int = shape(Some(0), Some(5), true);
        let num = shape(Some(0), Some(5), false);
        assert!(int.is_subset(&num));
        assert!(!num.is_subset(&int));
    }

    #[test]
    fn test_multiple_of_divisibility() {
        let by_six = NumericShape {
            multiple_of: Some(rat(6)),
            ..NumericShape::unconstrained(false)
        };
        let by_three = NumericShape {
            multiple_of: Some(rat(3)),
            ..NumericShape::unconstrained(false)
        };
        assert!(by_six.is_subset(&by_three));
        assert!(!by_three.is_subset(&by_six));
    }

    #[test]
    fn test_decimal_multiple_of_is_exact() {
        // 0.2 is a multiple of 0.1 in decimal, which binary doubles deny.
        let fifths = NumericShape {
            multiple_of: Some(dec("0.2")),
            ..NumericShape::unconstrained(false)
        };
        let tenths = NumericShape {
            multiple_of: Some(dec("0.1")),
            ..NumericShape::unconstrained(false)
        };
        assert!(fifths.is_subset(&tenths));
        assert!(tenths.contains(&dec("0.3")));
        assert!(!tenths.contains(&dec("0.35")));
    }

    #[test]
    fn test_integral_satisfies_fractional_multiple() {
        // Every integer is a multiple of 0.5.
        let ints = NumericShape::unconstrained(true);
        let halves = NumericShape {
            multiple_of: Some(dec("0.5")),
            ..NumericShape::unconstrained(false)
        };
        assert!(ints.is_subset(&halves));
    }

    #[test]
    fn test_integer_valued_multiple_is_integral() {
        let by_two = NumericShape {
            multiple_of: Some(rat(2)),
            ..NumericShape::unconstrained(false)
        };
        let ints = NumericShape::unconstrained(true);
        assert!(by_two.is_subset(&ints));
    }

    #[test]
    fn test_intersect_takes_lcm() {
        let a = NumericShape {
            multiple_of: Some(rat(4)),
            ..NumericShape::unconstrained(false)
        };
        let b = NumericShape {
            multiple_of: Some(rat(6)),
            ..NumericShape::unconstrained(false)
        };
        let m = a.intersect(&b);
        assert_eq!(m.multiple_of, Some(rat(12)));
    }

    #[test]
    fn test_intersect_bounds() {
        let a = shape(Some(0), Some(10), false);
        let b = shape(Some(5), Some(20), true);
        let m = a.intersect(&b);
        assert_eq!(m.min, Bound::Inclusive(rat(5)));
        assert_eq!(m.max, Bound::Inclusive(rat(10)));
        assert!(m.integral);
    }

    #[test]
    fn test_empty_interval() {
        let e = shape(Some(10), Some(5), false);
        assert!(e.is_empty());

        let point = shape(Some(5), Some(5), false);
        assert!(!point.is_empty());

        let open_point = NumericShape {
            min: Bound::Inclusive(rat(5)),
            max: Bound::Exclusive(rat(5)),
            multiple_of: None,
            integral: false,
        };
        assert!(open_point.is_empty());
    }

    #[test]
    fn test_empty_no_integer_in_interval() {
        // (0.1, 0.9) contains no integer.
        let s = NumericShape {
            min: Bound::Exclusive(dec("0.1")),
            max: Bound::Exclusive(dec("0.9")),
            multiple_of: None,
            integral: true,
        };
        assert!(s.is_empty());

        // (0.1, 1.1) contains 1.
        let t = NumericShape {
            min: Bound::Exclusive(dec("0.1")),
            max: Bound::Exclusive(dec("1.1")),
            multiple_of: None,
            integral: true,
        };
        assert!(!t.is_empty());
    }

    #[test]
    fn test_empty_no_multiple_in_interval() {
        // [7, 11] holds no multiple of 12.
        let s = NumericShape {
            min: Bound::Inclusive(rat(7)),
            max: Bound::Inclusive(rat(11)),
            multiple_of: Some(rat(12)),
            integral: false,
        };
        assert!(s.is_empty());
    }

    #[test]
    fn test_normalized_tightens_integral_bounds() {
        let s = NumericShape {
            min: Bound::Exclusive(dec("0.5")),
            max: Bound::Exclusive(rat(4)),
            multiple_of: None,
            integral: true,
        }
        .normalized();
        assert_eq!(s.min, Bound::Inclusive(rat(1)));
        assert_eq!(s.max, Bound::Inclusive(rat(3)));
    }

    #[test]
    fn test_try_join_contiguous() {
        let a = shape(Some(0), Some(5), false);
        let b = shape(Some(5), Some(10), false);
        let j = a.try_join(&b).expect("flush intervals join");
        assert_eq!(j.min, Bound::Inclusive(rat(0)));
        assert_eq!(j.max, Bound::Inclusive(rat(10)));
    }

    #[test]
    fn test_try_join_disjoint_returns_none() {
        let a = shape(Some(0), Some(1), false);
        let b = shape(Some(5), Some(10), false);
        assert!(a.try_join(&b).is_none());
    }

    #[test]
    fn test_try_join_open_gap_returns_none() {
        let a = NumericShape {
            min: Bound::Inclusive(rat(0)),
            max: Bound::Exclusive(rat(5)),
            multiple_of: None,
            integral: false,
        };
        let b = NumericShape {
            min: Bound::Exclusive(rat(5)),
            max: Bound::Inclusive(rat(10)),
            multiple_of: None,
            integral: false,
        };
        // 5 itself is admitted by neither side.
        assert!(a.try_join(&b).is_none());
    }

    #[test]
    fn test_try_join_absorbing() {
        let small = shape(Some(2), Some(3), true);
        let big = shape(Some(0), Some(10), true);
        assert_eq!(small.try_join(&big), Some(big.clone()));
    }

    #[test]
    fn test_rational_from_number() {
        let n: serde_json::Number = serde_json::from_str("0.1").unwrap();
        assert_eq!(rational_from_number(&n).unwrap(), dec("0.1"));
        let n: serde_json::Number = serde_json::from_str("-3").unwrap();
        assert_eq!(rational_from_number(&n).unwrap(), rat(-3));
        let n: serde_json::Number = serde_json::from_str("1e3").unwrap();
        assert_eq!(rational_from_number(&n).unwrap(), rat(1000));
    }
}
