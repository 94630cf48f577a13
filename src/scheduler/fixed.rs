/*
 * 17.14 Fixed-Point Arithmetic
 *
 * The MLFQS statistics (load average, recent CPU) are fractional values,
 * but the kernel does not use floating point: the FPU is not saved on
 * kernel context switches. Instead, values are i32s scaled by 2^14: the
 * top 17 bits and sign carry the integer part, the low 14 bits the
 * fraction.
 */

/// Number of fraction bits.
const F_SHIFT: u32 = 14;
/// The scale factor, 2^14.
const F: i64 = 1 << F_SHIFT;

/// A signed 17.14 fixed-point number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);

    pub const fn from_int(n: i32) -> Fixed {
        Fixed(n * F as i32)
    }

    /// Truncate toward zero.
    pub const fn to_int(self) -> i32 {
        self.0 / F as i32
    }

    /// Round to the nearest integer.
    pub const fn to_int_round(self) -> i32 {
        if self.0 >= 0 {
            (self.0 + F as i32 / 2) / F as i32
        } else {
            (self.0 - F as i32 / 2) / F as i32
        }
    }

    pub const fn add(self, other: Fixed) -> Fixed {
        Fixed(self.0 + other.0)
    }

    pub const fn sub(self, other: Fixed) -> Fixed {
        Fixed(self.0 - other.0)
    }

    pub const fn add_int(self, n: i32) -> Fixed {
        Fixed(self.0 + n * F as i32)
    }

    pub const fn sub_int(self, n: i32) -> Fixed {
        Fixed(self.0 - n * F as i32)
    }

    /// Multiply two fixed-point values. Widens to 64 bits internally so the
    /// intermediate product cannot overflow.
    pub const fn mul(self, other: Fixed) -> Fixed {
        Fixed((self.0 as i64 * other.0 as i64 / F) as i32)
    }

    pub const fn mul_int(self, n: i32) -> Fixed {
        Fixed(self.0 * n)
    }

    /// Divide two fixed-point values, widening like `mul`.
    pub const fn div(self, other: Fixed) -> Fixed {
        Fixed((self.0 as i64 * F / other.0 as i64) as i32)
    }

    pub const fn div_int(self, n: i32) -> Fixed {
        Fixed(self.0 / n)
    }

    /// The fraction n/d as a fixed-point value.
    pub const fn ratio(n: i32, d: i32) -> Fixed {
        Fixed((n as i64 * F / d as i64) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trip() {
        assert_eq!(Fixed::from_int(5).to_int(), 5);
        assert_eq!(Fixed::from_int(-7).to_int(), -7);
        assert_eq!(Fixed::ZERO.to_int(), 0);
    }

    #[test]
    fn rounding() {
        // 3/2 rounds away from zero in both directions.
        assert_eq!(Fixed::ratio(3, 2).to_int_round(), 2);
        assert_eq!(Fixed::ratio(-3, 2).to_int_round(), -2);
        assert_eq!(Fixed::ratio(3, 2).to_int(), 1);
        assert_eq!(Fixed::ratio(1, 3).to_int_round(), 0);
    }

    #[test]
    fn arithmetic() {
        let a = Fixed::from_int(6);
        let b = Fixed::from_int(4);
        assert_eq!(a.add(b).to_int(), 10);
        assert_eq!(a.sub(b).to_int(), 2);
        assert_eq!(a.mul(b).to_int(), 24);
        assert_eq!(a.div(b).to_int_round(), 2);
        assert_eq!(a.add_int(1).to_int(), 7);
        assert_eq!(a.sub_int(1).to_int(), 5);
        assert_eq!(a.mul_int(3).to_int(), 18);
        assert_eq!(a.div_int(2).to_int(), 3);
    }

    #[test]
    fn decay_coefficient_stays_below_one() {
        // 2L/(2L+1) < 1 for any positive load average; recent_cpu decays.
        for load in 1..100 {
            let l = Fixed::from_int(load);
            let coeff = l.mul_int(2).div(l.mul_int(2).add_int(1));
            assert!(coeff < Fixed::from_int(1));
            assert!(coeff > Fixed::ZERO);
        }
    }

    #[test]
    fn load_average_formula_converges_upward() {
        // One runnable thread forever: load_avg tends toward 1 from below.
        let mut load = Fixed::ZERO;
        for _ in 0..2000 {
            load = Fixed::ratio(59, 60).mul(load).add(Fixed::ratio(1, 60));
        }
        assert!(load > Fixed::ratio(9, 10));
        assert!(load < Fixed::from_int(1));
    }
}
