//! Exact time ↔ pixel conversion.
//!
//! `f64(time) * pixels_per_second` stops being exact once `time` passes 2^53
//! seconds, and 13.8 billion years is ~4.4×10^17 s. [`RationalScale`] keeps
//! seconds-per-pixel as a reduced big-integer fraction so that pixel → time
//! conversion is exact to the nearest second at every zoom level, and panning
//! by the same pixel delta always moves the same number of seconds.
//!
//! Time → pixel goes the other way and ends in an `f64`. Screen coordinates
//! are small, so losing low-order bits there is harmless.

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{FromPrimitive, One, Signed, ToPrimitive, Zero};

/// Smallest seconds-per-pixel callers should construct (1 ms per pixel).
pub const MIN_SECONDS_PER_PIXEL: f64 = 0.001;
/// Largest seconds-per-pixel callers should construct (~31.7 million years per pixel).
pub const MAX_SECONDS_PER_PIXEL: f64 = 1e15;

/// Fractional digits kept when rationalizing a seconds-per-pixel float.
const SCALE_PRECISION: u64 = 1_000_000_000;

/// Clamp a seconds-per-pixel value into the supported zoom range.
/// Non-finite input maps to the nearest bound.
pub fn clamp_seconds_per_pixel(spp: f64) -> f64 {
    if spp.is_nan() {
        return MIN_SECONDS_PER_PIXEL;
    }
    spp.clamp(MIN_SECONDS_PER_PIXEL, MAX_SECONDS_PER_PIXEL)
}

/// Seconds per pixel as an exact ratio of two big integers. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RationalScale {
    seconds_per_pixel: BigRational,
}

impl RationalScale {
    /// Build a scale from a floating-point seconds-per-pixel value, keeping
    /// nine fractional digits. The value is expected to be finite and within
    /// [`MIN_SECONDS_PER_PIXEL`, `MAX_SECONDS_PER_PIXEL`]; anything that
    /// rounds to zero is bumped to the smallest representable positive ratio
    /// so later divisions stay defined.
    pub fn from_seconds_per_pixel(spp: f64) -> Self {
        let mut ratio = rationalize(spp, SCALE_PRECISION);
        if !ratio.is_positive() {
            ratio = BigRational::new(BigInt::one(), BigInt::from(SCALE_PRECISION));
        }
        Self {
            seconds_per_pixel: ratio,
        }
    }

    pub fn from_pixels_per_second(pps: f64) -> Self {
        Self::from_seconds_per_pixel(1.0 / pps)
    }

    /// Rebuild a scale from an exact ratio, as received over the worker
    /// transport. Returns `None` unless both parts are positive.
    pub fn from_ratio(numerator: BigInt, denominator: BigInt) -> Option<Self> {
        if !numerator.is_positive() || !denominator.is_positive() {
            return None;
        }
        Some(Self {
            seconds_per_pixel: BigRational::new(numerator, denominator),
        })
    }

    /// Reduced numerator of the seconds-per-pixel ratio.
    pub fn numerator(&self) -> &BigInt {
        self.seconds_per_pixel.numer()
    }

    /// Reduced denominator of the seconds-per-pixel ratio.
    pub fn denominator(&self) -> &BigInt {
        self.seconds_per_pixel.denom()
    }

    /// Time delta covered by `px` pixels, rounded to the nearest second
    /// (halves away from zero). The pixel value is taken exactly as the
    /// `f64` it is; non-finite input maps to zero.
    pub fn px_to_time(&self, px: f64) -> BigInt {
        let Some(pixels) = BigRational::from_float(px) else {
            return BigInt::zero();
        };
        (pixels * &self.seconds_per_pixel).round().to_integer()
    }

    /// Pixel distance covered by a time delta.
    pub fn time_to_px(&self, delta: &BigInt) -> f64 {
        ratio_to_f64(
            &(delta * self.seconds_per_pixel.denom()),
            self.seconds_per_pixel.numer(),
        )
    }

    pub fn seconds_per_pixel(&self) -> f64 {
        ratio_to_f64(self.seconds_per_pixel.numer(), self.seconds_per_pixel.denom())
    }

    /// A new scale with seconds-per-pixel multiplied by `factor`, clamped to
    /// the supported range.
    pub fn zoomed(&self, factor: f64) -> Self {
        Self::from_seconds_per_pixel(clamp_seconds_per_pixel(self.seconds_per_pixel() * factor))
    }
}

/// Exact rational for `value`, rounded to `1 / precision`. The whole part of
/// a finite `f64` is always an integer that `BigInt::from_f64` reproduces
/// exactly, so only the fractional part is subject to rounding.
fn rationalize(value: f64, precision: u64) -> BigRational {
    if !value.is_finite() {
        return BigRational::zero();
    }
    let whole = value.trunc();
    let fraction = ((value - whole) * precision as f64).round();
    let precision = BigInt::from(precision);
    let whole = BigInt::from_f64(whole).unwrap_or_default();
    let fraction = BigInt::from_f64(fraction).unwrap_or_default();
    BigRational::new(whole * &precision + fraction, precision)
}

/// `numer / denom` as an `f64` without materializing a lossy `f64` of
/// either operand first. `denom` must be non-zero.
fn ratio_to_f64(numer: &BigInt, denom: &BigInt) -> f64 {
    let (quotient, remainder) = numer.div_rem(denom);
    big_to_f64(&quotient) + big_to_f64(&remainder) / big_to_f64(denom)
}

fn big_to_f64(value: &BigInt) -> f64 {
    value.to_f64().unwrap_or(if value.is_negative() {
        f64::NEG_INFINITY
    } else {
        f64::INFINITY
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const YEAR: i64 = 31_557_600;

    #[test]
    fn year_per_pixel_is_exact() {
        let scale = RationalScale::from_seconds_per_pixel(YEAR as f64);
        assert_eq!(scale.numerator(), &BigInt::from(YEAR));
        assert_eq!(scale.denominator(), &BigInt::one());
        assert_eq!(scale.px_to_time(800.0), BigInt::from(800 * YEAR));
    }

    #[test]
    fn fractional_scale_reduces() {
        let scale = RationalScale::from_seconds_per_pixel(0.25);
        assert_eq!(scale.numerator(), &BigInt::from(1));
        assert_eq!(scale.denominator(), &BigInt::from(4));
        assert_eq!(scale.px_to_time(10.0), BigInt::from(3)); // 2.5 rounds away from zero
        assert_eq!(scale.px_to_time(-10.0), BigInt::from(-3));
        assert!((scale.seconds_per_pixel() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn pixels_per_second_inverts() {
        let scale = RationalScale::from_pixels_per_second(4.0);
        assert_eq!(scale, RationalScale::from_seconds_per_pixel(0.25));
    }

    #[test]
    fn time_to_px_handles_deep_time() {
        let scale = RationalScale::from_seconds_per_pixel(1e15);
        let age: BigInt = "435485961600000000".parse().expect("valid integer");
        let px = scale.time_to_px(&age);
        assert!((px - 435.4859616).abs() < 1e-6, "px={px}");
        assert!((scale.time_to_px(&-age) + 435.4859616).abs() < 1e-6);
    }

    #[test]
    fn fractional_pixels_are_not_rounded_before_scaling() {
        let scale = RationalScale::from_seconds_per_pixel(1e15);
        assert_eq!(scale.px_to_time(0.1234567), BigInt::from(123_456_700_000_000i64));
        assert_eq!(scale.px_to_time(-0.1234567), BigInt::from(-123_456_700_000_000i64));
        assert_eq!(scale.px_to_time(1e-9), BigInt::from(1_000_000));
    }

    #[test]
    fn non_finite_pixels_map_to_zero() {
        let scale = RationalScale::from_seconds_per_pixel(1e15);
        assert!(scale.px_to_time(f64::NAN).is_zero());
        assert!(scale.px_to_time(f64::INFINITY).is_zero());
    }

    #[test]
    fn pan_steps_do_not_drift() {
        let scale = RationalScale::from_seconds_per_pixel(123_456.789);
        let step = scale.px_to_time(37.0);
        let mut total = BigInt::zero();
        for _ in 0..1000 {
            total += scale.px_to_time(37.0);
        }
        assert_eq!(total, step * 1000);
    }

    #[test]
    fn degenerate_input_stays_positive() {
        let scale = RationalScale::from_seconds_per_pixel(0.0);
        assert!(scale.numerator().is_positive());
        assert!(scale.time_to_px(&BigInt::from(1)).is_finite());
        let nan = RationalScale::from_seconds_per_pixel(f64::NAN);
        assert!(nan.numerator().is_positive());
    }

    #[test]
    fn from_ratio_rejects_non_positive() {
        assert!(RationalScale::from_ratio(BigInt::zero(), BigInt::one()).is_none());
        assert!(RationalScale::from_ratio(BigInt::one(), BigInt::from(-2)).is_none());
        let scale = RationalScale::from_ratio(BigInt::from(6), BigInt::from(4));
        assert_eq!(scale.map(|s| s.denominator().clone()), Some(BigInt::from(2)));
    }

    #[test]
    fn zoom_clamps() {
        let scale = RationalScale::from_seconds_per_pixel(MAX_SECONDS_PER_PIXEL);
        assert!((scale.zoomed(10.0).seconds_per_pixel() - MAX_SECONDS_PER_PIXEL).abs() < 1.0);
        let fine = RationalScale::from_seconds_per_pixel(MIN_SECONDS_PER_PIXEL);
        assert!((fine.zoomed(0.01).seconds_per_pixel() - MIN_SECONDS_PER_PIXEL).abs() < 1e-12);
    }
}
