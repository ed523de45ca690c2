// q15 fixed point helpers, shared by the state extractor and the behavioural core

use num_complex::Complex64;

/// Scale factor of a signed Q15 value (2^15).
pub const Q15_SCALE: f64 = 32768.0;

/// Largest representable Q15 value, just under +1.0.
pub const Q15_ONE: i16 = i16::MAX;

/// 1/sqrt(2) in Q15, rounded to nearest.
pub const Q15_FRAC_1_SQRT_2: i16 = 23170;

/// Raw register pair as it sits in the amplitude memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawAmplitude {
    pub re: i16,
    pub im: i16,
}

impl RawAmplitude {
    pub const ZERO: RawAmplitude = RawAmplitude { re: 0, im: 0 };

    pub fn new(re: i16, im: i16) -> Self {
        RawAmplitude { re, im }
    }
}

/// Converts a single Q15 value to a float in `[-1.0, 1.0)`.
pub fn q15_to_f64(v: i16) -> f64 {
    v as f64 / Q15_SCALE
}

/// Decodes a raw register pair into a complex amplitude.
///
/// Total over the full i16 range: `-32768` maps to exactly `-1.0` and
/// `32767` to `0.999969...`.
pub fn decode(raw_re: i16, raw_im: i16) -> Complex64 {
    Complex64::new(q15_to_f64(raw_re), q15_to_f64(raw_im))
}

pub fn decode_raw(raw: RawAmplitude) -> Complex64 {
    decode(raw.re, raw.im)
}

/// Squared magnitude of an amplitude, i.e. its measurement probability.
pub fn magnitude_squared(amp: Complex64) -> f64 {
    amp.re * amp.re + amp.im * amp.im
}

/// Encodes a float to Q15, rounding to nearest and saturating at the range ends.
pub fn encode(x: f64) -> i16 {
    let scaled = (x * Q15_SCALE).round();
    if scaled >= i16::MAX as f64 {
        i16::MAX
    } else if scaled <= i16::MIN as f64 {
        i16::MIN
    } else {
        scaled as i16
    }
}

// clamps a widened intermediate back into i16 range
fn saturate(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Q15 product with round-half-up, saturating.
pub fn q15_mul(a: i16, b: i16) -> i16 {
    let prod = (a as i32) * (b as i32);
    saturate((prod + (1 << 14)) >> 15)
}

/// Saturating Q15 addition.
pub fn q15_add(a: i16, b: i16) -> i16 {
    saturate(a as i32 + b as i32)
}

/// Saturating Q15 subtraction.
pub fn q15_sub(a: i16, b: i16) -> i16 {
    saturate(a as i32 - b as i32)
}

/// Scaled butterfly `((a + b) * k, (a - b) * k)` computed in a widened accumulator,
/// so the sum never saturates before the scale is applied.
pub fn q15_butterfly(a: i16, b: i16, k: i16) -> (i16, i16) {
    let sum = a as i32 + b as i32;
    let diff = a as i32 - b as i32;
    let round = 1 << 14;
    (
        saturate((sum * k as i32 + round) >> 15),
        saturate((diff * k as i32 + round) >> 15),
    )
}

/// Complex Q15 product `a * w`.
pub fn q15_cmul(a: RawAmplitude, w: RawAmplitude) -> RawAmplitude {
    let round = 1 << 14;
    let re = (a.re as i32) * (w.re as i32) - (a.im as i32) * (w.im as i32);
    let im = (a.re as i32) * (w.im as i32) + (a.im as i32) * (w.re as i32);
    RawAmplitude {
        re: saturate((re + round) >> 15),
        im: saturate((im + round) >> 15),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_range_ends() {
        assert_eq!(decode(i16::MIN, 0).re, -1.0);
        assert!((decode(i16::MAX, 0).re - 0.99997).abs() < 1e-5);
        assert_eq!(decode(0, 0), Complex64::new(0.0, 0.0));
    }

    #[test]
    fn decode_is_monotonic_over_full_range() {
        let mut prev = f64::NEG_INFINITY;
        for raw in i16::MIN..=i16::MAX {
            let v = decode(raw, 0).re;
            assert!(v > prev, "decode not increasing at {}", raw);
            prev = v;
        }
    }

    #[test]
    fn magnitude_squared_matches_norm_sqr() {
        let amp = decode(12000, -7000);
        assert!((magnitude_squared(amp) - amp.norm_sqr()).abs() < 1e-15);
    }

    #[test]
    fn encode_saturates() {
        assert_eq!(encode(1.0), i16::MAX);
        assert_eq!(encode(-1.0), i16::MIN);
        assert_eq!(encode(-2.0), i16::MIN);
        assert_eq!(encode(std::f64::consts::FRAC_1_SQRT_2), Q15_FRAC_1_SQRT_2);
    }

    #[test]
    fn butterfly_does_not_overflow_before_scaling() {
        // 0.99997 + 0.99997 would saturate in i16, the widened accumulator must not
        let (s, d) = q15_butterfly(Q15_ONE, Q15_ONE, Q15_FRAC_1_SQRT_2);
        assert_eq!(s, i16::MAX);
        assert_eq!(d, 0);

        let (s, d) = q15_butterfly(16384, 16384, Q15_FRAC_1_SQRT_2);
        assert!((q15_to_f64(s) - 0.7071).abs() < 1e-3);
        assert_eq!(d, 0);
    }

    #[test]
    fn cmul_by_minus_one_negates() {
        let minus_one = RawAmplitude::new(i16::MIN, 0);
        let a = RawAmplitude::new(10000, -5000);
        let r = q15_cmul(a, minus_one);
        assert_eq!(r, RawAmplitude::new(-10000, 5000));
    }
}
