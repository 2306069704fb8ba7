//! Decibel conversions for amplitude values

/// Amplitude ratio for a level in dB
#[inline]
pub fn decibel_to_value(decibel: f64) -> f64 {
    10.0_f64.powf(0.05 * decibel)
}

/// Level in dB for an amplitude ratio (values below 1e-300 are clamped)
#[inline]
pub fn value_to_decibel(value: f64) -> f64 {
    20.0 * value.max(1e-300).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert!((decibel_to_value(-20.0) - 0.1).abs() < 1e-12);
        assert!((value_to_decibel(0.01) + 40.0).abs() < 1e-9);
        assert!((value_to_decibel(0.0) + 6000.0).abs() < 1e-6);
    }
}
