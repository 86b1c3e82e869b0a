//! Numeric validation utilities
//!
//! Range, sign and parity checks shared by operator parameters and the
//! service configuration.

use crate::error::{FxError, Result};

/// Validator for numeric parameters and configuration values
pub struct NumericValidator;

impl NumericValidator {
    /// Validate that a value is finite (not NaN or infinite)
    pub fn validate_finite(value: f64, name: &str) -> Result<f64> {
        if !value.is_finite() {
            return Err(FxError::invalid_parameter(format!(
                "{} must be a finite number, got {}",
                name, value
            )));
        }
        Ok(value)
    }

    /// Validate numeric range (inclusive)
    pub fn validate_range<T>(value: T, min: T, max: T, name: &str) -> Result<T>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            return Err(FxError::invalid_parameter(format!(
                "{} must be between {} and {}, got {}",
                name, min, max, value
            )));
        }
        Ok(value)
    }

    /// Validate that a value is positive
    pub fn validate_positive<T>(value: T, name: &str) -> Result<T>
    where
        T: PartialOrd + std::fmt::Display + Copy + Default,
    {
        if value <= T::default() {
            return Err(FxError::invalid_parameter(format!(
                "{} must be positive, got {}",
                name, value
            )));
        }
        Ok(value)
    }

    /// Validate that an integral value is odd (kernel sizes)
    pub fn validate_odd(value: i64, name: &str) -> Result<i64> {
        if value % 2 == 0 {
            return Err(FxError::invalid_parameter(format!(
                "{} must be odd, got {}",
                name, value
            )));
        }
        Ok(value)
    }

    /// Validate that a value has no fractional part
    pub fn validate_integral(value: f64, name: &str) -> Result<i64> {
        if value.fract() != 0.0 {
            return Err(FxError::invalid_parameter(format!(
                "{} must be an integer, got {}",
                name, value
            )));
        }
        Ok(value as i64)
    }

    /// Validate JPEG quality (1-100)
    pub fn validate_quality(value: u8) -> Result<u8> {
        if !(1..=100).contains(&value) {
            return Err(FxError::config_value_error(
                "JPEG quality",
                value,
                "1-100",
                Some(95),
            ));
        }
        Ok(value)
    }

    /// Validate thread count
    pub fn validate_thread_count(value: usize) -> Result<usize> {
        const MAX_THREADS: usize = 256;

        if value > MAX_THREADS {
            return Err(FxError::invalid_config(format!(
                "Thread count {} exceeds maximum allowed ({})",
                value, MAX_THREADS
            )));
        }

        Ok(value)
    }

    /// Clamp a value to a range
    pub fn clamp_to_range<T>(value: T, min: T, max: T) -> T
    where
        T: PartialOrd + Copy,
    {
        if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_finite() {
        assert!(NumericValidator::validate_finite(1.5, "amount").is_ok());
        assert!(NumericValidator::validate_finite(f64::NAN, "amount").is_err());
        assert!(NumericValidator::validate_finite(f64::INFINITY, "amount").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(NumericValidator::validate_range(50, 0, 100, "test").is_ok());
        assert!(NumericValidator::validate_range(0, 0, 100, "test").is_ok());
        assert!(NumericValidator::validate_range(100, 0, 100, "test").is_ok());

        assert!(NumericValidator::validate_range(-1, 0, 100, "test").is_err());
        let err = NumericValidator::validate_range(101, 0, 100, "test").unwrap_err();
        assert!(matches!(err, FxError::InvalidParameter(_)));
    }

    #[test]
    fn test_validate_positive() {
        assert!(NumericValidator::validate_positive(1, "test").is_ok());
        assert!(NumericValidator::validate_positive(0, "test").is_err());
        assert!(NumericValidator::validate_positive(-1, "test").is_err());
    }

    #[test]
    fn test_validate_odd_and_integral() {
        assert!(NumericValidator::validate_odd(21, "blur").is_ok());
        assert!(NumericValidator::validate_odd(20, "blur").is_err());
        assert_eq!(NumericValidator::validate_integral(8.0, "k").unwrap(), 8);
        assert!(NumericValidator::validate_integral(8.5, "k").is_err());
    }

    #[test]
    fn test_validate_quality() {
        assert!(NumericValidator::validate_quality(1).is_ok());
        assert!(NumericValidator::validate_quality(100).is_ok());
        assert!(NumericValidator::validate_quality(0).is_err());
        assert!(NumericValidator::validate_quality(101).is_err());
    }

    #[test]
    fn test_clamp_to_range() {
        assert_eq!(NumericValidator::clamp_to_range(50, 0, 100), 50);
        assert_eq!(NumericValidator::clamp_to_range(-10, 0, 100), 0);
        assert_eq!(NumericValidator::clamp_to_range(150, 0, 100), 100);
    }
}
