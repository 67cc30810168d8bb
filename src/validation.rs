use std::ops::RangeInclusive;

/// Validates that a capture parameter is a finite number greater than zero.
///
/// # Arguments
///
/// * `value` - The value to validate.
/// * `name` - Parameter name used in the error message.
///
/// # Returns
///
/// * `Ok(())` if the value is valid.
/// * `Err(String)` naming the parameter otherwise.
pub fn is_positive_finite(value: f64, name: &str) -> Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be positive and finite, got {value}"))
    }
}

/// Validates if a given string can name a serial port.
///
/// # Arguments
///
/// * `port` - The string to validate.
///
/// # Returns
///
/// * `Ok(())` if the port name is valid.
/// * `Err(&'static str)` if the port name is invalid.
pub fn is_valid_port_name(port: &str) -> Result<(), &'static str> {
    if port.trim().is_empty() {
        return Err("Port name cannot be empty");
    }
    if port.contains('\0') {
        return Err("Port name cannot contain null bytes");
    }
    Ok(())
}

/// Validates if a given string is a valid file name prefix.
pub fn is_valid_file_prefix(prefix: &str) -> Result<(), &'static str> {
    if prefix.is_empty() {
        return Err("File prefix cannot be empty");
    }
    if prefix.contains(['/', '\\', '\0']) {
        return Err("File prefix cannot contain path separators or null bytes");
    }
    Ok(())
}

/// Validates if a given value is within a specified numeric range.
///
/// # Arguments
///
/// * `value` - The value to validate.
/// * `range` - The inclusive range to validate against.
///
/// # Returns
///
/// * `Ok(())` if the value is within the range.
/// * `Err(&'static str)` if the value is outside the range.
pub fn is_in_range<T: PartialOrd>(value: T, range: RangeInclusive<T>) -> Result<(), &'static str> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err("Value is outside the specified range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_finite() {
        assert!(is_positive_finite(30.0, "fps").is_ok());
        assert!(is_positive_finite(f64::MIN_POSITIVE, "fps").is_ok());
        assert!(is_positive_finite(0.0, "fps").is_err());
        assert!(is_positive_finite(-1.0, "fps").is_err());
        assert!(is_positive_finite(f64::NAN, "fps").is_err());
        assert!(is_positive_finite(f64::INFINITY, "fps").is_err());
        assert!(is_positive_finite(-2.5, "duration")
            .unwrap_err()
            .contains("duration"));
    }

    #[test]
    fn port_names() {
        assert!(is_valid_port_name("/dev/ttyUSB0").is_ok());
        assert!(is_valid_port_name("COM3").is_ok());
        assert!(is_valid_port_name("  ").is_err());
        assert!(is_valid_port_name("bad\0port").is_err());
    }

    #[test]
    fn file_prefixes() {
        assert!(is_valid_file_prefix("sensor_data").is_ok());
        assert!(is_valid_file_prefix("").is_err());
        assert!(is_valid_file_prefix("../escape").is_err());
    }

    #[test]
    fn ranges() {
        assert!(is_in_range(9600u32, 1..=4_000_000).is_ok());
        assert!(is_in_range(0u32, 1..=4_000_000).is_err());
    }
}
