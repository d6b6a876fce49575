//! printf-compatible scientific notation
//!
//! Rust's `{:e}` writes `1.23e-4`; downstream plotting tools expect the C
//! form `1.23e-04` with an explicit sign and at least two exponent digits.

use std::fmt;

/// Display adapter writing `value` like C's `%.<precision>e`
#[derive(Debug, Clone, Copy)]
pub struct Sci {
    pub value: f64,
    pub precision: usize,
}

impl Sci {
    pub fn new(value: f64, precision: usize) -> Self {
        Self { value, precision }
    }
}

impl fmt::Display for Sci {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_nan() {
            return f.write_str("nan");
        }
        if self.value.is_infinite() {
            return f.write_str(if self.value > 0.0 { "inf" } else { "-inf" });
        }

        let rust = format!("{:.*e}", self.precision, self.value);
        let (mantissa, exponent) = rust.split_once('e').unwrap_or((rust.as_str(), "0"));
        let exponent: i32 = exponent.parse().map_err(|_| fmt::Error)?;
        let sign = if exponent < 0 { '-' } else { '+' };

        write!(f, "{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}
