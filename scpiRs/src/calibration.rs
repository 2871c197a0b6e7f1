//! Calibration polynomials to post-process measured values.
//!
//! A measurement returns a raw value. Converting it into a calibrated value is an explicit,
//! separate step: [`Calibrations::evaluate`] applies a named polynomial to it.

use std::{collections::BTreeMap, fmt, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::ScpiError;

/// A table of named calibration polynomials.
///
/// Coefficients are stored highest order first, i.e., `[2.0, 0.5, 0.1]` is the polynomial
/// `2.0 x^2 + 0.5 x + 0.1`. The table is stored on disk as a JSON object that maps the names to
/// their coefficient lists.
///
/// The default table contains the identity `"equ"` (`[1.0, 0.0]`) and `"hlv"` (`[0.5, 0.0]`),
/// which halves the value.
///
/// # Example
///
/// ```
/// use scpirs::Calibrations;
///
/// let mut cal = Calibrations::default();
/// cal.add_polynomial("dbl", vec![2.0, 0.0]).unwrap();
///
/// let raw = 1.25;
/// assert_eq!(cal.evaluate("dbl", raw).unwrap(), 2.5);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Calibrations {
    polynomials: BTreeMap<String, Vec<f64>>,
}

impl Default for Calibrations {
    fn default() -> Self {
        let polynomials = BTreeMap::from([
            ("equ".to_string(), vec![1.0, 0.0]),
            ("hlv".to_string(), vec![0.5, 0.0]),
        ]);
        Self { polynomials }
    }
}

impl Calibrations {
    /// Evaluate the polynomial with the given name at `x` using Horner's method.
    ///
    /// # Errors
    /// * [`ScpiError::UnknownPolynomial`] if there is no polynomial with this name.
    /// * [`ScpiError::EmptyPolynomial`] if the polynomial has no coefficients.
    pub fn evaluate(&self, name: &str, x: f64) -> Result<f64, ScpiError> {
        let coefs = self
            .polynomials
            .get(name)
            .ok_or_else(|| ScpiError::UnknownPolynomial(name.to_string()))?;
        if coefs.is_empty() {
            return Err(ScpiError::EmptyPolynomial(name.to_string()));
        }
        Ok(coefs.iter().fold(0.0, |acc, coef| acc * x + coef))
    }

    /// Add a polynomial or replace an existing one with the same name.
    pub fn add_polynomial(&mut self, name: &str, coefs: Vec<f64>) -> Result<(), ScpiError> {
        if coefs.is_empty() {
            return Err(ScpiError::EmptyPolynomial(name.to_string()));
        }
        self.polynomials.insert(name.to_string(), coefs);
        Ok(())
    }

    /// Get the coefficients of a polynomial, highest order first.
    pub fn get_polynomial(&self, name: &str) -> Option<&[f64]> {
        self.polynomials.get(name).map(Vec::as_slice)
    }

    /// Load a table from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScpiError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the table to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ScpiError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load the table from a JSON file, or create the file with the default table if it does not
    /// exist yet.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ScpiError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No calibration file at {path:?}, writing defaults");
            let cal = Self::default();
            cal.save(path)?;
            Ok(cal)
        }
    }
}

/// Lists all polynomials as `name: [coefficients]`, sorted by name.
impl fmt::Display for Calibrations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self
            .polynomials
            .iter()
            .map(|(name, coefs)| format!("{name}: {coefs:?}"))
            .collect();
        write!(f, "{}", items.join(", "))
    }
}
