//! Declared operator parameters and their validation
//!
//! Every tunable knob has a [`ParamSpec`] with a default and an inclusive
//! range. Raw key/value pairs (query strings, CLI `-p key=value`) are parsed
//! and checked against those specs before an operator runs, so operators
//! only ever see values inside their declared domain.

use crate::error::{FxError, Result};
use crate::utils::NumericValidator;
use serde::Serialize;
use std::collections::BTreeMap;

/// Name of the reserved parameter that seeds randomized operators
pub const SEED_PARAM: &str = "seed";

/// Empty raw parameter list, for calls that keep every default
pub const NO_PARAMS: [(&str, &str); 0] = [];

/// How a raw parameter value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Whole number
    Integer,
    /// Whole odd number (kernel sizes)
    OddInteger,
    /// Real number
    Float,
    /// `0`/`1`, `true`/`false`
    Flag,
}

/// Declaration of a single operator parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub description: &'static str,
}

impl ParamSpec {
    pub(crate) const fn integer(name: &'static str, default: f64, min: f64, max: f64, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Integer,
            default,
            min,
            max,
            description,
        }
    }

    pub(crate) const fn odd(name: &'static str, default: f64, min: f64, max: f64, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::OddInteger,
            default,
            min,
            max,
            description,
        }
    }

    pub(crate) const fn float(name: &'static str, default: f64, min: f64, max: f64, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Float,
            default,
            min,
            max,
            description,
        }
    }

    pub(crate) const fn flag(name: &'static str, default: bool, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Flag,
            default: if default { 1.0 } else { 0.0 },
            min: 0.0,
            max: 1.0,
            description,
        }
    }

    /// Parse and validate a raw value against this spec
    ///
    /// # Errors
    /// Returns `InvalidParameter` for unparsable values, out-of-range values,
    /// fractional integers and even kernel sizes.
    pub fn parse(&self, operator: &str, raw: &str) -> Result<f64> {
        let trimmed = raw.trim();
        let value = match self.kind {
            ParamKind::Flag => match trimmed.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => 1.0,
                "0" | "false" | "no" | "off" => 0.0,
                _ => {
                    return Err(FxError::invalid_parameter(format!(
                        "{}: '{}' expects a boolean, got '{}'",
                        operator, self.name, raw
                    )));
                },
            },
            _ => trimmed.parse::<f64>().map_err(|_| {
                FxError::invalid_parameter(format!(
                    "{}: '{}' expects a number, got '{}'",
                    operator, self.name, raw
                ))
            })?,
        };
        self.check(operator, value)
    }

    /// Validate an already numeric value against this spec
    ///
    /// # Errors
    /// See [`ParamSpec::parse`].
    pub fn check(&self, operator: &str, value: f64) -> Result<f64> {
        let label = format!("{}: '{}'", operator, self.name);
        NumericValidator::validate_finite(value, &label)?;
        if value < self.min || value > self.max {
            return Err(FxError::parameter_range_error(
                operator,
                self.name,
                value,
                &format!("{}..={}", self.min, self.max),
            ));
        }
        match self.kind {
            ParamKind::Integer | ParamKind::Flag => {
                NumericValidator::validate_integral(value, &label)?;
            },
            ParamKind::OddInteger => {
                let integral = NumericValidator::validate_integral(value, &label)?;
                NumericValidator::validate_odd(integral, &label)?;
            },
            ParamKind::Float => {},
        }
        Ok(value)
    }
}

/// A complete, validated set of parameter values for one operator call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    values: BTreeMap<&'static str, f64>,
    seed: Option<u64>,
}

impl ParamSet {
    /// Defaults for every declared parameter
    #[must_use]
    pub fn defaults(specs: &[ParamSpec]) -> Self {
        Self {
            values: specs.iter().map(|s| (s.name, s.default)).collect(),
            seed: None,
        }
    }

    /// Resolve raw key/value pairs against `specs`
    ///
    /// Missing keys take their default. Unknown keys are rejected, except the
    /// reserved `seed` key which any operator accepts.
    ///
    /// # Errors
    /// Returns `InvalidParameter` for unknown keys and invalid values.
    pub fn resolve<'a, I>(operator: &str, specs: &[ParamSpec], raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut set = Self::defaults(specs);
        for (key, value) in raw {
            if key == SEED_PARAM {
                let seed = value.trim().parse::<u64>().map_err(|_| {
                    FxError::invalid_parameter(format!(
                        "{}: 'seed' expects an unsigned integer, got '{}'",
                        operator, value
                    ))
                })?;
                set.seed = Some(seed);
                continue;
            }
            let spec = specs.iter().find(|s| s.name == key).ok_or_else(|| {
                let known: Vec<&str> = specs.iter().map(|s| s.name).collect();
                FxError::invalid_parameter(format!(
                    "{}: unknown parameter '{}' (accepted: {})",
                    operator,
                    key,
                    if known.is_empty() {
                        "none".to_string()
                    } else {
                        known.join(", ")
                    }
                ))
            })?;
            set.values.insert(spec.name, spec.parse(operator, value)?);
        }
        Ok(set)
    }

    /// Override a single value, validating it
    ///
    /// # Errors
    /// Returns `InvalidParameter` if the name is not declared or the value is invalid.
    pub fn set(&mut self, operator: &str, specs: &[ParamSpec], name: &str, value: f64) -> Result<()> {
        let spec = specs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| FxError::invalid_parameter(format!("{}: unknown parameter '{}'", operator, name)))?;
        self.values.insert(spec.name, spec.check(operator, value)?);
        Ok(())
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    fn value(&self, name: &str) -> Result<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| FxError::processing(format!("parameter '{}' was not resolved", name)))
    }

    /// Value as `f32`
    ///
    /// # Errors
    /// Fails if the parameter is not part of this set.
    pub fn f32(&self, name: &str) -> Result<f32> {
        Ok(self.value(name)? as f32)
    }

    /// Value as `u32` (validated values are integral and non-negative)
    ///
    /// # Errors
    /// Fails if the parameter is not part of this set.
    pub fn u32(&self, name: &str) -> Result<u32> {
        Ok(self.value(name)?.max(0.0) as u32)
    }

    /// Value as a flag
    ///
    /// # Errors
    /// Fails if the parameter is not part of this set.
    pub fn flag(&self, name: &str) -> Result<bool> {
        Ok(self.value(name)? != 0.0)
    }

    /// Iterate over `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[ParamSpec] = &[
        ParamSpec::float("amount", 1.0, 0.1, 5.0, "sharpen amount"),
        ParamSpec::odd("blur", 21.0, 3.0, 99.0, "kernel"),
        ParamSpec::integer("levels", 4.0, 2.0, 16.0, "levels"),
        ParamSpec::flag("warm", true, "warm tone"),
    ];

    #[test]
    fn test_defaults_fill_missing() {
        let set = ParamSet::resolve("test", SPECS, Vec::<(&str, &str)>::new()).unwrap();
        assert!((set.f32("amount").unwrap() - 1.0).abs() < f32::EPSILON);
        assert_eq!(set.u32("blur").unwrap(), 21);
        assert!(set.flag("warm").unwrap());
        assert_eq!(set.seed(), None);
    }

    #[test]
    fn test_resolve_overrides_and_seed() {
        let set = ParamSet::resolve(
            "test",
            SPECS,
            vec![("amount", "2.5"), ("levels", "8"), ("warm", "false"), ("seed", "42")],
        )
        .unwrap();
        assert!((set.f32("amount").unwrap() - 2.5).abs() < f32::EPSILON);
        assert_eq!(set.u32("levels").unwrap(), 8);
        assert!(!set.flag("warm").unwrap());
        assert_eq!(set.seed(), Some(42));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let err = ParamSet::resolve("test", SPECS, vec![("amount", "9")]).unwrap_err();
        assert!(matches!(err, FxError::InvalidParameter(_)));
    }

    #[test]
    fn test_rejects_even_kernel_and_fraction() {
        assert!(ParamSet::resolve("test", SPECS, vec![("blur", "20")]).is_err());
        assert!(ParamSet::resolve("test", SPECS, vec![("levels", "3.5")]).is_err());
    }

    #[test]
    fn test_rejects_unknown_and_garbage() {
        assert!(ParamSet::resolve("test", SPECS, vec![("radius", "3")]).is_err());
        assert!(ParamSet::resolve("test", SPECS, vec![("amount", "lots")]).is_err());
        assert!(ParamSet::resolve("test", SPECS, vec![("amount", "NaN")]).is_err());
        assert!(ParamSet::resolve("test", SPECS, vec![("seed", "-1")]).is_err());
    }

    #[test]
    fn test_set_validates() {
        let mut set = ParamSet::defaults(SPECS);
        assert!(set.set("test", SPECS, "amount", 0.5).is_ok());
        assert!(set.set("test", SPECS, "amount", 0.0).is_err());
        assert!(set.set("test", SPECS, "nope", 1.0).is_err());
    }
}
