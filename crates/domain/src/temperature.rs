//! Temperature value object and unit conversions.
//!
//! A [`Temperature`] keeps the magnitude it was constructed with exactly and
//! derives the other unit rounded to one decimal, the resolution the oven
//! accepts on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Lowest cavity setpoint the oven accepts.
pub const MIN_CELSIUS: f64 = 25.0;
/// Highest cavity setpoint the oven accepts.
pub const MAX_CELSIUS: f64 = 250.0;
/// Lowest probe target the oven accepts.
pub const MIN_PROBE_CELSIUS: f64 = 1.0;
/// Highest probe target the oven accepts.
pub const MAX_PROBE_CELSIUS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "C", alias = "c", alias = "celsius")]
    Celsius,
    #[serde(rename = "F", alias = "f", alias = "fahrenheit")]
    Fahrenheit,
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Celsius => f.write_str("C"),
            Self::Fahrenheit => f.write_str("F"),
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c" | "celsius" => Ok(Self::Celsius),
            "f" | "fahrenheit" => Ok(Self::Fahrenheit),
            other => Err(format!("unknown temperature unit `{other}`")),
        }
    }
}

/// Convert Celsius to Fahrenheit, rounded to one decimal.
#[must_use]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    round_tenth(celsius * 9.0 / 5.0 + 32.0)
}

/// Convert Fahrenheit to Celsius, rounded to one decimal.
#[must_use]
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    round_tenth((fahrenheit - 32.0) * 5.0 / 9.0)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// A validated cavity temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Temperature {
    celsius: f64,
    fahrenheit: f64,
    unit: TemperatureUnit,
}

impl Temperature {
    /// Build a cavity temperature in the given unit.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NonFiniteTemperature`] for NaN/infinite input
    /// and [`ValidationError::TemperatureOutOfRange`] outside 25–250 °C.
    pub fn new(value: f64, unit: TemperatureUnit) -> Result<Self, ValidationError> {
        let temperature = Self::unchecked(value, unit)?;
        let (min, max) = match unit {
            TemperatureUnit::Celsius => (MIN_CELSIUS, MAX_CELSIUS),
            TemperatureUnit::Fahrenheit => (
                celsius_to_fahrenheit(MIN_CELSIUS),
                celsius_to_fahrenheit(MAX_CELSIUS),
            ),
        };
        if !(min..=max).contains(&value) {
            return Err(ValidationError::TemperatureOutOfRange {
                value,
                unit,
                min,
                max,
            });
        }
        Ok(temperature)
    }

    /// # Errors
    ///
    /// See [`Temperature::new`].
    pub fn from_celsius(celsius: f64) -> Result<Self, ValidationError> {
        Self::new(celsius, TemperatureUnit::Celsius)
    }

    /// # Errors
    ///
    /// See [`Temperature::new`].
    pub fn from_fahrenheit(fahrenheit: f64) -> Result<Self, ValidationError> {
        Self::new(fahrenheit, TemperatureUnit::Fahrenheit)
    }

    fn unchecked(value: f64, unit: TemperatureUnit) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteTemperature);
        }
        let (celsius, fahrenheit) = match unit {
            TemperatureUnit::Celsius => (value, celsius_to_fahrenheit(value)),
            TemperatureUnit::Fahrenheit => (fahrenheit_to_celsius(value), value),
        };
        Ok(Self {
            celsius,
            fahrenheit,
            unit,
        })
    }

    #[must_use]
    pub fn celsius(&self) -> f64 {
        self.celsius
    }

    #[must_use]
    pub fn fahrenheit(&self) -> f64 {
        self.fahrenheit
    }

    /// The unit this temperature was specified in.
    #[must_use]
    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    /// The magnitude in [`unit`](Self::unit).
    #[must_use]
    pub fn value(&self) -> f64 {
        match self.unit {
            TemperatureUnit::Celsius => self.celsius,
            TemperatureUnit::Fahrenheit => self.fahrenheit,
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value();
        if value.fract() == 0.0 {
            write!(f, "{value:.0}°{}", self.unit)
        } else {
            write!(f, "{value:.1}°{}", self.unit)
        }
    }
}

/// Target core temperature for the food probe.
///
/// The probe accepts a lower range than the cavity (1–100 °C), so it gets its
/// own type rather than a looser [`Temperature`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbeTarget(Temperature);

impl ProbeTarget {
    /// # Errors
    ///
    /// Returns [`ValidationError::ProbeOutOfRange`] outside 1–100 °C.
    pub fn new(value: f64, unit: TemperatureUnit) -> Result<Self, ValidationError> {
        let temperature = Temperature::unchecked(value, unit)?;
        let celsius = temperature.celsius();
        if !(MIN_PROBE_CELSIUS..=MAX_PROBE_CELSIUS).contains(&celsius) {
            return Err(ValidationError::ProbeOutOfRange { celsius });
        }
        Ok(Self(temperature))
    }

    #[must_use]
    pub fn temperature(&self) -> Temperature {
        self.0
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
