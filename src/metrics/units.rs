//! Unit catalog: how each Atlas measurement unit maps onto base units.

use crate::error::{ExporterError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * KIB;
const GIB: f64 = MIB * KIB;

/// Measurement units reported by the Atlas monitoring API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Unit {
    Percent,
    Milliseconds,
    Seconds,
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    BytesPerSecond,
    MegabytesPerSecond,
    GigabytesPerHour,
    ScalarPerSecond,
    Scalar,
}

/// Conversion applied to values and names of one unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitRule {
    /// Factor converting a raw value into the canonical base unit
    pub multiplier: f64,
    /// Appended verbatim to the lowercased measurement name
    pub name_suffix: &'static str,
}

impl Unit {
    /// Every unit in the catalog.
    pub const ALL: [Unit; 12] = [
        Unit::Percent,
        Unit::Milliseconds,
        Unit::Seconds,
        Unit::Bytes,
        Unit::Kilobytes,
        Unit::Megabytes,
        Unit::Gigabytes,
        Unit::BytesPerSecond,
        Unit::MegabytesPerSecond,
        Unit::GigabytesPerHour,
        Unit::ScalarPerSecond,
        Unit::Scalar,
    ];

    /// Multiplier and name suffix for this unit.
    pub fn rules(self) -> UnitRule {
        let (multiplier, name_suffix) = match self {
            Unit::Percent => (1.0, "_percent"),
            Unit::Milliseconds => (0.001, "_seconds"),
            Unit::Seconds => (1.0, "_seconds"),
            Unit::Bytes => (1.0, "_bytes"),
            Unit::Kilobytes => (KIB, "_bytes"),
            Unit::Megabytes => (MIB, "_bytes"),
            Unit::Gigabytes => (GIB, "_bytes"),
            Unit::BytesPerSecond => (1.0, "_bytes_ratio"),
            Unit::MegabytesPerSecond => (MIB, "_bytes_ratio"),
            Unit::GigabytesPerHour => (GIB, "_bytes_ratio_rate1h"),
            Unit::ScalarPerSecond => (1.0, "_ratio"),
            Unit::Scalar => (1.0, ""),
        };
        UnitRule {
            multiplier,
            name_suffix,
        }
    }

    /// The symbol Atlas uses for this unit.
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Percent => "PERCENT",
            Unit::Milliseconds => "MILLISECONDS",
            Unit::Seconds => "SECONDS",
            Unit::Bytes => "BYTES",
            Unit::Kilobytes => "KILOBYTES",
            Unit::Megabytes => "MEGABYTES",
            Unit::Gigabytes => "GIGABYTES",
            Unit::BytesPerSecond => "BYTES_PER_SECOND",
            Unit::MegabytesPerSecond => "MEGABYTES_PER_SECOND",
            Unit::GigabytesPerHour => "GIGABYTES_PER_HOUR",
            Unit::ScalarPerSecond => "SCALAR_PER_SECOND",
            Unit::Scalar => "SCALAR",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = ExporterError;

    fn from_str(symbol: &str) -> Result<Self> {
        Unit::ALL
            .into_iter()
            .find(|unit| unit.as_str() == symbol)
            .ok_or_else(|| {
                ExporterError::invalid_measurement(format!(
                    "Can't find suffix for unit '{}', the unit type seems to be unknown.",
                    symbol
                ))
            })
    }
}

/// Looks up the rule for a raw unit symbol; unknown symbols are an error.
pub fn rules(symbol: &str) -> Result<UnitRule> {
    symbol.parse::<Unit>().map(Unit::rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_round_trip_through_from_str() {
        for unit in Unit::ALL {
            assert_eq!(unit.as_str().parse::<Unit>().unwrap(), unit);
        }
    }

    #[test]
    fn test_unknown_symbol_is_rejected() {
        assert!(rules("FURLONGS").is_err());
        assert!(rules("").is_err());
        assert!(rules("percent").is_err());
    }

    #[test]
    fn test_multipliers_convert_to_base_units() {
        assert_eq!(Unit::Milliseconds.rules().multiplier, 0.001);
        assert_eq!(Unit::Kilobytes.rules().multiplier, 1024.0);
        assert_eq!(Unit::Megabytes.rules().multiplier, 1024.0 * 1024.0);
        assert_eq!(Unit::Gigabytes.rules().multiplier, 1024.0 * 1024.0 * 1024.0);
        assert_eq!(Unit::GigabytesPerHour.rules().name_suffix, "_bytes_ratio_rate1h");
        assert_eq!(Unit::Scalar.rules().name_suffix, "");
    }

    #[test]
    fn test_serde_uses_atlas_symbols() {
        let json = serde_json::to_string(&Unit::MegabytesPerSecond).unwrap();
        assert_eq!(json, "\"MEGABYTES_PER_SECOND\"");
        let unit: Unit = serde_json::from_str("\"SCALAR_PER_SECOND\"").unwrap();
        assert_eq!(unit, Unit::ScalarPerSecond);
    }
}
