//! Turning Atlas measurements into metric names, types and values.

use crate::error::{ExporterError, Result};
use crate::metrics::data::{MeasurementMetadata, Sample};
use crate::metrics::units::Unit;
use chrono::NaiveDateTime;
use prometheus::proto::MetricType;
use std::cmp::Ordering;

/// Layout of every sample timestamp Atlas returns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const NAME_DELIMITER: &str = "";

/// Normalized metric name for a measurement: lowercased name plus unit suffix.
///
/// Fails when the name is empty or the unit is not in the catalog; when both
/// hold the message mentions both.
pub fn transform_name(name: &str, unit: &str) -> Result<String> {
    let unit = unit.parse::<Unit>();

    match (name.is_empty(), unit) {
        (false, Ok(unit)) => Ok([name.to_lowercase().as_str(), unit.rules().name_suffix]
            .join(NAME_DELIMITER)),
        (empty_name, unit) => {
            let mut msg = String::new();
            if empty_name {
                msg.push_str(&format!(
                    "Can't transform name '{}', it seems to be invalid. ",
                    name
                ));
            }
            if let Err(ExporterError::InvalidMeasurement(reason)) = unit {
                msg.push_str(&reason);
            }
            Err(ExporterError::invalid_measurement(msg.trim_end()))
        }
    }
}

/// Metric type of a measurement.
///
/// Every Atlas measurement is an instantaneous reading, so the metadata does
/// not change the answer today.
pub fn transform_type(_metadata: &MeasurementMetadata) -> MetricType {
    MetricType::GAUGE
}

fn parse_timestamp(timestamp: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .map_err(|e| ExporterError::Timestamp(format!("'{}': {}", timestamp, e)))
}

/// Orders by timestamp; on ties a missing value sorts first, then by value.
fn compare_samples(a: &(NaiveDateTime, Option<f64>), b: &(NaiveDateTime, Option<f64>)) -> Ordering {
    a.0.cmp(&b.0).then_with(|| match (a.1, b.1) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.total_cmp(&y),
    })
}

/// Select the representative value of a sample series, converted to base units.
///
/// The latest non-null sample wins. An empty series is [`ExporterError::NoData`];
/// a series whose samples are all null yields `0`.
pub fn select_value(samples: &[Sample], unit: Unit) -> Result<f64> {
    if samples.is_empty() {
        return Err(ExporterError::NoData);
    }

    let mut points = samples
        .iter()
        .map(|sample| Ok((parse_timestamp(&sample.timestamp)?, sample.value)))
        .collect::<Result<Vec<_>>>()?;
    points.sort_by(compare_samples);

    let value = points
        .iter()
        .rev()
        .find_map(|(_, value)| *value)
        .map(|value| value * unit.rules().multiplier)
        .unwrap_or(0.0);

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: &str, value: Option<f64>) -> Sample {
        Sample::new(timestamp, value)
    }

    #[test]
    fn test_name_for_every_unit() {
        let name = "EXAMPLE_MeasuRemenT";
        for unit in Unit::ALL {
            let expected = format!("example_measurement{}", unit.rules().name_suffix);
            assert_eq!(transform_name(name, unit.as_str()).unwrap(), expected);
        }
    }

    #[test]
    fn test_name_scalar_has_no_suffix() {
        assert_eq!(
            transform_name("EXAMPLE_MeasuRemenT", "SCALAR").unwrap(),
            "example_measurement"
        );
    }

    #[test]
    fn test_name_empty_fails_for_every_unit() {
        for unit in Unit::ALL {
            assert!(transform_name("", unit.as_str()).is_err());
        }
    }

    #[test]
    fn test_name_unknown_unit_fails() {
        let err = transform_name("CONNECTIONS", "").unwrap_err();
        assert!(err.to_string().contains("unit type seems to be unknown"));
    }

    #[test]
    fn test_name_reports_both_causes() {
        let msg = transform_name("", "PARSECS").unwrap_err().to_string();
        assert!(msg.contains("Can't transform name"));
        assert!(msg.contains("Can't find suffix for unit 'PARSECS'"));
    }

    #[test]
    fn test_type_is_gauge() {
        for (name, unit) in [("CONNECTIONS", "SCALAR"), ("OPCOUNTER_CMD", "SCALAR_PER_SECOND")] {
            let metadata = MeasurementMetadata::new(name, unit);
            assert_eq!(transform_type(&metadata), MetricType::GAUGE);
        }
    }

    #[test]
    fn test_timestamp_validation() {
        assert!(select_value(&[sample("2021-03-04T16:53:06Z", None)], Unit::Scalar).is_ok());
        assert!(matches!(
            select_value(&[sample("2021-20-04T16:53:06Z", None)], Unit::Scalar),
            Err(ExporterError::Timestamp(_))
        ));
        assert!(matches!(
            select_value(&[sample("", None)], Unit::Scalar),
            Err(ExporterError::Timestamp(_))
        ));
    }

    #[test]
    fn test_no_samples_is_no_data() {
        assert!(matches!(select_value(&[], Unit::Scalar), Err(ExporterError::NoData)));
    }

    #[test]
    fn test_all_null_is_zero() {
        let samples = [
            sample("2021-03-04T16:53:06Z", None),
            sample("2021-03-04T16:54:06Z", None),
        ];
        assert_eq!(select_value(&samples, Unit::Scalar).unwrap(), 0.0);
        assert_eq!(
            select_value(&samples[..1], Unit::Scalar).unwrap(),
            0.0
        );
    }

    #[test]
    fn test_latest_valid_with_multiplier() {
        let samples = [
            sample("2021-03-04T16:53:06Z", None),
            sample("2021-03-04T16:54:06Z", Some(2.10016)),
        ];
        assert_eq!(
            select_value(&samples, Unit::Gigabytes).unwrap(),
            2.10016 * 1024f64.powi(3)
        );
    }

    #[test]
    fn test_first_valid_when_latest_is_null() {
        let samples = [
            sample("2021-03-04T16:53:06Z", Some(2.10016)),
            sample("2021-03-04T16:54:06Z", None),
        ];
        assert_eq!(
            select_value(&samples, Unit::GigabytesPerHour).unwrap(),
            2.10016 * 1024f64.powi(3)
        );
    }

    #[test]
    fn test_latest_of_two_values() {
        let samples = [
            sample("2021-03-04T16:53:06Z", Some(2.10016)),
            sample("2021-03-04T16:54:06Z", Some(2.10999)),
        ];
        assert_eq!(select_value(&samples, Unit::Kilobytes).unwrap(), 2.10999 * 1024.0);
    }

    #[test]
    fn test_unordered_input_is_sorted_by_timestamp() {
        let samples = [
            sample("2021-03-04T16:54:06Z", Some(2.10999)),
            sample("2021-03-04T16:53:06Z", Some(1.10016)),
        ];
        assert_eq!(
            select_value(&samples, Unit::Megabytes).unwrap(),
            2.10999 * 1024f64.powi(2)
        );

        let samples = [
            sample("2021-03-04T16:54:06Z", Some(10999.0)),
            sample("2021-03-04T16:53:06Z", None),
        ];
        assert_eq!(
            select_value(&samples, Unit::Milliseconds).unwrap(),
            10999.0 * 0.001
        );
    }

    #[test]
    fn test_duplicate_timestamps_prefer_value_over_null() {
        let samples = [
            sample("2021-03-04T16:54:06Z", Some(2.10016)),
            sample("2021-03-04T16:54:06Z", None),
        ];
        assert_eq!(select_value(&samples, Unit::Scalar).unwrap(), 2.10016);

        let samples = [
            sample("2021-03-04T16:53:06Z", None),
            sample("2021-03-04T16:54:06Z", Some(2.10999)),
            sample("2021-03-04T16:54:06Z", None),
        ];
        assert_eq!(select_value(&samples, Unit::Scalar).unwrap(), 2.10999);
    }

    #[test]
    fn test_duplicate_timestamps_prefer_larger_value() {
        let samples = [
            sample("2021-03-04T16:53:06Z", None),
            sample("2021-03-04T16:54:06Z", Some(2.20999)),
            sample("2021-03-04T16:54:06Z", Some(2.00999)),
        ];
        assert_eq!(select_value(&samples, Unit::Scalar).unwrap(), 2.20999);
    }

    #[test]
    fn test_null_between_values() {
        let samples = [
            sample("2021-03-04T16:53:06Z", None),
            sample("2021-03-04T16:53:20Z", Some(2.10999)),
            sample("2021-03-04T16:54:06Z", None),
        ];
        assert_eq!(select_value(&samples, Unit::Scalar).unwrap(), 2.10999);
    }

    #[test]
    fn test_sample_ordering() {
        let t1 = parse_timestamp("2021-03-04T16:55:06Z").unwrap();
        let t0 = parse_timestamp("2021-03-04T16:54:06Z").unwrap();

        assert_eq!(compare_samples(&(t0, Some(3.14)), &(t1, None)), Ordering::Less);
        assert_eq!(compare_samples(&(t1, None), &(t1, Some(2.72))), Ordering::Less);
        assert_eq!(compare_samples(&(t1, Some(3.14)), &(t1, Some(2.72))), Ordering::Greater);
        assert_eq!(compare_samples(&(t1, None), &(t1, None)), Ordering::Equal);
    }
}
