//! A single (metric, instance) time series.

use crate::archive::Value;
use crate::clock::NANOS_PER_SEC;

/// Value storage for one series. The variant is fixed by the first sample;
/// a series never mixes numeric and text values.
#[derive(Clone, Debug, PartialEq)]
pub enum Values {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl Values {
    fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }
}

/// Equal-length ordered timestamp and value sequences for one
/// (metric, instance) pair. Timestamps are UNIX nanoseconds,
/// non-decreasing.
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    timestamps: Vec<u64>,
    values: Values,
}

impl Series {
    /// A new empty series matching the value's variant.
    pub fn for_value(value: &Value) -> Self {
        let values = match value {
            Value::Float(_) => Values::Numeric(Vec::new()),
            Value::Text(_) => Values::Text(Vec::new()),
        };
        Self {
            timestamps: Vec::new(),
            values,
        }
    }

    /// Append one sample. Returns false, leaving the series untouched, when
    /// the value's variant does not match the series.
    pub fn push(&mut self, timestamp: u64, value: Value) -> bool {
        match (&mut self.values, value) {
            (Values::Numeric(values), Value::Float(v)) => {
                self.timestamps.push(timestamp);
                values.push(v);
                true
            }
            (Values::Text(values), Value::Text(v)) => {
                self.timestamps.push(timestamp);
                values.push(v);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[u64] {
        &self.timestamps
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn numeric_values(&self) -> Option<&[f64]> {
        match &self.values {
            Values::Numeric(v) => Some(v),
            Values::Text(_) => None,
        }
    }

    pub fn text_values(&self) -> Option<&[String]> {
        match &self.values {
            Values::Text(v) => Some(v),
            Values::Numeric(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.values, Values::Text(_))
    }

    /// len(timestamps) == len(values), always.
    pub fn shape_ok(&self) -> bool {
        self.timestamps.len() == self.values.len()
    }

    /// True for a numeric series whose every value is zero. Such a series
    /// carries no visual information and is pruned before rate conversion.
    pub fn all_zero(&self) -> bool {
        match &self.values {
            Values::Numeric(values) => values.iter().all(|v| *v == 0.0),
            Values::Text(_) => false,
        }
    }

    /// Replace the values with per-interval rates, in place.
    ///
    /// Given n+1 points the output has n, each stamped at the later
    /// timestamp of the interval it summarizes. A zero-duration interval
    /// (two samples sharing a timestamp) yields 0 when the value delta is
    /// also 0; otherwise the previously computed rate is reused if one
    /// exists, else 0. Reusing the prior output rate rather than failing
    /// prefers continuity over a spurious spike; tests pin this as a policy
    /// choice.
    ///
    /// Returns whether the series was modified. Text series and series of
    /// fewer than two points are left untouched.
    pub fn rate_convert(&mut self) -> bool {
        let Values::Numeric(values) = &self.values else {
            return false;
        };

        if self.timestamps.len() < 2 {
            return false;
        }

        let n = self.timestamps.len() - 1;
        let mut out_timestamps = Vec::with_capacity(n);
        let mut out_values = Vec::with_capacity(n);

        for i in 1..self.timestamps.len() {
            let duration = self.timestamps[i].saturating_sub(self.timestamps[i - 1]);
            let delta = values[i] - values[i - 1];

            let rate = if duration == 0 {
                if delta == 0.0 {
                    0.0
                } else {
                    out_values.last().copied().unwrap_or(0.0)
                }
            } else {
                delta / (duration as f64 / NANOS_PER_SEC as f64)
            };

            out_timestamps.push(self.timestamps[i]);
            out_values.push(rate);
        }

        self.timestamps = out_timestamps;
        self.values = Values::Numeric(out_values);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(timestamps: &[u64], values: &[f64]) -> Series {
        let mut series = Series::for_value(&Value::Float(0.0));
        for (ts, v) in timestamps.iter().zip(values) {
            assert!(series.push(*ts, Value::Float(*v)));
        }
        series
    }

    fn secs(s: u64) -> u64 {
        s * NANOS_PER_SEC
    }

    #[test]
    fn push_rejects_mismatched_variant() {
        let mut series = Series::for_value(&Value::Float(0.0));
        assert!(series.push(1, Value::Float(1.0)));
        assert!(!series.push(2, Value::Text("x".to_string())));
        assert_eq!(series.len(), 1);
        assert!(series.shape_ok());
    }

    #[test]
    fn rate_output_is_one_shorter_and_stamped_late() {
        let mut series = numeric(&[secs(0), secs(5), secs(10)], &[0.0, 50.0, 150.0]);
        assert!(series.rate_convert());
        assert_eq!(series.timestamps(), &[secs(5), secs(10)]);
        assert_eq!(series.numeric_values().unwrap(), &[10.0, 20.0]);
        assert!(series.shape_ok());
    }

    #[test]
    fn zero_interval_with_zero_delta_is_zero() {
        let mut series = numeric(&[secs(0), secs(0), secs(5)], &[10.0, 10.0, 14.0]);
        assert!(series.rate_convert());
        assert_eq!(series.numeric_values().unwrap(), &[0.0, 0.8]);
    }

    #[test]
    fn zero_interval_without_prior_rate_defaults_to_zero() {
        let mut series = numeric(&[secs(0), secs(0)], &[10.0, 12.0]);
        assert!(series.rate_convert());
        assert_eq!(series.numeric_values().unwrap(), &[0.0]);
    }

    #[test]
    fn zero_interval_reuses_prior_rate() {
        let mut series = numeric(&[secs(0), secs(1), secs(1)], &[10.0, 12.0, 15.0]);
        assert!(series.rate_convert());
        assert_eq!(series.numeric_values().unwrap(), &[2.0, 2.0]);
    }

    #[test]
    fn single_point_series_is_untouched() {
        let mut series = numeric(&[secs(0)], &[10.0]);
        assert!(!series.rate_convert());
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn text_series_is_never_converted() {
        let mut series = Series::for_value(&Value::Text(String::new()));
        series.push(secs(0), Value::Text("a".to_string()));
        series.push(secs(1), Value::Text("b".to_string()));
        assert!(!series.rate_convert());
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn all_zero_detection() {
        assert!(numeric(&[secs(0), secs(1)], &[0.0, 0.0]).all_zero());
        assert!(!numeric(&[secs(0), secs(1)], &[0.0, 0.1]).all_zero());

        let mut text = Series::for_value(&Value::Text(String::new()));
        text.push(secs(0), Value::Text("0".to_string()));
        assert!(!text.all_zero());
    }
}
