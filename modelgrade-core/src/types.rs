//! Fundamental value types shared by metrics, the evaluator, and the orchestrator.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Deployment targets scored by the `size_score` metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    RaspberryPi,
    JetsonNano,
    DesktopPc,
    AwsServer,
}

impl Device {
    pub const ALL: [Device; 4] = [
        Device::RaspberryPi,
        Device::JetsonNano,
        Device::DesktopPc,
        Device::AwsServer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::RaspberryPi => "raspberry_pi",
            Device::JetsonNano => "jetson_nano",
            Device::DesktopPc => "desktop_pc",
            Device::AwsServer => "aws_server",
        }
    }
}

/// Per-device scores. A metric may report a subset; [`DeviceMap::normalized`]
/// fills the missing devices with `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceMap(BTreeMap<Device, f64>);

impl DeviceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, device: Device, score: f64) -> Self {
        self.0.insert(device, score);
        self
    }

    pub fn insert(&mut self, device: Device, score: f64) {
        self.0.insert(device, score);
    }

    pub fn get(&self, device: Device) -> Option<f64> {
        self.0.get(&device).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All four devices present, each clamped to `[0, 1]`.
    pub fn normalized(&self) -> DeviceMap {
        let map = Device::ALL
            .iter()
            .map(|d| (*d, clamp_unit(self.get(*d).unwrap_or(0.0))))
            .collect();
        DeviceMap(map)
    }

    /// Arithmetic mean over the four canonical devices, missing ones counted as zero.
    pub fn mean(&self) -> f64 {
        let total: f64 = Device::ALL
            .iter()
            .map(|d| clamp_unit(self.get(*d).unwrap_or(0.0)))
            .sum();
        total / Device::ALL.len() as f64
    }

    pub fn iter(&self) -> impl Iterator<Item = (Device, f64)> + '_ {
        self.0.iter().map(|(d, v)| (*d, *v))
    }
}

impl FromIterator<(Device, f64)> for DeviceMap {
    fn from_iter<I: IntoIterator<Item = (Device, f64)>>(iter: I) -> Self {
        DeviceMap(iter.into_iter().collect())
    }
}

/// Value reported by a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    Devices(DeviceMap),
}

/// Sentinel a scalar metric emits when it does not apply to the artifact.
pub const NOT_APPLICABLE: f64 = -1.0;

impl MetricValue {
    /// Clamp scalars into `[0, 1]`, leaving the not-applicable sentinel untouched.
    /// Non-finite scalars become `0.0`.
    pub fn sanitized(self) -> MetricValue {
        match self {
            MetricValue::Scalar(v) if v == NOT_APPLICABLE => MetricValue::Scalar(v),
            MetricValue::Scalar(v) => MetricValue::Scalar(clamp_unit(v)),
            MetricValue::Devices(map) => MetricValue::Devices(
                map.iter().map(|(d, v)| (d, clamp_unit(v))).collect(),
            ),
        }
    }

    /// Scalar handed to the combiner. Device maps collapse to their mean.
    pub fn as_scalar(&self) -> f64 {
        match self {
            MetricValue::Scalar(v) => *v,
            MetricValue::Devices(map) => map.mean(),
        }
    }
}

impl Default for MetricValue {
    fn default() -> Self {
        MetricValue::Scalar(0.0)
    }
}

/// A metric's value together with its self-measured latency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub value: MetricValue,
    pub latency_ms: u64,
}

impl MetricResult {
    pub fn new(value: MetricValue, latency_ms: u64) -> Self {
        Self { value, latency_ms }
    }

    pub fn scalar(value: f64, latency_ms: u64) -> Self {
        Self::new(MetricValue::Scalar(value), latency_ms)
    }

    pub fn devices(map: DeviceMap, latency_ms: u64) -> Self {
        Self::new(MetricValue::Devices(map), latency_ms)
    }

    /// `{value: 0.0, latency_ms: 0}`, recorded for failed or unfinished metrics.
    pub fn neutral() -> Self {
        Self::scalar(0.0, 0)
    }
}

/// One field of a [`ScoreRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldScore {
    pub field: String,
    pub value: MetricValue,
    pub latency_ms: u64,
}

/// Flat output record for one scored model.
///
/// Serializes as `name`, `category`, `net_score`, `net_score_latency`, then
/// `<field>` and `<field>_latency` for every field in registry order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub name: String,
    pub category: String,
    pub net_score: f64,
    pub net_score_latency: u64,
    pub fields: Vec<FieldScore>,
}

impl ScoreRecord {
    pub const CATEGORY_MODEL: &'static str = "MODEL";

    pub fn field(&self, name: &str) -> Option<&FieldScore> {
        self.fields.iter().find(|f| f.field == name)
    }

    /// Render to a JSON value for key lookups. Map keys come back sorted;
    /// serialize the record itself to keep field order.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for ScoreRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4 + self.fields.len() * 2))?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("category", &self.category)?;
        map.serialize_entry("net_score", &self.net_score)?;
        map.serialize_entry("net_score_latency", &self.net_score_latency)?;
        for f in &self.fields {
            map.serialize_entry(&f.field, &f.value)?;
            map.serialize_entry(&format!("{}_latency", f.field), &f.latency_ms)?;
        }
        map.end()
    }
}

pub(crate) fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_device_map_normalized_fills_missing() {
        let map = DeviceMap::new()
            .with(Device::RaspberryPi, 0.3)
            .with(Device::DesktopPc, 0.9);
        let full = map.normalized();
        assert_eq!(full.len(), 4);
        assert_eq!(full.get(Device::JetsonNano), Some(0.0));
        assert_eq!(full.get(Device::AwsServer), Some(0.0));
        assert!((map.mean() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_device_map_serializes_snake_case() {
        let map = DeviceMap::new().with(Device::AwsServer, 1.0).normalized();
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "raspberry_pi": 0.0,
                "jetson_nano": 0.0,
                "desktop_pc": 0.0,
                "aws_server": 1.0
            })
        );
    }

    #[test]
    fn test_sanitized_keeps_sentinel() {
        assert_eq!(
            MetricValue::Scalar(-1.0).sanitized(),
            MetricValue::Scalar(-1.0)
        );
        assert_eq!(MetricValue::Scalar(1.7).sanitized(), MetricValue::Scalar(1.0));
        assert_eq!(MetricValue::Scalar(-0.2).sanitized(), MetricValue::Scalar(0.0));
        assert_eq!(
            MetricValue::Scalar(f64::NAN).sanitized(),
            MetricValue::Scalar(0.0)
        );
    }

    #[test]
    fn test_record_serialization_order() {
        let record = ScoreRecord {
            name: "org/model".into(),
            category: ScoreRecord::CATEGORY_MODEL.into(),
            net_score: 0.5,
            net_score_latency: 12,
            fields: vec![FieldScore {
                field: "license".into(),
                value: MetricValue::Scalar(1.0),
                latency_ms: 3,
            }],
        };
        let text = serde_json::to_string(&record).unwrap();
        assert_eq!(
            text,
            r#"{"name":"org/model","category":"MODEL","net_score":0.5,"net_score_latency":12,"license":1.0,"license_latency":3}"#
        );
    }
}
