//! Domain types shared across the Phil crates.

use std::fmt;
use std::time::Duration;

use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Name of a worker VM. Unique within a group at a point in time, not
/// stable across VM replacement.
pub type WorkerIdentity = String;

/// Capacity of a single worker, in work units. A worker reporting this
/// much load is considered fully used (relative load 1.0).
pub const MAX_BATCH_OPERATIONS: f64 = 500.0;

/// Lifecycle status of a VM as reported by the group manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Running,
    Other,
}

impl WorkerStatus {
    /// Map the provider's `instanceStatus` string.
    pub fn from_api(status: &str) -> Self {
        if status == "RUNNING" {
            WorkerStatus::Running
        } else {
            WorkerStatus::Other
        }
    }
}

/// Per-worker load document, written by the worker itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadRecord {
    pub name: WorkerIdentity,
    /// Outstanding/recent work units. Never negative.
    pub load: f64,
    /// Set by a worker that wants to be left out of load accounting.
    /// Workers may write any JSON value here; it is read by truthiness.
    #[serde(
        default,
        deserialize_with = "deserialize_truthy",
        skip_serializing_if = "Option::is_none"
    )]
    pub paused: Option<bool>,
    /// Unix timestamp (seconds) of the last report.
    #[serde(default)]
    pub updated_at: u64,
}

impl LoadRecord {
    pub fn new(name: impl Into<WorkerIdentity>, load: f64) -> Self {
        Self {
            name: name.into(),
            load,
            paused: None,
            updated_at: 0,
        }
    }

    /// A record counts as paused only when the flag is present and true.
    pub fn is_paused(&self) -> bool {
        self.paused.unwrap_or(false)
    }
}

/// `null` reads as absent. `false`, `0`, `NaN` and `""` read as false;
/// every other value reads as true.
fn deserialize_truthy<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Truthy;

    impl<'de> Visitor<'de> for Truthy {
        type Value = Option<bool>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a pause flag")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v != 0))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v != 0))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v != 0.0 && !v.is_nan()))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(!v.is_empty()))
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2: Deserializer<'de>>(self, d: D2) -> Result<Self::Value, D2::Error> {
            d.deserialize_any(self)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok(Some(true))
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
            Ok(Some(true))
        }
    }

    deserializer.deserialize_any(Truthy)
}

/// Zone + name of the managed instance group Phil resizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceGroupRef {
    pub zone: String,
    pub name: String,
}

impl fmt::Display for InstanceGroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone, self.name)
    }
}

/// Immutable sizing parameters, built once from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSizeBounds {
    pub minimum: u32,
    pub maximum: u32,
    /// Smoothed relative load above which the group grows by one.
    pub upper_bound_usage: f64,
    /// Smoothed relative load below which the group shrinks by one.
    pub lower_bound_usage: f64,
    /// Fixed delay between the end of one cycle and the start of the next.
    pub interval: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_status_from_api() {
        assert_eq!(WorkerStatus::from_api("RUNNING"), WorkerStatus::Running);
        assert_eq!(WorkerStatus::from_api("STAGING"), WorkerStatus::Other);
        assert_eq!(WorkerStatus::from_api("running"), WorkerStatus::Other);
    }

    #[test]
    fn paused_flag_defaults_to_active() {
        let mut record = LoadRecord::new("will-1", 10.0);
        assert!(!record.is_paused());

        record.paused = Some(false);
        assert!(!record.is_paused());

        record.paused = Some(true);
        assert!(record.is_paused());
    }

    #[test]
    fn load_record_without_paused_field_parses() {
        let json = r#"{"name":"will-1","load":42}"#;
        let record: LoadRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.load, 42.0);
        assert_eq!(record.paused, None);
        assert_eq!(record.updated_at, 0);
    }

    #[test]
    fn paused_flag_is_read_by_truthiness() {
        let cases = [
            ("1", Some(true)),
            ("\"yes\"", Some(true)),
            ("{}", Some(true)),
            ("[]", Some(true)),
            ("true", Some(true)),
            ("0", Some(false)),
            ("0.0", Some(false)),
            ("\"\"", Some(false)),
            ("false", Some(false)),
            ("null", None),
        ];
        for (paused, expected) in cases {
            let json = format!(r#"{{"name":"will-1","load":10,"paused":{paused}}}"#);
            let record: LoadRecord = serde_json::from_str(&json).unwrap();
            assert_eq!(record.paused, expected, "paused = {paused}");
            assert_eq!(record.is_paused(), expected == Some(true));
        }
    }

    #[test]
    fn group_ref_display() {
        let group = InstanceGroupRef {
            zone: "europe-west1-b".to_string(),
            name: "will".to_string(),
        };
        assert_eq!(group.to_string(), "europe-west1-b/will");
    }
}
