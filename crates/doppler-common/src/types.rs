use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Unix time in whole seconds.
pub type Timestamp = i64;

/// Current unix time in whole seconds.
pub fn unix_now() -> Timestamp {
    Utc::now().timestamp()
}

/// A single JSON scalar carried by a sample.
///
/// # Examples
///
/// ```
/// use doppler_common::types::Scalar;
///
/// assert_eq!(Scalar::from(95), Scalar::Int(95));
/// assert_eq!(Scalar::from("1.0"), Scalar::Text("1.0".into()));
/// assert_eq!(serde_json::to_string(&Scalar::Float(2.5)).unwrap(), "2.5");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Scalar::Float(v as f64), Scalar::Int)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// One timestamped, named measurement or event occurrence held by a store.
///
/// `seq` is assigned by the owning store at collection time and is unique
/// within that store; removal after delivery matches on it rather than on
/// the `(timestamp, name, value)` tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub seq: u64,
    pub timestamp: Timestamp,
    pub name: String,
    pub value: Option<Scalar>,
}

/// The three payload sections a sample can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Metrics,
    States,
    Events,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Metrics, Category::States, Category::Events];

    /// Key of this section in the outbound envelope.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Metrics => "metrics",
            Category::States => "states",
            Category::Events => "events",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
