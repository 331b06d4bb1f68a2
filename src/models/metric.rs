use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use validator::Validate;

use super::validators::COUNTRY_CODE_REGEX;

/// Mobile platform a record was measured on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    #[default]
    Android,
    Ios,
}

impl Os {
    pub fn as_str(self) -> &'static str {
        match self {
            Os::Android => "android",
            Os::Ios => "ios",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "android" => Ok(Os::Android),
            "ios" => Ok(Os::Ios),
            other => Err(format!("Invalid os '{}', expected android or ios", other)),
        }
    }
}

/// A new daily metric record, as read from a bulk load file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreateMetric {
    pub date: NaiveDate,
    #[validate(length(min = 1, max = 250))]
    pub channel: String,
    #[validate(regex(path = *COUNTRY_CODE_REGEX))]
    pub country: String,
    #[serde(default)]
    pub os: Os,
    #[validate(range(min = 0))]
    pub impressions: i64,
    #[validate(range(min = 0))]
    pub clicks: i32,
    #[validate(range(min = 0))]
    pub installs: i32,
    #[validate(range(min = 0.0))]
    pub spend: f64,
    #[validate(range(min = 0.0))]
    pub revenue: f64,
}

/// A stored record as returned by the raw listing, with per-row CPI.
///
/// `cpi` is `spend / installs`, or `None` when `installs` is zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub date: NaiveDate,
    pub channel: String,
    pub country: String,
    pub os: Os,
    pub impressions: i64,
    pub clicks: i32,
    pub installs: i32,
    pub spend: f64,
    pub revenue: f64,
    pub cpi: Option<f64>,
}

/// A single value in a grouped result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Option<i64>> for Scalar {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Scalar::Null, Scalar::Int)
    }
}

impl From<Option<f64>> for Scalar {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Scalar::Null, Scalar::Float)
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_none(),
            Scalar::Int(v) => serializer.serialize_i64(*v),
            Scalar::Float(v) => serializer.serialize_f64(*v),
            Scalar::Text(v) => serializer.serialize_str(v),
            Scalar::Date(v) => v.serialize(serializer),
        }
    }
}

/// One grouped result row: output column name to value, in plan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    columns: Vec<(String, Scalar)>,
}

impl ResultRow {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: Scalar) {
        self.columns.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
