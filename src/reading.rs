use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::source::FetchError;

/// A single observation of the monitored risk value.
#[derive(Debug, Clone)]
pub struct Reading {
    pub value: i64,
    pub details: Vec<DetailSection>,
    pub observed_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(value: i64) -> Self {
        Self {
            value,
            details: Vec::new(),
            observed_at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: Vec<DetailSection>) -> Self {
        self.details = details;
        self
    }
}

/// A named block of descriptive fields shipped alongside the risk value
/// (e.g. the `news` or `weather` object of a JSON feed).
#[derive(Debug, Clone, PartialEq)]
pub struct DetailSection {
    pub name: String,
    pub fields: Vec<(String, String)>,
}

/// Keep only the ASCII digits of `raw` and parse them: `"55%"` -> 55.
/// Returns None when there are no digits or the number overflows.
pub fn extract_digits(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Where the risk value and detail sections live inside a JSON document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonLayout {
    #[serde(default = "default_risk_field")]
    pub risk_field: String,
    #[serde(default = "default_detail_keys")]
    pub detail_keys: Vec<String>,
}

fn default_risk_field() -> String { "risk".to_string() }
fn default_detail_keys() -> Vec<String> {
    vec!["news".to_string(), "flight".to_string(), "weather".to_string()]
}

impl Default for JsonLayout {
    fn default() -> Self {
        Self {
            risk_field: default_risk_field(),
            detail_keys: default_detail_keys(),
        }
    }
}

impl JsonLayout {
    pub fn parse_str(&self, body: &str) -> Result<Reading, FetchError> {
        let doc: Value = serde_json::from_str(body)
            .map_err(|e| FetchError::Parse(format!("invalid JSON: {}", e)))?;
        self.parse(&doc)
    }

    pub fn parse(&self, doc: &Value) -> Result<Reading, FetchError> {
        let root = doc
            .as_object()
            .ok_or_else(|| FetchError::Parse("document root is not an object".to_string()))?;

        let raw = root
            .get(&self.risk_field)
            .ok_or_else(|| FetchError::MissingField(self.risk_field.clone()))?;
        let value = risk_value(raw).ok_or_else(|| FetchError::InvalidValue {
            field: self.risk_field.clone(),
            found: raw.to_string(),
        })?;

        let details = self
            .detail_keys
            .iter()
            .filter_map(|key| match root.get(key) {
                Some(Value::Object(obj)) => detail_section(key, obj),
                _ => None,
            })
            .collect();

        Ok(Reading::new(value).with_details(details))
    }
}

fn risk_value(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            // Reject values outside the i64 range instead of saturating.
            if f.is_finite() && f.abs() < i64::MAX as f64 {
                Some(f.round() as i64)
            } else {
                None
            }
        }),
        Value::String(s) => extract_digits(s),
        _ => None,
    }
}

/// Scalar fields only; nested objects, arrays and nulls are dropped.
fn detail_section(name: &str, obj: &Map<String, Value>) -> Option<DetailSection> {
    let fields: Vec<(String, String)> = obj
        .iter()
        .filter_map(|(k, v)| {
            let rendered = match v {
                Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((k.clone(), rendered))
        })
        .collect();

    if fields.is_empty() {
        None
    } else {
        Some(DetailSection {
            name: name.to_string(),
            fields,
        })
    }
}
