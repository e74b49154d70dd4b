//! The RPC value model shared by both wire protocols.
//!
//! `Value` is the closed set of types both protocols can carry. JSON mapping
//! is lossy in one direction only: datetimes and binary payloads ride inside
//! strings, with [`DateEncoding`] selecting the datetime shape and a decode
//! side "upgrade" pass recovering recognized date strings into
//! [`Value::DateTime`].

use std::collections::BTreeMap;

use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Number, Value as Json, json};

/// A value exchanged with the remote service.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    DateTime(DateTime<Utc>),
    Base64(Vec<u8>),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

/// How [`Value::DateTime`] is represented on a JSON wire.
///
/// XML-RPC always uses `<dateTime.iso8601>` and ignores this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateEncoding {
    /// UTC ISO8601 with millisecond precision and no zone suffix.
    #[default]
    Iso8601,
    /// `"@<millis>@"` tick strings.
    Ticks,
    /// `{"__jsonclass__": ["Date", [<millis>]]}` class hinting.
    ClassHinting,
    /// `"/Date(<millis>)/"` strings.
    AspNet,
}

impl Value {
    /// Build a struct value from an iterator of members.
    pub fn structure<K, I>(members: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Struct(
            members
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        )
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Struct(members) => Some(members),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Convert to a JSON tree, rendering datetimes per `encoding`.
    ///
    /// Non-finite doubles become `null`; binary payloads become standard
    /// base64 strings.
    #[must_use]
    pub fn to_json(&self, encoding: DateEncoding) -> Json {
        match self {
            Self::Nil => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(n) => Json::Number(Number::from(*n)),
            Self::Double(d) => Number::from_f64(*d).map_or(Json::Null, Json::Number),
            Self::Str(s) => Json::String(s.clone()),
            Self::DateTime(dt) => encode_datetime(*dt, encoding),
            Self::Base64(bytes) => {
                Json::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Self::Array(items) => {
                Json::Array(items.iter().map(|v| v.to_json(encoding)).collect())
            }
            Self::Struct(members) => {
                let mut map = Map::with_capacity(members.len());
                for (key, value) in members {
                    map.insert(key.clone(), value.to_json(encoding));
                }
                Json::Object(map)
            }
        }
    }

    /// Convert a JSON tree into a value, without date recognition.
    ///
    /// Integral numbers become [`Value::Int`]; everything else maps
    /// one-to-one. Run [`Value::upgrade_dates`] afterwards to recover
    /// datetimes.
    #[must_use]
    pub fn from_json(json: Json) -> Self {
        match json {
            Json::Null => Self::Nil,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => n.as_i64().map_or_else(
                || Self::Double(n.as_f64().unwrap_or(f64::NAN)),
                Self::Int,
            ),
            Json::String(s) => Self::Str(s),
            Json::Array(items) => Self::Array(items.into_iter().map(Self::from_json).collect()),
            Json::Object(map) => Self::Struct(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Recursively convert recognized date shapes into [`Value::DateTime`].
    ///
    /// Tick strings (`"@<millis>@"`), `"/Date(<millis>)/"` strings, and
    /// `__jsonclass__` Date hints are always converted; plain ISO8601
    /// strings only when `decode_iso8601` is set, since any string that
    /// happens to look like a date would be caught too.
    pub fn upgrade_dates(&mut self, decode_iso8601: bool) {
        match self {
            Self::Str(s) => {
                if let Some(dt) = parse_date_string(s, decode_iso8601) {
                    *self = Self::DateTime(dt);
                }
            }
            Self::Array(items) => {
                for item in items {
                    item.upgrade_dates(decode_iso8601);
                }
            }
            Self::Struct(members) => {
                if let Some(dt) = class_hinted_date(members) {
                    *self = Self::DateTime(dt);
                    return;
                }
                for value in members.values_mut() {
                    value.upgrade_dates(decode_iso8601);
                }
            }
            _ => {}
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

/// Format a datetime the way the wire expects ISO8601: UTC, millisecond
/// precision, no zone suffix.
#[must_use]
pub fn format_iso8601(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

fn encode_datetime(dt: DateTime<Utc>, encoding: DateEncoding) -> Json {
    match encoding {
        DateEncoding::Iso8601 => Json::String(format_iso8601(dt)),
        DateEncoding::Ticks => Json::String(format!("@{}@", dt.timestamp_millis())),
        DateEncoding::ClassHinting => json!({
            "__jsonclass__": ["Date", [dt.timestamp_millis()]],
        }),
        DateEncoding::AspNet => Json::String(format!("/Date({})/", dt.timestamp_millis())),
    }
}

fn parse_date_string(s: &str, decode_iso8601: bool) -> Option<DateTime<Utc>> {
    if let Some(ticks) = s.strip_prefix('@').and_then(|rest| rest.strip_suffix('@')) {
        return millis_to_datetime(ticks);
    }
    if let Some(ticks) = s
        .strip_prefix("/Date(")
        .and_then(|rest| rest.strip_suffix(")/"))
    {
        return millis_to_datetime(ticks);
    }
    if decode_iso8601 {
        return parse_iso8601(s);
    }
    None
}

fn millis_to_datetime(digits: &str) -> Option<DateTime<Utc>> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let millis: i64 = digits.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Parse the partial ISO8601 shapes the wire allows: `YYYY-MM` through a
/// full datetime with fractional seconds, all interpreted as UTC.
#[must_use]
pub fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    if s.len() < 7 || !s.bytes().take(4).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let naive = match s.len() {
        // YYYY-MM: first of the month at midnight
        7 => date_only(&format!("{s}-01"))?,
        10 => date_only(s)?,
        13 => NaiveDateTime::parse_from_str(&format!("{s}:00:00"), "%Y-%m-%dT%H:%M:%S").ok()?,
        16 => NaiveDateTime::parse_from_str(&format!("{s}:00"), "%Y-%m-%dT%H:%M:%S").ok()?,
        19 => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok()?,
        _ => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()?,
    };
    Some(naive.and_utc())
}

fn date_only(s: &str) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
}

fn class_hinted_date(members: &BTreeMap<String, Value>) -> Option<DateTime<Utc>> {
    let hint = members.get("__jsonclass__")?.as_array()?;
    if hint.first()?.as_str()? != "Date" {
        return None;
    }
    match hint.get(1) {
        Some(Value::Array(params)) => match params.first() {
            Some(Value::Int(millis)) => Utc.timestamp_millis_opt(*millis).single(),
            Some(Value::Double(millis)) => Utc.timestamp_millis_opt(*millis as i64).single(),
            // A Date hint without parameters means "now".
            _ => Some(Utc::now()),
        },
        _ => Some(Utc::now()),
    }
}
