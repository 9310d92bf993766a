//! Request parameter validation.
//!
//! A [`Validator`] reads raw values from one request ([`Inputs`]) and runs
//! checkers against them. Checkers never stop the chain: every failure is
//! appended to one error list, and the route only proceeds once
//! [`Validator::finish`] reports no errors.
//!
//! ```ignore
//! let mut v = Validator::new(&inputs).tracking(["count"]);
//! let count = v.integer(Location::Query, "count", Need::OrDefault(100), Bounds::between(1, 100));
//! let checked = v.finish(|| Some(ListParams { count: count? }))?;
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value as Json;

use crate::api::pagination::SearchParams;

static INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(0|[1-9][0-9]*)$").expect("integer pattern"));

/// Standard alphabet with mandatory padding.
pub static BASE64: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=|[A-Za-z0-9+/]{4})$")
        .expect("base64 pattern")
});

pub static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("hex color pattern"));

/// Where a parameter (or a failure) comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Url,
    Query,
    Body,
    Status,
    Internal,
}

impl Location {
    fn label(self) -> &'static str {
        match self {
            Location::Url => "Url",
            Location::Query => "Query",
            Location::Body => "Body",
            Location::Status => "Status",
            Location::Internal => "Internal",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decides the HTTP status of a failed request; never serialized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorKind {
    #[default]
    Invalid,
    NotFound,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldError {
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub message: String,
    #[serde(skip)]
    pub kind: ErrorKind,
}

impl FieldError {
    pub fn new(location: Location, name: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            location,
            name: name.map(str::to_string),
            message: message.into(),
            kind: ErrorKind::Invalid,
        }
    }

    /// Business-state failure with no parameter name (e.g. a closed task).
    pub fn status(message: impl Into<String>) -> Self {
        Self::new(Location::Status, None, message)
    }

    pub fn not_found(location: Location, name: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            ..Self::new(location, name, message)
        }
    }
}

/// How a checker treats an absent value.
#[derive(Clone, Debug, PartialEq)]
pub enum Need<T> {
    /// Absent ⇒ "Missing ... Parameter" error.
    Mandatory,
    /// Absent ⇒ skipped.
    Optional,
    /// Absent ⇒ the given value.
    OrDefault(T),
}

/// Inclusive integer bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bounds {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl Bounds {
    pub const NONE: Bounds = Bounds {
        min: None,
        max: None,
    };

    pub fn min(min: i64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn between(min: i64, max: i64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    fn contains(&self, v: i64) -> bool {
        self.min.map_or(true, |m| v >= m) && self.max.map_or(true, |m| v <= m)
    }
}

/// Raw values of one request, by location.
#[derive(Clone, Debug, Default)]
pub struct Inputs {
    url: HashMap<String, String>,
    query: HashMap<String, String>,
    body: serde_json::Map<String, Json>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, params: HashMap<String, String>) -> Self {
        self.url = params;
        self
    }

    pub fn with_url_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.url.insert(name.to_string(), value.into());
        self
    }

    pub fn with_query(mut self, params: HashMap<String, String>) -> Self {
        self.query = params;
        self
    }

    /// A non-object body is treated as empty.
    pub fn with_body(mut self, body: Json) -> Self {
        self.body = match body {
            Json::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        self
    }

    pub fn get(&self, at: Location, name: &str) -> Option<Json> {
        match at {
            Location::Url => self.url.get(name).cloned().map(Json::String),
            Location::Query => self.query.get(name).cloned().map(Json::String),
            Location::Body => self.body.get(name).filter(|v| !v.is_null()).cloned(),
            Location::Status | Location::Internal => None,
        }
    }
}

/// Parameters that passed validation, plus the search metadata recorded on the way.
#[derive(Clone, Debug)]
pub struct Checked<T> {
    pub params: T,
    pub search: SearchParams,
}

pub struct Validator<'a> {
    inputs: &'a Inputs,
    errors: Vec<FieldError>,
    tracked: BTreeSet<String>,
    search: SearchParams,
}

impl<'a> Validator<'a> {
    pub fn new(inputs: &'a Inputs) -> Self {
        Self {
            inputs,
            errors: Vec::new(),
            tracked: BTreeSet::new(),
            search: SearchParams::default(),
        }
    }

    /// Register parameters whose accepted values are echoed as search metadata.
    pub fn tracking<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracked.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Append `error` when `failed` holds.
    pub fn check(&mut self, failed: bool, error: impl FnOnce() -> FieldError) {
        if failed {
            self.errors.push(error());
        }
    }

    pub fn search(&self) -> &SearchParams {
        &self.search
    }

    /// Close the chain. With no errors the parameters are built; `build`
    /// returning `None` means a mandatory value was not collected.
    pub fn finish<T>(self, build: impl FnOnce() -> Option<T>) -> Result<Checked<T>, Vec<FieldError>> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        match build() {
            Some(params) => Ok(Checked {
                params,
                search: self.search,
            }),
            None => Err(vec![FieldError::new(
                Location::Internal,
                None,
                "Incomplete request parameters",
            )]),
        }
    }

    fn record(&mut self, name: &str, value: impl Into<Json>) {
        if self.tracked.contains(name) {
            self.search.insert(name, value.into());
        }
    }

    fn invalid(&mut self, at: Location, name: &str, reason: &str) {
        self.errors.push(FieldError::new(
            at,
            Some(name),
            format!("Invalid {at} Parameter '{name}', {reason}"),
        ));
    }

    /// Presence step shared by all checkers. `Err(value)` short-cuts with the
    /// default (or nothing); `Ok(raw)` hands the present value to the coercion.
    fn presence<T>(&mut self, at: Location, name: &str, need: Need<T>) -> Result<Json, Option<T>> {
        match (self.inputs.get(at, name), need) {
            (Some(raw), _) => Ok(raw),
            (None, Need::Mandatory) => {
                self.errors.push(FieldError::new(
                    at,
                    Some(name),
                    format!("Missing {at} Parameter '{name}'"),
                ));
                Err(None)
            }
            (None, Need::Optional) => Err(None),
            (None, Need::OrDefault(v)) => Err(Some(v)),
        }
    }

    pub fn integer(&mut self, at: Location, name: &str, need: Need<i64>, bounds: Bounds) -> Option<i64> {
        let value = match self.presence(at, name, need) {
            Ok(raw) => match coerce_integer(&raw) {
                None => {
                    self.invalid(at, name, "it is not a number");
                    None
                }
                Some(v) if !bounds.contains(v) => {
                    self.invalid(at, name, "out of bound");
                    None
                }
                Some(v) => Some(v),
            },
            Err(default) => default,
        };
        if let Some(v) = value {
            self.record(name, v);
        }
        value
    }

    pub fn boolean(&mut self, at: Location, name: &str, need: Need<bool>) -> Option<bool> {
        let value = match self.presence(at, name, need) {
            Ok(raw) => Some(coerce_boolean(&raw)),
            Err(default) => default,
        };
        if let Some(v) = value {
            self.record(name, v);
        }
        value
    }

    pub fn regexp(
        &mut self,
        at: Location,
        name: &str,
        pattern: &Regex,
        label: Option<&str>,
        need: Need<String>,
    ) -> Option<String> {
        let value = match self.presence(at, name, need) {
            Ok(Json::String(s)) if pattern.is_match(&s) => Some(s),
            Ok(_) => {
                let message = match label {
                    Some(label) => format!("Invalid {at} Parameter '{name}', it is not a valid {label}"),
                    None => format!("Invalid {at} Parameter '{name}'"),
                };
                self.errors.push(FieldError::new(at, Some(name), message));
                None
            }
            Err(default) => default,
        };
        if let Some(v) = &value {
            self.record(name, v.clone());
        }
        value
    }

    pub fn base64(&mut self, at: Location, name: &str, need: Need<String>) -> Option<String> {
        self.regexp(at, name, &BASE64, Some("Base64 String"), need)
    }

    pub fn string(&mut self, at: Location, name: &str, allow_empty: bool, need: Need<String>) -> Option<String> {
        let value = match self.presence(at, name, need) {
            Ok(Json::String(s)) if s.is_empty() && !allow_empty => {
                self.invalid(at, name, "it cannot be empty");
                None
            }
            Ok(Json::String(s)) => Some(s),
            Ok(_) => {
                self.invalid(at, name, "it is not a string");
                None
            }
            Err(default) => default,
        };
        if let Some(v) = &value {
            self.record(name, v.clone());
        }
        value
    }

    /// An array, or a string holding a JSON array. `item` both checks and maps
    /// every element; a single rejected element fails the parameter.
    pub fn array<T>(
        &mut self,
        at: Location,
        name: &str,
        need: Need<Vec<T>>,
        item: impl Fn(&Json) -> Option<T>,
    ) -> Option<Vec<T>> {
        let raw = match self.presence(at, name, need) {
            Ok(raw) => raw,
            Err(default) => return default,
        };
        let items = match raw {
            Json::Array(items) => Some(items),
            Json::String(s) => match serde_json::from_str::<Json>(&s) {
                Ok(Json::Array(items)) => Some(items),
                _ => None,
            },
            _ => None,
        };
        let Some(items) = items else {
            self.invalid(at, name, "it is not an Array");
            return None;
        };
        let mapped: Option<Vec<T>> = items.iter().map(&item).collect();
        if mapped.is_none() {
            self.invalid(at, name, "some Array items are not valid");
        }
        mapped
    }

    /// Integer id resolved through `resolve`. Unresolved ids are validation
    /// failures (404 for url ids); resolver errors are returned as-is.
    pub async fn id<R, E, F, Fut>(
        &mut self,
        at: Location,
        name: &str,
        model: &str,
        need: Need<i64>,
        resolve: F,
    ) -> Result<Option<R>, E>
    where
        F: FnOnce(i64) -> Fut,
        Fut: Future<Output = Result<Option<R>, E>>,
    {
        let id = match self.presence(at, name, need) {
            Ok(raw) => match coerce_integer(&raw) {
                None if at == Location::Url => {
                    self.errors.push(FieldError::new(
                        at,
                        Some(name),
                        format!("Invalid {model} '{name}', it is not a number"),
                    ));
                    None
                }
                Some(v) if v < 0 && at == Location::Url => {
                    self.errors.push(FieldError::new(
                        at,
                        Some(name),
                        format!("Invalid {model} '{name}', must be greater than 0"),
                    ));
                    None
                }
                None => {
                    self.invalid(at, name, "it is not a number");
                    None
                }
                Some(v) if v < 0 => {
                    self.invalid(at, name, "out of bound");
                    None
                }
                Some(v) => Some(v),
            },
            Err(default) => default,
        };
        let Some(id) = id else {
            return Ok(None);
        };

        match resolve(id).await? {
            Some(record) => {
                self.record(name, id);
                Ok(Some(record))
            }
            None => {
                let error = if at == Location::Url {
                    FieldError::not_found(at, Some(name), format!("Unable to find {model} {id}"))
                } else {
                    FieldError::new(
                        at,
                        Some(name),
                        format!("Unable to find {model} {id} in {at} Parameter '{name}'"),
                    )
                };
                self.errors.push(error);
                Ok(None)
            }
        }
    }
}

/// JSON integer, or a string in canonical integer form.
pub fn coerce_integer(raw: &Json) -> Option<i64> {
    match raw {
        Json::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64)),
        Json::String(s) if INTEGER.is_match(s) => s.parse().ok(),
        _ => None,
    }
}

/// `false`, `"false"` and `"0"` are false; any other present value is true.
pub fn coerce_boolean(raw: &Json) -> bool {
    !matches!(raw, Json::Bool(false)) && !matches!(raw.as_str(), Some("false") | Some("0"))
}
