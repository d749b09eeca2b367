//! Request preparation.
//!
//! Resource methods describe a call with a [`RequestSpec`] (HTTP method, path
//! template, parameters) and hand it to a [`Preparer`], which turns it into a
//! concrete [`RequestDescriptor`]. Preparation is a pure function of its
//! inputs: no I/O and no credential access happen here.

use std::collections::BTreeMap;

use reqwest::Method;
use serde_json::Value;

use crate::utils;

/// Body of an outbound request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// Everything a transport needs to put a request on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Body,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            query: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns a copy carrying the given `Authorization` value.
    ///
    /// The original is left untouched so that a retried send never aliases the first attempt.
    pub fn authorized(&self, authorization: &str) -> Self {
        let mut request = self.clone();
        request.set_header("Authorization", authorization);
        request
    }

    pub fn is_idempotent(&self) -> bool {
        matches!(self.method, Method::GET | Method::PUT | Method::DELETE)
    }
}

/// A single parameter value as supplied by a resource method.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    List(Vec<String>),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ParamValue {
    fn render(&self) -> String {
        match self {
            ParamValue::Str(s) => s.clone(),
            ParamValue::List(items) => utils::comma_join(items),
            ParamValue::Int(n) => n.to_string(),
            ParamValue::Float(f) => f.to_string(),
            ParamValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue::Str(value.clone())
    }
}

impl<S: AsRef<str>> From<&[S]> for ParamValue {
    fn from(value: &[S]) -> Self {
        ParamValue::List(value.iter().map(|s| s.as_ref().to_string()).collect())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::List(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// Logical description of a resource call.
///
/// ```rust,ignore
/// let spec = RequestSpec::new(Method::GET, "/artists/{id}/albums")
///     .path("id", artist_id)
///     .query("limit", Some(20u32))
///     .query("include_groups", None::<&str>)
///     .locale("market");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    method: Method,
    path: String,
    path_params: Vec<(&'static str, String)>,
    query: Vec<(&'static str, ParamValue)>,
    body: Body,
    locale_param: Option<&'static str>,
    absolute: bool,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: Vec::new(),
            query: Vec::new(),
            body: Body::Empty,
            locale_param: None,
            absolute: false,
        }
    }

    /// Spec for a fully qualified URL, e.g. a `next` link from a paged response.
    pub fn absolute(method: Method, url: impl Into<String>) -> Self {
        Self {
            absolute: true,
            ..Self::new(method, url)
        }
    }

    pub fn path(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.path_params.push((name, value.into()));
        self
    }

    /// Adds a query parameter; `None` values are dropped.
    pub fn query<V: Into<ParamValue>>(mut self, name: &'static str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.query.push((name, value.into()));
        }
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Body::Json(strip_nulls(body));
        self
    }

    /// Marks the call as locale-aware: `name` is filled with the user's country
    /// when the caller did not set it explicitly.
    pub fn locale(mut self, name: &'static str) -> Self {
        self.locale_param = Some(name);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

/// Turns [`RequestSpec`]s into [`RequestDescriptor`]s.
#[derive(Debug, Clone)]
pub struct Preparer {
    base_url: String,
    locale: Option<String>,
}

impl Preparer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            locale: None,
        }
    }

    /// Sets the locale to inject into locale-aware requests, if known.
    pub fn with_locale(mut self, locale: Option<String>) -> Self {
        self.locale = locale;
        self
    }

    pub fn prepare(&self, spec: RequestSpec) -> RequestDescriptor {
        let mut path = spec.path;
        for (name, value) in &spec.path_params {
            path = path.replace(&format!("{{{name}}}"), value);
        }
        let url = if spec.absolute {
            path
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };

        let mut query: Vec<(String, String)> = spec
            .query
            .iter()
            .map(|(name, value)| (name.to_string(), value.render()))
            .collect();

        if let (Some(param), Some(locale)) = (spec.locale_param, &self.locale) {
            if !query.iter().any(|(name, _)| name == param) {
                query.push((param.to_string(), locale.clone()));
            }
        }

        let mut request = RequestDescriptor::new(spec.method, url);
        request.query = query;
        if let Body::Json(_) = spec.body {
            request.set_header("Content-Type", "application/json");
        }
        request.body = spec.body;
        request
    }

    /// `GET /me`, the current user's profile.
    pub fn me(&self) -> RequestDescriptor {
        self.prepare(RequestSpec::new(Method::GET, "/me"))
    }

    /// Same endpoint as [`Preparer::me`]; the caller inspects `product`.
    pub fn is_premium(&self) -> RequestDescriptor {
        self.me()
    }

    /// Cheapest call that needs authorization but no scope.
    pub fn check_authorization(&self) -> RequestDescriptor {
        self.prepare(
            RequestSpec::new(Method::GET, "/search")
                .query("q", Some("Hey spotify"))
                .query("type", Some("track"))
                .query("limit", Some(1u32)),
        )
    }
}

fn strip_nulls(body: Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, value)| !value.is_null())
                .collect(),
        ),
        other => other,
    }
}
