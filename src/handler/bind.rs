//! Binding query strings and JSON bodies into request types.
//!
//! # Order
//! 1. The request type starts from its `Default` value.
//! 2. Query pairs are laid over it, each parsed as the JSON kind of the field
//!    it lands on.
//! 3. For non-GET requests declaring `application/json`, the body is read
//!    and merged over the result. Body fields always win.
//! 4. One typed deserialization produces the bound value.

use std::time::Duration;

use axum::{
    body::Body,
    extract::Query,
    http::{header, Method, Request},
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Limits applied while binding, set per server.
#[derive(Debug, Clone, Copy)]
pub struct BindLimits {
    pub max_body_bytes: usize,
    pub read_timeout: Option<Duration>,
}

impl Default for BindLimits {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024,
            read_timeout: None,
        }
    }
}

/// Malformed input. Always reported as 400 with the bad-request code.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("fail to parse query with error: {0}")]
    Query(String),

    #[error("invalid request content type or invalid JSON in body with error: {0}")]
    Body(String),
}

/// Bind `request` into a fresh `T`.
///
/// Binding starts from `T::default()`, so fields absent from both the query
/// and the body keep their zero value whether or not the type opts into
/// `#[serde(default)]`.
pub async fn bind_request<T>(request: Request<Body>) -> Result<T, BindError>
where
    T: DeserializeOwned + Serialize + Default,
{
    let limits = request
        .extensions()
        .get::<BindLimits>()
        .copied()
        .unwrap_or_default();

    let mut merged = match serde_json::to_value(T::default()) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::Object(Map::new()),
    };

    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .map_err(|e| BindError::Query(e.body_text()))?;
    let query = query_overlay(&merged, pairs);
    merge_object(&mut merged, query);

    if *request.method() == Method::GET || !is_json(&request) {
        return serde_json::from_value(merged).map_err(|e| BindError::Query(e.to_string()));
    }

    // Surface query errors as such before the body is read.
    serde_json::from_value::<T>(merged.clone()).map_err(|e| BindError::Query(e.to_string()))?;

    let body = read_body(request.into_body(), &limits).await?;
    let overlay = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            return Err(BindError::Body(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            )))
        }
        Err(e) => return Err(BindError::Body(e.to_string())),
    };
    merge_object(&mut merged, overlay);

    serde_json::from_value(merged).map_err(|e| BindError::Body(e.to_string()))
}

/// Turn query pairs into JSON fields, typed after the matching field of `base`.
///
/// Repeated keys collect into an array when the field is a sequence; otherwise
/// the last value wins.
fn query_overlay(base: &Value, pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut fields = Map::new();

    for (key, raw) in pairs {
        let like = base.get(&key);
        match like {
            Some(Value::Array(items)) => {
                let value = coerce(&raw, items.first());
                match fields.get_mut(&key) {
                    Some(Value::Array(collected)) => collected.push(value),
                    _ => {
                        fields.insert(key, Value::Array(vec![value]));
                    }
                }
            }
            _ => {
                let value = coerce(&raw, like);
                fields.insert(key, value);
            }
        }
    }

    fields
}

/// Parse a query value into the JSON kind of `like`. Values that do not parse
/// stay strings and fail later, in typed deserialization.
fn coerce(raw: &str, like: Option<&Value>) -> Value {
    match like {
        Some(Value::Number(_)) => parse_number(raw).unwrap_or_else(|| Value::String(raw.to_string())),
        Some(Value::Bool(_)) => match raw {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Value::Bool(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        Some(Value::Object(_)) => match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => value,
            _ => Value::String(raw.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Value::from(n));
    }
    if let Ok(n) = raw.parse::<u64>() {
        return Some(Value::from(n));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// Whether the request declares a JSON body. Parameters such as `charset` are ignored.
pub fn is_json(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

async fn read_body(body: Body, limits: &BindLimits) -> Result<axum::body::Bytes, BindError> {
    let read = axum::body::to_bytes(body, limits.max_body_bytes);

    let result = match limits.read_timeout {
        Some(timeout) => tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| BindError::Body(format!("body read timed out after {:?}", timeout)))?,
        None => read.await,
    };

    result.map_err(|e| BindError::Body(e.to_string()))
}

/// Overlay `overlay` onto `base`. Nested objects merge, everything else is replaced.
fn merge_object(base: &mut Value, overlay: Map<String, Value>) {
    let Value::Object(fields) = base else {
        *base = Value::Object(overlay);
        return;
    };

    for (key, value) in overlay {
        if let Value::Object(nested) = value {
            if let Some(existing) = fields.get_mut(&key).filter(|v| v.is_object()) {
                merge_object(existing, nested);
                continue;
            }
            fields.insert(key, Value::Object(nested));
        } else {
            fields.insert(key, value);
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct ProjectList {
        uid: i64,
        project_id: i64,
        limit: i32,
        filter: Filter,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Filter {
        owner: String,
        archived: bool,
    }

    fn request(method: Method, uri: &str, content_type: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_query_only() {
        let req = request(Method::GET, "/list?uid=906&limit=20", None, "");
        let bound: ProjectList = bind_request(req).await.unwrap();

        assert_eq!(bound.uid, 906);
        assert_eq!(bound.limit, 20);
        assert_eq!(bound.project_id, 0);
    }

    #[tokio::test]
    async fn test_body_overrides_query() {
        let req = request(
            Method::POST,
            "/list?uid=906&limit=5",
            Some("application/json; charset=utf-8"),
            r#"{"project_id": 888, "limit": 20, "filter": {"owner": "huandu"}}"#,
        );
        let bound: ProjectList = bind_request(req).await.unwrap();

        assert_eq!(bound.uid, 906);
        assert_eq!(bound.project_id, 888);
        assert_eq!(bound.limit, 20);
        assert_eq!(bound.filter.owner, "huandu");
        assert!(!bound.filter.archived);
    }

    #[tokio::test]
    async fn test_get_ignores_body() {
        let req = request(
            Method::GET,
            "/list?uid=1",
            Some("application/json"),
            r#"{"uid": 2}"#,
        );
        let bound: ProjectList = bind_request(req).await.unwrap();
        assert_eq!(bound.uid, 1);
    }

    #[tokio::test]
    async fn test_non_json_body_ignored() {
        let req = request(Method::POST, "/list?uid=1", Some("text/plain"), "uid=2");
        let bound: ProjectList = bind_request(req).await.unwrap();
        assert_eq!(bound.uid, 1);
    }

    #[tokio::test]
    async fn test_malformed_input() {
        let req = request(Method::POST, "/list", Some("application/json"), r#"{"project_id"}"#);
        assert!(matches!(bind_request::<ProjectList>(req).await, Err(BindError::Body(_))));

        let req = request(Method::POST, "/list", Some("application/json"), "[1, 2]");
        let err = bind_request::<ProjectList>(req).await.unwrap_err();
        assert!(err.to_string().contains("an array"), "{}", err);

        let req = request(Method::POST, "/list", Some("application/json"), "");
        assert!(matches!(bind_request::<ProjectList>(req).await, Err(BindError::Body(_))));

        let req = request(Method::GET, "/list?uid=abc", None, "");
        assert!(matches!(bind_request::<ProjectList>(req).await, Err(BindError::Query(_))));

        let req = request(Method::POST, "/list", Some("application/json"), r#"{"limit": "many"}"#);
        assert!(matches!(bind_request::<ProjectList>(req).await, Err(BindError::Body(_))));
    }

    #[tokio::test]
    async fn test_body_limit() {
        let mut req = request(
            Method::POST,
            "/list",
            Some("application/json"),
            r#"{"filter": {"owner": "a-rather-long-owner-name"}}"#,
        );
        req.extensions_mut().insert(BindLimits {
            max_body_bytes: 8,
            read_timeout: None,
        });
        assert!(matches!(bind_request::<ProjectList>(req).await, Err(BindError::Body(_))));
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Login {
        username: String,
        passport: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Search {
        tags: Vec<String>,
        page: u32,
        exact: bool,
        ratio: f64,
    }

    #[tokio::test]
    async fn test_plain_struct_binds_from_body() {
        let req = request(
            Method::POST,
            "/login",
            Some("application/json"),
            r#"{"username": "huandu", "passport": "p"}"#,
        );
        let bound: Login = bind_request(req).await.unwrap();
        assert_eq!(bound.username, "huandu");
        assert_eq!(bound.passport, "p");

        let req = request(Method::POST, "/login?passport=q", Some("application/json"), "{}");
        let bound: Login = bind_request(req).await.unwrap();
        assert_eq!(bound.username, "");
        assert_eq!(bound.passport, "q");
    }

    #[tokio::test]
    async fn test_query_values_follow_field_types() {
        let req = request(
            Method::GET,
            "/search?tags=a&tags=b&page=3&exact=1&ratio=0.5",
            None,
            "",
        );
        let bound: Search = bind_request(req).await.unwrap();
        assert_eq!(bound.tags, vec!["a", "b"]);
        assert_eq!(bound.page, 3);
        assert!(bound.exact);
        assert_eq!(bound.ratio, 0.5);

        let req = request(Method::GET, "/search?page=-1", None, "");
        assert!(matches!(bind_request::<Search>(req).await, Err(BindError::Query(_))));
    }

    #[test]
    fn test_merge_replaces_non_objects() {
        let mut base = json!({"a": [1, 2], "b": {"c": 1, "d": 2}});
        let overlay = json!({"a": [3], "b": {"c": 9}, "e": true});
        let Value::Object(overlay) = overlay else { unreachable!() };

        merge_object(&mut base, overlay);
        assert_eq!(base, json!({"a": [3], "b": {"c": 9, "d": 2}, "e": true}));
    }
}
