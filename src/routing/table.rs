//! The axum-backed route table.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
};
use thiserror::Error;

use super::{Method, Router};
use crate::handler::{normalize_chain, normalize_group, Chain, ContractError, Handler, Layer};
use crate::pipeline::Pipeline;

/// Body of the health check response.
pub const PING_BODY: &str = "OK";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("invalid route path `{0}`")]
    InvalidUri(String),

    #[error("{method} {path} is already bound")]
    Duplicate { method: String, path: String },

    #[error("route path `{path}` conflicts with `{existing}`")]
    Conflict { path: String, existing: String },

    #[error(transparent)]
    Contract(#[from] ContractError),
}

#[derive(Clone, Default)]
struct PathEntry {
    methods: Vec<(axum::http::Method, Chain)>,
    any: Option<Chain>,
}

impl PathEntry {
    fn lookup(&self, method: &axum::http::Method) -> Option<&Chain> {
        self.methods
            .iter()
            .find(|(bound, _)| bound == method)
            .map(|(_, chain)| chain)
            .or(self.any.as_ref())
    }

    fn allow(&self) -> String {
        self.methods
            .iter()
            .map(|(method, _)| method.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Every chain bound so far, keyed by full path.
#[derive(Clone, Default)]
pub struct RouteTable {
    entries: BTreeMap<String, PathEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .values()
            .map(|entry| entry.methods.len() + usize::from(entry.any.is_some()))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(method, path)` for every binding, sorted by path.
    pub fn bindings(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (path, entry) in &self.entries {
            for (method, _) in &entry.methods {
                out.push((method.to_string(), path.clone()));
            }
            if entry.any.is_some() {
                out.push((Method::Any.to_string(), path.clone()));
            }
        }
        out
    }

    fn root(&mut self) -> Group<'_> {
        Group {
            table: self,
            prefix: "/".to_string(),
            layers: Vec::new(),
        }
    }

    fn insert(
        &mut self,
        path: String,
        method: Option<axum::http::Method>,
        chain: Chain,
    ) -> Result<(), RouteError> {
        if let Some(existing) = self
            .entries
            .keys()
            .find(|existing| paths_conflict(existing, &path))
        {
            return Err(RouteError::Conflict {
                existing: existing.clone(),
                path,
            });
        }

        let entry = self.entries.entry(path.clone()).or_default();

        match method {
            Some(method) => {
                if entry.methods.iter().any(|(bound, _)| *bound == method) {
                    return Err(RouteError::Duplicate {
                        method: method.to_string(),
                        path,
                    });
                }
                entry.methods.push((method, chain));
            }
            None => {
                if entry.any.is_some() {
                    return Err(RouteError::Duplicate {
                        method: Method::Any.to_string(),
                        path,
                    });
                }
                entry.any = Some(chain);
            }
        }

        Ok(())
    }

    /// Assemble an axum router. Each path dispatches on method itself so that
    /// explicit methods take precedence over the wildcard.
    ///
    /// `ping` answers `GET` with `200 OK` ahead of anything bound at that path.
    pub fn into_axum(&self, pipeline: Arc<Pipeline>, ping: Option<&str>) -> axum::Router {
        let mut paths: BTreeMap<String, Option<PathEntry>> = self
            .entries
            .iter()
            .map(|(path, entry)| (path.clone(), Some(entry.clone())))
            .collect();
        if let Some(ping) = ping {
            paths.entry(escape_braces(ping)).or_insert(None);
        }
        let ping = ping.map(escape_braces);

        let mut router = axum::Router::new();
        for (path, entry) in paths {
            let dispatch = Arc::new(Dispatch {
                route: path.clone(),
                ping: ping.as_deref() == Some(path.as_str()),
                entry,
                pipeline: pipeline.clone(),
            });

            router = router.route(
                &path,
                any(move |request: Request<Body>| {
                    let dispatch = dispatch.clone();
                    async move { dispatch.call(request).await }
                }),
            );
        }

        router
    }
}

struct Dispatch {
    route: String,
    ping: bool,
    entry: Option<PathEntry>,
    pipeline: Arc<Pipeline>,
}

impl Dispatch {
    async fn call(&self, request: Request<Body>) -> Response {
        if self.ping && *request.method() == axum::http::Method::GET {
            return (StatusCode::OK, PING_BODY).into_response();
        }

        let chain = self
            .entry
            .as_ref()
            .and_then(|entry| entry.lookup(request.method()));

        match chain {
            Some(chain) => {
                self.pipeline
                    .handle(&self.route, chain.clone(), request)
                    .await
            }
            None => self.method_not_allowed(),
        }
    }

    fn method_not_allowed(&self) -> Response {
        let mut allow = self
            .entry
            .as_ref()
            .map(PathEntry::allow)
            .unwrap_or_default();
        if self.ping {
            allow = if allow.is_empty() {
                "GET".to_string()
            } else {
                format!("GET, {}", allow)
            };
        }

        let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
        if let Ok(value) = HeaderValue::from_str(&allow) {
            response.headers_mut().insert(header::ALLOW, value);
        }
        response
    }
}

/// A view of the table under a path prefix with group middleware.
pub struct Group<'a> {
    table: &'a mut RouteTable,
    prefix: String,
    layers: Vec<Arc<dyn Layer>>,
}

impl Group<'_> {
    fn bind_chain(
        &mut self,
        method: Option<axum::http::Method>,
        uri: &str,
        handlers: &[Handler],
    ) -> Result<(), RouteError> {
        validate_uri(uri)?;
        let chain = normalize_chain(handlers)?.with_group(&self.layers);
        let path = route_pattern(&join_paths(&self.prefix, uri))?;
        self.table.insert(path, method, chain)
    }
}

impl Router for Group<'_> {
    fn sub_router(
        &mut self,
        prefix: &str,
        middlewares: &[Handler],
    ) -> Result<Box<dyn Router + '_>, RouteError> {
        validate_uri(prefix)?;
        let mut layers = self.layers.clone();
        layers.extend(normalize_group(middlewares)?);

        Ok(Box::new(Group {
            prefix: join_paths(&self.prefix, prefix),
            table: self.table,
            layers,
        }))
    }

    fn bind(&mut self, method: Method, uri: &str, handlers: &[Handler]) -> Result<(), RouteError> {
        match method.to_http() {
            Some(method) => self.bind_chain(Some(method), uri, handlers),
            None => self.bind_any(uri, handlers),
        }
    }

    fn bind_any(&mut self, uri: &str, handlers: &[Handler]) -> Result<(), RouteError> {
        self.bind_chain(None, uri, handlers)
    }
}

impl Router for RouteTable {
    fn sub_router(
        &mut self,
        prefix: &str,
        middlewares: &[Handler],
    ) -> Result<Box<dyn Router + '_>, RouteError> {
        validate_uri(prefix)?;
        Ok(Box::new(Group {
            prefix: join_paths("/", prefix),
            layers: normalize_group(middlewares)?,
            table: self,
        }))
    }

    fn bind(&mut self, method: Method, uri: &str, handlers: &[Handler]) -> Result<(), RouteError> {
        self.root().bind(method, uri, handlers)
    }

    fn bind_any(&mut self, uri: &str, handlers: &[Handler]) -> Result<(), RouteError> {
        self.root().bind_any(uri, handlers)
    }
}

fn validate_uri(uri: &str) -> Result<(), RouteError> {
    if uri
        .chars()
        .any(|c| c.is_whitespace() || c == '?' || c == '#')
    {
        return Err(RouteError::InvalidUri(uri.to_string()));
    }
    Ok(())
}

/// Translate a joined path into an axum pattern.
///
/// `:name` segments become `{name}` and `*name` becomes `{*name}`. Captures
/// must span a whole segment and a catch-all must be the last segment.
fn route_pattern(path: &str) -> Result<String, RouteError> {
    let invalid = || RouteError::InvalidUri(path.to_string());
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;

    let mut out = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        let capture = if let Some(name) = segment.strip_prefix(':') {
            Capture::Param(name)
        } else if let Some(name) = segment.strip_prefix('*') {
            Capture::CatchAll(name)
        } else if let Some(inner) = segment
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        {
            match inner.strip_prefix('*') {
                Some(name) => Capture::CatchAll(name),
                None => Capture::Param(inner),
            }
        } else if segment.contains(&['{', '}', '*'][..]) {
            return Err(invalid());
        } else {
            Capture::Static(segment)
        };

        match capture {
            Capture::Static(segment) => out.push(segment.to_string()),
            Capture::Param(name) if is_capture_name(name) => out.push(format!("{{{}}}", name)),
            Capture::CatchAll(name) if is_capture_name(name) && i == last => {
                out.push(format!("{{*{}}}", name))
            }
            _ => return Err(invalid()),
        }
    }

    Ok(out.join("/"))
}

enum Capture<'a> {
    Static(&'a str),
    Param(&'a str),
    CatchAll(&'a str),
}

fn is_capture_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_capture(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

/// Whether axum would refuse to hold both patterns: at the first position
/// where they differ, both capture.
fn paths_conflict(a: &str, b: &str) -> bool {
    a.split('/')
        .zip(b.split('/'))
        .find(|(x, y)| x != y)
        .is_some_and(|(x, y)| is_capture(x) && is_capture(y))
}

fn escape_braces(path: &str) -> String {
    path.replace('{', "{{").replace('}', "}}")
}

/// Join a group prefix and a relative path.
///
/// Duplicate separators collapse, `.` and `..` segments resolve, and a
/// trailing `/` on `relative` is kept.
pub fn join_paths(prefix: &str, relative: &str) -> String {
    if relative.is_empty() {
        return clean_path(prefix, false);
    }
    clean_path(&format!("{}/{}", prefix, relative), relative.ends_with('/'))
}

fn clean_path(path: &str, trailing_slash: bool) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    let mut cleaned = format!("/{}", segments.join("/"));
    if trailing_slash && !cleaned.ends_with('/') {
        cleaned.push('/');
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Outcome, RequestContext};
    use crate::handler::Next;
    use crate::routing::{route, RouteList, RouteMap, Routes};

    async fn ok(_req: Request<Body>) -> StatusCode {
        StatusCode::OK
    }

    async fn pass(_ctx: RequestContext, req: Request<Body>, next: Next) -> Outcome {
        next.run(req).await
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/", ""), "/");
        assert_eq!(join_paths("/", "/a"), "/a");
        assert_eq!(join_paths("/api", "v1/"), "/api/v1/");
        assert_eq!(join_paths("/api/", "/v1"), "/api/v1");
        assert_eq!(join_paths("/api//v1", "./x/../y"), "/api/v1/y");
        assert_eq!(join_paths("/api", ""), "/api");
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let mut table = RouteTable::new();
        table.bind(Method::Get, "/a", &[Handler::raw(ok)]).unwrap();
        table.bind(Method::Post, "/a", &[Handler::raw(ok)]).unwrap();
        table.bind_any("/a", &[Handler::raw(ok)]).unwrap();

        assert_eq!(
            table.bind(Method::Get, "/a/", &[Handler::raw(ok)]).err(),
            None,
            "trailing slash is a different path"
        );
        assert_eq!(
            table.bind(Method::Get, "/a", &[Handler::raw(ok)]),
            Err(RouteError::Duplicate {
                method: "GET".into(),
                path: "/a".into()
            })
        );
        assert!(matches!(
            table.bind(Method::Any, "/a", &[Handler::raw(ok)]),
            Err(RouteError::Duplicate { .. })
        ));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_failed_chain_leaves_table_unchanged() {
        let mut table = RouteTable::new();
        let err = table
            .bind(Method::Get, "/a", &[Handler::raw(ok), Handler::raw(ok)])
            .unwrap_err();

        assert!(matches!(err, RouteError::Contract(ContractError::TerminalNotLast { .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn test_invalid_uri() {
        let mut table = RouteTable::new();
        assert!(matches!(
            table.bind(Method::Get, "/a b", &[Handler::raw(ok)]),
            Err(RouteError::InvalidUri(_))
        ));
        assert!(matches!(
            table.sub_router("/x?y", &[]).err(),
            Some(RouteError::InvalidUri(_))
        ));
    }

    #[test]
    fn test_route_pattern() {
        assert_eq!(route_pattern("/user/:id").unwrap(), "/user/{id}");
        assert_eq!(route_pattern("/files/*rest").unwrap(), "/files/{*rest}");
        assert_eq!(route_pattern("/user/{id}/posts").unwrap(), "/user/{id}/posts");
        assert_eq!(route_pattern("/a:b").unwrap(), "/a:b");

        for bad in ["/a/*x/b", "/a/:", "/a/{}", "/a/x{y}", "/a/{x", "/a/:x-y", "/a/*rest/"] {
            assert_eq!(route_pattern(bad), Err(RouteError::InvalidUri(bad.into())), "{}", bad);
        }
    }

    #[test]
    fn test_capture_conflicts_rejected() {
        let mut table = RouteTable::new();
        table.bind(Method::Get, "/a/:x", &[Handler::raw(ok)]).unwrap();
        table.bind(Method::Post, "/a/{x}", &[Handler::raw(ok)]).unwrap();
        table.bind(Method::Get, "/a/:x/b", &[Handler::raw(ok)]).unwrap();
        table.bind(Method::Get, "/a/static", &[Handler::raw(ok)]).unwrap();

        assert_eq!(
            table.bind(Method::Get, "/a/{y}", &[Handler::raw(ok)]),
            Err(RouteError::Conflict {
                path: "/a/{y}".into(),
                existing: "/a/{x}".into()
            })
        );
        assert!(matches!(
            table.bind_any("/a/*rest", &[Handler::raw(ok)]),
            Err(RouteError::Conflict { .. })
        ));
        assert!(matches!(
            table.bind(Method::Get, "/a/*x/b", &[Handler::raw(ok)]),
            Err(RouteError::InvalidUri(_))
        ));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_group_middleware_must_be_middleware() {
        let mut table = RouteTable::new();
        assert!(matches!(
            table.sub_router("/api", &[Handler::raw(ok)]).err(),
            Some(RouteError::Contract(ContractError::GroupHandler { .. }))
        ));

        let mut api = table.sub_router("/api", &[Handler::middleware(pass)]).unwrap();
        api.bind(Method::Get, "/users", &[Handler::raw(ok)]).unwrap();
        drop(api);

        assert_eq!(table.bindings(), vec![("GET".to_string(), "/api/users".to_string())]);
    }

    #[test]
    fn test_route_declarations_register() {
        let routes = RouteMap::new()
            .with(
                "/api",
                RouteList::new(vec![
                    route("/users", Method::Get, vec![Handler::raw(ok)]),
                    route("/users", Method::Any, vec![Handler::raw(ok)]),
                ]),
            )
            .with("", RouteList::new(vec![route("/", Method::Get, vec![Handler::raw(ok)])]));

        let mut table = RouteTable::new();
        routes.register(&mut table).unwrap();

        assert_eq!(
            table.bindings(),
            vec![
                ("GET".to_string(), "/".to_string()),
                ("GET".to_string(), "/api/users".to_string()),
                ("ANY".to_string(), "/api/users".to_string()),
            ]
        );
    }
}
