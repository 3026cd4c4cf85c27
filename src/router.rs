//! Ordered, per-method route table. Patterns like `/certificates/{id:[0-9]+}` are parsed into
//! segments at registration and compiled once into an anchored, case-insensitive regex.
//! Resolution is first match in registration order.

use crate::controller::{ControllerRegistry, RequestContext};
use crate::error::{AppError, RouteError};
use axum::http::Method;
use axum::response::Response;
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashMap;

/// Capture pattern for `{name}` without an explicit regex.
pub const DEFAULT_CAPTURE: &str = "[a-z-]+";

/// Route parameters in pattern order: defaults first, captures overlaid.
pub type Params = IndexMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Capture { name: String, pattern: Option<String> },
}

/// A parsed and compiled route pattern.
#[derive(Clone, Debug)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
    regex: Regex,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let invalid = |message: String| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            message,
        };
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            if c == '}' {
                return Err(invalid("unmatched '}'".into()));
            }
            if c != '{' {
                literal.push(c);
                continue;
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            // Capture body up to the matching brace; the regex part may contain `{m,n}`.
            let mut body = String::new();
            let mut depth = 1;
            for c in chars.by_ref() {
                match c {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                body.push(c);
            }
            if depth != 0 {
                return Err(invalid("unclosed '{'".into()));
            }
            let (name, capture) = match body.split_once(':') {
                Some((name, re)) => (name.trim(), Some(re.to_string())),
                None => (body.trim(), None),
            };
            let valid_name = name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid_name {
                return Err(invalid(format!("invalid parameter name '{}'", name)));
            }
            if capture.as_deref() == Some("") {
                return Err(invalid(format!("empty pattern for parameter '{}'", name)));
            }
            segments.push(Segment::Capture {
                name: name.to_string(),
                pattern: capture,
            });
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let mut re = String::from("(?i)^");
        for segment in &segments {
            match segment {
                Segment::Literal(text) => re.push_str(&regex::escape(text)),
                Segment::Capture { name, pattern } => {
                    let p = pattern.as_deref().unwrap_or(DEFAULT_CAPTURE);
                    re.push_str(&format!("(?P<{}>{})", name, p));
                }
            }
        }
        re.push('$');
        let regex = Regex::new(&re).map_err(|e| invalid(e.to_string()))?;
        Ok(RoutePattern {
            source: pattern.to_string(),
            segments,
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Captured values by parameter name, when the whole path matches.
    fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.segments
                .iter()
                .filter_map(|s| match s {
                    Segment::Capture { name, .. } => caps
                        .name(name)
                        .map(|m| (name.clone(), m.as_str().to_string())),
                    Segment::Literal(_) => None,
                })
                .collect(),
        )
    }
}

#[derive(Clone, Debug)]
pub struct Route {
    pub pattern: RoutePattern,
    pub defaults: Params,
}

/// Outcome of a successful resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteMatch {
    pub pattern: String,
    pub params: Params,
}

impl RouteMatch {
    pub fn controller(&self) -> Option<&str> {
        self.params.get("controller").map(String::as_str)
    }

    pub fn action(&self) -> Option<&str> {
        self.params.get("action").map(String::as_str)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pattern` for `method`. Later registrations never shadow earlier ones.
    pub fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        defaults: Params,
    ) -> Result<&mut Self, RouteError> {
        let pattern = RoutePattern::parse(pattern)?;
        tracing::debug!(method = %method, pattern = pattern.source(), "route registered");
        self.routes
            .entry(method)
            .or_default()
            .push(Route { pattern, defaults });
        Ok(self)
    }

    fn add_action(
        &mut self,
        method: Method,
        pattern: &str,
        controller: &str,
        action: &str,
    ) -> Result<&mut Self, RouteError> {
        let mut defaults = Params::new();
        defaults.insert("controller".into(), controller.into());
        defaults.insert("action".into(), action.into());
        self.add_route(method, pattern, defaults)
    }

    pub fn get(&mut self, pattern: &str, controller: &str, action: &str) -> Result<&mut Self, RouteError> {
        self.add_action(Method::GET, pattern, controller, action)
    }

    pub fn post(&mut self, pattern: &str, controller: &str, action: &str) -> Result<&mut Self, RouteError> {
        self.add_action(Method::POST, pattern, controller, action)
    }

    pub fn put(&mut self, pattern: &str, controller: &str, action: &str) -> Result<&mut Self, RouteError> {
        self.add_action(Method::PUT, pattern, controller, action)
    }

    pub fn delete(&mut self, pattern: &str, controller: &str, action: &str) -> Result<&mut Self, RouteError> {
        self.add_action(Method::DELETE, pattern, controller, action)
    }

    pub fn routes(&self, method: &Method) -> &[Route] {
        self.routes.get(method).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First route for `method` whose pattern matches `path` (query string ignored).
    pub fn resolve(&self, path: &str, method: &Method) -> Option<RouteMatch> {
        let path = strip_query(path);
        self.routes(method).iter().find_map(|route| {
            let captures = route.pattern.captures(path)?;
            let mut params = route.defaults.clone();
            for (name, value) in captures {
                params.insert(name, value);
            }
            Some(RouteMatch {
                pattern: route.pattern.source().to_string(),
                params,
            })
        })
    }

    pub fn matches(&self, path: &str, method: &Method) -> bool {
        self.resolve(path, method).is_some()
    }

    /// Resolve and run the target action. `controller`/`action` are taken out of the
    /// parameters; the rest become positional arguments in pattern order.
    pub async fn dispatch(
        &self,
        registry: &ControllerRegistry,
        method: &Method,
        path: &str,
        ctx: RequestContext,
    ) -> Result<Response, AppError> {
        let path = strip_query(path);
        let mut params = self
            .resolve(path, method)
            .ok_or_else(|| RouteError::RouteNotFound(path.to_string()))?
            .params;
        let controller = params.shift_remove("controller").filter(|c| !c.is_empty());
        let action = params.shift_remove("action").filter(|a| !a.is_empty());
        let (Some(controller), Some(action)) = (controller, action) else {
            return Err(RouteError::ControllerNotSpecified.into());
        };
        let class = format!("{}Controller", controller);
        let target = registry
            .get(&controller)
            .ok_or_else(|| RouteError::ControllerNotFound(class.clone()))?;
        if !target.actions().contains(&action.as_str()) {
            return Err(RouteError::ActionNotFound {
                controller: class,
                action,
            }
            .into());
        }
        tracing::debug!(controller = %class, action = %action, "dispatch");
        target
            .invoke(&action, params.into_values().collect(), ctx)
            .await
    }
}

pub fn strip_query(path: &str) -> &str {
    path.split_once('?').map(|(p, _)| p).unwrap_or(path)
}

/// Method the request is routed as: a POST whose `_method` field is exactly `PUT` or `DELETE`
/// is treated as that method; anything else keeps the real method.
pub fn effective_method(method: &Method, override_field: Option<&str>) -> Method {
    if *method != Method::POST {
        return method.clone();
    }
    match override_field {
        Some("PUT") => Method::PUT,
        Some("DELETE") => Method::DELETE,
        _ => Method::POST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn certificates() -> Router {
        let mut router = Router::new();
        router
            .get("/certificates/{id:[0-9]+}", "Certificate", "show")
            .unwrap();
        router
    }

    #[test]
    fn numeric_capture_matches_digits_only() {
        let router = certificates();
        let m = router.resolve("/certificates/42", &Method::GET).unwrap();
        assert_eq!(m.controller(), Some("Certificate"));
        assert_eq!(m.action(), Some("show"));
        assert_eq!(m.params.get("id").map(String::as_str), Some("42"));

        assert!(router.resolve("/certificates/abc", &Method::GET).is_none());
        assert!(router.resolve("/certificates/42/extra", &Method::GET).is_none());
        assert!(router.resolve("/certificates/42", &Method::POST).is_none());
    }

    #[test]
    fn default_capture_and_case_insensitivity() {
        let mut router = Router::new();
        router.get("/customers/{slug}", "Customer", "show").unwrap();
        let m = router.resolve("/CUSTOMERS/acme-ltd", &Method::GET).unwrap();
        assert_eq!(m.params.get("slug").map(String::as_str), Some("acme-ltd"));
        assert!(router.resolve("/customers/acme_ltd", &Method::GET).is_none());
    }

    #[test]
    fn query_string_is_ignored() {
        let router = certificates();
        assert!(router.matches("/certificates/7?tab=observations", &Method::GET));
    }

    #[test]
    fn first_registration_wins() {
        let mut router = Router::new();
        router.get("/certificates/{ref:[a-z0-9-]+}", "Certificate", "byReference").unwrap();
        router.get("/certificates/{id:[0-9]+}", "Certificate", "show").unwrap();
        let m = router.resolve("/certificates/42", &Method::GET).unwrap();
        assert_eq!(m.action(), Some("byReference"));
        assert_eq!(m.params.get("ref").map(String::as_str), Some("42"));
    }

    #[test]
    fn captures_overlay_defaults_in_order() {
        let mut router = Router::new();
        let mut defaults = Params::new();
        defaults.insert("controller".into(), "Observation".into());
        defaults.insert("action".into(), "index".into());
        defaults.insert("id".into(), "0".into());
        router
            .add_route(Method::GET, "/certificates/{id:\\d+}/observations/{code:C[1-3]|FI}", defaults)
            .unwrap();
        let m = router
            .resolve("/certificates/9/observations/c2", &Method::GET)
            .unwrap();
        let keys: Vec<&String> = m.params.keys().collect();
        assert_eq!(keys, ["controller", "action", "id", "code"]);
        assert_eq!(m.params["id"], "9");
        assert_eq!(m.params["code"], "c2");
    }

    #[test]
    fn literals_are_escaped_and_nested_braces_parse() {
        let mut router = Router::new();
        router.get("/export.json", "Home", "index").unwrap();
        router.get("/years/{year:[0-9]{4}}", "Home", "index").unwrap();
        assert!(router.matches("/export.json", &Method::GET));
        assert!(!router.matches("/exportxjson", &Method::GET));
        assert!(router.matches("/years/2024", &Method::GET));
        assert!(!router.matches("/years/24", &Method::GET));
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        let mut router = Router::new();
        for bad in ["/a/{id", "/a/id}", "/a/{1id}", "/a/{id:}", "/a/{id:[0-9}"] {
            assert!(
                matches!(router.get(bad, "Home", "index"), Err(RouteError::InvalidPattern { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn method_override_applies_to_put_and_delete_only() {
        assert_eq!(effective_method(&Method::POST, Some("PUT")), Method::PUT);
        assert_eq!(effective_method(&Method::POST, Some("DELETE")), Method::DELETE);
        assert_eq!(effective_method(&Method::POST, Some("PATCH")), Method::POST);
        assert_eq!(effective_method(&Method::POST, Some("put")), Method::POST);
        assert_eq!(effective_method(&Method::POST, None), Method::POST);
        assert_eq!(effective_method(&Method::GET, Some("DELETE")), Method::GET);
    }
}
