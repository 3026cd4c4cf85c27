//! axum application: operational routes plus a fallback front controller that feeds every
//! other request through the application router.

use crate::controller::RequestContext;
use crate::error::AppError;
use crate::record::Record;
use crate::router::effective_method;
use crate::routes::common_routes;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, Uri},
    response::Response,
    Router,
};
use serde_json::Value;
use tower_http::limit::RequestBodyLimitLayer;

const METHOD_FIELD: &str = "_method";

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit;
    Router::new()
        .merge(common_routes())
        .fallback(front_controller)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

async fn front_controller(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let show_details = state.show_details();
    match handle(state, method, uri, &headers, &body).await {
        Ok(response) => response,
        Err(e) => {
            if e.status().0.is_server_error() {
                tracing::error!(error = %e, "request failed");
            } else {
                tracing::debug!(error = %e, "request rejected");
            }
            e.into_response_with(show_details)
        }
    }
}

async fn handle(
    state: AppState,
    method: Method,
    uri: Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, AppError> {
    let mut body = parse_body(headers, body)?;
    // Only a body field can override the method; a query-string `_method` is dropped.
    let method = effective_method(&method, body.get_str(METHOD_FIELD));
    body.remove(METHOD_FIELD);

    let mut input = uri.query().map(parse_form).unwrap_or_default();
    input.remove(METHOD_FIELD);
    input.merge(body);

    let path = uri.path().to_string();
    tracing::debug!(method = %method, path = %path, "request");
    let ctx = RequestContext::new(state.clone(), method.clone(), path.clone(), input);
    state
        .router
        .dispatch(&state.controllers, &method, &path, ctx)
        .await
}

fn parse_form(raw: &str) -> Record {
    url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

/// Form or JSON body fields; other content types contribute nothing.
fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<Record, AppError> {
    if body.is_empty() {
        return Ok(Record::new());
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type.starts_with("application/x-www-form-urlencoded") {
        let text = std::str::from_utf8(body)
            .map_err(|_| AppError::BadRequest("form body is not valid UTF-8".into()))?;
        return Ok(parse_form(text));
    }
    if content_type.starts_with("application/json") {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))?;
        return Record::from_value(value)
            .ok_or_else(|| AppError::BadRequest("body must be a JSON object".into()));
    }
    Ok(Record::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::controllers;
    use crate::router::Router as AppRouter;
    use crate::testing::{self, certificate_input};
    use axum::{body::Body, http::Request, http::StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        read(app.clone().oneshot(request).await.unwrap()).await
    }

    async fn send_form(app: &Router, uri: &str, form: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap();
        read(app.clone().oneshot(request).await.unwrap()).await
    }

    async fn read(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn app() -> Router {
        build_app(testing::test_state().await)
    }

    #[tokio::test]
    async fn operational_routes() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, "GET", "/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "ok");

        let (_, body) = send(&app, "GET", "/version", None).await;
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn home_page() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["title"], "CertiFlow - Electrical Testing Certificate Management");
    }

    #[tokio::test]
    async fn certificate_by_numeric_id() {
        let app = app().await;
        let (status, created) = send(&app, "POST", "/certificates", Some(certificate_input().into_value())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["meta"]["id"], "1");
        let reference = created["data"]["reference_number"].as_str().unwrap().to_string();
        assert!(reference.starts_with("GE-"));

        let (status, body) = send(&app, "GET", "/certificates/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["reference_number"], reference.as_str());
        assert_eq!(body["data"]["status"], "draft");

        let (status, body) = send(&app, "GET", "/certificates/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "no route matched for /certificates/abc");

        let (status, _) = send(&app, "GET", "/certificates/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn prefix_setting_overrides_config() {
        let state = testing::test_state().await;
        {
            let mut db = state.database();
            db.execute(
                "INSERT INTO settings (setting_key, setting_value) VALUES ('certificate_prefix', 'CF-')",
                (),
            )
            .await
            .unwrap();
        }
        let app = build_app(state);
        let (_, created) = send(&app, "POST", "/certificates", Some(certificate_input().into_value())).await;
        assert!(created["data"]["reference_number"].as_str().unwrap().starts_with("CF-"));
    }

    #[tokio::test]
    async fn validation_failures_are_422_with_field_map() {
        let app = app().await;
        let (status, body) = send(&app, "POST", "/customers", Some(json!({ "first_name": "Dee" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "validation_error");
        assert_eq!(body["error"]["details"]["last_name"], "last_name is required");
        assert!(body["error"]["details"].get("first_name").is_none());
    }

    #[tokio::test]
    async fn form_post_with_method_override() {
        let app = app().await;
        send(&app, "POST", "/certificates", Some(certificate_input().into_value())).await;

        let (status, body) = send_form(&app, "/certificates/1", "_method=PUT&installation_city=Bradford").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["installation_city"], "Bradford");

        let (status, body) = send_form(&app, "/certificates/1", "_method=DELETE").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], true);

        let (status, _) = send(&app, "GET", "/certificates/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Lowercase override is not honoured: POST /certificates/1 has no route.
        let (status, _) = send_form(&app, "/certificates/1", "_method=delete").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn query_string_cannot_override_method() {
        let app = app().await;
        send(&app, "POST", "/certificates", Some(certificate_input().into_value())).await;

        let (status, body) = send(&app, "POST", "/certificates/1?_method=DELETE", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "no route matched for /certificates/1");

        let (status, _) = send(&app, "GET", "/certificates/1", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn status_change_and_expiring_query() {
        let app = app().await;
        let today = chrono::Local::now().date_naive();
        let soon = (today + chrono::Duration::days(10)).format("%Y-%m-%d").to_string();
        let input = certificate_input().with("expiry_date", soon.as_str()).into_value();
        send(&app, "POST", "/certificates", Some(input)).await;

        let (_, body) = send(&app, "GET", "/certificates/expiring?days=30", None).await;
        assert_eq!(body["meta"]["count"], 0);

        let (status, body) = send(&app, "POST", "/certificates/1/status", Some(json!({ "status": "issued" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "issued");

        let (_, body) = send(&app, "GET", "/certificates/expiring?days=30", None).await;
        assert_eq!(body["meta"]["count"], 1);
        let (_, body) = send(&app, "GET", "/certificates/expiring?days=5", None).await;
        assert_eq!(body["meta"]["count"], 0);

        let (status, _) = send(&app, "POST", "/certificates/1/status", Some(json!({ "status": "void" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn expiring_window_beyond_the_calendar_is_a_bad_request() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/certificates/expiring?days=1000000000000", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "bad request: days out of range");

        let (status, _) = send(&app, "GET", "/certificates/expiring?days=-1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn observation_batch_and_listing() {
        let app = app().await;
        send(&app, "POST", "/certificates", Some(certificate_input().into_value())).await;
        let item = |priority: &str, code: &str| {
            json!({
                "code": code,
                "description": "No RCD protection",
                "recommendation": "Install RCD",
                "priority": priority,
            })
        };

        let (status, body) = send(
            &app,
            "POST",
            "/certificates/1/observations",
            Some(json!({ "observations": [item("C2", "4.1"), item("C1", "4.2")] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["meta"]["count"], 2);

        let (status, body) = send(
            &app,
            "POST",
            "/certificates/1/observations",
            Some(json!({ "observations": [item("C3", "5.1"), item("X9", "5.2")] })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["details"]["1.priority"], "priority must be one of: C1, C2, C3, FI");

        let (_, body) = send(&app, "GET", "/certificates/1/observations", None).await;
        let codes: Vec<&str> = body["data"].as_array().unwrap().iter().map(|o| o["code"].as_str().unwrap()).collect();
        assert_eq!(codes, ["4.2", "4.1"]);

        let (_, body) = send(&app, "GET", "/observations/dangerous", None).await;
        assert_eq!(body["data"][0]["code"], "4.2");

        let (status, _) = send(&app, "POST", "/certificates/9/observations", Some(item("C1", "1"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn user_show_hides_password() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/users/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["username"], "jsparks");
        assert_eq!(body["data"]["role"]["name"], "engineer");
        assert!(body["data"].get("password").is_none());

        let (_, body) = send(&app, "GET", "/users/1/permissions", None).await;
        assert_eq!(body["meta"]["count"], 2);
    }

    #[tokio::test]
    async fn certificate_types_toggle() {
        let app = app().await;
        let (_, body) = send(&app, "GET", "/certificate-types", None).await;
        assert_eq!(body["meta"]["count"], 2);
        let (_, body) = send(&app, "GET", "/certificate-types?all=1", None).await;
        assert_eq!(body["meta"]["count"], 3);

        let (status, body) = send(&app, "POST", "/certificate-types/2/toggle", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["active"], 1);
    }

    #[tokio::test]
    async fn server_errors_hide_details_outside_development() {
        let mut config = testing::test_config();
        config.app.environment = Environment::Production;
        let app = build_app(testing::state_with(config).await);
        send(&app, "POST", "/certificates", Some(certificate_input().into_value())).await;

        // Foreign key violation: the customer still has a certificate.
        let (status, body) = send(&app, "DELETE", "/customers/1", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], crate::error::GENERIC_ERROR_MESSAGE);
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn dispatch_errors_name_the_controller() {
        let mut router = AppRouter::new();
        router
            .get("/ghost", "Ghost", "index")
            .unwrap()
            .get("/home-missing", "Home", "missing")
            .unwrap()
            .add_route(Method::GET, "/bare", Default::default())
            .unwrap();
        let state = AppState::new(
            testing::memory_pool().await,
            testing::test_config(),
            router,
            controllers::registry(),
        );
        let app = build_app(state);

        let (status, body) = send(&app, "GET", "/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "controller GhostController not found");

        let (_, body) = send(&app, "GET", "/home-missing", None).await;
        assert_eq!(body["error"]["message"], "method missing not found in controller HomeController");

        let (_, body) = send(&app, "GET", "/bare", None).await;
        assert_eq!(body["error"]["message"], "controller and action not specified");
    }

    #[test]
    fn later_input_sources_win() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        let mut input = parse_form("city=Leeds&page=2");
        input.merge(parse_body(&headers, br#"{"city":"York"}"#).unwrap());
        assert_eq!(input.get_str("city"), Some("York"));
        assert_eq!(input.get_str("page"), Some("2"));

        assert!(parse_body(&headers, b"[1,2]").is_err());
        assert!(parse_body(&headers, b"{oops").is_err());
        assert!(parse_body(&HeaderMap::new(), b"raw").unwrap().is_empty());
    }
}
