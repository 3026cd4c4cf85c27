//! Route table for the front controller, plus the operational routes served directly by axum.

pub mod common;

pub use common::common_routes;

use crate::error::RouteError;
use crate::router::Router;

const ID: &str = "{id:[0-9]+}";

/// Every application route, in match order.
pub fn app_routes() -> Result<Router, RouteError> {
    let mut r = Router::new();
    let certificate = format!("/certificates/{}", ID);
    let customer = format!("/customers/{}", ID);
    let certificate_type = format!("/certificate-types/{}", ID);
    let user = format!("/users/{}", ID);

    r.get("/", "Home", "index")?
        .get("/about", "Home", "about")?
        .get("/contact", "Home", "contact")?;

    r.get("/certificates", "Certificate", "index")?
        .get("/certificates/expiring", "Certificate", "expiring")?
        .get(&certificate, "Certificate", "show")?
        .post("/certificates", "Certificate", "store")?
        .put(&certificate, "Certificate", "update")?
        .delete(&certificate, "Certificate", "destroy")?
        .post(&format!("{}/status", certificate), "Certificate", "status")?
        .get(&format!("{}/observations", certificate), "Certificate", "observations")?
        .post(&format!("{}/observations", certificate), "Observation", "store")?;

    r.get("/observations", "Observation", "index")?
        .get("/observations/dangerous", "Observation", "dangerous")?;

    r.get("/customers", "Customer", "index")?
        .get(&customer, "Customer", "show")?
        .post("/customers", "Customer", "store")?
        .put(&customer, "Customer", "update")?
        .delete(&customer, "Customer", "destroy")?
        .get(&format!("{}/certificates", customer), "Customer", "certificates")?;

    r.get("/certificate-types", "CertificateType", "index")?
        .get(&certificate_type, "CertificateType", "show")?
        .post(&format!("{}/toggle", certificate_type), "CertificateType", "toggle")?;

    r.get(&user, "User", "show")?
        .get(&format!("{}/permissions", user), "User", "permissions")?;

    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers;
    use axum::http::Method;

    #[test]
    fn every_route_targets_a_registered_action() {
        let router = app_routes().unwrap();
        let registry = controllers::registry();
        for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
            for route in router.routes(&method) {
                let controller = &route.defaults["controller"];
                let action = &route.defaults["action"];
                let target = registry
                    .get(controller)
                    .unwrap_or_else(|| panic!("no controller {}", controller));
                assert!(
                    target.actions().contains(&action.as_str()),
                    "{} {} -> {}::{}",
                    method,
                    route.pattern.source(),
                    controller,
                    action
                );
            }
        }
    }

    #[test]
    fn resolves_representative_paths() {
        let router = app_routes().unwrap();
        let m = router.resolve("/certificates/17/observations", &Method::POST).unwrap();
        assert_eq!(m.controller(), Some("Observation"));
        assert_eq!(m.params.get("id").map(String::as_str), Some("17"));

        let m = router.resolve("/certificates/expiring?days=7", &Method::GET).unwrap();
        assert_eq!(m.action(), Some("expiring"));

        assert!(router.resolve("/certificates/abc", &Method::GET).is_none());
        assert!(router.resolve("/certificates/1", &Method::PATCH).is_none());
    }
}
