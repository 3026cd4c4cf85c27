//! Application controllers.

mod certificate;
mod certificate_type;
mod customer;
mod home;
mod observation;
mod user;

pub use certificate::CertificateController;
pub use certificate_type::CertificateTypeController;
pub use customer::CustomerController;
pub use home::HomeController;
pub use observation::ObservationController;
pub use user::UserController;

use crate::controller::ControllerRegistry;
use crate::error::{AppError, RouteError};

/// Every controller the route table refers to.
pub fn registry() -> ControllerRegistry {
    let mut registry = ControllerRegistry::new();
    registry
        .register(HomeController)
        .register(CertificateController)
        .register(CustomerController)
        .register(CertificateTypeController)
        .register(ObservationController)
        .register(UserController);
    registry
}

fn unknown_action(controller: &str, action: &str) -> AppError {
    RouteError::ActionNotFound {
        controller: format!("{}Controller", controller),
        action: action.to_string(),
    }
    .into()
}

fn not_found(what: &str, id: i64) -> AppError {
    AppError::NotFound(format!("{} {}", what, id))
}
