mod identity;
mod jwt_service;

pub use identity::*;
pub use jwt_service::*;
