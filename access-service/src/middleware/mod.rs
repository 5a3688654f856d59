pub mod auth;
pub mod guard;

pub use auth::{auth_middleware, AuthUser};
pub use guard::{permission_middleware, ServiceRoute};
