//! HTTP handlers for heracles.

pub mod admin;
pub mod identity;
pub mod metrics;
pub mod session;
pub mod tokens;
pub mod validate;

pub use admin::*;
pub use identity::*;
pub use session::{login, logout, logout_redirect};
pub use tokens::*;
pub use validate::validate;
