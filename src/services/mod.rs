//! Business services behind the HTTP handlers.

mod auth;
mod content;

pub use auth::AuthService;
pub use content::{ContentService, PageWindow};
