mod actions;
mod auth;
mod middleware;
mod public;

pub use auth::{LOGIN_PATH, SESSION_COOKIE, login_redirect};
pub use public::{HttpState, build_router};
