//! Session resolution at the identity-subsystem boundary.

use std::sync::Arc;

use uuid::Uuid;

use crate::application::repos::{RepoError, SessionsRepo};
use crate::domain::viewer::Viewer;

#[derive(Clone)]
pub struct AuthService {
    sessions: Arc<dyn SessionsRepo>,
}

impl AuthService {
    pub fn new(sessions: Arc<dyn SessionsRepo>) -> Self {
        Self { sessions }
    }

    /// Resolve an optional session token to the request viewer. Unknown or
    /// absent tokens are an anonymous viewer, not an error.
    pub async fn resolve(&self, token: Option<Uuid>) -> Result<Viewer, RepoError> {
        let Some(token) = token else {
            return Ok(Viewer::Anonymous);
        };

        Ok(self
            .sessions
            .find_session_author(token)
            .await?
            .map(Viewer::Authenticated)
            .unwrap_or(Viewer::Anonymous))
    }
}
