use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{RepoError, SessionsRepo};
use crate::domain::entities::AuthorRecord;

use super::authors::AuthorRow;
use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl SessionsRepo for PostgresRepositories {
    async fn find_session_author(
        &self,
        token: Uuid,
    ) -> Result<Option<AuthorRecord>, RepoError> {
        let row: Option<AuthorRow> = sqlx::query_as(
            "SELECT a.id, a.username, a.display_name, a.created_at \
             FROM sessions s JOIN authors a ON a.id = s.author_id \
             WHERE s.token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(AuthorRecord::from))
    }
}
