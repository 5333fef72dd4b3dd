use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::application::repos::{AuthorsRepo, RepoError};
use crate::domain::entities::AuthorRecord;

use super::{PostgresRepositories, map_sqlx_error};

const AUTHOR_COLUMNS: &str = "id, username, display_name, created_at";

#[derive(Debug, FromRow)]
pub(super) struct AuthorRow {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub created_at: OffsetDateTime,
}

impl From<AuthorRow> for AuthorRecord {
    fn from(row: AuthorRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            display_name: row.display_name,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AuthorsRepo for PostgresRepositories {
    async fn find_author_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AuthorRecord>, RepoError> {
        let row: Option<AuthorRow> = sqlx::query_as(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(AuthorRecord::from))
    }

    async fn find_author_by_id(&self, id: i64) -> Result<Option<AuthorRecord>, RepoError> {
        let row: Option<AuthorRow> =
            sqlx::query_as(&format!("SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(row.map(AuthorRecord::from))
    }

    async fn delete_author(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
