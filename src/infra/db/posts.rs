use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::application::repos::{
    CreatePostParams, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::PostRecord;

use super::{PostgresRepositories, map_sqlx_error};

const POST_COLUMNS: &str = "p.id, p.body, p.created_at, p.author_id, \
     a.username AS author_username, a.display_name AS author_display_name, \
     p.group_id, g.slug AS group_slug, g.title AS group_title, p.image_path";

const POST_JOINS: &str = "FROM posts p \
     JOIN authors a ON a.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id";

// The feed total order: primary key `created_at` descending, ties broken
// by insertion order.
const FEED_ORDER: &str = "ORDER BY p.created_at DESC, p.id DESC";

#[derive(Debug, FromRow)]
struct PostRow {
    id: i64,
    body: String,
    created_at: OffsetDateTime,
    author_id: i64,
    author_username: String,
    author_display_name: String,
    group_id: Option<i64>,
    group_slug: Option<String>,
    group_title: Option<String>,
    image_path: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            body: row.body,
            created_at: row.created_at,
            author_id: row.author_id,
            author_username: row.author_username,
            author_display_name: row.author_display_name,
            group_id: row.group_id,
            group_slug: row.group_slug,
            group_title: row.group_title,
            image_path: row.image_path,
        }
    }
}

fn into_records(rows: Vec<PostRow>) -> Vec<PostRecord> {
    rows.into_iter().map(PostRecord::from).collect()
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(&self) -> Result<Vec<PostRecord>, RepoError> {
        let rows: Vec<PostRow> =
            sqlx::query_as(&format!("SELECT {POST_COLUMNS} {POST_JOINS} {FEED_ORDER}"))
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(into_records(rows))
    }

    async fn list_posts_by_group(&self, group_id: i64) -> Result<Vec<PostRecord>, RepoError> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} {POST_JOINS} WHERE p.group_id = $1 {FEED_ORDER}"
        ))
        .bind(group_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(into_records(rows))
    }

    async fn list_posts_by_author(&self, author_id: i64) -> Result<Vec<PostRecord>, RepoError> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} {POST_JOINS} WHERE p.author_id = $1 {FEED_ORDER}"
        ))
        .bind(author_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(into_records(rows))
    }

    async fn list_posts_by_authors(
        &self,
        author_ids: &[i64],
    ) -> Result<Vec<PostRecord>, RepoError> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} {POST_JOINS} WHERE p.author_id = ANY($1) {FEED_ORDER}"
        ))
        .bind(author_ids.to_vec())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(into_records(rows))
    }

    async fn find_post_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let row: Option<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} {POST_JOINS} WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (body, author_id, group_id, image_path) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&params.body)
        .bind(params.author_id)
        .bind(params.group_id)
        .bind(&params.image_path)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.find_post_by_id(id)
            .await?
            .ok_or_else(|| RepoError::from_persistence("created post vanished before re-read"))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let updated: Option<i64> = sqlx::query_scalar(
            "UPDATE posts SET body = $2, group_id = $3, image_path = $4 \
             WHERE id = $1 RETURNING id",
        )
        .bind(params.id)
        .bind(&params.body)
        .bind(params.group_id)
        .bind(&params.image_path)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let id = updated.ok_or(RepoError::NotFound)?;
        self.find_post_by_id(id)
            .await?
            .ok_or_else(|| RepoError::from_persistence("updated post vanished before re-read"))
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
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
