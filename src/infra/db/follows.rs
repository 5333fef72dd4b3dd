use async_trait::async_trait;

use crate::application::repos::{FollowsRepo, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl FollowsRepo for PostgresRepositories {
    async fn insert_edge(&self, follower_id: i64, followee_id: i64) -> Result<(), RepoError> {
        // Insert-if-absent in one statement: concurrent follows of the same
        // pair cannot produce duplicates. Self-edges trip the CHECK
        // constraint and surface as an integrity error.
        sqlx::query(
            "INSERT INTO follows (follower_id, followee_id) VALUES ($1, $2) \
             ON CONFLICT (follower_id, followee_id) DO NOTHING",
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(self.pool())
        .await
        .map(|_| ())
        .map_err(map_sqlx_error)
    }

    async fn delete_edge(&self, follower_id: i64, followee_id: i64) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower_id)
            .bind(followee_id)
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    async fn edge_exists(&self, follower_id: i64, followee_id: i64) -> Result<bool, RepoError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn followee_ids(&self, follower_id: i64) -> Result<Vec<i64>, RepoError> {
        sqlx::query_scalar(
            "SELECT followee_id FROM follows WHERE follower_id = $1 ORDER BY followee_id",
        )
        .bind(follower_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
