//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{AuthorRecord, CommentRecord, GroupRecord, PostRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: i64,
    pub body: String,
    pub group_id: Option<i64>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub body: String,
    pub group_id: Option<i64>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: i64,
    pub author_id: i64,
    pub body: String,
}

#[async_trait]
pub trait AuthorsRepo: Send + Sync {
    async fn find_author_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AuthorRecord>, RepoError>;

    async fn find_author_by_id(&self, id: i64) -> Result<Option<AuthorRecord>, RepoError>;

    /// Removes the author. Posts, comments, follow edges and sessions go
    /// with them (declared CASCADE policy).
    async fn delete_author(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    async fn find_group_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError>;

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError>;

    /// Removes the group. Its posts stay and lose their group reference
    /// (declared SET NULL policy).
    async fn delete_group(&self, id: i64) -> Result<(), RepoError>;
}

/// Read side of the post store. Every listing returns the feed total order
/// `(created_at DESC, id DESC)`.
#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn list_posts(&self) -> Result<Vec<PostRecord>, RepoError>;

    async fn list_posts_by_group(&self, group_id: i64) -> Result<Vec<PostRecord>, RepoError>;

    async fn list_posts_by_author(&self, author_id: i64) -> Result<Vec<PostRecord>, RepoError>;

    async fn list_posts_by_authors(&self, author_ids: &[i64])
    -> Result<Vec<PostRecord>, RepoError>;

    async fn find_post_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    async fn delete_post(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Comments for a post, newest first.
    async fn list_comments_for_post(&self, post_id: i64)
    -> Result<Vec<CommentRecord>, RepoError>;

    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    /// Atomic insert-if-absent; inserting an existing edge is a no-op.
    /// A self-edge violates the storage CHECK constraint and surfaces as
    /// [`RepoError::Integrity`].
    async fn insert_edge(&self, follower_id: i64, followee_id: i64) -> Result<(), RepoError>;

    /// Removes the edge; absent edges are a no-op.
    async fn delete_edge(&self, follower_id: i64, followee_id: i64) -> Result<(), RepoError>;

    async fn edge_exists(&self, follower_id: i64, followee_id: i64) -> Result<bool, RepoError>;

    async fn followee_ids(&self, follower_id: i64) -> Result<Vec<i64>, RepoError>;
}

/// Boundary interface of the external identity subsystem: the only
/// identity operation this crate performs is resolving a session token.
#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn find_session_author(&self, token: Uuid) -> Result<Option<AuthorRecord>, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn check(&self) -> Result<(), RepoError>;
}
