//! Follow-graph mutations and lookups.

use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{AuthorsRepo, FollowsRepo, RepoError};
use crate::domain::entities::AuthorRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    /// Self-loop attempt. The storage CHECK constraint backs this up; the
    /// service rejecting it first keeps the defect out of the database log.
    #[error("an author cannot follow themselves")]
    SelfFollow,
    #[error("unknown author")]
    UnknownAuthor,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
    authors: Arc<dyn AuthorsRepo>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowsRepo>, authors: Arc<dyn AuthorsRepo>) -> Self {
        Self { follows, authors }
    }

    /// Create the edge `follower → followee`. Idempotent: the edge is
    /// inserted if absent and re-following is a no-op.
    pub async fn follow(
        &self,
        follower: &AuthorRecord,
        followee_username: &str,
    ) -> Result<(), FollowError> {
        let followee = self.resolve(followee_username).await?;
        if followee.id == follower.id {
            return Err(FollowError::SelfFollow);
        }

        self.follows
            .insert_edge(follower.id, followee.id)
            .await
            .map_err(FollowError::from)
    }

    /// Remove the edge if present; removing an absent edge is a no-op.
    pub async fn unfollow(
        &self,
        follower: &AuthorRecord,
        followee_username: &str,
    ) -> Result<(), FollowError> {
        let followee = self.resolve(followee_username).await?;
        self.follows
            .delete_edge(follower.id, followee.id)
            .await
            .map_err(FollowError::from)
    }

    pub async fn is_following(
        &self,
        follower_id: i64,
        followee_id: i64,
    ) -> Result<bool, RepoError> {
        self.follows.edge_exists(follower_id, followee_id).await
    }

    pub async fn followees_of(&self, follower_id: i64) -> Result<Vec<i64>, RepoError> {
        self.follows.followee_ids(follower_id).await
    }

    async fn resolve(&self, username: &str) -> Result<AuthorRecord, FollowError> {
        self.authors
            .find_author_by_username(username)
            .await?
            .ok_or(FollowError::UnknownAuthor)
    }
}
