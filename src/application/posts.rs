//! Post and comment lifecycle: detail view, authoring, editing, comments.

use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams,
};
use crate::domain::entities::{AuthorRecord, CommentRecord, GroupRecord, PostRecord};

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post not found")]
    NotFound,
    #[error("post body must not be empty")]
    EmptyBody,
    #[error("unknown group")]
    UnknownGroup,
    #[error("only the author may change a post")]
    NotAuthor,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A post together with its comment list, newest first.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub comments: Vec<CommentRecord>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    groups: Arc<dyn GroupsRepo>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        groups: Arc<dyn GroupsRepo>,
    ) -> Self {
        Self {
            posts,
            posts_write,
            comments,
            groups,
        }
    }

    pub async fn detail(&self, id: i64) -> Result<PostDetail, PostError> {
        let post = self
            .posts
            .find_post_by_id(id)
            .await?
            .ok_or(PostError::NotFound)?;
        let comments = self.comments.list_comments_for_post(post.id).await?;
        Ok(PostDetail { post, comments })
    }

    pub async fn create(
        &self,
        author: &AuthorRecord,
        body: &str,
        group_id: Option<i64>,
        image_path: Option<String>,
    ) -> Result<PostRecord, PostError> {
        let body = non_empty(body)?;
        self.check_group(group_id).await?;

        self.posts_write
            .create_post(CreatePostParams {
                author_id: author.id,
                body,
                group_id,
                image_path,
            })
            .await
            .map_err(PostError::from)
    }

    /// Replace the post's body and group. A new image path replaces the
    /// stored one; `None` keeps it.
    pub async fn update(
        &self,
        id: i64,
        editor: &AuthorRecord,
        body: &str,
        group_id: Option<i64>,
        new_image_path: Option<String>,
    ) -> Result<PostRecord, PostError> {
        let existing = self.owned_post(id, editor).await?;
        let body = non_empty(body)?;
        self.check_group(group_id).await?;

        self.posts_write
            .update_post(UpdatePostParams {
                id: existing.id,
                body,
                group_id,
                image_path: new_image_path.or(existing.image_path),
            })
            .await
            .map_err(PostError::from)
    }

    pub async fn delete(&self, id: i64, requester: &AuthorRecord) -> Result<(), PostError> {
        let existing = self.owned_post(id, requester).await?;
        self.posts_write
            .delete_post(existing.id)
            .await
            .map_err(PostError::from)
    }

    pub async fn add_comment(
        &self,
        author: &AuthorRecord,
        post_id: i64,
        body: &str,
    ) -> Result<CommentRecord, PostError> {
        let post = self
            .posts
            .find_post_by_id(post_id)
            .await?
            .ok_or(PostError::NotFound)?;
        let body = non_empty(body)?;

        self.comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                body,
            })
            .await
            .map_err(PostError::from)
    }

    /// Groups offered by the post form's selector.
    pub async fn groups_for_form(&self) -> Result<Vec<GroupRecord>, RepoError> {
        self.groups.list_groups().await
    }

    async fn owned_post(&self, id: i64, author: &AuthorRecord) -> Result<PostRecord, PostError> {
        let post = self
            .posts
            .find_post_by_id(id)
            .await?
            .ok_or(PostError::NotFound)?;
        if post.author_id != author.id {
            return Err(PostError::NotAuthor);
        }
        Ok(post)
    }

    async fn check_group(&self, group_id: Option<i64>) -> Result<(), PostError> {
        if let Some(group_id) = group_id {
            self.groups
                .find_group_by_id(group_id)
                .await?
                .ok_or(PostError::UnknownGroup)?;
        }
        Ok(())
    }
}

fn non_empty(body: &str) -> Result<String, PostError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(PostError::EmptyBody);
    }
    Ok(trimmed.to_string())
}
