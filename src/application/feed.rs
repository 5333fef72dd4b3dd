//! Feed composition for the four public feed kinds.
//!
//! Every feed is an ordered slice of the post store: the composer selects
//! the candidate set, the paginator slices it. Ordering is the total order
//! from [`crate::domain::feed::feed_order`], produced by the repository
//! (`ORDER BY created_at DESC, id DESC`), so repeated composition against
//! an unchanged store is byte-identical.

use std::sync::Arc;

use thiserror::Error;

use crate::application::pagination::{Page, paginate};
use crate::application::repos::{
    AuthorsRepo, FollowsRepo, GroupsRepo, PostsRepo, RepoError,
};
use crate::domain::entities::{AuthorRecord, GroupRecord, PostRecord};
use crate::domain::viewer::Viewer;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown author")]
    UnknownAuthor,
    #[error("authentication required")]
    AuthenticationRequired,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Group feed page plus the group record for the page header.
#[derive(Debug, Clone)]
pub struct GroupFeed {
    pub group: GroupRecord,
    pub page: Page<PostRecord>,
}

/// Profile feed page with the follow-state booleans the profile header
/// renders. `following` and `is_self` are derived for the viewer and play
/// no part in ordering.
#[derive(Debug, Clone)]
pub struct ProfileFeed {
    pub author: AuthorRecord,
    pub page: Page<PostRecord>,
    pub following: bool,
    pub is_self: bool,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    authors: Arc<dyn AuthorsRepo>,
    follows: Arc<dyn FollowsRepo>,
    page_size: usize,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        authors: Arc<dyn AuthorsRepo>,
        follows: Arc<dyn FollowsRepo>,
        page_size: usize,
    ) -> Self {
        Self {
            posts,
            groups,
            authors,
            follows,
            page_size,
        }
    }

    /// All posts, unfiltered.
    pub async fn global_page(&self, requested: usize) -> Result<Page<PostRecord>, FeedError> {
        let posts = self.posts.list_posts().await?;
        Ok(paginate(posts, self.page_size, requested))
    }

    /// Posts tagged to the group behind `slug`.
    pub async fn group_page(&self, slug: &str, requested: usize) -> Result<GroupFeed, FeedError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or(FeedError::UnknownGroup)?;
        let posts = self.posts.list_posts_by_group(group.id).await?;
        Ok(GroupFeed {
            page: paginate(posts, self.page_size, requested),
            group,
        })
    }

    /// Posts authored by `username`, with the viewer's follow state.
    pub async fn profile_page(
        &self,
        username: &str,
        viewer: &Viewer,
        requested: usize,
    ) -> Result<ProfileFeed, FeedError> {
        let author = self
            .authors
            .find_author_by_username(username)
            .await?
            .ok_or(FeedError::UnknownAuthor)?;
        let posts = self.posts.list_posts_by_author(author.id).await?;
        let following = self.viewer_follows(viewer, author.id).await?;
        let is_self = viewer.is_author(author.id);

        Ok(ProfileFeed {
            page: paginate(posts, self.page_size, requested),
            following,
            is_self,
            author,
        })
    }

    /// Union of the profile feeds of every author the viewer follows,
    /// merged in the feed total order. Requires an authenticated viewer.
    pub async fn following_page(
        &self,
        viewer: &Viewer,
        requested: usize,
    ) -> Result<Page<PostRecord>, FeedError> {
        let Some(author) = viewer.author() else {
            return Err(FeedError::AuthenticationRequired);
        };

        let followees = self.follows.followee_ids(author.id).await?;
        let posts = self.posts.list_posts_by_authors(&followees).await?;
        Ok(paginate(posts, self.page_size, requested))
    }

    /// Whether the viewer follows the given author. Anonymous viewers are
    /// resolved to `false` before any follow-graph lookup.
    pub async fn viewer_follows(
        &self,
        viewer: &Viewer,
        author_id: i64,
    ) -> Result<bool, RepoError> {
        match viewer.author() {
            None => Ok(false),
            Some(follower) => self.follows.edge_exists(follower.id, author_id).await,
        }
    }
}
