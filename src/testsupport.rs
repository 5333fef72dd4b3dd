//! In-memory store implementing every repository trait for unit tests.
//!
//! Mirrors the declared storage policies: author deletion cascades to
//! posts, comments, follow edges and sessions; group deletion detaches
//! posts; the follow edge set is unique per pair and rejects self-loops.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::application::repos::{
    AuthorsRepo, CommentsRepo, CreateCommentParams, CreatePostParams, FollowsRepo, GroupsRepo,
    HealthRepo, PostsRepo, PostsWriteRepo, RepoError, SessionsRepo, UpdatePostParams,
};
use crate::domain::entities::{AuthorRecord, CommentRecord, GroupRecord, PostRecord};
use crate::domain::feed::feed_order;

#[derive(Clone)]
struct StoredPost {
    id: i64,
    body: String,
    created_at: OffsetDateTime,
    author_id: i64,
    group_id: Option<i64>,
    image_path: Option<String>,
}

#[derive(Clone)]
struct StoredComment {
    id: i64,
    post_id: i64,
    author_id: i64,
    body: String,
    created_at: OffsetDateTime,
}

#[derive(Default)]
struct State {
    authors: Vec<AuthorRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<StoredComment>,
    follows: Vec<(i64, i64)>,
    sessions: HashMap<Uuid, i64>,
    next_id: i64,
    tick: i64,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn next_instant(&mut self) -> OffsetDateTime {
        let at = OffsetDateTime::UNIX_EPOCH + Duration::seconds(self.tick);
        self.tick += 1;
        at
    }

    fn materialize_post(&self, post: &StoredPost) -> PostRecord {
        let author = self
            .authors
            .iter()
            .find(|author| author.id == post.author_id)
            .expect("stored post references a live author");
        let group = post
            .group_id
            .and_then(|group_id| self.groups.iter().find(|group| group.id == group_id));

        PostRecord {
            id: post.id,
            body: post.body.clone(),
            created_at: post.created_at,
            author_id: author.id,
            author_username: author.username.clone(),
            author_display_name: author.display_name.clone(),
            group_id: group.map(|group| group.id),
            group_slug: group.map(|group| group.slug.clone()),
            group_title: group.map(|group| group.title.clone()),
            image_path: post.image_path.clone(),
        }
    }

    fn materialize_comment(&self, comment: &StoredComment) -> CommentRecord {
        let author = self
            .authors
            .iter()
            .find(|author| author.id == comment.author_id)
            .expect("stored comment references a live author");

        CommentRecord {
            id: comment.id,
            post_id: comment.post_id,
            author_id: author.id,
            author_username: author.username.clone(),
            author_display_name: author.display_name.clone(),
            body: comment.body.clone(),
            created_at: comment.created_at,
        }
    }

    fn collect_posts<F>(&self, keep: F) -> Vec<PostRecord>
    where
        F: Fn(&StoredPost) -> bool,
    {
        let mut records: Vec<PostRecord> = self
            .posts
            .iter()
            .filter(|post| keep(post))
            .map(|post| self.materialize_post(post))
            .collect();
        records.sort_by(feed_order);
        records
    }

    fn remove_post_with_comments(&mut self, id: i64) {
        self.posts.retain(|post| post.id != id);
        self.comments.retain(|comment| comment.post_id != id);
    }
}

pub(crate) struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store lock")
    }

    pub fn add_author(&self, username: &str) -> AuthorRecord {
        let mut state = self.lock();
        let id = state.allocate_id();
        let created_at = state.next_instant();
        let record = AuthorRecord {
            id,
            username: username.to_string(),
            display_name: username.to_string(),
            created_at,
        };
        state.authors.push(record.clone());
        record
    }

    pub fn add_group(&self, slug: &str, title: &str) -> GroupRecord {
        let mut state = self.lock();
        let id = state.allocate_id();
        let record = GroupRecord {
            id,
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("Posts about {title}"),
        };
        state.groups.push(record.clone());
        record
    }

    pub fn add_post(&self, author_id: i64, body: &str) -> PostRecord {
        let mut state = self.lock();
        let at = state.next_instant();
        insert_post(&mut state, author_id, None, body, at)
    }

    pub fn add_post_at(&self, author_id: i64, body: &str, at: OffsetDateTime) -> PostRecord {
        let mut state = self.lock();
        insert_post(&mut state, author_id, None, body, at)
    }

    pub fn add_group_post(&self, author_id: i64, group_id: i64, body: &str) -> PostRecord {
        let mut state = self.lock();
        let at = state.next_instant();
        insert_post(&mut state, author_id, Some(group_id), body, at)
    }

    pub fn add_session(&self, author_id: i64) -> Uuid {
        let token = Uuid::new_v4();
        self.lock().sessions.insert(token, author_id);
        token
    }

    /// Insert an edge directly, bypassing the service layer, the way a
    /// seed script would.
    pub fn follow(&self, follower_id: i64, followee_id: i64) {
        let mut state = self.lock();
        if !state.follows.contains(&(follower_id, followee_id)) {
            state.follows.push((follower_id, followee_id));
        }
    }

    /// Delete a post the way a raw `DELETE` would: comments cascade, no
    /// ownership check.
    pub fn remove_post(&self, id: i64) {
        self.lock().remove_post_with_comments(id);
    }

    pub fn edge_count(&self) -> usize {
        self.lock().follows.len()
    }

    pub fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }
}

fn insert_post(
    state: &mut State,
    author_id: i64,
    group_id: Option<i64>,
    body: &str,
    at: OffsetDateTime,
) -> PostRecord {
    assert!(
        state.authors.iter().any(|author| author.id == author_id),
        "post fixture references a missing author"
    );
    if let Some(group_id) = group_id {
        assert!(
            state.groups.iter().any(|group| group.id == group_id),
            "post fixture references a missing group"
        );
    }

    let id = state.allocate_id();
    let stored = StoredPost {
        id,
        body: body.to_string(),
        created_at: at,
        author_id,
        group_id,
        image_path: None,
    };
    state.posts.push(stored);
    let stored = state.posts.last().expect("just pushed");
    state.materialize_post(stored)
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(&self) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self.lock().collect_posts(|_| true))
    }

    async fn list_posts_by_group(&self, group_id: i64) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self
            .lock()
            .collect_posts(|post| post.group_id == Some(group_id)))
    }

    async fn list_posts_by_author(&self, author_id: i64) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self.lock().collect_posts(|post| post.author_id == author_id))
    }

    async fn list_posts_by_authors(
        &self,
        author_ids: &[i64],
    ) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self
            .lock()
            .collect_posts(|post| author_ids.contains(&post.author_id)))
    }

    async fn find_post_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let state = self.lock();
        Ok(state
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| state.materialize_post(post)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.lock();
        if params.body.is_empty() {
            return Err(RepoError::integrity("posts_body_not_empty"));
        }
        if !state.authors.iter().any(|author| author.id == params.author_id) {
            return Err(RepoError::InvalidInput {
                message: "unknown author".to_string(),
            });
        }
        if let Some(group_id) = params.group_id
            && !state.groups.iter().any(|group| group.id == group_id)
        {
            return Err(RepoError::InvalidInput {
                message: "unknown group".to_string(),
            });
        }

        let at = state.next_instant();
        let id = state.allocate_id();
        state.posts.push(StoredPost {
            id,
            body: params.body,
            created_at: at,
            author_id: params.author_id,
            group_id: params.group_id,
            image_path: params.image_path,
        });
        let stored = state.posts.last().expect("just pushed");
        Ok(state.materialize_post(stored))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.lock();
        if params.body.is_empty() {
            return Err(RepoError::integrity("posts_body_not_empty"));
        }
        if let Some(group_id) = params.group_id
            && !state.groups.iter().any(|group| group.id == group_id)
        {
            return Err(RepoError::InvalidInput {
                message: "unknown group".to_string(),
            });
        }

        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.body = params.body;
        post.group_id = params.group_id;
        post.image_path = params.image_path;
        let id = post.id;

        let stored = state
            .posts
            .iter()
            .find(|post| post.id == id)
            .expect("updated post present");
        Ok(state.materialize_post(stored))
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.lock();
        if !state.posts.iter().any(|post| post.id == id) {
            return Err(RepoError::NotFound);
        }
        state.remove_post_with_comments(id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_comments_for_post(
        &self,
        post_id: i64,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.lock();
        let mut records: Vec<CommentRecord> = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| state.materialize_comment(comment))
            .collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(records)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.lock();
        if params.body.is_empty() {
            return Err(RepoError::integrity("comments_body_not_empty"));
        }
        if !state.posts.iter().any(|post| post.id == params.post_id) {
            return Err(RepoError::InvalidInput {
                message: "unknown post".to_string(),
            });
        }

        let at = state.next_instant();
        let id = state.allocate_id();
        state.comments.push(StoredComment {
            id,
            post_id: params.post_id,
            author_id: params.author_id,
            body: params.body,
            created_at: at,
        });
        let stored = state.comments.last().expect("just pushed");
        Ok(state.materialize_comment(stored))
    }
}

#[async_trait]
impl AuthorsRepo for MemoryStore {
    async fn find_author_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AuthorRecord>, RepoError> {
        Ok(self
            .lock()
            .authors
            .iter()
            .find(|author| author.username == username)
            .cloned())
    }

    async fn find_author_by_id(&self, id: i64) -> Result<Option<AuthorRecord>, RepoError> {
        Ok(self
            .lock()
            .authors
            .iter()
            .find(|author| author.id == id)
            .cloned())
    }

    async fn delete_author(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.lock();
        if !state.authors.iter().any(|author| author.id == id) {
            return Err(RepoError::NotFound);
        }

        state.authors.retain(|author| author.id != id);
        let doomed_posts: Vec<i64> = state
            .posts
            .iter()
            .filter(|post| post.author_id == id)
            .map(|post| post.id)
            .collect();
        for post_id in doomed_posts {
            state.remove_post_with_comments(post_id);
        }
        state.comments.retain(|comment| comment.author_id != id);
        state
            .follows
            .retain(|(follower, followee)| *follower != id && *followee != id);
        state.sessions.retain(|_, author_id| *author_id != id);
        Ok(())
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn find_group_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.lock().groups.iter().find(|group| group.id == id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn delete_group(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.lock();
        if !state.groups.iter().any(|group| group.id == id) {
            return Err(RepoError::NotFound);
        }

        state.groups.retain(|group| group.id != id);
        for post in state
            .posts
            .iter_mut()
            .filter(|post| post.group_id == Some(id))
        {
            post.group_id = None;
        }
        Ok(())
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn insert_edge(&self, follower_id: i64, followee_id: i64) -> Result<(), RepoError> {
        let mut state = self.lock();
        if follower_id == followee_id {
            return Err(RepoError::integrity("follows_no_self_edge"));
        }
        if !state.follows.contains(&(follower_id, followee_id)) {
            state.follows.push((follower_id, followee_id));
        }
        Ok(())
    }

    async fn delete_edge(&self, follower_id: i64, followee_id: i64) -> Result<(), RepoError> {
        self.lock()
            .follows
            .retain(|edge| *edge != (follower_id, followee_id));
        Ok(())
    }

    async fn edge_exists(&self, follower_id: i64, followee_id: i64) -> Result<bool, RepoError> {
        Ok(self.lock().follows.contains(&(follower_id, followee_id)))
    }

    async fn followee_ids(&self, follower_id: i64) -> Result<Vec<i64>, RepoError> {
        let mut followees: Vec<i64> = self
            .lock()
            .follows
            .iter()
            .filter(|(follower, _)| *follower == follower_id)
            .map(|(_, followee)| *followee)
            .collect();
        followees.sort_unstable();
        Ok(followees)
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn find_session_author(
        &self,
        token: Uuid,
    ) -> Result<Option<AuthorRecord>, RepoError> {
        let state = self.lock();
        Ok(state.sessions.get(&token).and_then(|author_id| {
            state
                .authors
                .iter()
                .find(|author| author.id == *author_id)
                .cloned()
        }))
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}
