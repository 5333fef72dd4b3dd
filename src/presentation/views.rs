use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::Page;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord};
use crate::domain::viewer::Viewer;

pub const HUMAN_DATETIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year] [hour]:[minute]");

pub fn format_published(at: OffsetDateTime) -> String {
    at.format(HUMAN_DATETIME_FORMAT)
        .expect("valid datetime format")
}

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response() -> Response {
    let mut response = render_template_response(NotFoundTemplate {}, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

// ============================================================================
// View models
// ============================================================================

#[derive(Debug, Clone)]
pub struct ViewerView {
    pub authenticated: bool,
    pub username: String,
}

impl ViewerView {
    pub fn from_viewer(viewer: &Viewer) -> Self {
        match viewer.author() {
            Some(author) => Self {
                authenticated: true,
                username: author.username.clone(),
            },
            None => Self {
                authenticated: false,
                username: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupBadge {
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct PostCard {
    pub id: i64,
    pub body: String,
    pub author_username: String,
    pub author_display_name: String,
    pub group: Option<GroupBadge>,
    pub image_path: Option<String>,
    pub published: String,
}

impl PostCard {
    pub fn from_record(record: &PostRecord) -> Self {
        let group = match (&record.group_slug, &record.group_title) {
            (Some(slug), Some(title)) => Some(GroupBadge {
                slug: slug.clone(),
                title: title.clone(),
            }),
            _ => None,
        };

        Self {
            id: record.id,
            body: record.body.clone(),
            author_username: record.author_username.clone(),
            author_display_name: record.author_display_name.clone(),
            group,
            image_path: record.image_path.clone(),
            published: format_published(record.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub author_username: String,
    pub author_display_name: String,
    pub body: String,
    pub published: String,
}

impl CommentView {
    pub fn from_record(record: &CommentRecord) -> Self {
        Self {
            author_username: record.author_username.clone(),
            author_display_name: record.author_display_name.clone(),
            body: record.body.clone(),
            published: format_published(record.created_at),
        }
    }
}

/// Pager controls for a feed page. `base_path` is the feed path the page
/// numbers append to.
#[derive(Debug, Clone)]
pub struct PagerView {
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub previous_page: usize,
    pub next_page: usize,
    pub base_path: String,
}

pub fn feed_cards(page: &Page<PostRecord>) -> Vec<PostCard> {
    page.items().iter().map(PostCard::from_record).collect()
}

pub fn pager_view<T>(page: &Page<T>, base_path: impl Into<String>) -> PagerView {
    PagerView {
        number: page.number(),
        total_pages: page.total_pages(),
        total_items: page.total_items(),
        has_next: page.has_next(),
        has_previous: page.has_previous(),
        previous_page: page.number().saturating_sub(1).max(1),
        next_page: page.number() + 1,
        base_path: base_path.into(),
    }
}

#[derive(Debug, Clone)]
pub struct GroupView {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl GroupView {
    pub fn from_record(record: &GroupRecord) -> Self {
        Self {
            title: record.title.clone(),
            slug: record.slug.clone(),
            description: record.description.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileView {
    pub username: String,
    pub display_name: String,
    pub following: bool,
    pub is_self: bool,
}

#[derive(Debug, Clone)]
pub struct GroupOptionView {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

pub fn group_options(groups: &[GroupRecord], selected: Option<i64>) -> Vec<GroupOptionView> {
    groups
        .iter()
        .map(|group| GroupOptionView {
            id: group.id,
            title: group.title.clone(),
            selected: selected == Some(group.id),
        })
        .collect()
}

/// Post submission form, for both create and edit.
#[derive(Debug, Clone)]
pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub body: String,
    pub groups: Vec<GroupOptionView>,
    pub error: Option<String>,
}

// ============================================================================
// Templates
// ============================================================================

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub title: String,
    pub posts: Vec<PostCard>,
    pub pager: PagerView,
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub group: GroupView,
    pub posts: Vec<PostCard>,
    pub pager: PagerView,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub profile: ProfileView,
    pub viewer: ViewerView,
    pub posts: Vec<PostCard>,
    pub pager: PagerView,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowingTemplate {
    pub posts: Vec<PostCard>,
    pub pager: PagerView,
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub post: PostCard,
    pub comments: Vec<CommentView>,
    pub viewer: ViewerView,
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub form: PostFormView,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct NotFoundTemplate {}
