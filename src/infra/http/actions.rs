//! Authenticated actions: posting, editing, commenting, follow mutations.

use axum::{
    Form,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;

use crate::application::error::{HttpError, repo_error_to_http};
use crate::application::follows::FollowError;
use crate::application::posts::PostError;
use crate::infra::uploads::UploadStorageError;
use crate::presentation::views::{
    PostFormTemplate, PostFormView, group_options, render_not_found_response,
    render_template_response,
};

use super::auth::{login_redirect, resolve_viewer};
use super::public::HttpState;

const SOURCE: &str = "infra::http::actions";

#[derive(Debug, Deserialize)]
pub(super) struct CommentForm {
    body: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    Path(raw_id): Path<String>,
    jar: CookieJar,
    Form(form): Form<CommentForm>,
) -> Response {
    let Ok(id) = raw_id.parse::<i64>() else {
        return render_not_found_response();
    };
    let viewer = match resolve_viewer(&state.auth, &jar).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };
    let Some(author) = viewer.author() else {
        return login_redirect(&format!("/posts/{id}/comment"));
    };

    match state.posts.add_comment(author, id, &form.body).await {
        // The post page is the destination whatever the form outcome; a
        // blank comment simply creates nothing.
        Ok(_) | Err(PostError::EmptyBody) => {
            Redirect::to(&format!("/posts/{id}")).into_response()
        }
        Err(PostError::NotFound) => render_not_found_response(),
        Err(err) => post_action_error(err),
    }
}

pub(super) async fn follow_author(
    State(state): State<HttpState>,
    Path(username): Path<String>,
    jar: CookieJar,
) -> Response {
    let viewer = match resolve_viewer(&state.auth, &jar).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };
    let Some(author) = viewer.author() else {
        return login_redirect(&format!("/profile/{username}/follow"));
    };

    match state.follows.follow(author, &username).await {
        Ok(()) => Redirect::to(&format!("/profile/{username}")).into_response(),
        Err(err) => follow_error_to_response(err),
    }
}

pub(super) async fn unfollow_author(
    State(state): State<HttpState>,
    Path(username): Path<String>,
    jar: CookieJar,
) -> Response {
    let viewer = match resolve_viewer(&state.auth, &jar).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };
    let Some(author) = viewer.author() else {
        return login_redirect(&format!("/profile/{username}/unfollow"));
    };

    match state.follows.unfollow(author, &username).await {
        Ok(()) => Redirect::to(&format!("/profile/{username}")).into_response(),
        Err(err) => follow_error_to_response(err),
    }
}

fn follow_error_to_response(err: FollowError) -> Response {
    match err {
        // The profile page hides the button for self; a self-follow
        // reaching the graph is a defect upstream and is surfaced, not
        // swallowed.
        FollowError::SelfFollow => HttpError::new(
            SOURCE,
            StatusCode::CONFLICT,
            "Cannot follow yourself",
            "self-follow rejected by the follow graph",
        )
        .into_response(),
        FollowError::UnknownAuthor => render_not_found_response(),
        FollowError::Repo(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}

pub(super) async fn create_post_form(State(state): State<HttpState>, jar: CookieJar) -> Response {
    let viewer = match resolve_viewer(&state.auth, &jar).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };
    if !viewer.is_authenticated() {
        return login_redirect("/create");
    }

    render_post_form(
        &state,
        false,
        "/create".to_string(),
        String::new(),
        None,
        None,
        StatusCode::OK,
    )
    .await
}

pub(super) async fn create_post_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    let viewer = match resolve_viewer(&state.auth, &jar).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };
    let Some(author) = viewer.author() else {
        return login_redirect("/create");
    };

    let submitted = match read_post_form(multipart).await {
        Ok(submitted) => submitted,
        Err(err) => return err.into_response(),
    };

    let image_path = match store_submitted_image(&state, submitted.image).await {
        ImageOutcome::Stored(path) => path,
        ImageOutcome::Rejected(message) => {
            return render_post_form(
                &state,
                false,
                "/create".to_string(),
                submitted.body,
                submitted.group_id,
                Some(message),
                StatusCode::UNPROCESSABLE_ENTITY,
            )
            .await;
        }
        ImageOutcome::Failed(err) => return err.into_response(),
    };

    match state
        .posts
        .create(author, &submitted.body, submitted.group_id, image_path)
        .await
    {
        Ok(_) => Redirect::to(&format!("/profile/{}", author.username)).into_response(),
        Err(err @ (PostError::EmptyBody | PostError::UnknownGroup)) => {
            render_post_form(
                &state,
                false,
                "/create".to_string(),
                submitted.body,
                submitted.group_id,
                Some(err.to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            )
            .await
        }
        Err(err) => post_action_error(err),
    }
}

pub(super) async fn edit_post_form(
    State(state): State<HttpState>,
    Path(raw_id): Path<String>,
    jar: CookieJar,
) -> Response {
    let Ok(id) = raw_id.parse::<i64>() else {
        return render_not_found_response();
    };
    let viewer = match resolve_viewer(&state.auth, &jar).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };

    let detail = match state.posts.detail(id).await {
        Ok(detail) => detail,
        Err(PostError::NotFound) => return render_not_found_response(),
        Err(err) => return post_action_error(err),
    };

    // Every viewer who is not the author lands back on the post page,
    // anonymous included.
    if !viewer.is_author(detail.post.author_id) {
        return Redirect::to(&format!("/posts/{id}")).into_response();
    }

    render_post_form(
        &state,
        true,
        format!("/posts/{id}/edit"),
        detail.post.body,
        detail.post.group_id,
        None,
        StatusCode::OK,
    )
    .await
}

pub(super) async fn edit_post_submit(
    State(state): State<HttpState>,
    Path(raw_id): Path<String>,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    let Ok(id) = raw_id.parse::<i64>() else {
        return render_not_found_response();
    };
    let viewer = match resolve_viewer(&state.auth, &jar).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };
    let Some(author) = viewer.author() else {
        return Redirect::to(&format!("/posts/{id}")).into_response();
    };

    let submitted = match read_post_form(multipart).await {
        Ok(submitted) => submitted,
        Err(err) => return err.into_response(),
    };

    let image_path = match store_submitted_image(&state, submitted.image).await {
        ImageOutcome::Stored(path) => path,
        ImageOutcome::Rejected(message) => {
            return render_post_form(
                &state,
                true,
                format!("/posts/{id}/edit"),
                submitted.body,
                submitted.group_id,
                Some(message),
                StatusCode::UNPROCESSABLE_ENTITY,
            )
            .await;
        }
        ImageOutcome::Failed(err) => return err.into_response(),
    };

    match state
        .posts
        .update(id, author, &submitted.body, submitted.group_id, image_path)
        .await
    {
        Ok(_) | Err(PostError::NotAuthor) => {
            Redirect::to(&format!("/posts/{id}")).into_response()
        }
        Err(PostError::NotFound) => render_not_found_response(),
        Err(err @ (PostError::EmptyBody | PostError::UnknownGroup)) => {
            render_post_form(
                &state,
                true,
                format!("/posts/{id}/edit"),
                submitted.body,
                submitted.group_id,
                Some(err.to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            )
            .await
        }
        Err(err) => post_action_error(err),
    }
}

fn post_action_error(err: PostError) -> Response {
    match err {
        PostError::NotFound => render_not_found_response(),
        PostError::Repo(err) => repo_error_to_http(SOURCE, err).into_response(),
        PostError::NotAuthor => HttpError::new(
            SOURCE,
            StatusCode::FORBIDDEN,
            "Only the author may change a post",
            "post ownership check failed",
        )
        .into_response(),
        PostError::EmptyBody | PostError::UnknownGroup => HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid submission",
            err.to_string(),
        )
        .into_response(),
    }
}

async fn render_post_form(
    state: &HttpState,
    is_edit: bool,
    action: String,
    body: String,
    selected_group: Option<i64>,
    error_message: Option<String>,
    status: StatusCode,
) -> Response {
    match state.posts.groups_for_form().await {
        Ok(groups) => render_template_response(
            PostFormTemplate {
                form: PostFormView {
                    is_edit,
                    action,
                    body,
                    groups: group_options(&groups, selected_group),
                    error: error_message,
                },
            },
            status,
        ),
        Err(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}

struct SubmittedPost {
    body: String,
    group_id: Option<i64>,
    image: Option<(String, Bytes)>,
}

async fn read_post_form(mut multipart: Multipart) -> Result<SubmittedPost, HttpError> {
    let mut submitted = SubmittedPost {
        body: String::new(),
        group_id: None,
        image: None,
    };

    loop {
        let field = multipart.next_field().await.map_err(|err| {
            HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Malformed form submission",
                &err,
            )
        })?;
        let Some(field) = field else { break };
        let name = field.name().map(str::to_string);

        match name.as_deref() {
            Some("body") => {
                submitted.body = field.text().await.map_err(|err| {
                    HttpError::from_error(
                        SOURCE,
                        StatusCode::BAD_REQUEST,
                        "Malformed form submission",
                        &err,
                    )
                })?;
            }
            Some("group") => {
                let raw = field.text().await.map_err(|err| {
                    HttpError::from_error(
                        SOURCE,
                        StatusCode::BAD_REQUEST,
                        "Malformed form submission",
                        &err,
                    )
                })?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    submitted.group_id = Some(raw.parse::<i64>().map_err(|err| {
                        HttpError::from_error(
                            SOURCE,
                            StatusCode::BAD_REQUEST,
                            "Malformed group selection",
                            &err,
                        )
                    })?);
                }
            }
            Some("image") => {
                let file_name = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(|err| {
                    HttpError::from_error(
                        SOURCE,
                        StatusCode::BAD_REQUEST,
                        "Malformed image upload",
                        &err,
                    )
                })?;
                if let Some(file_name) = file_name
                    && !data.is_empty()
                {
                    submitted.image = Some((file_name, data));
                }
            }
            _ => {}
        }
    }

    Ok(submitted)
}

enum ImageOutcome {
    Stored(Option<String>),
    Rejected(String),
    Failed(HttpError),
}

async fn store_submitted_image(
    state: &HttpState,
    image: Option<(String, Bytes)>,
) -> ImageOutcome {
    let Some((file_name, data)) = image else {
        return ImageOutcome::Stored(None);
    };

    match state.uploads.store_image(&file_name, data).await {
        Ok(path) => ImageOutcome::Stored(Some(path)),
        Err(UploadStorageError::NotAnImage | UploadStorageError::EmptyPayload) => {
            ImageOutcome::Rejected("The uploaded file is not a recognised image.".to_string())
        }
        Err(err) => {
            error!(target = SOURCE, error = %err, "failed to store uploaded image");
            ImageOutcome::Failed(HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store uploaded image",
                err.to_string(),
            ))
        }
    }
}
