use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;

use crate::{
    application::{
        auth::AuthService,
        error::{ErrorReport, HttpError, repo_error_to_http},
        feed::{FeedError, FeedService},
        follows::FollowService,
        pagination::parse_page_param,
        posts::{PostError, PostService},
        repos::HealthRepo,
    },
    cache::{CacheState, response_cache_layer},
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::views::{
        CommentView, FollowingTemplate, GroupTemplate, GroupView, IndexTemplate, PostCard,
        PostDetailTemplate, ProfileTemplate, ProfileView, ViewerView, feed_cards, pager_view,
        render_not_found_response, render_template_response,
    },
};

use super::{
    actions,
    auth::{login_redirect, resolve_viewer},
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub auth: Arc<AuthService>,
    pub uploads: Arc<UploadStorage>,
    pub health: Arc<dyn HealthRepo>,
    pub cache: Option<CacheState>,
}

pub fn build_router(state: HttpState, upload_body_limit: usize) -> Router {
    // The global feed is the only cached surface. Every other feed reads
    // the store fresh on each request.
    let cached_routes = Router::new().route("/", get(index));
    let cached_routes = if let Some(cache_state) = state.cache.clone() {
        cached_routes.layer(middleware::from_fn_with_state(
            cache_state,
            response_cache_layer,
        ))
    } else {
        cached_routes
    };

    let fresh_routes = Router::new()
        .route("/group/{slug}", get(group_feed))
        .route("/profile/{username}", get(profile_feed))
        .route("/profile/{username}/follow", get(actions::follow_author))
        .route(
            "/profile/{username}/unfollow",
            get(actions::unfollow_author),
        )
        .route("/posts/{id}", get(post_detail))
        .route("/posts/{id}/comment", post(actions::add_comment))
        .route(
            "/posts/{id}/edit",
            get(actions::edit_post_form).post(actions::edit_post_submit),
        )
        .route(
            "/create",
            get(actions::create_post_form).post(actions::create_post_submit),
        )
        .route("/follow", get(following_feed))
        .route("/media/{*path}", get(serve_upload))
        .route("/_health/db", get(health))
        .layer(DefaultBodyLimit::max(upload_body_limit));

    cached_routes
        .merge(fresh_routes)
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeedQuery {
    page: Option<String>,
}

async fn index(State(state): State<HttpState>, Query(query): Query<FeedQuery>) -> Response {
    let requested = parse_page_param(query.page.as_deref());

    match state.feed.global_page(requested).await {
        Ok(page) => render_template_response(
            IndexTemplate {
                title: "Latest posts".to_string(),
                posts: feed_cards(&page),
                pager: pager_view(&page, "/"),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, "/"),
    }
}

async fn group_feed(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    Query(query): Query<FeedQuery>,
) -> Response {
    let requested = parse_page_param(query.page.as_deref());

    match state.feed.group_page(&slug, requested).await {
        Ok(feed) => render_template_response(
            GroupTemplate {
                group: GroupView::from_record(&feed.group),
                posts: feed_cards(&feed.page),
                pager: pager_view(&feed.page, format!("/group/{slug}")),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, &format!("/group/{slug}")),
    }
}

async fn profile_feed(
    State(state): State<HttpState>,
    Path(username): Path<String>,
    Query(query): Query<FeedQuery>,
    jar: CookieJar,
) -> Response {
    let viewer = match resolve_viewer(&state.auth, &jar).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };
    let requested = parse_page_param(query.page.as_deref());

    match state.feed.profile_page(&username, &viewer, requested).await {
        Ok(feed) => render_template_response(
            ProfileTemplate {
                profile: ProfileView {
                    username: feed.author.username.clone(),
                    display_name: feed.author.display_name.clone(),
                    following: feed.following,
                    is_self: feed.is_self,
                },
                viewer: ViewerView::from_viewer(&viewer),
                posts: feed_cards(&feed.page),
                pager: pager_view(&feed.page, format!("/profile/{username}")),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, &format!("/profile/{username}")),
    }
}

async fn following_feed(
    State(state): State<HttpState>,
    Query(query): Query<FeedQuery>,
    jar: CookieJar,
) -> Response {
    let viewer = match resolve_viewer(&state.auth, &jar).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };
    if !viewer.is_authenticated() {
        return login_redirect("/follow");
    }

    let requested = parse_page_param(query.page.as_deref());
    match state.feed.following_page(&viewer, requested).await {
        Ok(page) => render_template_response(
            FollowingTemplate {
                posts: feed_cards(&page),
                pager: pager_view(&page, "/follow"),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, "/follow"),
    }
}

async fn post_detail(
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

    match state.posts.detail(id).await {
        Ok(detail) => render_template_response(
            PostDetailTemplate {
                post: PostCard::from_record(&detail.post),
                comments: detail.comments.iter().map(CommentView::from_record).collect(),
                viewer: ViewerView::from_viewer(&viewer),
            },
            StatusCode::OK,
        ),
        Err(PostError::NotFound) => render_not_found_response(),
        Err(err) => HttpError::from_error(
            "infra::http::public::post_detail",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load post",
            &err,
        )
        .into_response(),
    }
}

fn feed_error_to_response(err: FeedError, request_path: &str) -> Response {
    match err {
        FeedError::UnknownGroup | FeedError::UnknownAuthor => render_not_found_response(),
        FeedError::AuthenticationRequired => login_redirect(request_path),
        FeedError::Repo(err) => {
            repo_error_to_http("infra::http::public::feed", err).into_response()
        }
    }
}

async fn serve_upload(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_upload";

    match state.uploads.read(&path).await {
        Ok(bytes) => build_upload_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Image not found",
            "The requested image is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Image not found",
                "The requested image is not available",
            )
            .into_response()
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored image"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read stored image",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_upload_response(path: &str, bytes: Bytes) -> Response {
    let mut response = Response::new(Body::from(bytes.clone()));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&bytes.len().to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

async fn health(State(state): State<HttpState>) -> Response {
    match state.health.check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn not_found() -> Response {
    render_not_found_response()
}

#[cfg(test)]
mod tests {
    use axum::http::header::{CONTENT_TYPE as CT, COOKIE, LOCATION};
    use axum::http::{Method, Request};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::application::posts::PostService;
    use crate::cache::{CacheConfig, ResponseCache};
    use crate::testsupport::MemoryStore;

    struct Harness {
        router: Router,
        store: Arc<MemoryStore>,
        _uploads_dir: tempfile::TempDir,
    }

    fn harness(cache: bool) -> Harness {
        let store = MemoryStore::new();
        let uploads_dir = tempfile::tempdir().expect("temp dir");
        let uploads = Arc::new(
            UploadStorage::new(uploads_dir.path().to_path_buf()).expect("upload storage"),
        );

        let cache_state = cache.then(|| {
            let config = CacheConfig::default();
            CacheState {
                store: Arc::new(ResponseCache::new(&config)),
                config,
            }
        });

        let state = HttpState {
            feed: Arc::new(FeedService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
                10,
            )),
            posts: Arc::new(PostService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
            )),
            follows: Arc::new(FollowService::new(store.clone(), store.clone())),
            auth: Arc::new(AuthService::new(store.clone())),
            uploads,
            health: store.clone(),
            cache: cache_state,
        };

        Harness {
            router: build_router(state, 1024 * 1024),
            store,
            _uploads_dir: uploads_dir,
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> Response {
        router.clone().oneshot(request).await.expect("response")
    }

    async fn get_uri(router: &Router, uri: &str) -> Response {
        send(
            router,
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn comment_request(post_id: i64, session: Option<Uuid>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(format!("/posts/{post_id}/comment"))
            .header(CT, "application/x-www-form-urlencoded");
        if let Some(token) = session {
            builder = builder.header(COOKIE, format!("session={token}"));
        }
        builder
            .body(Body::from("body=well+said"))
            .expect("request")
    }

    #[tokio::test]
    async fn anonymous_comment_is_redirected_to_login_and_stores_nothing() {
        let harness = harness(false);
        let poet = harness.store.add_author("poet");
        let post = harness.store.add_post(poet.id, "quiet");

        let response = send(&harness.router, comment_request(post.id, None)).await;

        assert!(response.status().is_redirection());
        assert_eq!(
            location(&response),
            format!("/auth/login?next=%2Fposts%2F{}%2Fcomment", post.id)
        );
        assert_eq!(harness.store.comment_count(), 0);
    }

    #[tokio::test]
    async fn authenticated_comment_is_created_and_redirected_to_the_post() {
        let harness = harness(false);
        let poet = harness.store.add_author("poet");
        let reader = harness.store.add_author("reader");
        let post = harness.store.add_post(poet.id, "discussed");
        let token = harness.store.add_session(reader.id);

        let response = send(&harness.router, comment_request(post.id, Some(token))).await;

        assert!(response.status().is_redirection());
        assert_eq!(location(&response), format!("/posts/{}", post.id));
        assert_eq!(harness.store.comment_count(), 1);
    }

    #[tokio::test]
    async fn unknown_group_and_profile_render_the_not_found_page() {
        let harness = harness(false);

        let group = get_uri(&harness.router, "/group/missing").await;
        assert_eq!(group.status(), StatusCode::NOT_FOUND);

        let profile = get_uri(&harness.router, "/profile/ghost").await;
        assert_eq!(profile.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unmatched_routes_render_the_custom_not_found_page() {
        let harness = harness(false);

        let response = get_uri(&harness.router, "/no/such/page").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_text(response).await;
        assert!(body.contains("Page not found"));
    }

    #[tokio::test]
    async fn following_feed_requires_a_session() {
        let harness = harness(false);

        let response = get_uri(&harness.router, "/follow").await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/auth/login?next=%2Ffollow");
    }

    #[tokio::test]
    async fn create_requires_a_session() {
        let harness = harness(false);

        let response = get_uri(&harness.router, "/create").await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/auth/login?next=%2Fcreate");
    }

    #[tokio::test]
    async fn edit_by_another_viewer_redirects_to_the_post() {
        let harness = harness(false);
        let poet = harness.store.add_author("poet");
        let intruder = harness.store.add_author("intruder");
        let post = harness.store.add_post(poet.id, "mine");
        let token = harness.store.add_session(intruder.id);

        let request = Request::builder()
            .uri(format!("/posts/{}/edit", post.id))
            .header(COOKIE, format!("session={token}"))
            .body(Body::empty())
            .expect("request");
        let response = send(&harness.router, request).await;

        assert!(response.status().is_redirection());
        assert_eq!(location(&response), format!("/posts/{}", post.id));

        // Anonymous viewers take the same exit.
        let anonymous = get_uri(&harness.router, &format!("/posts/{}/edit", post.id)).await;
        assert!(anonymous.status().is_redirection());
        assert_eq!(location(&anonymous), format!("/posts/{}", post.id));
    }

    #[tokio::test]
    async fn follow_action_updates_the_graph_and_redirects() {
        let harness = harness(false);
        harness.store.add_author("poet");
        let reader = harness.store.add_author("reader");
        let token = harness.store.add_session(reader.id);

        let request = Request::builder()
            .uri("/profile/poet/follow")
            .header(COOKIE, format!("session={token}"))
            .body(Body::empty())
            .expect("request");
        let response = send(&harness.router, request).await;

        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/profile/poet");
        assert_eq!(harness.store.edge_count(), 1);
    }

    #[tokio::test]
    async fn self_follow_via_url_is_a_conflict_not_a_silent_noop() {
        let harness = harness(false);
        let poet = harness.store.add_author("poet");
        let token = harness.store.add_session(poet.id);

        let request = Request::builder()
            .uri("/profile/poet/follow")
            .header(COOKIE, format!("session={token}"))
            .body(Body::empty())
            .expect("request");
        let response = send(&harness.router, request).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(harness.store.edge_count(), 0);
    }

    #[tokio::test]
    async fn global_feed_serves_the_cached_render_after_a_delete() {
        let harness = harness(true);
        let poet = harness.store.add_author("poet");
        let post = harness.store.add_post(poet.id, "Test cache");

        let first = body_text(get_uri(&harness.router, "/").await).await;
        assert!(first.contains("Test cache"));

        harness.store.remove_post(post.id);

        let second = body_text(get_uri(&harness.router, "/").await).await;
        assert_eq!(second, first, "within the TTL the stale render persists");

        // The uncached profile feed reflects the delete immediately.
        let profile = body_text(get_uri(&harness.router, "/profile/poet").await).await;
        assert!(!profile.contains("Test cache"));
    }
}
