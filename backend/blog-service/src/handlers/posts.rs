/// Feed, post and follow handlers
use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use actix_web::{web, FromRequest, HttpMessage, HttpRequest, HttpResponse};
use page_cache::PageKey;
use serde::Deserialize;
use tracing::warn;

use super::{base_context, PageQuery};
use crate::error::{AppError, Result};
use crate::forms::{CommentForm, FormErrors, PostForm};
use crate::metrics;
use crate::middleware::permissions::{check_post_ownership, post_detail_url, profile_url, redirect};
use crate::middleware::{AuthenticatedUser, CurrentUser};
use crate::models::{truncate_chars, Post, User};
use crate::pagination::PageRequest;
use crate::AppState;

/// Key prefix of cached index renderings
pub const INDEX_CACHE_PREFIX: &str = "index_page";
pub const CACHE_STATUS_HEADER: &str = "x-page-cache";

/// Body of the create and edit forms.
///
/// Fields not listed here (an `author`, say) are ignored.
#[derive(MultipartForm, Default)]
pub struct PostUpload {
    pub text: Option<Text<String>>,
    pub group: Option<Text<String>>,
    pub image: Option<TempFile>,
}

/// Text-only submission of the same form
#[derive(Debug, Deserialize)]
struct PostFields {
    text: Option<String>,
    group: Option<String>,
}

impl PostUpload {
    /// Read the form body once the handler has decided to accept it.
    ///
    /// Multipart and urlencoded bodies are both understood; any other body
    /// is treated as an empty form.
    pub async fn read(req: &HttpRequest, payload: web::Payload) -> Result<Self> {
        let mut payload = payload.into_inner();
        let content_type = req.content_type().to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let form = MultipartForm::<PostUpload>::from_request(req, &mut payload)
                .await
                .map_err(|e| AppError::Validation(format!("Malformed upload: {}", e)))?;
            Ok(form.into_inner())
        } else if content_type == "application/x-www-form-urlencoded" {
            let fields = web::Form::<PostFields>::from_request(req, &mut payload)
                .await
                .map_err(|e| AppError::Validation(format!("Malformed form: {}", e)))?
                .into_inner();
            Ok(PostUpload {
                text: fields.text.map(Text),
                group: fields.group.map(Text),
                image: None,
            })
        } else {
            Ok(PostUpload::default())
        }
    }

    fn to_form(&self) -> (PostForm, FormErrors) {
        let text = self
            .text
            .as_ref()
            .map(|t| t.0.clone())
            .unwrap_or_default();
        let (group, errors) = match PostForm::parse_group(self.group.as_ref().map(|g| g.0.as_str())) {
            Ok(group) => (group, FormErrors::new()),
            Err(errors) => (None, errors),
        };
        (PostForm { text, group }, errors)
    }
}

fn cached_page(html: String, status: &'static str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(mime::TEXT_HTML_UTF_8)
        .insert_header((CACHE_STATUS_HEADER, status))
        .body(html)
}

/// GET / - every post, newest first, served from the page cache when fresh
pub async fn index(
    state: web::Data<AppState>,
    user: CurrentUser,
    query: PageQuery,
) -> Result<HttpResponse> {
    let raw_page = query.page.as_deref();
    let key = PageKey::page(
        INDEX_CACHE_PREFIX,
        user.id(),
        &PageRequest::cache_token(raw_page),
    );

    match state.page_cache.get(&key).await {
        Ok(Some(html)) => {
            metrics::record_cache_event("hit");
            return Ok(cached_page(html, "HIT"));
        }
        Ok(None) => metrics::record_cache_event("miss"),
        Err(e) => {
            warn!(error = %e, key = %key, "page cache read failed, rendering");
            metrics::record_cache_event("error");
        }
    }

    let page = state.feed.index(raw_page).await?;
    let mut context = base_context(&user);
    context.insert("page_obj", &page);
    context.insert("index", &true);
    let html = state.templates.render("posts/index.html", &context)?;

    if let Err(e) = state
        .page_cache
        .set(&key, &html, state.config.cache.timeout())
        .await
    {
        warn!(error = %e, key = %key, "page cache write failed");
        metrics::record_cache_event("error");
    }

    Ok(cached_page(html, "MISS"))
}

/// GET /group/{slug}/
pub async fn group_posts(
    state: web::Data<AppState>,
    user: CurrentUser,
    slug: web::Path<String>,
    query: PageQuery,
) -> Result<HttpResponse> {
    let group = state
        .repo
        .find_group_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("group {}", slug)))?;
    let page = state.feed.group(group.id, query.page.as_deref()).await?;

    let mut context = base_context(&user);
    context.insert("group", &group);
    context.insert("page_obj", &page);
    state.templates.page("posts/group_list.html", &context)
}

/// GET /profile/{username}/
pub async fn profile(
    state: web::Data<AppState>,
    user: CurrentUser,
    username: web::Path<String>,
    query: PageQuery,
) -> Result<HttpResponse> {
    let author = state.accounts.find_by_username(&username).await?;
    let page = state.feed.profile(author.id, query.page.as_deref()).await?;
    let following = state.follows.is_following(user.user(), &author).await?;

    let mut context = base_context(&user);
    context.insert("author", &author.summary());
    context.insert("posts_count", &page.count);
    context.insert("page_obj", &page);
    context.insert("following", &following);
    state.templates.page("posts/profile.html", &context)
}

/// GET /posts/{id}/
pub async fn post_detail(
    state: web::Data<AppState>,
    user: CurrentUser,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = state.posts.get_post_view(*post_id).await?;
    let posts_count = state.posts.posts_count(post.author.id).await?;
    let comments = state.posts.comments(post.id).await?;

    let mut context = base_context(&user);
    let label = truncate_chars(&post.text, state.config.blog.text_field_limit);
    context.insert("post_label", &label);
    context.insert("post", &post);
    context.insert("posts_count", &posts_count);
    context.insert("form", &CommentForm::default());
    context.insert("comments", &comments);
    state.templates.page("posts/post_detail.html", &context)
}

/// Render the create/edit page
async fn render_post_form(
    state: &AppState,
    user: &User,
    form: &PostForm,
    errors: &FormErrors,
    editing: Option<&Post>,
) -> Result<HttpResponse> {
    let groups = state.repo.list_groups().await?;

    let mut context = base_context(&CurrentUser(Some(user.clone())));
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("groups", &groups);
    context.insert("is_edit", &editing.is_some());
    if let Some(post) = editing {
        context.insert("post_id", &post.id);
        context.insert("current_image", &post.image);
    }
    state.templates.page("posts/create_post.html", &context)
}

/// Validate an upload; stores the image only when everything is valid
async fn accept_upload(
    state: &AppState,
    upload: &PostUpload,
) -> Result<std::result::Result<(PostForm, Option<String>), (PostForm, FormErrors)>> {
    let (form, mut errors) = upload.to_form();
    errors.merge(state.posts.validate(&form).await?);

    let file = match state.media.check_upload(upload.image.as_ref()) {
        Ok(file) => file,
        Err(image_errors) => {
            errors.merge(image_errors);
            None
        }
    };
    if !errors.is_empty() {
        return Ok(Err((form, errors)));
    }

    let image = match file {
        Some(file) => Some(state.media.save_post_image(file).await?),
        None => None,
    };
    Ok(Ok((form, image)))
}

/// GET /create/
pub async fn post_create_form(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    render_post_form(&state, &user.0, &PostForm::default(), &FormErrors::new(), None).await
}

/// POST /create/ - the author is always the signed-in user
pub async fn post_create(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse> {
    let author = user.0;
    let upload = PostUpload::read(&req, payload).await?;
    match accept_upload(&state, &upload).await? {
        Ok((form, image)) => {
            state.posts.create(&author, form, image).await?;
            Ok(redirect(&profile_url(&author.username)))
        }
        Err((form, errors)) => render_post_form(&state, &author, &form, &errors, None).await,
    }
}

/// GET /posts/{id}/edit/ - non-authors are sent back to the post
pub async fn post_edit_form(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = state.posts.get_post(*post_id).await?;
    if let Err(redirect) = check_post_ownership(&user.0, &post) {
        return Ok(redirect);
    }

    let form = PostForm {
        text: post.text.clone(),
        group: post.group_id,
    };
    render_post_form(&state, &user.0, &form, &FormErrors::new(), Some(&post)).await
}

/// POST /posts/{id}/edit/ - ownership is settled before the body is read
pub async fn post_edit(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    post_id: web::Path<i64>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse> {
    let post = state.posts.get_post(*post_id).await?;
    if let Err(redirect) = check_post_ownership(&user.0, &post) {
        return Ok(redirect);
    }

    let upload = PostUpload::read(&req, payload).await?;
    match accept_upload(&state, &upload).await? {
        Ok((form, image)) => {
            state.posts.update(&post, form, image).await?;
            Ok(redirect(&post_detail_url(post.id)))
        }
        Err((form, errors)) => render_post_form(&state, &user.0, &form, &errors, Some(&post)).await,
    }
}

/// POST /posts/{id}/comment/ - always lands back on the post
pub async fn add_comment(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    post_id: web::Path<i64>,
    form: Option<web::Form<CommentForm>>,
) -> Result<HttpResponse> {
    let post = state.posts.get_post(*post_id).await?;
    let form = form.map(|f| f.into_inner()).unwrap_or_default();
    state.posts.add_comment(&user.0, &post, &form).await?;
    Ok(redirect(&post_detail_url(post.id)))
}

/// GET /posts/{id}/comment/
pub async fn comment_redirect(
    state: web::Data<AppState>,
    _user: AuthenticatedUser,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = state.posts.get_post(*post_id).await?;
    Ok(redirect(&post_detail_url(post.id)))
}

/// GET /follow/ - posts by followed authors
pub async fn follow_index(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: PageQuery,
) -> Result<HttpResponse> {
    let page = state
        .feed
        .follow_feed(user.0.id, query.page.as_deref())
        .await?;

    let mut context = base_context(&CurrentUser(Some(user.0)));
    context.insert("page_obj", &page);
    context.insert("follow", &true);
    state.templates.page("posts/follow.html", &context)
}

/// GET /profile/{username}/follow/
pub async fn profile_follow(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    username: web::Path<String>,
) -> Result<HttpResponse> {
    let author = state.accounts.find_by_username(&username).await?;
    state.follows.follow(&user.0, &author).await?;
    Ok(redirect(&profile_url(&author.username)))
}

/// GET /profile/{username}/unfollow/
pub async fn profile_unfollow(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    username: web::Path<String>,
) -> Result<HttpResponse> {
    let author = state.accounts.find_by_username(&username).await?;
    state.follows.unfollow(&user.0, &author).await?;
    Ok(redirect(&profile_url(&author.username)))
}
