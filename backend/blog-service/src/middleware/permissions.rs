/// Authorization module for blog-service
///
/// Ownership checks for posts. A failed check is not an error page: the
/// visitor is sent back to the post instead.
use actix_web::{http::header, HttpResponse};

use crate::models::{Post, User};

/// Result type for permission checks; `Err` carries the redirect to send
pub type PermissionResult = Result<(), HttpResponse>;

/// Only the author may edit a post
pub fn check_post_ownership(user: &User, post: &Post) -> PermissionResult {
    if post.author_id == user.id {
        Ok(())
    } else {
        tracing::debug!(post_id = post.id, user_id = user.id, "edit by non-author redirected");
        Err(redirect(&post_detail_url(post.id)))
    }
}

pub fn post_detail_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

/// Usernames may hold any letters, so the segment is percent-encoded
pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

/// 302 to `location`
pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.to_string()))
        .finish()
}
