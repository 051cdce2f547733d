//! HTTP handlers for blog-service
//!
//! Route table:
//!
//! - `/`, `/group/{slug}/`, `/profile/{username}/`, `/posts/{id}/`: feeds and detail
//! - `/create/`, `/posts/{id}/edit/`, `/posts/{id}/comment/`: authoring
//! - `/follow/`, `/profile/{username}/follow/`, `/profile/{username}/unfollow/`: follow graph
//! - `/auth/*`: accounts
//! - `/about/*`: static pages
//! - `/media/*`, `/health`, `/health/ready`, `/metrics`: infrastructure
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use tera::Context;

use crate::middleware::CurrentUser;
use crate::models::AuthorSummary;

pub mod about;
pub mod posts;
pub mod site;
pub mod users;

/// `?page=` as typed by the visitor.
///
/// Never rejects a request: a repeated `page` keeps the last value and an
/// unparseable query string counts as no page at all.
#[derive(Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn from_query_string(query: &str) -> Self {
        let page = web::Query::<Vec<(String, String)>>::from_query(query)
            .map(|pairs| {
                pairs
                    .into_inner()
                    .into_iter()
                    .filter(|(name, _)| name == "page")
                    .map(|(_, value)| value)
                    .last()
            })
            .unwrap_or_default();
        Self { page }
    }
}

impl FromRequest for PageQuery {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(Self::from_query_string(req.query_string())))
    }
}

/// Context every page starts from: who is signed in
pub fn base_context(user: &CurrentUser) -> Context {
    let mut context = Context::new();
    context.insert("current_user", &user.user().map(|u| u.summary()));
    context
}

pub(crate) fn anonymous_context() -> Context {
    let mut context = Context::new();
    context.insert("current_user", &Option::<AuthorSummary>::None);
    context
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(posts::index))
        .route("/group/{slug}/", web::get().to(posts::group_posts))
        .route("/profile/{username}/", web::get().to(posts::profile))
        .route("/profile/{username}/follow/", web::get().to(posts::profile_follow))
        .route("/profile/{username}/unfollow/", web::get().to(posts::profile_unfollow))
        .route("/posts/{post_id}/", web::get().to(posts::post_detail))
        .service(
            web::resource("/create/")
                .route(web::get().to(posts::post_create_form))
                .route(web::post().to(posts::post_create)),
        )
        .service(
            web::resource("/posts/{post_id}/edit/")
                .route(web::get().to(posts::post_edit_form))
                .route(web::post().to(posts::post_edit)),
        )
        .service(
            web::resource("/posts/{post_id}/comment/")
                .route(web::get().to(posts::comment_redirect))
                .route(web::post().to(posts::add_comment)),
        )
        .route("/follow/", web::get().to(posts::follow_index))
        .service(
            web::scope("/auth")
                .service(
                    web::resource("/signup/")
                        .route(web::get().to(users::signup_form))
                        .route(web::post().to(users::signup)),
                )
                .service(
                    web::resource("/login/")
                        .route(web::get().to(users::login_form))
                        .route(web::post().to(users::login)),
                )
                .service(
                    web::resource("/logout/")
                        .route(web::get().to(users::logout))
                        .route(web::post().to(users::logout)),
                )
                .service(
                    web::resource("/password_change/")
                        .route(web::get().to(users::password_change_form))
                        .route(web::post().to(users::password_change)),
                )
                .route(
                    "/password_change/done/",
                    web::get().to(users::password_change_done),
                )
                .service(
                    web::resource("/password_reset/")
                        .route(web::get().to(users::password_reset_form))
                        .route(web::post().to(users::password_reset)),
                )
                .route(
                    "/password_reset/done/",
                    web::get().to(users::password_reset_done),
                )
                // before the token route, which would also match "done"
                .route("/reset/done/", web::get().to(users::password_reset_complete))
                .service(
                    web::resource("/reset/{token}/")
                        .route(web::get().to(users::password_reset_confirm_form))
                        .route(web::post().to(users::password_reset_confirm)),
                ),
        )
        .service(
            web::scope("/about")
                .route("/author/", web::get().to(about::author))
                .route("/tech/", web::get().to(about::tech)),
        )
        .route("/media/{path:.*}", web::get().to(site::media))
        .route("/health", web::get().to(site::health))
        .route("/health/ready", web::get().to(site::readiness))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics));
}
