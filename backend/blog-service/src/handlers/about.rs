/// Static "about" pages
use actix_web::{web, HttpResponse};

use super::base_context;
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::AppState;

/// GET /about/author/
pub async fn author(state: web::Data<AppState>, user: CurrentUser) -> Result<HttpResponse> {
    state
        .templates
        .page("about/author.html", &base_context(&user))
}

/// GET /about/tech/
pub async fn tech(state: web::Data<AppState>, user: CurrentUser) -> Result<HttpResponse> {
    state.templates.page("about/tech.html", &base_context(&user))
}
