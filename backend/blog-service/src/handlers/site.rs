/// Site-wide handlers: themed error pages, uploaded media, health checks
use actix_web::{
    dev::ServiceResponse,
    http::{
        header::{self, HeaderValue},
        StatusCode,
    },
    middleware::{ErrorHandlerResponse, ErrorHandlers},
    web, HttpResponse,
};
use chrono::Utc;
use std::time::Instant;

use super::anonymous_context;
use crate::error::{AppError, Result};
use crate::AppState;

/// Swap plain 404 and 500 bodies for the themed pages.
///
/// Responses keep their status; only the body and content type change.
pub fn error_pages<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new()
        .handler(StatusCode::NOT_FOUND, not_found_page)
        .handler(StatusCode::INTERNAL_SERVER_ERROR, server_error_page)
}

fn not_found_page<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let path = res.request().path().to_string();
    themed_page(res, "core/404.html", Some(path))
}

fn server_error_page<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    themed_page(res, "core/500.html", None)
}

fn themed_page<B>(
    res: ServiceResponse<B>,
    template: &str,
    path: Option<String>,
) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let rendered = match res.request().app_data::<web::Data<AppState>>() {
        Some(state) => {
            let mut context = anonymous_context();
            if let Some(path) = &path {
                context.insert("path", path);
            }
            match state.templates.render(template, &context) {
                Ok(html) => Some(html),
                Err(e) => {
                    tracing::error!(error = %e, template, "failed to render error page");
                    None
                }
            }
        }
        None => None,
    };

    let Some(html) = rendered else {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    };

    let (req, res) = res.into_parts();
    let mut res = res.set_body(html);
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    let res = ServiceResponse::new(req, res)
        .map_into_boxed_body()
        .map_into_right_body();
    Ok(ErrorHandlerResponse::Response(res))
}

/// GET /media/{path} - files stored under MEDIA_ROOT
pub async fn media(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    match state.media.open(&path).await? {
        Some((bytes, mime)) => Ok(HttpResponse::Ok().content_type(mime).body(bytes)),
        None => Err(AppError::NotFound(format!("media {}", path))),
    }
}

/// GET /health - liveness
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "blog-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /health/ready - storage reachable
pub async fn readiness(state: web::Data<AppState>) -> HttpResponse {
    let start = Instant::now();
    let result = state.repo.health_check().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "ready": true,
            "database": { "status": "healthy", "latency_ms": latency_ms },
            "timestamp": Utc::now().to_rfc3339(),
        })),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "ready": false,
                "database": {
                    "status": "unhealthy",
                    "message": e.to_string(),
                    "latency_ms": latency_ms,
                },
                "timestamp": Utc::now().to_rfc3339(),
            }))
        }
    }
}
