/// Error types for Blog Service
///
/// Every variant maps to an HTTP status. 404 and 500 bodies are swapped for
/// the themed pages by the `ErrorHandlers` middleware registered in
/// `handlers::site::error_pages`; a missing session becomes a redirect to the
/// login page instead of an error body.
use actix_web::{
    error::ResponseError,
    http::{header, StatusCode},
    HttpResponse,
};
use thiserror::Error;

/// Result type for blog-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] page_cache::CacheError),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Anonymous access to a route that needs a session
    #[error("Login required for {next}")]
    LoginRequired { next: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Login URL carrying `next` the way browsers expect it back.
    ///
    /// Slashes stay readable; everything else is percent-encoded.
    pub fn login_url(next: &str) -> String {
        let encoded = urlencoding::encode(next).replace("%2F", "/");
        format!("/auth/login/?next={}", encoded)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::LoginRequired { .. } => StatusCode::FOUND,
            AppError::Database(_)
            | AppError::Cache(_)
            | AppError::Template(_)
            | AppError::Io(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        match self {
            AppError::LoginRequired { next } => HttpResponse::Found()
                .insert_header((header::LOCATION, Self::login_url(next)))
                .finish(),
            AppError::NotFound(_) | AppError::Validation(_) => {
                HttpResponse::build(status).body(self.to_string())
            }
            _ => {
                tracing::error!(error = %self, "request failed");
                // Internal details stay in the log
                HttpResponse::build(status).body("Internal server error")
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}
