/// Blog Service Library
///
/// A social blogging site: authors write posts, file them into groups,
/// comment on each other's posts and follow one another.
///
/// # Modules
///
/// - `config`: Service configuration
/// - `error`: Error types and handling
/// - `forms`: Form inputs and validation rules
/// - `handlers`: HTTP request handlers
/// - `metrics`: Prometheus collectors
/// - `middleware`: Sessions and permission checks
/// - `models`: Data models
/// - `pagination`: Feed paging
/// - `repository`: Storage port and adapters
/// - `services`: Business logic layer
/// - `templates`: HTML rendering
pub mod config;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod services;
pub mod templates;

pub use config::Config;
pub use error::{AppError, Result};

use actix_multipart::form::MultipartFormConfig;
use actix_web::web;
use page_cache::PageCache;
use std::sync::Arc;

use middleware::SessionKeys;
use repository::SharedRepository;
use services::{
    AccountService, EmailService, FeedService, FollowService, MediaStore, PostService,
};
use templates::Templates;

/// Multipart allowance on top of the image itself for the text fields
const FORM_OVERHEAD_BYTES: usize = 256 * 1024;

/// Everything a request handler can reach, shared across workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repo: SharedRepository,
    pub page_cache: Arc<dyn PageCache>,
    pub templates: Templates,
    pub sessions: SessionKeys,
    pub feed: FeedService,
    pub follows: FollowService,
    pub posts: PostService,
    pub accounts: AccountService,
    pub media: MediaStore,
    pub email: EmailService,
}

impl AppState {
    pub fn new(
        config: Config,
        repo: SharedRepository,
        page_cache: Arc<dyn PageCache>,
    ) -> Result<Self> {
        let templates = Templates::load()?;
        let sessions = SessionKeys::new(&config.session);
        let media = MediaStore::new(config.media.root.clone(), config.media.max_upload_bytes);
        let email = EmailService::new(&config.email)?;

        Ok(Self {
            feed: FeedService::new(repo.clone(), config.blog.paginator_limit),
            follows: FollowService::new(repo.clone()),
            posts: PostService::new(repo.clone()),
            accounts: AccountService::new(repo.clone()),
            config: Arc::new(config),
            repo,
            page_cache,
            templates,
            sessions,
            media,
            email,
        })
    }
}

/// Register application data and every route.
///
/// Shared by the server binary and the HTTP tests.
pub fn configure(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        let upload_limit = state.config.media.max_upload_bytes + FORM_OVERHEAD_BYTES;
        cfg.app_data(web::Data::new(state))
            .app_data(
                MultipartFormConfig::default()
                    .total_limit(upload_limit)
                    .memory_limit(FORM_OVERHEAD_BYTES),
            )
            .configure(handlers::routes);
    }
}
