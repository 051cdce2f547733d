#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::test;
use page_cache::MemoryPageCache;
use std::path::PathBuf;
use std::sync::Arc;

use blog_service::config::{
    AppConfig, BlogConfig, CacheConfig, DatabaseConfig, EmailConfig, MediaConfig, SessionConfig,
};
use blog_service::models::{Group, NewGroup, NewPost, NewUser, Post, User};
use blog_service::repository::{BlogRepository, InMemoryBlogRepository, SharedRepository};
use blog_service::services::password::hash_password;
use blog_service::{AppState, Config};

pub const PASSWORD: &str = "Str0ngPassw0rd";

/// 2x1 transparent GIF
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

/// Build the full application around `$state`, themed error pages included
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(blog_service::handlers::site::error_pages())
                .configure(blog_service::configure($state.clone())),
        )
        .await
    };
}
pub(crate) use test_app;

pub fn test_config(media_root: PathBuf, mail_dir: PathBuf, cache_timeout_secs: u64) -> Config {
    Config {
        app: AppConfig {
            env: "test".into(),
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseConfig {
            url: "postgres://unused".into(),
            max_connections: 1,
            min_connections: 0,
        },
        cache: CacheConfig {
            redis_url: None,
            timeout_secs: cache_timeout_secs,
            max_entries: 300,
        },
        blog: BlogConfig {
            paginator_limit: 10,
            text_field_limit: 15,
        },
        session: SessionConfig {
            secret: "integration-test-session-secret-0123456789".into(),
            ttl_secs: 3600,
            reset_ttl_secs: 3600,
            secure_cookie: false,
        },
        media: MediaConfig {
            root: media_root,
            max_upload_bytes: 1024 * 1024,
        },
        email: EmailConfig {
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            use_starttls: true,
            from: "webmaster@localhost".into(),
            file_path: mail_dir,
        },
    }
}

/// Application state over the in-memory adapters and a private media root
pub struct TestContext {
    pub state: AppState,
    pub repo: SharedRepository,
    pub media_root: PathBuf,
    pub mail_dir: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_cache_timeout(20)
    }

    pub fn with_cache_timeout(secs: u64) -> Self {
        let media_root =
            std::env::temp_dir().join(format!("blog-media-{}", uuid::Uuid::new_v4().simple()));
        let mail_dir =
            std::env::temp_dir().join(format!("blog-mail-{}", uuid::Uuid::new_v4().simple()));
        let repo: SharedRepository = Arc::new(InMemoryBlogRepository::new());
        let state = AppState::new(
            test_config(media_root.clone(), mail_dir.clone(), secs),
            repo.clone(),
            Arc::new(MemoryPageCache::new()),
        )
        .expect("templates load");

        Self {
            state,
            repo,
            media_root,
            mail_dir,
        }
    }

    pub async fn user(&self, username: &str) -> User {
        self.repo
            .create_user(NewUser {
                username: username.into(),
                email: format!("{}@mail.com", username),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: hash_password(PASSWORD).expect("hash"),
            })
            .await
            .expect("create user")
            .expect("username free")
    }

    pub async fn group(&self, slug: &str, title: &str) -> Group {
        self.repo
            .create_group(NewGroup {
                title: title.into(),
                slug: slug.into(),
                description: format!("Описание {}", title),
            })
            .await
            .expect("create group")
            .expect("slug free")
    }

    pub async fn post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        self.repo
            .insert_post(NewPost {
                author_id: author.id,
                text: text.into(),
                group_id: group.map(|g| g.id),
                image: None,
            })
            .await
            .expect("insert post")
    }

    /// Session cookie as set by a successful login
    pub fn session(&self, user: &User) -> Cookie<'static> {
        let token = self.state.sessions.issue(user).expect("issue session");
        self.state.sessions.cookie(token)
    }

    /// Messages written by the file mail transport
    pub fn sent_mail(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.mail_dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| std::fs::read_to_string(entry.ok()?.path()).ok())
            // undo quoted-printable soft line breaks
            .map(|mail| mail.replace("=\r\n", "").replace("=\n", ""))
            .collect()
    }

    /// Path of the reset link in the only message sent so far
    pub fn reset_path(&self) -> String {
        let mail = self.sent_mail();
        assert_eq!(mail.len(), 1, "expected exactly one message");
        let start = mail[0].find("/auth/reset/").expect("reset link in message");
        let rest = &mail[0][start..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest[..end].to_string()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.media_root);
        let _ = std::fs::remove_dir_all(&self.mail_dir);
    }
}

pub async fn body_string<B: MessageBody>(resp: ServiceResponse<B>) -> String {
    let bytes = test::read_body(resp).await;
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Value stamped on `<body data-template=...>`
pub fn template_name(html: &str) -> Option<&str> {
    let start = html.find(r#"data-template=""#)? + r#"data-template=""#.len();
    let end = html[start..].find('"')?;
    Some(&html[start..start + end])
}

pub fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Ids from `data-post-id` in page order
pub fn post_ids(html: &str) -> Vec<i64> {
    html.split(r#"data-post-id=""#)
        .skip(1)
        .filter_map(|rest| rest.split('"').next()?.parse().ok())
        .collect()
}

/// multipart/form-data body builder
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: format!("----blogtest{}", uuid::Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Content-Type header value and the encoded body
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}
