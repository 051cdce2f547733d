//! HTML rendering
//!
//! Templates are compiled into the binary and parsed once at startup. Every
//! render gets `template_name` in its context; the base layout stamps it on
//! `<body data-template=...>`.

use actix_web::{http::StatusCode, HttpResponse};
use std::sync::Arc;
use tera::{Context, Tera};

use crate::error::Result;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("includes/header.html", include_str!("../templates/includes/header.html")),
    ("includes/post_card.html", include_str!("../templates/includes/post_card.html")),
    ("includes/paginator.html", include_str!("../templates/includes/paginator.html")),
    ("includes/form_errors.html", include_str!("../templates/includes/form_errors.html")),
    ("posts/index.html", include_str!("../templates/posts/index.html")),
    ("posts/group_list.html", include_str!("../templates/posts/group_list.html")),
    ("posts/profile.html", include_str!("../templates/posts/profile.html")),
    ("posts/post_detail.html", include_str!("../templates/posts/post_detail.html")),
    ("posts/create_post.html", include_str!("../templates/posts/create_post.html")),
    ("posts/follow.html", include_str!("../templates/posts/follow.html")),
    ("users/signup.html", include_str!("../templates/users/signup.html")),
    ("users/login.html", include_str!("../templates/users/login.html")),
    ("users/logged_out.html", include_str!("../templates/users/logged_out.html")),
    ("users/password_change.html", include_str!("../templates/users/password_change.html")),
    (
        "users/password_change_done.html",
        include_str!("../templates/users/password_change_done.html"),
    ),
    (
        "users/password_reset_form.html",
        include_str!("../templates/users/password_reset_form.html"),
    ),
    (
        "users/password_reset_done.html",
        include_str!("../templates/users/password_reset_done.html"),
    ),
    (
        "users/password_reset_confirm.html",
        include_str!("../templates/users/password_reset_confirm.html"),
    ),
    (
        "users/password_reset_complete.html",
        include_str!("../templates/users/password_reset_complete.html"),
    ),
    ("about/author.html", include_str!("../templates/about/author.html")),
    ("about/tech.html", include_str!("../templates/about/tech.html")),
    ("core/404.html", include_str!("../templates/core/404.html")),
    ("core/500.html", include_str!("../templates/core/500.html")),
];

#[derive(Clone)]
pub struct Templates {
    tera: Arc<Tera>,
}

impl Templates {
    /// Parse every embedded template
    pub fn load() -> std::result::Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<String> {
        let mut context = context.clone();
        context.insert("template_name", name);
        Ok(self.tera.render(name, &context)?)
    }

    /// Render `name` into an HTML response with `status`
    pub fn respond(&self, status: StatusCode, name: &str, context: &Context) -> Result<HttpResponse> {
        let body = self.render(name, context)?;
        Ok(HttpResponse::build(status)
            .content_type(mime::TEXT_HTML_UTF_8)
            .body(body))
    }

    pub fn page(&self, name: &str, context: &Context) -> Result<HttpResponse> {
        self.respond(StatusCode::OK, name, context)
    }
}
