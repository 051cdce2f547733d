/// Data models for blog-service
///
/// - Rows: `User`, `Group`, `Post`, `Comment`, `Follow` as stored
/// - Views: `PostView`, `CommentView` with author and group already joined,
///   which is what feeds and pages render
/// - Inputs: `NewUser`, `NewGroup`, `NewPost`, `PostChanges`
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display format for publication timestamps
const DATE_FORMAT: &str = "%d %b %Y %H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// "First Last", or the username when neither name is set
    pub fn full_name(&self) -> String {
        display_name(&self.username, &self.first_name, &self.last_name)
    }

    pub fn summary(&self) -> AuthorSummary {
        AuthorSummary::new(self.id, &self.username, &self.first_name, &self.last_name)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub group_id: Option<i64>,
    /// Stored path relative to the media root, e.g. `posts/small.gif`
    pub image: Option<String>,
}

impl Post {
    /// Short label: the first `limit` characters of the text
    pub fn label(&self, limit: usize) -> String {
        truncate_chars(&self.text, limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    pub created: DateTime<Utc>,
}

impl Comment {
    pub fn label(&self, limit: usize) -> String {
        truncate_chars(&self.text, limit)
    }
}

/// Directed edge: `user_id` receives `author_id`'s posts in the follow feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follow {
    pub id: i64,
    pub user_id: i64,
    pub author_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorSummary {
    pub id: i64,
    pub username: String,
    pub full_name: String,
}

impl AuthorSummary {
    pub fn new(id: i64, username: &str, first_name: &str, last_name: &str) -> Self {
        Self {
            id,
            username: username.to_string(),
            full_name: display_name(username, first_name, last_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

impl From<&Group> for GroupSummary {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            title: group.title.clone(),
            slug: group.slug.clone(),
        }
    }
}

/// Post with its author and group resolved, ready for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub published: String,
    pub author: AuthorSummary,
    pub group: Option<GroupSummary>,
    pub image: Option<String>,
}

impl PostView {
    pub fn new(post: &Post, author: &User, group: Option<&Group>) -> Self {
        Self::from_parts(
            post.clone(),
            author.summary(),
            group.map(GroupSummary::from),
        )
    }

    pub fn from_parts(post: Post, author: AuthorSummary, group: Option<GroupSummary>) -> Self {
        Self {
            id: post.id,
            published: post.pub_date.format(DATE_FORMAT).to_string(),
            text: post.text,
            pub_date: post.pub_date,
            author,
            group,
            image: post.image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub text: String,
    pub created: DateTime<Utc>,
    pub published: String,
    pub author: AuthorSummary,
}

impl CommentView {
    pub fn new(comment: &Comment, author: &User) -> Self {
        Self::from_parts(comment.clone(), author.summary())
    }

    pub fn from_parts(comment: Comment, author: AuthorSummary) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            published: comment.created.format(DATE_FORMAT).to_string(),
            text: comment.text,
            created: comment.created,
            author,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// Author-editable fields of a post
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i64>,
    /// `None` keeps the current image
    pub image: Option<String>,
}

fn display_name(username: &str, first_name: &str, last_name: &str) -> String {
    let full = format!("{} {}", first_name, last_name);
    let full = full.trim();
    if full.is_empty() {
        username.to_string()
    } else {
        full.to_string()
    }
}

/// First `limit` characters of `text`, counted as chars not bytes
pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
