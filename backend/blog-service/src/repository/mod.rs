/// Storage port for blog-service
///
/// Handlers and services only talk to `BlogRepository`. Two adapters exist:
/// `PgBlogRepository` for production and `InMemoryBlogRepository` for tests
/// and local runs without a database.
use crate::error::Result;
use crate::models::{
    Comment, CommentView, Group, NewGroup, NewPost, NewUser, Post, PostChanges, PostView, User,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryBlogRepository;
pub use postgres::PgBlogRepository;

/// Handle shared by services and handlers
pub type SharedRepository = std::sync::Arc<dyn BlogRepository>;

/// Base collection a feed is cut from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts written by any of these authors
    Authors(Vec<i64>),
}

impl PostFilter {
    pub(crate) fn group_id(&self) -> Option<i64> {
        match self {
            PostFilter::Group(id) => Some(*id),
            _ => None,
        }
    }

    pub(crate) fn author_ids(&self) -> Option<Vec<i64>> {
        match self {
            PostFilter::Author(id) => Some(vec![*id]),
            PostFilter::Authors(ids) => Some(ids.clone()),
            _ => None,
        }
    }

    pub(crate) fn matches(&self, post: &Post) -> bool {
        match self {
            PostFilter::All => true,
            PostFilter::Group(id) => post.group_id == Some(*id),
            PostFilter::Author(id) => post.author_id == *id,
            PostFilter::Authors(ids) => ids.contains(&post.author_id),
        }
    }
}

/// Every persistence operation the application needs.
///
/// Feeds are returned newest first (`pub_date DESC, id DESC`); comments in
/// creation order.
#[async_trait::async_trait]
pub trait BlogRepository: Send + Sync {
    /// Returns `None` when the username is taken
    async fn create_user(&self, user: NewUser) -> Result<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Users whose email matches case-insensitively, ordered by id
    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>>;

    async fn update_user_password(&self, user_id: i64, password_hash: &str) -> Result<()>;

    /// Returns `None` when the slug is taken
    async fn create_group(&self, group: NewGroup) -> Result<Option<Group>>;

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>>;

    async fn find_group_by_id(&self, id: i64) -> Result<Option<Group>>;

    /// All groups ordered by title
    async fn list_groups(&self) -> Result<Vec<Group>>;

    async fn insert_post(&self, post: NewPost) -> Result<Post>;

    /// Returns `None` when the post does not exist
    async fn update_post(&self, post_id: i64, changes: PostChanges) -> Result<Option<Post>>;

    async fn find_post(&self, id: i64) -> Result<Option<Post>>;

    async fn find_post_view(&self, id: i64) -> Result<Option<PostView>>;

    async fn count_posts(&self, filter: &PostFilter) -> Result<usize>;

    async fn list_posts(
        &self,
        filter: &PostFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostView>>;

    async fn insert_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<Comment>;

    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentView>>;

    /// Idempotent; returns true if a new edge was stored
    async fn insert_follow(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Idempotent; returns true if an edge was removed
    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool>;

    async fn follow_exists(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Authors `user_id` follows, ordered by username
    async fn followed_authors(&self, user_id: i64) -> Result<Vec<User>>;

    async fn health_check(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(author_id: i64, group_id: Option<i64>) -> Post {
        Post {
            id: 1,
            text: "text".into(),
            pub_date: Utc::now(),
            author_id,
            group_id,
            image: None,
        }
    }

    #[test]
    fn test_filter_matches() {
        assert!(PostFilter::All.matches(&post(1, None)));
        assert!(PostFilter::Group(2).matches(&post(1, Some(2))));
        assert!(!PostFilter::Group(2).matches(&post(1, None)));
        assert!(PostFilter::Author(1).matches(&post(1, None)));
        assert!(PostFilter::Authors(vec![3, 1]).matches(&post(1, None)));
        assert!(!PostFilter::Authors(vec![]).matches(&post(1, None)));
    }

    #[test]
    fn test_filter_bind_values() {
        assert_eq!(PostFilter::All.group_id(), None);
        assert_eq!(PostFilter::All.author_ids(), None);
        assert_eq!(PostFilter::Group(4).group_id(), Some(4));
        assert_eq!(PostFilter::Author(5).author_ids(), Some(vec![5]));
    }
}
