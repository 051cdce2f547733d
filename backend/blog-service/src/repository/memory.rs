//! In-process repository used by the test suite and by local runs
//!
//! Mirrors the PostgreSQL adapter: unique usernames, slugs and follow edges,
//! the same feed ordering and the same `None`-on-conflict results.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{BlogRepository, PostFilter};
use crate::error::Result;
use crate::models::{
    Comment, CommentView, Follow, Group, NewGroup, NewPost, NewUser, Post, PostChanges, PostView,
    User,
};

#[derive(Default)]
struct State {
    users: Vec<User>,
    groups: Vec<Group>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
    next_id: HashMap<&'static str, i64>,
}

impl State {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let id = self.next_id.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn user(&self, id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn group(&self, id: i64) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    fn view(&self, post: &Post) -> Option<PostView> {
        let author = self.user(post.author_id)?;
        let group = post.group_id.and_then(|id| self.group(id));
        Some(PostView::new(post, author, group))
    }

    /// Matching posts, newest first
    fn feed(&self, filter: &PostFilter) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self.posts.iter().filter(|p| filter.matches(p)).collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }
}

#[derive(Clone, Default)]
pub struct InMemoryBlogRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryBlogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BlogRepository for InMemoryBlogRepository {
    async fn create_user(&self, user: NewUser) -> Result<Option<User>> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.username == user.username) {
            return Ok(None);
        }

        let created = User {
            id: state.next_id("users"),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.password_hash,
            date_joined: Utc::now(),
        };
        state.users.push(created.clone());
        Ok(Some(created))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.state.read().await.user(id).cloned())
    }

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>> {
        let email = email.to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .filter(|u| u.email.to_lowercase() == email)
            .cloned()
            .collect())
    }

    async fn update_user_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn create_group(&self, group: NewGroup) -> Result<Option<Group>> {
        let mut state = self.state.write().await;
        if state.groups.iter().any(|g| g.slug == group.slug) {
            return Ok(None);
        }

        let created = Group {
            id: state.next_id("groups"),
            title: group.title,
            slug: group.slug,
            description: group.description,
        };
        state.groups.push(created.clone());
        Ok(Some(created))
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let state = self.state.read().await;
        Ok(state.groups.iter().find(|g| g.slug == slug).cloned())
    }

    async fn find_group_by_id(&self, id: i64) -> Result<Option<Group>> {
        Ok(self.state.read().await.group(id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let mut groups = self.state.read().await.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let mut state = self.state.write().await;
        let created = Post {
            id: state.next_id("posts"),
            text: post.text,
            pub_date: Utc::now(),
            author_id: post.author_id,
            group_id: post.group_id,
            image: post.image,
        };
        state.posts.push(created.clone());
        Ok(created)
    }

    async fn update_post(&self, post_id: i64, changes: PostChanges) -> Result<Option<Post>> {
        let mut state = self.state.write().await;
        let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) else {
            return Ok(None);
        };

        post.text = changes.text;
        post.group_id = changes.group_id;
        if changes.image.is_some() {
            post.image = changes.image;
        }
        Ok(Some(post.clone()))
    }

    async fn find_post(&self, id: i64) -> Result<Option<Post>> {
        let state = self.state.read().await;
        Ok(state.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn find_post_view(&self, id: i64) -> Result<Option<PostView>> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| state.view(p)))
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state.posts.iter().filter(|p| filter.matches(p)).count())
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostView>> {
        let state = self.state.read().await;
        Ok(state
            .feed(filter)
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|p| state.view(p))
            .collect())
    }

    async fn insert_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<Comment> {
        let mut state = self.state.write().await;
        let comment = Comment {
            id: state.next_id("comments"),
            post_id,
            author_id,
            text: text.to_string(),
            created: Utc::now(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentView>> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .filter_map(|c| state.user(c.author_id).map(|u| CommentView::new(c, u)))
            .collect())
    }

    async fn insert_follow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        let exists = state
            .follows
            .iter()
            .any(|f| f.user_id == user_id && f.author_id == author_id);
        if exists || user_id == author_id {
            return Ok(false);
        }

        let id = state.next_id("follows");
        state.follows.push(Follow {
            id,
            user_id,
            author_id,
        });
        Ok(true)
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.follows.len();
        state
            .follows
            .retain(|f| !(f.user_id == user_id && f.author_id == author_id));
        Ok(state.follows.len() < before)
    }

    async fn follow_exists(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .iter()
            .any(|f| f.user_id == user_id && f.author_id == author_id))
    }

    async fn followed_authors(&self, user_id: i64) -> Result<Vec<User>> {
        let state = self.state.read().await;
        let mut authors: Vec<User> = state
            .follows
            .iter()
            .filter(|f| f.user_id == user_id)
            .filter_map(|f| state.user(f.author_id).cloned())
            .collect();
        authors.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(authors)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
