/// Post service - handles post creation, editing, and comments
use crate::error::{AppError, Result};
use crate::forms::{CommentForm, FormErrors, PostForm};
use crate::metrics;
use crate::models::{Comment, CommentView, NewPost, Post, PostChanges, PostView, User};
use crate::repository::{PostFilter, SharedRepository};
use tracing::{debug, info};

#[derive(Clone)]
pub struct PostService {
    repo: SharedRepository,
}

impl PostService {
    pub fn new(repo: SharedRepository) -> Self {
        Self { repo }
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: i64) -> Result<Post> {
        self.repo
            .find_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))
    }

    /// Get a post with its author and group resolved
    pub async fn get_post_view(&self, post_id: i64) -> Result<PostView> {
        self.repo
            .find_post_view(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))
    }

    /// Total posts written by `author_id`
    pub async fn posts_count(&self, author_id: i64) -> Result<usize> {
        self.repo.count_posts(&PostFilter::Author(author_id)).await
    }

    pub async fn comments(&self, post_id: i64) -> Result<Vec<CommentView>> {
        self.repo.list_comments(post_id).await
    }

    /// Run the form rules plus the "group exists" check
    pub async fn validate(&self, form: &PostForm) -> Result<FormErrors> {
        let mut errors = FormErrors::check(form);
        if let Some(group_id) = form.group {
            if self.repo.find_group_by_id(group_id).await?.is_none() {
                errors.add("group", "Select a valid choice.");
            }
        }
        Ok(errors)
    }

    /// Create a post written by `author`.
    ///
    /// The author always comes from the session, never from submitted data.
    pub async fn create(&self, author: &User, form: PostForm, image: Option<String>) -> Result<Post> {
        let post = self
            .repo
            .insert_post(NewPost {
                author_id: author.id,
                text: form.text,
                group_id: form.group,
                image,
            })
            .await?;

        info!(post_id = post.id, author_id = author.id, "post created");
        metrics::POSTS_CREATED.inc();
        Ok(post)
    }

    /// Apply an edit; `image: None` keeps the current image
    pub async fn update(&self, post: &Post, form: PostForm, image: Option<String>) -> Result<Post> {
        let updated = self
            .repo
            .update_post(
                post.id,
                PostChanges {
                    text: form.text,
                    group_id: form.group,
                    image,
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post.id)))?;

        info!(post_id = post.id, "post updated");
        Ok(updated)
    }

    /// Attach a comment by `author` to `post`.
    ///
    /// Blank comments are dropped; returns `None` when nothing was saved.
    pub async fn add_comment(
        &self,
        author: &User,
        post: &Post,
        form: &CommentForm,
    ) -> Result<Option<Comment>> {
        if !FormErrors::check(form).is_empty() {
            debug!(post_id = post.id, author_id = author.id, "blank comment dropped");
            return Ok(None);
        }

        let comment = self
            .repo
            .insert_comment(post.id, author.id, form.text.trim())
            .await?;

        info!(comment_id = comment.id, post_id = post.id, "comment created");
        metrics::COMMENTS_CREATED.inc();
        Ok(Some(comment))
    }
}
