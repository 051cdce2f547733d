use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{BlogRepository, PostFilter};
use crate::error::Result;
use crate::models::{
    AuthorSummary, Comment, CommentView, Group, GroupSummary, NewGroup, NewPost, NewUser, Post,
    PostChanges, PostView, User,
};

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, date_joined";

/// Posts joined with author and group.
///
/// `$1` narrows to a group, `$2` to a set of authors; NULL disables either.
const POST_VIEW_SELECT: &str = r#"
    SELECT p.id, p.text, p.pub_date, p.image, p.author_id, p.group_id,
           u.username AS author_username,
           u.first_name AS author_first_name,
           u.last_name AS author_last_name,
           g.title AS group_title,
           g.slug AS group_slug
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

const FEED_WHERE: &str = r#"
    WHERE ($1::BIGINT IS NULL OR p.group_id = $1)
      AND ($2::BIGINT[] IS NULL OR p.author_id = ANY($2))
"#;

#[derive(sqlx::FromRow)]
struct PostViewRow {
    id: i64,
    text: String,
    pub_date: DateTime<Utc>,
    image: Option<String>,
    author_id: i64,
    group_id: Option<i64>,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
    group_title: Option<String>,
    group_slug: Option<String>,
}

impl From<PostViewRow> for PostView {
    fn from(row: PostViewRow) -> Self {
        let author = AuthorSummary::new(
            row.author_id,
            &row.author_username,
            &row.author_first_name,
            &row.author_last_name,
        );
        let group = match (row.group_id, row.group_title, row.group_slug) {
            (Some(id), Some(title), Some(slug)) => Some(GroupSummary { id, title, slug }),
            _ => None,
        };
        let post = Post {
            id: row.id,
            text: row.text,
            pub_date: row.pub_date,
            author_id: row.author_id,
            group_id: row.group_id,
            image: row.image,
        };
        PostView::from_parts(post, author, group)
    }
}

#[derive(sqlx::FromRow)]
struct CommentViewRow {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    created: DateTime<Utc>,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
}

impl From<CommentViewRow> for CommentView {
    fn from(row: CommentViewRow) -> Self {
        let author = AuthorSummary::new(
            row.author_id,
            &row.author_username,
            &row.author_first_name,
            &row.author_last_name,
        );
        let comment = Comment {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            text: row.text,
            created: row.created,
        };
        CommentView::from_parts(comment, author)
    }
}

/// PostgreSQL adapter
#[derive(Clone)]
pub struct PgBlogRepository {
    pool: PgPool,
}

impl PgBlogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BlogRepository for PgBlogRepository {
    async fn create_user(&self, user: NewUser) -> Result<Option<User>> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, first_name, last_name, password_hash, date_joined)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (username) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.password_hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(created)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1) ORDER BY id");
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn update_user_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_group(&self, group: NewGroup) -> Result<Option<Group>> {
        let created = sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO post_groups (title, slug, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO NOTHING
            RETURNING id, title, slug, description
            "#,
        )
        .bind(&group.title)
        .bind(&group.slug)
        .bind(&group.description)
        .fetch_optional(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, title, slug, description FROM post_groups WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    async fn find_group_by_id(&self, id: i64) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, title, slug, description FROM post_groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(
            "SELECT id, title, slug, description FROM post_groups ORDER BY title, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(groups)
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let created = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (text, pub_date, author_id, group_id, image)
            VALUES ($1, NOW(), $2, $3, $4)
            RETURNING id, text, pub_date, author_id, group_id, image
            "#,
        )
        .bind(&post.text)
        .bind(post.author_id)
        .bind(post.group_id)
        .bind(&post.image)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update_post(&self, post_id: i64, changes: PostChanges) -> Result<Option<Post>> {
        let updated = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET text = $2, group_id = $3, image = COALESCE($4, image)
            WHERE id = $1
            RETURNING id, text, pub_date, author_id, group_id, image
            "#,
        )
        .bind(post_id)
        .bind(&changes.text)
        .bind(changes.group_id)
        .bind(&changes.image)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn find_post(&self, id: i64) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            "SELECT id, text, pub_date, author_id, group_id, image FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn find_post_view(&self, id: i64) -> Result<Option<PostView>> {
        let sql = format!("{POST_VIEW_SELECT} WHERE p.id = $1");
        let row = sqlx::query_as::<_, PostViewRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PostView::from))
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM posts p {FEED_WHERE}");
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(filter.group_id())
            .bind(filter.author_ids())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostView>> {
        let sql = format!(
            "{POST_VIEW_SELECT} {FEED_WHERE} ORDER BY p.pub_date DESC, p.id DESC LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, PostViewRow>(&sql)
            .bind(filter.group_id())
            .bind(filter.author_ids())
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(PostView::from).collect())
    }

    async fn insert_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (post_id, author_id, text, created)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, post_id, author_id, text, created
            "#,
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentView>> {
        let rows = sqlx::query_as::<_, CommentViewRow>(
            r#"
            SELECT c.id, c.post_id, c.author_id, c.text, c.created,
                   u.username AS author_username,
                   u.first_name AS author_first_name,
                   u.last_name AS author_last_name
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created ASC, c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CommentView::from).collect())
    }

    async fn insert_follow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let inserted = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO follows (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, author_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted.is_some())
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let affected = sqlx::query(
            r#"
            DELETE FROM follows
            WHERE user_id = $1 AND author_id = $2
            "#,
        )
        .bind(user_id)
        .bind(author_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn follow_exists(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn followed_authors(&self, user_id: i64) -> Result<Vec<User>> {
        let authors = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.first_name, u.last_name,
                   u.password_hash, u.date_joined
            FROM follows f
            JOIN users u ON u.id = f.author_id
            WHERE f.user_id = $1
            ORDER BY u.username
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
