/// Feed assembly - ordered, paginated post lists for every feed page
use crate::error::Result;
use crate::models::PostView;
use crate::pagination::{Page, PageRequest};
use crate::repository::{PostFilter, SharedRepository};

#[derive(Clone)]
pub struct FeedService {
    repo: SharedRepository,
    per_page: usize,
}

impl FeedService {
    pub fn new(repo: SharedRepository, per_page: usize) -> Self {
        Self { repo, per_page }
    }

    /// Cut one page out of the collection selected by `filter`.
    ///
    /// One COUNT query resolves the page number, then one LIMIT/OFFSET
    /// query fetches the slice.
    pub async fn page(&self, filter: &PostFilter, raw_page: Option<&str>) -> Result<Page<PostView>> {
        let count = self.repo.count_posts(filter).await?;
        let request = PageRequest::resolve(raw_page, self.per_page, count);

        let items = if count == 0 {
            Vec::new()
        } else {
            self.repo
                .list_posts(filter, request.limit(), request.offset())
                .await?
        };

        Ok(request.with_items(items))
    }

    pub async fn index(&self, raw_page: Option<&str>) -> Result<Page<PostView>> {
        self.page(&PostFilter::All, raw_page).await
    }

    pub async fn group(&self, group_id: i64, raw_page: Option<&str>) -> Result<Page<PostView>> {
        self.page(&PostFilter::Group(group_id), raw_page).await
    }

    pub async fn profile(&self, author_id: i64, raw_page: Option<&str>) -> Result<Page<PostView>> {
        self.page(&PostFilter::Author(author_id), raw_page).await
    }

    /// Posts by the authors `user_id` follows
    pub async fn follow_feed(&self, user_id: i64, raw_page: Option<&str>) -> Result<Page<PostView>> {
        let authors = self.repo.followed_authors(user_id).await?;
        let ids = authors.into_iter().map(|author| author.id).collect();
        self.page(&PostFilter::Authors(ids), raw_page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPost, NewUser};
    use crate::repository::{BlogRepository, InMemoryBlogRepository};
    use std::sync::Arc;

    async fn seed(repo: &InMemoryBlogRepository, username: &str, posts: usize) -> i64 {
        let user = repo
            .create_user(NewUser {
                username: username.into(),
                email: String::new(),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: String::new(),
            })
            .await
            .unwrap()
            .unwrap();
        for i in 0..posts {
            repo.insert_post(NewPost {
                author_id: user.id,
                text: format!("{} post {}", username, i),
                group_id: None,
                image: None,
            })
            .await
            .unwrap();
        }
        user.id
    }

    #[tokio::test]
    async fn test_index_pages_walk_whole_feed_once() {
        let repo = InMemoryBlogRepository::new();
        seed(&repo, "author", 23).await;
        let feed = FeedService::new(Arc::new(repo), 10);

        let mut ids = Vec::new();
        for n in ["1", "2", "3"] {
            ids.extend(feed.index(Some(n)).await.unwrap().items.into_iter().map(|p| p.id));
        }
        let expected: Vec<i64> = (1..=23).rev().collect();
        assert_eq!(ids, expected);

        let past_end = feed.index(Some("42")).await.unwrap();
        assert_eq!(past_end.number, 3);
        assert_eq!(past_end.len(), 3);
    }

    #[tokio::test]
    async fn test_follow_feed_only_has_followed_authors() {
        let repo = InMemoryBlogRepository::new();
        let reader = seed(&repo, "reader", 0).await;
        let followed = seed(&repo, "followed", 3).await;
        seed(&repo, "stranger", 4).await;
        repo.insert_follow(reader, followed).await.unwrap();

        let feed = FeedService::new(Arc::new(repo), 10);
        let page = feed.follow_feed(reader, None).await.unwrap();

        assert_eq!(page.count, 3);
        assert!(page.items.iter().all(|p| p.author.id == followed));
    }

    #[tokio::test]
    async fn test_follow_feed_empty_without_edges() {
        let repo = InMemoryBlogRepository::new();
        let reader = seed(&repo, "reader", 2).await;
        let feed = FeedService::new(Arc::new(repo), 10);

        let page = feed.follow_feed(reader, Some("5")).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
    }
}
