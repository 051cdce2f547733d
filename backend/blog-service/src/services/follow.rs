use crate::error::Result;
use crate::metrics;
use crate::models::User;
use crate::repository::SharedRepository;
use tracing::{debug, info};

/// Follow graph: directed, unique, never self-referencing edges
#[derive(Clone)]
pub struct FollowService {
    repo: SharedRepository,
}

impl FollowService {
    pub fn new(repo: SharedRepository) -> Self {
        Self { repo }
    }

    /// Follow `author`; returns true if a new edge was created.
    ///
    /// Self-follow and repeat follows are silent no-ops.
    pub async fn follow(&self, user: &User, author: &User) -> Result<bool> {
        if user.id == author.id {
            debug!(user_id = user.id, "self-follow ignored");
            metrics::record_follow_event("noop");
            return Ok(false);
        }

        let created = self.repo.insert_follow(user.id, author.id).await?;
        if created {
            info!(user_id = user.id, author_id = author.id, "follow created");
            metrics::record_follow_event("follow");
        } else {
            debug!(user_id = user.id, author_id = author.id, "already following");
            metrics::record_follow_event("noop");
        }
        Ok(created)
    }

    /// Remove the edge if present; returns true if one was removed
    pub async fn unfollow(&self, user: &User, author: &User) -> Result<bool> {
        let removed = self.repo.delete_follow(user.id, author.id).await?;
        if removed {
            info!(user_id = user.id, author_id = author.id, "follow removed");
            metrics::record_follow_event("unfollow");
        } else {
            metrics::record_follow_event("noop");
        }
        Ok(removed)
    }

    /// `None` for anonymous viewers, otherwise whether the edge exists
    pub async fn is_following(&self, viewer: Option<&User>, author: &User) -> Result<Option<bool>> {
        match viewer {
            None => Ok(None),
            Some(viewer) => Ok(Some(self.repo.follow_exists(viewer.id, author.id).await?)),
        }
    }

    pub async fn followed_authors(&self, user: &User) -> Result<Vec<User>> {
        self.repo.followed_authors(user.id).await
    }
}
