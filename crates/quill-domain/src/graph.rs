use chrono::Utc;

use quill_db::models::{PostRow, UserRow};

use crate::{Domain, DomainError, DomainResult};

impl Domain {
    /// Create the edge `follower → target`. Following someone twice is
    /// a no-op, not an error.
    pub fn follow(&self, follower: &UserRow, target_id: &str) -> DomainResult<()> {
        if self.db.get_user_by_id(target_id)?.is_none() {
            return Err(DomainError::NotFound);
        }
        self.db.insert_follow(&follower.id, target_id, Utc::now())?;
        Ok(())
    }

    /// Remove the edge if present; absent is a no-op.
    pub fn unfollow(&self, follower: &UserRow, target_id: &str) -> DomainResult<()> {
        if self.db.get_user_by_id(target_id)?.is_none() {
            return Err(DomainError::NotFound);
        }
        self.db.delete_follow(&follower.id, target_id)?;
        Ok(())
    }

    pub fn is_following(&self, follower: &UserRow, target_id: &str) -> DomainResult<bool> {
        Ok(self.db.follow_exists(&follower.id, target_id)?)
    }

    pub fn is_followed_by(&self, user: &UserRow, other_id: &str) -> DomainResult<bool> {
        Ok(self.db.follow_exists(other_id, &user.id)?)
    }

    /// Posts by everyone the user follows, newest first. The reflexive
    /// edge created at registration puts the user's own posts in here.
    pub fn followed_posts(
        &self,
        user: &UserRow,
        limit: u32,
        offset: u32,
    ) -> DomainResult<(Vec<PostRow>, u64)> {
        let posts = self.db.followed_feed(&user.id, limit, offset)?;
        let total = self.db.count_followed_feed(&user.id)?;
        Ok((posts, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::domain_with_transport;

    #[tokio::test]
    async fn follow_unfollow_roundtrip() {
        let (domain, _) = domain_with_transport();
        let john = domain.register("john@example.com", "john", "cat").unwrap();
        let susan = domain.register("susan@example.org", "susan", "dog").unwrap();

        assert!(!domain.is_following(&john, &susan.id).unwrap());
        domain.follow(&john, &susan.id).unwrap();
        assert!(domain.is_following(&john, &susan.id).unwrap());
        assert!(domain.is_followed_by(&susan, &john.id).unwrap());
        assert!(!domain.is_following(&susan, &john.id).unwrap());

        // Re-following is a no-op.
        domain.follow(&john, &susan.id).unwrap();

        domain.unfollow(&john, &susan.id).unwrap();
        assert!(!domain.is_following(&john, &susan.id).unwrap());
        // Unfollowing again is also a no-op.
        domain.unfollow(&john, &susan.id).unwrap();
    }

    #[tokio::test]
    async fn self_follow_exists_without_an_explicit_call() {
        let (domain, _) = domain_with_transport();
        let john = domain.register("john@example.com", "john", "cat").unwrap();
        assert!(domain.is_following(&john, &john.id).unwrap());
        assert!(domain.is_followed_by(&john, &john.id).unwrap());
    }

    #[tokio::test]
    async fn deleting_an_identity_removes_all_its_edges() {
        let (domain, _) = domain_with_transport();
        let john = domain.register("john@example.com", "john", "cat").unwrap();
        let susan = domain.register("susan@example.org", "susan", "dog").unwrap();
        domain.follow(&john, &susan.id).unwrap();
        domain.follow(&susan, &john.id).unwrap();

        // Two self-edges plus two cross edges.
        assert_eq!(domain.db.follow_count().unwrap(), 4);

        // susan touches three edges: her self-edge and both cross edges.
        assert!(domain.db.delete_user(&susan.id).unwrap());
        assert_eq!(domain.db.follow_count().unwrap(), 1);
        assert!(domain.is_following(&john, &john.id).unwrap());
    }

    #[tokio::test]
    async fn followed_posts_includes_own_and_followed_only() {
        let (domain, _) = domain_with_transport();
        let john = domain.register("john@example.com", "john", "cat").unwrap();
        let susan = domain.register("susan@example.org", "susan", "dog").unwrap();
        let dave = domain.register("dave@example.net", "dave", "fish").unwrap();

        domain.create_post(&john.id, "john's post").unwrap();
        domain.create_post(&susan.id, "susan's post").unwrap();
        domain.create_post(&dave.id, "dave's post").unwrap();

        domain.follow(&john, &susan.id).unwrap();

        let (feed, total) = domain.followed_posts(&john, 50, 0).unwrap();
        assert_eq!(total, 2);
        let bodies: Vec<_> = feed.iter().map(|p| p.body.as_str()).collect();
        assert!(bodies.contains(&"john's post"));
        assert!(bodies.contains(&"susan's post"));
        assert!(!bodies.contains(&"dave's post"));
    }

    #[tokio::test]
    async fn feed_is_newest_first() {
        let (domain, _) = domain_with_transport();
        let john = domain.register("john@example.com", "john", "cat").unwrap();
        domain.create_post(&john.id, "first").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        domain.create_post(&john.id, "second").unwrap();

        let (feed, _) = domain.followed_posts(&john, 50, 0).unwrap();
        assert_eq!(feed[0].body, "second");
        assert_eq!(feed[1].body, "first");
    }

    #[tokio::test]
    async fn following_a_missing_user_is_not_found() {
        let (domain, _) = domain_with_transport();
        let john = domain.register("john@example.com", "john", "cat").unwrap();
        let err = domain
            .follow(&john, "00000000-0000-0000-0000-000000000000")
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }
}
