//! Delivery selection: resolves a (tag filter, size, index-or-random)
//! request to exactly one stored image.
//!
//! Rotation mode wraps an explicit 1-based index into the candidate range,
//! so `/300/cats/7` keeps pointing at the same image as long as the
//! catalog only grows. Random mode memoizes a uniform draw per client
//! fingerprint in the database, giving every client a stable "random"
//! image for the configured TTL across requests and process restarts.

use chrono::Utc;
use rand::Rng;
use sea_orm::sea_query::OnConflict;
use sea_orm::{EntityTrait, Set, TransactionTrait};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::database::Database;
use crate::database::repositories::ImageSeaOrmRepository;
use crate::entities::{prelude::RandomSessions, random_sessions};
use crate::errors::AppResult;
use crate::models::Image;

/// How the candidate index is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Deterministic 1-based index with modulo wrap-around
    Rotation { index: u64 },
    /// Session-sticky uniform draw
    Random,
}

/// The client identity random mode is keyed on.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub remote_addr: String,
    pub user_agent: String,
}

/// Injectable random number source so selection tests can fix the draw.
pub trait RandomSource: Send + Sync {
    /// Uniform draw in `[1, upper]`; `upper` is at least 1.
    fn pick(&self, upper: u64) -> u64;
}

/// Production random source backed by the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick(&self, upper: u64) -> u64 {
        rand::rng().random_range(1..=upper)
    }
}

/// Resolves delivery requests to concrete images.
#[derive(Clone)]
pub struct SelectionEngine {
    database: Database,
    images: ImageSeaOrmRepository,
    random: Arc<dyn RandomSource>,
    session_ttl: Duration,
}

impl SelectionEngine {
    pub fn new(database: Database, random: Arc<dyn RandomSource>, session_ttl: Duration) -> Self {
        let images = ImageSeaOrmRepository::new(database.connection());
        Self {
            database,
            images,
            random,
            session_ttl,
        }
    }

    /// Resolve a request to one image, or `None` when no candidate
    /// matches. The caller substitutes the fallback image; an empty result
    /// is a normal outcome, not an error.
    pub async fn select(
        &self,
        tag_filter: &[String],
        size_label: &str,
        mode: SelectionMode,
        client: &ClientIdentity,
    ) -> AppResult<Option<Image>> {
        let total = self.images.count_candidates(tag_filter).await?;
        if total == 0 {
            return Ok(None);
        }

        let index = match mode {
            SelectionMode::Rotation { index } => wrap_index(index, total),
            SelectionMode::Random => {
                self.sticky_index(tag_filter, size_label, client, total)
                    .await?
            }
        };

        let image = self.images.candidate_at(tag_filter, index - 1).await?;
        Ok(image)
    }

    /// Look up or draw the memoized random index for this fingerprint.
    ///
    /// The read-then-upsert runs in one transaction; a stored index is
    /// still re-wrapped against the current candidate count since the
    /// catalog may have shrunk since the draw.
    async fn sticky_index(
        &self,
        tag_filter: &[String],
        size_label: &str,
        client: &ClientIdentity,
        total: u64,
    ) -> AppResult<u64> {
        let fingerprint = fingerprint(client, size_label, tag_filter);
        let now = Utc::now();

        let txn = self.database.connection.begin().await?;

        let memo = RandomSessions::find_by_id(fingerprint.clone())
            .one(&txn)
            .await?;
        if let Some(memo) = memo
            && memo.expires_at > now
        {
            txn.commit().await?;
            return Ok(wrap_index(memo.chosen_index.max(1) as u64, total));
        }

        let drawn = self.random.pick(total);
        let expires_at = now
            + chrono::Duration::from_std(self.session_ttl)
                .unwrap_or_else(|_| chrono::Duration::hours(1));

        let memo = random_sessions::ActiveModel {
            fingerprint: Set(fingerprint),
            chosen_index: Set(drawn as i64),
            expires_at: Set(expires_at),
        };
        RandomSessions::insert(memo)
            .on_conflict(
                OnConflict::column(random_sessions::Column::Fingerprint)
                    .update_columns([
                        random_sessions::Column::ChosenIndex,
                        random_sessions::Column::ExpiresAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        txn.commit().await?;
        Ok(drawn)
    }
}

/// Wrap an arbitrary 1-based index into `[1, total]`.
pub fn wrap_index(index: u64, total: u64) -> u64 {
    debug_assert!(total > 0);
    (index.saturating_sub(1) % total) + 1
}

/// Fingerprint for the sticky-random memo: client identity plus the
/// request shape (size label and sorted tag filter).
pub fn fingerprint(client: &ClientIdentity, size_label: &str, tag_filter: &[String]) -> String {
    let mut sorted: Vec<&str> = tag_filter.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(client.remote_addr.as_bytes());
    hasher.update(b"|");
    hasher.update(client.user_agent.as_bytes());
    hasher.update(b"|");
    hasher.update(size_label.as_bytes());
    hasher.update(b"|");
    hasher.update(sorted.join(",").as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{in_memory_database, mark_removed, seed_image, seed_partition, tag_image};
    use sea_orm::{ActiveModelTrait, EntityTrait};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Random source that always returns a fixed value (clamped to range).
    struct Fixed(u64);

    impl RandomSource for Fixed {
        fn pick(&self, upper: u64) -> u64 {
            self.0.min(upper)
        }
    }

    /// Random source that counts how often it was consulted.
    struct Counting(AtomicU64);

    impl RandomSource for Counting {
        fn pick(&self, upper: u64) -> u64 {
            self.0.fetch_add(1, Ordering::SeqCst);
            upper
        }
    }

    fn client() -> ClientIdentity {
        ClientIdentity {
            remote_addr: "198.51.100.7".to_string(),
            user_agent: "test-agent/1.0".to_string(),
        }
    }

    fn engine(database: crate::database::Database, random: Arc<dyn RandomSource>) -> SelectionEngine {
        SelectionEngine::new(database, random, Duration::from_secs(3600))
    }

    #[test]
    fn wrap_index_law() {
        for total in 1..=7u64 {
            for index in 1..=20u64 {
                assert_eq!(wrap_index(index, total), wrap_index(index + total, total));
            }
        }
        assert_eq!(wrap_index(1, 3), 1);
        assert_eq!(wrap_index(3, 3), 3);
        assert_eq!(wrap_index(4, 3), 1);
        assert_eq!(wrap_index(0, 3), 1);
    }

    #[test]
    fn fingerprint_ignores_tag_order() {
        let a = fingerprint(
            &client(),
            "300x200",
            &["redBg".to_string(), "horizontal".to_string()],
        );
        let b = fingerprint(
            &client(),
            "300x200",
            &["horizontal".to_string(), "redBg".to_string()],
        );
        assert_eq!(a, b);

        let other_size = fingerprint(
            &client(),
            "301x200",
            &["redBg".to_string(), "horizontal".to_string()],
        );
        assert_ne!(a, other_size);
    }

    #[tokio::test]
    async fn rotation_wraps_out_of_range_indices() {
        let db = in_memory_database().await;
        seed_partition(&*db.connection, 1).await;
        let first = seed_image(&*db.connection, 1, 0).await;
        let second = seed_image(&*db.connection, 1, 1).await;
        let third = seed_image(&*db.connection, 1, 2).await;

        let engine = engine(db, Arc::new(ThreadRandom));

        for (index, expected) in [(1, first), (2, second), (3, third), (4, first), (302, second)] {
            let image = engine
                .select(&[], "orig", SelectionMode::Rotation { index }, &client())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(image.id, expected, "index {index}");
        }
    }

    #[tokio::test]
    async fn empty_candidate_set_is_not_found() {
        let db = in_memory_database().await;
        let engine = engine(db, Arc::new(ThreadRandom));

        let result = engine
            .select(&[], "orig", SelectionMode::Rotation { index: 1 }, &client())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn tag_filter_requires_every_tag() {
        let db = in_memory_database().await;
        seed_partition(&*db.connection, 1).await;
        let both = seed_image(&*db.connection, 1, 0).await;
        let red_only = seed_image(&*db.connection, 1, 1).await;
        tag_image(&*db.connection, both, "redBg").await;
        tag_image(&*db.connection, both, "horizontal").await;
        tag_image(&*db.connection, red_only, "redBg").await;

        let engine = engine(db, Arc::new(ThreadRandom));
        let filter = vec!["redBg".to_string(), "horizontal".to_string()];

        // Every index resolves to the only image carrying both tags.
        for index in 1..=5 {
            let image = engine
                .select(&filter, "orig", SelectionMode::Rotation { index }, &client())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(image.id, both);
        }

        let single = vec!["redBg".to_string()];
        let image = engine
            .select(&single, "orig", SelectionMode::Rotation { index: 2 }, &client())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(image.id, red_only);
    }

    #[tokio::test]
    async fn removed_images_never_match() {
        let db = in_memory_database().await;
        seed_partition(&*db.connection, 1).await;
        let removed = seed_image(&*db.connection, 1, 0).await;
        let live = seed_image(&*db.connection, 1, 1).await;
        mark_removed(&*db.connection, removed).await;

        let engine = engine(db, Arc::new(ThreadRandom));
        for index in 1..=4 {
            let image = engine
                .select(&[], "orig", SelectionMode::Rotation { index }, &client())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(image.id, live);
        }
    }

    #[tokio::test]
    async fn random_mode_is_sticky_within_ttl() {
        let db = in_memory_database().await;
        seed_partition(&*db.connection, 1).await;
        for seq in 0..3 {
            seed_image(&*db.connection, 1, seq).await;
        }

        let counting = Arc::new(Counting(AtomicU64::new(0)));
        let engine = engine(db, counting.clone());

        let first = engine
            .select(&[], "300x300", SelectionMode::Random, &client())
            .await
            .unwrap()
            .unwrap();
        let second = engine
            .select(&[], "300x300", SelectionMode::Random, &client())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.id, second.id);
        // Only the first request consulted the random source.
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_memo_triggers_a_fresh_draw() {
        let db = in_memory_database().await;
        seed_partition(&*db.connection, 1).await;
        let first = seed_image(&*db.connection, 1, 0).await;
        seed_image(&*db.connection, 1, 1).await;
        let third = seed_image(&*db.connection, 1, 2).await;

        let connection = db.connection();
        let first_engine = engine(db.clone(), Arc::new(Fixed(3)));

        let chosen = first_engine
            .select(&[], "orig", SelectionMode::Random, &client())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chosen.id, third);

        // Expire the stored memo in place.
        let fp = fingerprint(&client(), "orig", &[]);
        let memo = RandomSessions::find_by_id(fp)
            .one(&*connection)
            .await
            .unwrap()
            .unwrap();
        let mut active: random_sessions::ActiveModel = memo.into();
        active.expires_at = Set(Utc::now() - chrono::Duration::seconds(1));
        active.update(&*connection).await.unwrap();

        // New draw comes from a different source value.
        let second_engine = engine(db, Arc::new(Fixed(1)));
        let redrawn = second_engine
            .select(&[], "orig", SelectionMode::Random, &client())
            .await
            .unwrap()
            .unwrap();

        assert_ne!(chosen.id, redrawn.id);
        assert_eq!(redrawn.id, first);
    }

    #[tokio::test]
    async fn stale_memo_index_is_rewrapped_against_shrunken_catalog() {
        let db = in_memory_database().await;
        seed_partition(&*db.connection, 1).await;
        let first = seed_image(&*db.connection, 1, 0).await;
        let second = seed_image(&*db.connection, 1, 1).await;
        let connection = db.connection();

        let engine = engine(db, Arc::new(Fixed(2)));
        let chosen = engine
            .select(&[], "orig", SelectionMode::Random, &client())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chosen.id, second);

        // The memoized index 2 now exceeds the candidate count of 1.
        mark_removed(&*connection, second).await;
        let rewrapped = engine
            .select(&[], "orig", SelectionMode::Random, &client())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rewrapped.id, first);
    }
}
