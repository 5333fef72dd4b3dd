//! Feed ordering invariant.

use std::cmp::Ordering;

use crate::domain::entities::PostRecord;

/// Total order for every feed: newest first by `created_at`, ties broken
/// by `id` descending. Ids are insertion-ordered (BIGSERIAL), so the order
/// is fully deterministic even when timestamps collide.
pub fn feed_order(a: &PostRecord, b: &PostRecord) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};

    use super::*;

    fn post(id: i64, created_at: OffsetDateTime) -> PostRecord {
        PostRecord {
            id,
            body: "post".to_string(),
            created_at,
            author_id: 1,
            author_username: "poet".to_string(),
            author_display_name: "Poet".to_string(),
            group_id: None,
            group_slug: None,
            group_title: None,
            image_path: None,
        }
    }

    #[test]
    fn newer_posts_sort_first() {
        let base = OffsetDateTime::UNIX_EPOCH;
        let older = post(1, base);
        let newer = post(2, base + Duration::seconds(5));

        let mut posts = vec![older.clone(), newer.clone()];
        posts.sort_by(feed_order);

        assert_eq!(posts, vec![newer, older]);
    }

    #[test]
    fn timestamp_ties_break_by_id_descending() {
        let base = OffsetDateTime::UNIX_EPOCH;
        let first = post(1, base);
        let second = post(2, base);

        assert_eq!(feed_order(&second, &first), Ordering::Less);
        assert_eq!(feed_order(&first, &second), Ordering::Greater);
    }

    #[test]
    fn ordering_has_no_equal_posts_with_distinct_ids() {
        let base = OffsetDateTime::UNIX_EPOCH;
        assert_ne!(feed_order(&post(1, base), &post(2, base)), Ordering::Equal);
    }
}
