use lectern_client::NotificationFeed;
use lectern_core::RecordId;
use lectern_test_utils::fixtures::notification;
use proptest::prelude::*;
use tokio::sync::broadcast::error::TryRecvError;

proptest! {
    #[test]
    fn prop_feed_holds_each_id_once_newest_first(
        frames in proptest::collection::vec(proptest::collection::vec(0u64..30, 0..6), 0..12),
    ) {
        let feed = NotificationFeed::new(256);
        let mut rx = feed.subscribe();
        let mut expected: Vec<u64> = Vec::new();

        for frame in &frames {
            let incoming = frame.iter().map(|&id| notification(id, "update")).collect();
            let added: Vec<u64> = feed
                .ingest(incoming)
                .iter()
                .filter_map(|n| n.id.as_str().parse().ok())
                .collect();

            let mut fresh = Vec::new();
            for id in frame {
                if !expected.contains(id) && !fresh.contains(id) {
                    fresh.push(*id);
                }
            }
            prop_assert_eq!(&added, &fresh);
            expected.splice(0..0, fresh);
        }

        let held: Vec<u64> = feed
            .items()
            .iter()
            .filter_map(|n| n.id.as_str().parse().ok())
            .collect();
        prop_assert_eq!(&held, &expected);

        let mut broadcast = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(n) => broadcast.push(n.id),
                Err(TryRecvError::Empty) => break,
                Err(err) => return Err(TestCaseError::fail(format!("receiver failed: {err}"))),
            }
        }
        prop_assert_eq!(broadcast.len(), expected.len());
        prop_assert_eq!(feed.unread_count(), expected.len());
    }
}

#[test]
fn batch_and_single_frames_share_dedup() {
    let feed = NotificationFeed::default();
    let added = feed
        .ingest_frame(
            r#"[
                {"id": 1, "title": "a", "object_title": "x", "time": "2024-05-01T10:00:00Z"},
                {"id": 2, "title": "b", "object_title": "x", "time": "2024-05-01T10:01:00Z"}
            ]"#,
        )
        .expect("batch");
    assert_eq!(added.len(), 2);

    let again = feed
        .ingest_frame(r#"{"id": 2, "title": "b", "object_title": "x", "time": "2024-05-01T10:01:00Z"}"#)
        .expect("single");
    assert!(again.is_empty());
    assert_eq!(feed.len(), 2);
    assert_eq!(
        feed.items().first().map(|n| n.id.clone()),
        Some(RecordId::from(1u64))
    );
}

#[test]
fn marking_read_is_idempotent() {
    let feed = NotificationFeed::default();
    feed.ingest(vec![notification(1, "a"), notification(2, "b")]);
    let now = chrono::Utc::now();

    assert!(feed.mark_read(&RecordId::from(1u64), now));
    assert!(!feed.mark_read(&RecordId::from(1u64), now));
    assert!(!feed.mark_read(&RecordId::from(99u64), now));
    assert_eq!(feed.unread_count(), 1);
    assert_eq!(feed.mark_all_read(now), 1);
    assert_eq!(feed.unread_count(), 0);
}
