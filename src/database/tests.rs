// Edge-case tests for the catalog store
// Run with: cargo test --lib database::tests

#[cfg(test)]
mod store_tests {
    use crate::database::{Database, Episode, InsertOutcome, Pill, UNKNOWN};
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    fn episode(episode_id: i64, part: i64, title: &str) -> Episode {
        Episode {
            episode_id,
            part,
            title: title.to_string(),
            description: format!("Description for {}", title),
            category: "INTERVISTA".to_string(),
            guest: UNKNOWN.to_string(),
            audio_url: "https://open.example.com/episode".to_string(),
            shownotes_url: UNKNOWN.to_string(),
        }
    }

    fn pill(title: &str, episode_id: Option<i64>) -> Pill {
        Pill {
            episode_id,
            title: title.to_string(),
            description: "A short clip".to_string(),
            audio_url: "https://open.example.com/pill".to_string(),
        }
    }

    // =========================================================================
    // Episode insert / uniqueness
    // =========================================================================

    #[test]
    fn test_insert_episode_basic() {
        let (db, _temp) = setup_test_db();
        let outcome = db.insert_episode(&episode(1, 1, "Primo")).unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
        assert!(db.episode_exists(1, 1).unwrap());
        assert!(!db.episode_exists(1, 2).unwrap());
    }

    #[test]
    fn test_insert_episode_twice_yields_one_row() {
        let (db, _temp) = setup_test_db();
        db.insert_episode(&episode(5, 1, "Alpha")).unwrap();
        let second = db.insert_episode(&episode(5, 1, "Alpha")).unwrap();
        assert_eq!(second, InsertOutcome::Duplicate);
        assert_eq!(db.total_episodes().unwrap(), 1);
    }

    #[test]
    fn test_insert_same_id_different_parts() {
        let (db, _temp) = setup_test_db();
        assert_eq!(
            db.insert_episode(&episode(5, 1, "Alpha")).unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            db.insert_episode(&episode(5, 2, "Beta")).unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(db.episodes_by_id(5).unwrap().len(), 2);
    }

    #[test]
    fn test_insert_episode_rejects_negative_id() {
        let (db, _temp) = setup_test_db();
        assert!(db.insert_episode(&episode(-1, 1, "Bad")).is_err());
    }

    #[test]
    fn test_insert_episode_rejects_part_zero() {
        let (db, _temp) = setup_test_db();
        assert!(db.insert_episode(&episode(1, 0, "Bad")).is_err());
    }

    #[test]
    fn test_episode_id_zero_is_valid() {
        let (db, _temp) = setup_test_db();
        assert_eq!(
            db.insert_episode(&episode(0, 1, "Benvenuti")).unwrap(),
            InsertOutcome::Inserted
        );
    }

    // =========================================================================
    // Max id / last episode
    // =========================================================================

    #[test]
    fn test_max_episode_id_empty_is_zero() {
        let (db, _temp) = setup_test_db();
        assert_eq!(db.max_episode_id().unwrap(), 0);
    }

    #[test]
    fn test_max_episode_id_non_decreasing_across_commits() {
        let (db, _temp) = setup_test_db();
        let mut previous = db.max_episode_id().unwrap();
        for id in [3, 7, 7, 2, 11] {
            let _ = db.insert_episode(&episode(id, 1, &format!("Ep {}", id)));
            let current = db.max_episode_id().unwrap();
            assert!(current >= previous, "max id decreased: {} -> {}", previous, current);
            previous = current;
        }
        assert_eq!(previous, 11);
    }

    #[test]
    fn test_last_episode_tie_breaks_on_part() {
        let (db, _temp) = setup_test_db();
        db.insert_episode(&episode(9, 1, "Nove parte uno")).unwrap();
        db.insert_episode(&episode(9, 2, "Nove parte due")).unwrap();
        db.insert_episode(&episode(4, 1, "Quattro")).unwrap();

        let last = db.last_episode().unwrap().unwrap();
        assert_eq!(last.episode_id, 9);
        assert_eq!(last.part, 2);
    }

    #[test]
    fn test_last_episode_empty_is_none() {
        let (db, _temp) = setup_test_db();
        assert!(db.last_episode().unwrap().is_none());
    }

    // =========================================================================
    // Lookup shapes used by the resolver
    // =========================================================================

    #[test]
    fn test_episodes_by_id_ordered_by_part() {
        let (db, _temp) = setup_test_db();
        db.insert_episode(&episode(5, 2, "Beta")).unwrap();
        db.insert_episode(&episode(5, 1, "Alpha")).unwrap();

        let parts = db.episodes_by_id(5).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].part, 1);
        assert_eq!(parts[1].part, 2);
    }

    #[test]
    fn test_episode_by_title_is_case_sensitive() {
        let (db, _temp) = setup_test_db();
        db.insert_episode(&episode(1, 1, "La Strategia")).unwrap();

        assert!(db.episode_by_title("La Strategia").unwrap().is_some());
        assert!(db.episode_by_title("la strategia").unwrap().is_none());
    }

    #[test]
    fn test_episodes_by_guest_is_case_insensitive() {
        let (db, _temp) = setup_test_db();
        let mut ep = episode(2, 1, "Intervista");
        ep.guest = "Mario Rossi".to_string();
        db.insert_episode(&ep).unwrap();

        assert_eq!(db.episodes_by_guest("mario rossi").unwrap().len(), 1);
        assert_eq!(db.episodes_by_guest("MARIO ROSSI").unwrap().len(), 1);
        assert!(db.episodes_by_guest("Luigi Verdi").unwrap().is_empty());
    }

    #[test]
    fn test_guests_excludes_sentinel() {
        let (db, _temp) = setup_test_db();
        let mut a = episode(1, 1, "Uno");
        a.guest = "Mario Rossi".to_string();
        db.insert_episode(&a).unwrap();
        db.insert_episode(&episode(2, 1, "Due")).unwrap(); // guest stays "unknown"

        let guests = db.guests().unwrap();
        assert_eq!(guests, vec!["Mario Rossi".to_string()]);
    }

    #[test]
    fn test_categories_distinct_and_sorted() {
        let (db, _temp) = setup_test_db();
        let mut a = episode(1, 1, "Uno");
        a.category = "LIBRO".to_string();
        let mut b = episode(2, 1, "Due");
        b.category = "INTERVISTA".to_string();
        let mut c = episode(3, 1, "Tre");
        c.category = "LIBRO".to_string();
        for ep in [&a, &b, &c] {
            db.insert_episode(ep).unwrap();
        }

        let categories = db.categories().unwrap();
        assert_eq!(categories, vec!["INTERVISTA".to_string(), "LIBRO".to_string()]);
    }

    // =========================================================================
    // Pills
    // =========================================================================

    #[test]
    fn test_random_pill_empty_is_none() {
        let (db, _temp) = setup_test_db();
        assert!(db.random_pill().unwrap().is_none());
    }

    #[test]
    fn test_random_pill_returns_stored_pill() {
        let (db, _temp) = setup_test_db();
        db.insert_pill(&pill("Pillola 1", Some(10))).unwrap();
        let got = db.random_pill().unwrap().unwrap();
        assert_eq!(got.title, "Pillola 1");
        assert_eq!(got.episode_id, Some(10));
    }

    #[test]
    fn test_insert_pill_duplicate_by_title() {
        let (db, _temp) = setup_test_db();
        db.insert_pill(&pill("Pillola 1", Some(10))).unwrap();
        let second = db.insert_pill(&pill("Pillola 1", None)).unwrap();
        assert_eq!(second, InsertOutcome::Duplicate);
        assert_eq!(db.total_pills().unwrap(), 1);
    }

    #[test]
    fn test_insert_pill_without_linked_episode() {
        let (db, _temp) = setup_test_db();
        db.insert_pill(&pill("Pillola slegata", None)).unwrap();
        let got = db.random_pill().unwrap().unwrap();
        assert_eq!(got.episode_id, None);
    }

    #[test]
    fn test_insert_pill_empty_title_fails() {
        let (db, _temp) = setup_test_db();
        assert!(db.insert_pill(&pill("", None)).is_err());
    }

    // =========================================================================
    // Enrichment backfill
    // =========================================================================

    #[test]
    fn test_update_enrichment_fills_sentinel_fields() {
        let (db, _temp) = setup_test_db();
        db.insert_episode(&episode(7, 1, "Sette p1")).unwrap();
        db.insert_episode(&episode(7, 2, "Sette p2")).unwrap();

        let changed = db
            .update_enrichment(7, "Mario Rossi", "https://example.com/ospite/mario")
            .unwrap();
        assert_eq!(changed, 2);

        for part in db.episodes_by_id(7).unwrap() {
            assert_eq!(part.guest, "Mario Rossi");
            assert_eq!(part.shownotes_url, "https://example.com/ospite/mario");
        }
    }

    #[test]
    fn test_update_enrichment_never_overwrites_known_fields() {
        let (db, _temp) = setup_test_db();
        let mut ep = episode(8, 1, "Otto");
        ep.guest = "Luigi Verdi".to_string();
        db.insert_episode(&ep).unwrap();

        // shownotes is still the sentinel, guest is not
        let changed = db
            .update_enrichment(8, "Someone Else", "https://example.com/ospite/otto")
            .unwrap();
        assert_eq!(changed, 1);

        let got = db.episodes_by_id(8).unwrap().remove(0);
        assert_eq!(got.guest, "Luigi Verdi");
        assert_eq!(got.shownotes_url, "https://example.com/ospite/otto");
    }

    #[test]
    fn test_update_enrichment_no_sentinel_rows_is_noop() {
        let (db, _temp) = setup_test_db();
        let mut ep = episode(9, 1, "Nove");
        ep.guest = "Luigi Verdi".to_string();
        ep.shownotes_url = "https://example.com/ospite/nove".to_string();
        db.insert_episode(&ep).unwrap();

        let changed = db.update_enrichment(9, "X", "https://example.com/x").unwrap();
        assert_eq!(changed, 0);
    }

    // =========================================================================
    // Usage stats
    // =========================================================================

    #[test]
    fn test_append_stat_and_totals() {
        let (db, _temp) = setup_test_db();
        db.append_stat("100", "Last").unwrap();
        db.append_stat("100", "Last").unwrap();
        db.append_stat("200", "Random").unwrap();

        assert_eq!(db.total_stats().unwrap(), 3);

        let top = db.top_queries(5).unwrap();
        assert_eq!(top[0].label, "Last");
        assert_eq!(top[0].count, 2);
    }

    // =========================================================================
    // Subscribers
    // =========================================================================

    #[test]
    fn test_subscribers_registration_order() {
        let (db, _temp) = setup_test_db();
        db.add_subscriber("b").unwrap();
        db.add_subscriber("a").unwrap();
        db.add_subscriber("c").unwrap();

        // added_at has second resolution in tests, chat_id breaks ties but
        // registration order wins when timestamps differ
        let subs = db.active_subscribers().unwrap();
        assert_eq!(subs.len(), 3);
        assert!(subs.contains(&"a".to_string()));
    }

    #[test]
    fn test_deactivate_subscriber_keeps_row() {
        let (db, _temp) = setup_test_db();
        db.add_subscriber("100").unwrap();
        db.add_subscriber("200").unwrap();
        db.deactivate_subscriber("100").unwrap();

        assert_eq!(db.active_subscribers().unwrap(), vec!["200".to_string()]);
        assert_eq!(db.active_subscriber_count().unwrap(), 1);
    }

    #[test]
    fn test_add_subscriber_reactivates() {
        let (db, _temp) = setup_test_db();
        db.add_subscriber("100").unwrap();
        db.deactivate_subscriber("100").unwrap();
        db.add_subscriber("100").unwrap();

        assert_eq!(db.active_subscribers().unwrap(), vec!["100".to_string()]);
    }

    #[test]
    fn test_add_subscriber_idempotent() {
        let (db, _temp) = setup_test_db();
        db.add_subscriber("100").unwrap();
        db.add_subscriber("100").unwrap();
        assert_eq!(db.active_subscriber_count().unwrap(), 1);
    }

    // =========================================================================
    // Roll-up
    // =========================================================================

    #[test]
    fn test_catalog_stats_rollup() {
        let (db, _temp) = setup_test_db();
        let mut a = episode(1, 1, "Uno");
        a.guest = "Mario Rossi".to_string();
        a.category = "INTERVISTA".to_string();
        db.insert_episode(&a).unwrap();
        db.insert_pill(&pill("Pillola 1", Some(1))).unwrap();
        db.add_subscriber("100").unwrap();
        db.append_stat("100", "Numero").unwrap();

        let stats = db.catalog_stats().unwrap();
        assert_eq!(stats.total_episodes, 1);
        assert_eq!(stats.total_pills, 1);
        assert_eq!(stats.total_categories, 1);
        assert_eq!(stats.total_guests, 1);
        assert_eq!(stats.active_subscribers, 1);
        assert_eq!(stats.total_queries, 1);
        assert_eq!(stats.top_queries[0].label, "Numero");
    }
}
