#[cfg(test)]
mod tests {
    use tokio::time::timeout;
    use tokio::time::Duration;

    use crate::config::StoreConfig;
    use crate::errors::Error;
    use crate::options::GetOptions;
    use crate::options::ListOptions;
    use crate::options::Preconditions;
    use crate::options::VersionMatch;
    use crate::selection::SelectionPredicate;
    use crate::store::MemoryStore;
    use crate::test_support::TestObject;
    use crate::watch::EventKind;

    fn store() -> MemoryStore<TestObject> {
        MemoryStore::new(StoreConfig::default()).unwrap()
    }

    fn rv(obj: &TestObject) -> u64 {
        obj.resource_version.parse().unwrap()
    }

    fn recursive_list(prefix_rv: &str) -> ListOptions<TestObject> {
        ListOptions {
            resource_version: prefix_rv.to_string(),
            recursive: true,
            ..ListOptions::default()
        }
    }

    #[test]
    fn test_create_and_get_round_trip() {
        let store = store();
        let obj = TestObject::new("web").with_data("v1");

        let created = store.create("/apps/default/web", &obj).unwrap();
        assert!(!created.resource_version.is_empty());
        assert_eq!(created.data, "v1");

        let fetched = store
            .get("/apps/default/web", &GetOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn test_create_existing_key_conflicts() {
        let store = store();
        let obj = TestObject::new("web");
        store.create("/apps/default/web", &obj).unwrap();
        let err = store.create("/apps/default/web", &obj).unwrap_err();
        assert!(matches!(err, Error::KeyExists { .. }));
    }

    #[test]
    fn test_malformed_keys_are_rejected() {
        let store = store();
        let obj = TestObject::new("web");
        for key in ["", "/", "///", "/apps//web"] {
            let err = store.create(key, &obj).unwrap_err();
            assert!(matches!(err, Error::InvalidKey { .. }), "key: {key:?}");
        }
    }

    #[test]
    fn test_get_missing_key() {
        let store = store();
        let err = store
            .get("/apps/default/web", &GetOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::KeyNotFound { .. }));

        let opts = GetOptions {
            ignore_not_found: true,
            ..GetOptions::default()
        };
        assert!(store.get("/apps/default/web", &opts).unwrap().is_none());
    }

    #[test]
    fn test_get_enforces_minimum_resource_version() {
        let store = store();
        let created = store
            .create("/apps/default/web", &TestObject::new("web"))
            .unwrap();
        let created_rv = rv(&created);

        let opts = GetOptions {
            resource_version: created_rv.to_string(),
            ..GetOptions::default()
        };
        assert!(store.get("/apps/default/web", &opts).unwrap().is_some());

        let opts = GetOptions {
            resource_version: (created_rv + 1).to_string(),
            ..GetOptions::default()
        };
        let err = store.get("/apps/default/web", &opts).unwrap_err();
        assert!(matches!(err, Error::TooLargeResourceVersion { .. }));

        let opts = GetOptions {
            resource_version: "not-a-number".to_string(),
            ..GetOptions::default()
        };
        let err = store.get("/apps/default/web", &opts).unwrap_err();
        assert!(matches!(err, Error::InvalidResourceVersion { .. }));
    }

    #[test]
    fn test_delete_returns_pre_image() {
        let store = store();
        let created = store
            .create("/apps/default/web", &TestObject::new("web").with_data("v1"))
            .unwrap();

        let deleted = store.delete("/apps/default/web", None, None, None).unwrap();
        assert_eq!(deleted, created);

        let err = store
            .get("/apps/default/web", &GetOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::KeyNotFound { .. }));

        let err = store
            .delete("/apps/default/web", None, None, None)
            .unwrap_err();
        assert!(matches!(err, Error::KeyNotFound { .. }));

        let events = store.recent_events(10);
        let last = events.last().unwrap();
        assert_eq!(last.kind, EventKind::Deleted);
        assert!(last.object.is_none());
        assert_eq!(last.old_object.as_ref().unwrap(), &created);
        assert!(last.revision > rv(&created));
    }

    #[test]
    fn test_delete_preconditions() {
        let store = store();
        let created = store
            .create("/apps/default/web", &TestObject::new("web"))
            .unwrap();

        let wrong_uid = Preconditions {
            uid: Some("uid-someone-else".to_string()),
            resource_version: None,
        };
        let err = store
            .delete("/apps/default/web", Some(&wrong_uid), None, None)
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { .. }));

        let matching = Preconditions {
            uid: Some("uid-web".to_string()),
            resource_version: Some(rv(&created)),
        };
        store
            .delete("/apps/default/web", Some(&matching), None, None)
            .unwrap();
    }

    #[test]
    fn test_delete_validator_can_veto() {
        let store = store();
        store
            .create("/apps/default/web", &TestObject::new("web"))
            .unwrap();

        let veto = |_obj: &TestObject| -> crate::errors::Result<()> {
            Err(Error::Internal("deletion vetoed".to_string()))
        };
        let err = store
            .delete("/apps/default/web", None, Some(&veto), None)
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        // The object survived the vetoed deletion.
        assert!(store
            .get("/apps/default/web", &GetOptions::default())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_guaranteed_update_applies_mutator() {
        let store = store();
        let created = store
            .create("/apps/default/web", &TestObject::new("web").with_data("v1"))
            .unwrap();

        let updated = store
            .guaranteed_update(
                "/apps/default/web",
                false,
                None,
                |mut current| {
                    current.data = "v2".to_string();
                    Ok(current)
                },
                None,
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.data, "v2");
        assert!(rv(&updated) > rv(&created));

        let fetched = store
            .get("/apps/default/web", &GetOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(fetched, updated);
    }

    #[test]
    fn test_guaranteed_update_missing_key() {
        let store = store();
        let err = store
            .guaranteed_update("/apps/default/web", false, None, Ok, None)
            .unwrap_err();
        assert!(matches!(err, Error::KeyNotFound { .. }));

        let skipped = store
            .guaranteed_update("/apps/default/web", true, None, Ok, None)
            .unwrap();
        assert!(skipped.is_none());
    }

    #[test]
    fn test_guaranteed_update_stale_precondition_conflicts() {
        let store = store();
        let created = store
            .create("/apps/default/web", &TestObject::new("web").with_data("v1"))
            .unwrap();
        let stale_rv = rv(&created);

        store
            .guaranteed_update(
                "/apps/default/web",
                false,
                None,
                |mut current| {
                    current.data = "v2".to_string();
                    Ok(current)
                },
                None,
            )
            .unwrap();

        // A second writer still holding the original revision must conflict.
        let stale = Preconditions {
            uid: None,
            resource_version: Some(stale_rv),
        };
        let err = store
            .guaranteed_update(
                "/apps/default/web",
                false,
                Some(&stale),
                |mut current| {
                    current.data = "v3".to_string();
                    Ok(current)
                },
                None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { .. }));
    }

    #[test]
    fn test_guaranteed_update_stale_cache_only_warns() {
        let store = store();
        store
            .create("/apps/default/web", &TestObject::new("web").with_data("v1"))
            .unwrap();
        let stale_cache = TestObject::new("web").with_resource_version("1");

        let updated = store
            .guaranteed_update(
                "/apps/default/web",
                false,
                None,
                |mut current| {
                    current.data = "v2".to_string();
                    Ok(current)
                },
                Some(&stale_cache),
            )
            .unwrap();
        assert_eq!(updated.unwrap().data, "v2");
    }

    #[test]
    fn test_create_or_update_requires_merge_for_existing() {
        let store = store();
        let obj = TestObject::new("web").with_data("v1");

        // Absent: plain create, no merge needed.
        let created = store.create_or_update("/apps/default/web", &obj, None).unwrap();
        assert_eq!(created.data, "v1");

        let err = store
            .create_or_update("/apps/default/web", &obj, None)
            .unwrap_err();
        assert!(matches!(err, Error::MergeUnsupported { .. }));
    }

    #[test]
    fn test_create_or_update_merges_existing() {
        let store = store();
        store
            .create("/apps/default/web", &TestObject::new("web").with_data("v1"))
            .unwrap();

        let incoming = TestObject::new("web").with_data("v2");
        let merge = |current: &TestObject, incoming: &mut TestObject| -> crate::errors::Result<()> {
            incoming.data = format!("{}+{}", current.data, incoming.data);
            Ok(())
        };
        let merged = store
            .create_or_update("/apps/default/web", &incoming, Some(&merge))
            .unwrap();
        assert_eq!(merged.data, "v1+v2");
    }

    #[test]
    fn test_create_or_replace_is_idempotent_modulo_revision() {
        let store = store();
        let obj = TestObject::new("web").with_data("v1");

        let first = store.create_or_replace("/apps/default/web", &obj).unwrap();
        let second = store.create_or_replace("/apps/default/web", &obj).unwrap();
        assert!(rv(&second) > rv(&first));

        let mut expected = obj.clone();
        expected.resource_version = second.resource_version.clone();
        assert_eq!(second, expected);

        let kinds: Vec<EventKind> = store.recent_events(10).iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Created, EventKind::Updated]);
    }

    #[test]
    fn test_get_or_create_never_mutates_existing() {
        let store = store();
        let created = store
            .create("/apps/default/web", &TestObject::new("web").with_data("v1"))
            .unwrap();

        let template = TestObject::new("web").with_data("other");
        let existing = store.get_or_create("/apps/default/web", &template).unwrap();
        assert_eq!(existing, created);
        assert_eq!(store.recent_events(10).len(), 1);

        let fresh = store.get_or_create("/apps/default/api", &template).unwrap();
        assert_eq!(fresh.data, "other");
        assert!(!fresh.resource_version.is_empty());
    }

    #[test]
    fn test_ensure_update_and_delete_removes_when_signaled() {
        let store = store();
        store
            .create("/apps/default/web", &TestObject::new("web"))
            .unwrap();

        let doomed = TestObject::new("web").deleting();
        let result = store
            .ensure_update_and_delete("/apps/default/web", false, None, doomed)
            .unwrap();
        assert!(result.is_some());

        let err = store
            .get("/apps/default/web", &GetOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::KeyNotFound { .. }));
    }

    #[test]
    fn test_ensure_update_and_delete_respects_finalizers() {
        let store = store();
        store
            .create("/apps/default/web", &TestObject::new("web"))
            .unwrap();

        let held = TestObject::new("web").deleting().with_finalizer("unhook-lb");
        let result = store
            .ensure_update_and_delete("/apps/default/web", false, None, held)
            .unwrap()
            .unwrap();
        assert!(result.deletion_requested);

        // Still present: the finalizer holds it.
        assert!(store
            .get("/apps/default/web", &GetOptions::default())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_count_by_prefix() {
        let store = store();
        store
            .create("/apps/default/web", &TestObject::new("web"))
            .unwrap();
        store
            .create("/apps/default/api", &TestObject::new("api"))
            .unwrap();
        store
            .create("/apps/staging/web", &TestObject::new("web"))
            .unwrap();

        assert_eq!(store.count("/apps/").unwrap(), 3);
        assert_eq!(store.count("/apps/default/").unwrap(), 2);
        assert_eq!(store.count("/jobs/").unwrap(), 0);
        assert_eq!(store.count("/").unwrap(), 3);
    }

    #[test]
    fn test_single_key_list() {
        let store = store();
        let created = store
            .create("/apps/default/web", &TestObject::new("web"))
            .unwrap();

        let list = store
            .get_list("/apps/default/web", &ListOptions::default())
            .unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.revision, rv(&created));
        assert!(list.continue_token.is_none());

        let empty = store
            .get_list("/apps/default/api", &ListOptions::default())
            .unwrap();
        assert!(empty.items.is_empty());
    }

    #[test]
    fn test_recursive_list_returns_prefix_matches_in_revision_order() {
        let store = store();
        for name in ["a", "b", "c"] {
            store
                .create(&format!("/apps/default/{name}"), &TestObject::new(name))
                .unwrap();
        }
        store
            .create("/jobs/default/x", &TestObject::new("x"))
            .unwrap();

        let list = store.get_list("/apps/default/", &recursive_list("")).unwrap();
        assert_eq!(list.items.len(), 3);
        assert_eq!(list.revision, 1);
        let revisions: Vec<u64> = list.items.iter().map(rv).collect();
        let mut sorted = revisions.clone();
        sorted.sort_unstable();
        assert_eq!(revisions, sorted);
    }

    #[test]
    fn test_recursive_list_resource_version_pivot() {
        let store = store();
        let mut created = Vec::new();
        for i in 0..5 {
            created.push(
                store
                    .create(&format!("/apps/default/k{i}"), &TestObject::new(&format!("k{i}")))
                    .unwrap(),
            );
        }
        let pivot = rv(&created[2]);

        let mut opts = recursive_list(&pivot.to_string());
        opts.version_match = Some(VersionMatch::NotOlderThan);
        let list = store.get_list("/apps/default/", &opts).unwrap();
        assert_eq!(list.items.len(), 3);
        assert_eq!(list.revision, pivot);

        // Unset match behaves as Exact: strictly after the pivot.
        let opts = recursive_list(&pivot.to_string());
        let list = store.get_list("/apps/default/", &opts).unwrap();
        assert_eq!(list.items.len(), 2);
    }

    #[test]
    fn test_recursive_list_applies_predicate() {
        let store = store();
        for i in 0..6 {
            let obj = TestObject::new(&format!("k{i}"))
                .with_label("parity", if i % 2 == 0 { "even" } else { "odd" });
            store.create(&format!("/apps/default/k{i}"), &obj).unwrap();
        }

        let mut opts = recursive_list("");
        opts.predicate = SelectionPredicate::everything()
            .with_filter(|obj: &TestObject| obj.labels.get("parity").map(String::as_str) == Some("even"));
        let list = store.get_list("/apps/default/", &opts).unwrap();
        assert_eq!(list.items.len(), 3);
        assert!(list.items.iter().all(|o| o.labels["parity"] == "even"));
    }

    #[test]
    fn test_list_continue_conflicts_with_resource_version() {
        let store = store();
        store
            .create("/apps/default/web", &TestObject::new("web"))
            .unwrap();

        let mut opts = recursive_list("12345");
        opts.predicate = SelectionPredicate::everything().with_continue("deadbeef");
        let err = store.get_list("/apps/default/", &opts).unwrap_err();
        assert!(matches!(err, Error::InvalidContinueToken { .. }));
    }

    #[test]
    fn test_list_rejects_garbage_continue_token() {
        let store = store();
        store
            .create("/apps/default/web", &TestObject::new("web"))
            .unwrap();

        let mut opts = recursive_list("");
        opts.predicate = SelectionPredicate::everything().with_continue("not a token");
        let err = store.get_list("/apps/default/", &opts).unwrap_err();
        assert!(matches!(err, Error::InvalidContinueToken { .. }));
    }

    #[test]
    fn test_shrink_compacts_tombstones() {
        let config = StoreConfig {
            shrink_slack: 0,
            ..StoreConfig::default()
        };
        let store: MemoryStore<TestObject> = MemoryStore::new(config).unwrap();

        for i in 0..5 {
            store
                .create(&format!("/apps/default/k{i}"), &TestObject::new(&format!("k{i}")))
                .unwrap();
        }
        for i in 0..5 {
            store
                .guaranteed_update(
                    &format!("/apps/default/k{i}"),
                    false,
                    None,
                    |mut current| {
                        current.data = "updated".to_string();
                        Ok(current)
                    },
                    None,
                )
                .unwrap();
        }
        store.delete("/apps/default/k0", None, None, None).unwrap();
        store.delete("/apps/default/k1", None, None, None).unwrap();

        store.shrink();

        // The store still lists and updates correctly after compaction.
        let list = store.get_list("/apps/default/", &recursive_list("")).unwrap();
        assert_eq!(list.items.len(), 3);
        let updated = store
            .guaranteed_update(
                "/apps/default/k2",
                false,
                None,
                |mut current| {
                    current.data = "post-shrink".to_string();
                    Ok(current)
                },
                None,
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.data, "post-shrink");
    }

    #[test]
    fn test_zero_sized_buffers_are_rejected() {
        let config = StoreConfig {
            watcher_incoming_buffer: 0,
            ..StoreConfig::default()
        };
        let err = MemoryStore::<TestObject>::new(config).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let store = store();
        store.start();
        store.start();
        store.stop();
        store.stop();
    }

    #[tokio::test]
    async fn test_watch_rejects_invalid_resource_version() {
        let store = store();
        let opts = ListOptions {
            resource_version: "bogus".to_string(),
            recursive: true,
            ..ListOptions::default()
        };
        let err = store.watch("/apps/default/", &opts).unwrap_err();
        assert!(matches!(err, Error::InvalidResourceVersion { .. }));
    }

    #[tokio::test]
    async fn test_watch_from_zero_tails_live_mutations_only() {
        let store = store();
        store
            .create("/apps/default/before", &TestObject::new("before"))
            .unwrap();

        let opts = ListOptions {
            resource_version: "0".to_string(),
            recursive: true,
            ..ListOptions::default()
        };
        let mut watch = store.watch("/apps/default/", &opts).unwrap();

        let after = store
            .create("/apps/default/after", &TestObject::new("after"))
            .unwrap();

        let event = timeout(Duration::from_millis(200), watch.recv())
            .await
            .expect("timeout")
            .expect("stream ended")
            .unwrap();
        assert_eq!(event.key, "/apps/default/after");
        assert_eq!(event.revision, rv(&after));
        assert_eq!(event.kind, EventKind::Created);
    }

    #[tokio::test]
    async fn test_watch_replays_then_tails() {
        let store = store();
        let mut created = Vec::new();
        for name in ["a", "b", "c"] {
            created.push(
                store
                    .create(&format!("/apps/default/{name}"), &TestObject::new(name))
                    .unwrap(),
            );
        }

        let opts = ListOptions {
            resource_version: rv(&created[0]).to_string(),
            version_match: Some(VersionMatch::NotOlderThan),
            recursive: true,
            ..ListOptions::default()
        };
        let mut watch = store.watch("/apps/default/", &opts).unwrap();

        for expected in &created {
            let event = timeout(Duration::from_millis(200), watch.recv())
                .await
                .expect("timeout")
                .expect("stream ended")
                .unwrap();
            assert_eq!(event.revision, rv(expected));
            assert_eq!(event.kind, EventKind::Created);
        }

        let fourth = store
            .create("/apps/default/d", &TestObject::new("d"))
            .unwrap();
        let event = timeout(Duration::from_millis(200), watch.recv())
            .await
            .expect("timeout")
            .expect("stream ended")
            .unwrap();
        assert_eq!(event.revision, rv(&fourth));
    }

    #[tokio::test]
    async fn test_watch_with_old_obj_carries_pre_image() {
        let store = store();
        let created = store
            .create("/apps/default/web", &TestObject::new("web").with_data("v1"))
            .unwrap();

        let opts = ListOptions {
            resource_version: "0".to_string(),
            recursive: true,
            ..ListOptions::default()
        };
        let mut watch = store.watch_with_old_obj("/apps/default/", &opts).unwrap();

        store
            .guaranteed_update(
                "/apps/default/web",
                false,
                None,
                |mut current| {
                    current.data = "v2".to_string();
                    Ok(current)
                },
                None,
            )
            .unwrap();

        let event = timeout(Duration::from_millis(200), watch.recv())
            .await
            .expect("timeout")
            .expect("stream ended")
            .unwrap();
        assert_eq!(event.kind, EventKind::Updated);
        assert_eq!(event.old_object.as_ref().unwrap(), &created);
        assert_eq!(event.object.as_ref().unwrap().data, "v2");
    }
}
