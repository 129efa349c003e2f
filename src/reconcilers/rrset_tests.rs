// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `rrset.rs`

#[cfg(test)]
mod tests {
    use crate::constants::{DUPLICATE_RRSET_DESCRIPTION, FINALIZER_RRSET};
    use crate::context::Context;
    use crate::crd::{RRset, RRsetStatus, SyncStatus};
    use crate::metrics::MemoryStatusSink;
    use crate::pdns::types::{ExternalRRset, Record};
    use crate::pdns::{MemoryPdns, RecordedCall};
    use crate::reconcilers::index::UniquenessIndex;
    use crate::reconcilers::rrset::{reconcile_rrset, zone_owner_update};
    use crate::reconcilers::ReconcileError;
    use crate::store::{MemoryStore, RRsetStore};
    use crate::testing::{rrset, with_finalizer, zone, TEST_NAMESPACE, TEST_ZONE};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use kube::runtime::controller::Action;
    use kube::runtime::reflector::ObjectRef;
    use std::sync::Arc;
    use std::time::Duration;

    struct Harness {
        store: Arc<MemoryStore>,
        pdns: Arc<MemoryPdns>,
        sink: Arc<MemoryStatusSink>,
        ctx: Context,
    }

    impl Harness {
        fn new() -> Self {
            let harness = Self::without_zone();
            harness.store.put_zone(zone(TEST_ZONE));
            harness
        }

        fn without_zone() -> Self {
            let store = Arc::new(MemoryStore::new(Arc::new(UniquenessIndex::new())));
            let pdns = Arc::new(MemoryPdns::new());
            pdns.add_zone("example.com.");
            let sink = Arc::new(MemoryStatusSink::new());
            let ctx = Context::in_memory(store.clone(), pdns.clone(), sink.clone());
            Self {
                store,
                pdns,
                sink,
                ctx,
            }
        }

        async fn reconcile(&self, name: &str) -> Result<Action, ReconcileError> {
            reconcile_rrset(&self.ctx, TEST_NAMESPACE, name).await
        }

        fn get(&self, name: &str) -> Option<RRset> {
            self.store.rrset(TEST_NAMESPACE, name)
        }

        fn status(&self, name: &str) -> RRsetStatus {
            self.get(name).and_then(|r| r.status).unwrap_or_default()
        }

        fn published(&self, name: &str) -> Option<SyncStatus> {
            self.sink.get(&identity(name)).map(|p| p.status)
        }
    }

    fn identity(name: &str) -> ObjectRef<RRset> {
        ObjectRef::new(name).within(TEST_NAMESPACE)
    }

    #[tokio::test]
    async fn test_new_rrset_gets_finalizer_before_sync() {
        let h = Harness::new();
        h.store.create_rrset(rrset("www", "www", &["192.0.2.1"])).unwrap();

        let action = h.reconcile("www").await.unwrap();

        assert_eq!(action, Action::await_change());
        assert!(h.get("www").unwrap().has_finalizer(FINALIZER_RRSET));
        assert!(h.pdns.calls().is_empty());
        assert!(h.get("www").unwrap().status.is_none());
    }

    #[tokio::test]
    async fn test_sync_writes_pdns_status_owner_and_sink() {
        let h = Harness::new();
        h.store.create_rrset(rrset("www", "www", &["192.0.2.1"])).unwrap();

        h.reconcile("www").await.unwrap();
        let action = h.reconcile("www").await.unwrap();
        assert_eq!(action, Action::await_change());

        let stored = h.pdns.rrset("example.com.", "www.example.com.", "A").unwrap();
        assert_eq!(stored.ttl, Some(300));
        assert_eq!(stored.records[0].content, "192.0.2.1");

        let status = h.status("www");
        assert_eq!(status.sync_status, Some(SyncStatus::Succeeded));
        assert_eq!(status.dns_entry_name.as_deref(), Some("www.example.com."));
        assert_eq!(status.sync_error_description, None);
        assert!(status.last_update_time.is_some());
        assert_eq!(status.observed_generation, Some(1));

        let owners = h.get("www").unwrap().metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "Zone");
        assert_eq!(owners[0].uid, "uid-zone-example.com");
        assert_eq!(owners[0].controller, Some(true));

        let published = h.sink.get(&identity("www")).unwrap();
        assert_eq!(published.dns_entry_name, "www.example.com.");
        assert_eq!(published.record_type, "A");
        assert_eq!(published.status, SyncStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_second_sync_is_a_no_op() {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();

        h.reconcile("www").await.unwrap();
        let first = h.status("www");
        h.reconcile("www").await.unwrap();
        let second = h.status("www");

        assert_eq!(h.pdns.replace_count(), 1);
        assert_eq!(first.last_update_time, second.last_update_time);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_out_of_band_change_is_overwritten() {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();
        h.reconcile("www").await.unwrap();

        h.pdns.seed(
            "example.com.",
            ExternalRRset {
                name: "www.example.com.".to_string(),
                record_type: "A".to_string(),
                ttl: Some(60),
                changetype: None,
                records: vec![Record {
                    content: "203.0.113.7".to_string(),
                    disabled: false,
                }],
                comments: vec![],
            },
        );
        h.reconcile("www").await.unwrap();

        let stored = h.pdns.rrset("example.com.", "www.example.com.", "A").unwrap();
        assert_eq!(stored.ttl, Some(300));
        assert_eq!(stored.records[0].content, "192.0.2.1");
        assert_eq!(h.pdns.replace_count(), 2);
    }

    #[tokio::test]
    async fn test_stray_record_sets_from_pdns_are_ignored() {
        let h = Harness::new();
        h.pdns.seed(
            "example.com.",
            ExternalRRset {
                name: "api.example.com.".to_string(),
                record_type: "A".to_string(),
                ttl: Some(300),
                changetype: None,
                records: vec![Record {
                    content: "192.0.2.1".to_string(),
                    disabled: false,
                }],
                comments: vec![],
            },
        );
        h.pdns.set_unfiltered_gets(true);
        h.store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();

        h.reconcile("www").await.unwrap();

        // The stray api.example.com. entry must not count as "already in sync"
        assert_eq!(h.pdns.replace_count(), 1);
        assert!(h.pdns.rrset("example.com.", "www.example.com.", "A").is_some());
    }

    #[tokio::test]
    async fn test_apex_and_absolute_names() {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("apex", "@", &["192.0.2.1"])))
            .unwrap();
        h.store
            .create_rrset(with_finalizer(rrset("abs", "mail.example.com.", &["192.0.2.2"])))
            .unwrap();

        h.reconcile("apex").await.unwrap();
        h.reconcile("abs").await.unwrap();

        assert_eq!(
            h.status("apex").dns_entry_name.as_deref(),
            Some("example.com.")
        );
        assert!(h.pdns.rrset("example.com.", "example.com.", "A").is_some());
        assert!(h.pdns.rrset("example.com.", "mail.example.com.", "A").is_some());
    }

    async fn settle_duplicates(first: &str, second: &str) -> Harness {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("www-a", "www", &["192.0.2.1"])))
            .unwrap();
        h.store
            .create_rrset(with_finalizer(rrset("www-b", "www", &["192.0.2.2"])))
            .unwrap();

        for name in [first, second, first, second] {
            h.reconcile(name).await.unwrap();
        }
        h
    }

    #[tokio::test]
    async fn test_duplicates_leave_exactly_one_winner_in_either_order() {
        for (first, second) in [("www-a", "www-b"), ("www-b", "www-a")] {
            let h = settle_duplicates(first, second).await;

            let statuses = [h.status("www-a"), h.status("www-b")];
            let succeeded = statuses
                .iter()
                .filter(|s| s.sync_status == Some(SyncStatus::Succeeded))
                .count();
            let failed: Vec<_> = statuses
                .iter()
                .filter(|s| s.sync_status == Some(SyncStatus::Failed))
                .collect();

            assert_eq!(succeeded, 1, "order {first}, {second}");
            assert_eq!(
                h.status("www-a").sync_status,
                Some(SyncStatus::Succeeded),
                "order {first}, {second}"
            );
            assert_eq!(failed.len(), 1, "order {first}, {second}");
            assert_eq!(
                failed[0].sync_error_description.as_deref(),
                Some(DUPLICATE_RRSET_DESCRIPTION)
            );
            assert_eq!(h.pdns.replace_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_duplicate_is_published_as_failed() {
        let h = settle_duplicates("www-a", "www-b").await;

        assert_eq!(h.published("www-a"), Some(SyncStatus::Succeeded));
        assert_eq!(h.published("www-b"), Some(SyncStatus::Failed));
        assert_eq!(
            h.store.index().claimants("www.example.com./A"),
            vec![identity("www-a")]
        );
    }

    #[tokio::test]
    async fn test_synced_incumbent_keeps_its_claim_against_newcomer() {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("www-old", "www", &["192.0.2.1"])))
            .unwrap();
        h.reconcile("www-old").await.unwrap();
        assert_eq!(h.status("www-old").sync_status, Some(SyncStatus::Succeeded));

        // "www-new" sorts before "www-old" by uid, so only the synced claim
        // keeps the incumbent in place
        h.store
            .create_rrset(with_finalizer(rrset("www-new", "www", &["198.51.100.9"])))
            .unwrap();
        h.reconcile("www-old").await.unwrap();
        h.reconcile("www-new").await.unwrap();
        h.reconcile("www-old").await.unwrap();

        assert_eq!(h.status("www-old").sync_status, Some(SyncStatus::Succeeded));
        assert_eq!(h.status("www-new").sync_status, Some(SyncStatus::Failed));
        assert_eq!(
            h.status("www-new").sync_error_description.as_deref(),
            Some(DUPLICATE_RRSET_DESCRIPTION)
        );
        let stored = h.pdns.rrset("example.com.", "www.example.com.", "A").unwrap();
        assert_eq!(stored.records.len(), 1);
        assert_eq!(stored.records[0].content, "192.0.2.1");
        assert_eq!(h.pdns.replace_count(), 1);
    }

    #[tokio::test]
    async fn test_same_name_different_type_is_not_a_duplicate() {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("www-a", "www", &["192.0.2.1"])))
            .unwrap();
        let mut aaaa = with_finalizer(rrset("www-aaaa", "www", &["2001:db8::1"]));
        aaaa.spec.r#type = "AAAA".to_string();
        h.store.create_rrset(aaaa).unwrap();

        h.reconcile("www-a").await.unwrap();
        h.reconcile("www-aaaa").await.unwrap();

        assert_eq!(h.status("www-a").sync_status, Some(SyncStatus::Succeeded));
        assert_eq!(h.status("www-aaaa").sync_status, Some(SyncStatus::Succeeded));
    }

    #[tokio::test]
    async fn test_sync_failure_persists_failed_then_errors() {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("www", "www", &["not-an-ip"])))
            .unwrap();
        h.pdns
            .fail_with(Some((422, "Parsing record content failed")));

        let err = h.reconcile("www").await.unwrap_err();

        assert!(matches!(err, ReconcileError::ExternalSync(_)));
        let status = h.status("www");
        assert_eq!(status.sync_status, Some(SyncStatus::Failed));
        assert!(status
            .sync_error_description
            .unwrap()
            .contains("Parsing record content failed"));
        assert_eq!(h.published("www"), Some(SyncStatus::Failed));
    }

    #[tokio::test]
    async fn test_failed_rrset_is_pinned_until_its_spec_changes() {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();
        h.pdns.fail_with(Some((500, "backend down")));
        assert!(h.reconcile("www").await.is_err());
        h.pdns.fail_with(None);

        let calls_before = h.pdns.calls().len();
        let action = h.reconcile("www").await.unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(h.pdns.calls().len(), calls_before);
        assert_eq!(h.published("www"), Some(SyncStatus::Failed));

        let mut spec = h.get("www").unwrap().spec;
        spec.ttl = 600;
        h.store.edit_spec(TEST_NAMESPACE, "www", spec).unwrap();
        h.reconcile("www").await.unwrap();

        let status = h.status("www");
        assert_eq!(status.sync_status, Some(SyncStatus::Succeeded));
        assert_eq!(status.sync_error_description, None);
        assert_eq!(status.observed_generation, Some(2));
        let stored = h.pdns.rrset("example.com.", "www.example.com.", "A").unwrap();
        assert_eq!(stored.ttl, Some(600));
    }

    #[tokio::test]
    async fn test_delete_removes_pdns_record_then_finalizer() {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();
        h.reconcile("www").await.unwrap();

        h.store.delete_rrset(TEST_NAMESPACE, "www");
        let action = h.reconcile("www").await.unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(h.pdns.delete_count(), 1);
        assert!(matches!(
            h.pdns.calls().last(),
            Some(RecordedCall::Delete { name, .. }) if name == "www.example.com."
        ));
        assert!(h.pdns.rrset("example.com.", "www.example.com.", "A").is_none());
        assert!(h.get("www").is_none());
        assert!(h.sink.is_empty());
        assert!(h.store.index().is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_failed_rrset_skips_pdns() {
        let h = settle_duplicates("www-a", "www-b").await;
        let deletes_before = h.pdns.delete_count();

        h.store.delete_rrset(TEST_NAMESPACE, "www-b");
        h.reconcile("www-b").await.unwrap();

        assert_eq!(h.pdns.delete_count(), deletes_before);
        assert!(h.get("www-b").is_none());
        // The winner's record-set survives the loser's deletion
        assert!(h.pdns.rrset("example.com.", "www.example.com.", "A").is_some());
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_finalizer() {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();
        h.reconcile("www").await.unwrap();

        h.store.delete_rrset(TEST_NAMESPACE, "www");
        h.pdns.fail_with(Some((500, "backend down")));
        let err = h.reconcile("www").await.unwrap_err();

        assert!(matches!(err, ReconcileError::ExternalSync(_)));
        assert!(h.get("www").unwrap().has_finalizer(FINALIZER_RRSET));

        h.pdns.fail_with(None);
        h.reconcile("www").await.unwrap();
        assert!(h.get("www").is_none());
    }

    #[tokio::test]
    async fn test_deleting_rrset_is_never_synced() {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();
        h.store.delete_rrset(TEST_NAMESPACE, "www");

        h.reconcile("www").await.unwrap();

        assert_eq!(h.pdns.replace_count(), 0);
        assert!(h.get("www").is_none());
    }

    #[tokio::test]
    async fn test_missing_zone_requeues_then_recovers() {
        let h = Harness::without_zone();
        h.store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();

        let action = h.reconcile("www").await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(2)));
        assert!(!h.get("www").unwrap().has_finalizer(FINALIZER_RRSET));
        assert!(h.pdns.calls().is_empty());

        h.store.put_zone(zone(TEST_ZONE));
        h.reconcile("www").await.unwrap();
        h.reconcile("www").await.unwrap();

        assert_eq!(h.status("www").sync_status, Some(SyncStatus::Succeeded));
    }

    #[tokio::test]
    async fn test_missing_zone_releases_deleting_rrset() {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();
        h.reconcile("www").await.unwrap();
        assert!(h.sink.get(&identity("www")).is_some());

        h.store.delete_zone(TEST_NAMESPACE, TEST_ZONE);
        h.store.delete_rrset(TEST_NAMESPACE, "www");
        h.reconcile("www").await.unwrap();

        assert!(h.get("www").is_none());
        assert_eq!(h.pdns.delete_count(), 0);
        assert!(h.sink.is_empty());
    }

    #[tokio::test]
    async fn test_conflict_requeues_immediately() {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();
        h.store.inject_conflicts(1);

        let action = h.reconcile("www").await.unwrap();
        assert_eq!(action, Action::requeue(Duration::ZERO));
        assert!(h.get("www").unwrap().status.is_none());

        h.reconcile("www").await.unwrap();
        assert_eq!(h.status("www").sync_status, Some(SyncStatus::Succeeded));
    }

    #[tokio::test]
    async fn test_change_timestamp_survives_conflict_after_pdns_write() {
        let h = Harness::new();
        h.store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();
        h.reconcile("www").await.unwrap();

        let synced = h.get("www").unwrap();
        let mut old = h.status("www");
        old.last_update_time = Some("2020-01-01T00:00:00Z".to_string());
        h.store.patch_status(&synced, &old).await.unwrap();

        let mut spec = synced.spec;
        spec.ttl = 600;
        h.store.edit_spec(TEST_NAMESPACE, "www", spec).unwrap();
        h.store.inject_conflicts(1);

        // PowerDNS is written, then the status write conflicts
        let action = h.reconcile("www").await.unwrap();
        assert_eq!(action, Action::requeue(Duration::ZERO));
        assert_eq!(h.pdns.replace_count(), 2);

        h.reconcile("www").await.unwrap();

        let status = h.status("www");
        assert_eq!(h.pdns.replace_count(), 2);
        assert_eq!(status.observed_generation, Some(2));
        assert_ne!(status.last_update_time.as_deref(), Some("2020-01-01T00:00:00Z"));
        let stored = h.pdns.rrset("example.com.", "www.example.com.", "A").unwrap();
        assert_eq!(stored.ttl, Some(600));
    }

    #[tokio::test]
    async fn test_absent_rrset_is_done() {
        let h = Harness::new();
        let action = h.reconcile("ghost").await.unwrap();
        assert_eq!(action, Action::await_change());
        assert!(h.pdns.calls().is_empty());
    }

    fn owner(kind: &str, name: &str, uid: &str, controller: bool) -> OwnerReference {
        OwnerReference {
            api_version: "v1".to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            uid: uid.to_string(),
            controller: Some(controller),
            block_owner_deletion: None,
        }
    }

    #[test]
    fn test_zone_owner_update_is_idempotent() {
        let z = zone(TEST_ZONE);
        let obj = rrset("www", "www", &["192.0.2.1"]);

        let owned = zone_owner_update(&obj, &z).unwrap().unwrap();
        assert!(zone_owner_update(&owned, &z).unwrap().is_none());
    }

    #[test]
    fn test_zone_owner_update_replaces_previous_zone_keeps_others() {
        let mut obj = rrset("www", "www", &["192.0.2.1"]);
        obj.metadata.owner_references = Some(vec![
            owner("Zone", "old.example", "uid-old", true),
            owner("ConfigMap", "settings", "uid-cm", false),
        ]);

        let owned = zone_owner_update(&obj, &zone(TEST_ZONE)).unwrap().unwrap();
        let refs = owned.metadata.owner_references.unwrap();

        assert_eq!(refs.len(), 2);
        assert!(refs.iter().any(|r| r.kind == "ConfigMap"));
        assert!(refs
            .iter()
            .any(|r| r.uid == "uid-zone-example.com" && r.controller == Some(true)));
    }

    #[test]
    fn test_zone_owner_update_rejects_foreign_controller() {
        let mut obj = rrset("www", "www", &["192.0.2.1"]);
        obj.metadata.owner_references = Some(vec![owner("Deployment", "web", "uid-web", true)]);

        let err = zone_owner_update(&obj, &zone(TEST_ZONE)).unwrap_err();
        assert!(matches!(err, ReconcileError::Invalid(_)));
    }
}
