// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `finalizers.rs`

#[cfg(test)]
mod tests {
    use crate::constants::FINALIZER_RRSET;
    use crate::crd::{RRset, SyncStatus};
    use crate::dns_errors::PdnsError;
    use crate::reconcilers::finalizers::{
        ensure_finalizer, finalizer_state, handle_deletion, remove_finalizer, FinalizerCleanup,
        FinalizerState,
    };
    use crate::reconcilers::index::UniquenessIndex;
    use crate::reconcilers::ReconcileError;
    use crate::store::{MemoryStore, RRsetStore};
    use crate::testing::{deleting, rrset, with_finalizer, with_sync_status, TEST_NAMESPACE};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingCleanup {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl FinalizerCleanup for CountingCleanup {
        async fn cleanup(&self, _rrset: &RRset) -> Result<(), ReconcileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ReconcileError::ExternalSync(PdnsError::Api {
                    status: 500,
                    message: "backend down".to_string(),
                }));
            }
            Ok(())
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new(Arc::new(UniquenessIndex::new()))
    }

    #[test]
    fn test_finalizer_state_table() {
        let plain = rrset("www", "www", &["192.0.2.1"]);

        assert_eq!(
            finalizer_state(&plain, FINALIZER_RRSET),
            FinalizerState::Unregistered
        );
        assert_eq!(
            finalizer_state(&with_finalizer(plain.clone()), FINALIZER_RRSET),
            FinalizerState::Active
        );
        assert_eq!(
            finalizer_state(&deleting(with_finalizer(plain.clone())), FINALIZER_RRSET),
            FinalizerState::Finalizing
        );
        assert_eq!(
            finalizer_state(&deleting(plain), FINALIZER_RRSET),
            FinalizerState::Released
        );
    }

    #[test]
    fn test_foreign_finalizer_does_not_count() {
        let mut obj = rrset("www", "www", &["192.0.2.1"]);
        obj.metadata.finalizers = Some(vec!["example.com/other".to_string()]);
        assert_eq!(
            finalizer_state(&obj, FINALIZER_RRSET),
            FinalizerState::Unregistered
        );
    }

    #[tokio::test]
    async fn test_ensure_finalizer_adds_once() {
        let store = store();
        let created = store.create_rrset(rrset("www", "www", &["192.0.2.1"])).unwrap();

        let updated = ensure_finalizer(&store, &created, FINALIZER_RRSET)
            .await
            .unwrap()
            .unwrap();
        assert!(updated.has_finalizer(FINALIZER_RRSET));

        let again = ensure_finalizer(&store, &updated, FINALIZER_RRSET).await.unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_remove_finalizer_keeps_others() {
        let store = store();
        let mut obj = with_finalizer(rrset("www", "www", &["192.0.2.1"]));
        obj.metadata
            .finalizers
            .as_mut()
            .unwrap()
            .push("example.com/other".to_string());
        let created = store.create_rrset(obj).unwrap();

        let updated = remove_finalizer(&store, &created, FINALIZER_RRSET)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            updated.metadata.finalizers,
            Some(vec!["example.com/other".to_string()])
        );

        assert!(remove_finalizer(&store, &updated, FINALIZER_RRSET)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_handle_deletion_cleans_up_then_releases() {
        let store = store();
        store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();
        store.delete_rrset(TEST_NAMESPACE, "www");
        let obj = store.rrset(TEST_NAMESPACE, "www").unwrap();

        let cleanup = CountingCleanup::default();
        handle_deletion(&store, &obj, FINALIZER_RRSET, &cleanup)
            .await
            .unwrap();

        assert_eq!(cleanup.calls.load(Ordering::SeqCst), 1);
        assert!(store.rrset(TEST_NAMESPACE, "www").is_none());
    }

    #[tokio::test]
    async fn test_handle_deletion_skips_cleanup_when_failed() {
        let store = store();
        let created = store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();
        let failed = with_sync_status(created, SyncStatus::Failed);
        store
            .patch_status(&failed, failed.status.as_ref().unwrap())
            .await
            .unwrap();
        store.delete_rrset(TEST_NAMESPACE, "www");
        let obj = store.rrset(TEST_NAMESPACE, "www").unwrap();

        let cleanup = CountingCleanup::default();
        handle_deletion(&store, &obj, FINALIZER_RRSET, &cleanup)
            .await
            .unwrap();

        assert_eq!(cleanup.calls.load(Ordering::SeqCst), 0);
        assert!(store.rrset(TEST_NAMESPACE, "www").is_none());
    }

    #[tokio::test]
    async fn test_handle_deletion_failure_keeps_finalizer() {
        let store = store();
        store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();
        store.delete_rrset(TEST_NAMESPACE, "www");
        let obj = store.rrset(TEST_NAMESPACE, "www").unwrap();

        let cleanup = CountingCleanup {
            fail: true,
            ..Default::default()
        };
        let err = handle_deletion(&store, &obj, FINALIZER_RRSET, &cleanup)
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::ExternalSync(_)));
        let kept = store.rrset(TEST_NAMESPACE, "www").unwrap();
        assert!(kept.has_finalizer(FINALIZER_RRSET));
    }

    #[tokio::test]
    async fn test_handle_deletion_conflict_is_returned() {
        let store = store();
        store
            .create_rrset(with_finalizer(rrset("www", "www", &["192.0.2.1"])))
            .unwrap();
        store.delete_rrset(TEST_NAMESPACE, "www");
        let obj = store.rrset(TEST_NAMESPACE, "www").unwrap();
        store.inject_conflicts(1);

        let err = handle_deletion(&store, &obj, FINALIZER_RRSET, &CountingCleanup::default())
            .await
            .unwrap_err();

        assert!(err.is_conflict());
    }
}
