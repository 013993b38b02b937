//! Tests for the handler registry and error classification.

use super::*;
use crate::adapters::{
    MemoryActivityLog, MemorySubscriptionStore, MemoryTaskStore,
};

mod handler_registry_tests {
    use super::*;

    /// Handlers register under their own source.
    #[test]
    fn test_register_and_lookup_by_source() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(PaymentEventHandler::new(
            Arc::new(MemorySubscriptionStore::new()),
            Arc::new(MemoryActivityLog::new()),
        )));

        assert!(registry.get(EventSource::Payment).is_some());
        assert!(registry.get(EventSource::Scm).is_none());
    }

    /// Descriptors list every registered source with its event types, in
    /// stable order.
    #[test]
    fn test_descriptors_are_sorted_and_complete() {
        let activity = Arc::new(MemoryActivityLog::new());
        let mut registry = HandlerRegistry::new();
        registry
            .register(Arc::new(ScmEventHandler::new(
                Arc::new(MemoryTaskStore::new()),
                activity.clone(),
            )))
            .register(Arc::new(PaymentEventHandler::new(
                Arc::new(MemorySubscriptionStore::new()),
                activity,
            )));

        let descriptors = registry.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].0, EventSource::Payment);
        assert_eq!(descriptors[1].0, EventSource::Scm);
        assert!(descriptors[0].1.contains(&"invoice.paid"));
        assert!(descriptors[1].1.contains(&"push"));
    }
}

mod handler_error_tests {
    use super::*;

    /// Retryability is visible on the error itself.
    #[test]
    fn test_retryability_classification() {
        assert!(HandlerError::retryable("not synced yet").is_retryable());
        assert!(!HandlerError::fatal("bad payload").is_retryable());
    }

    /// Transient store errors convert to retryable handler failures.
    #[test]
    fn test_store_error_conversion_preserves_transience() {
        let transient: HandlerError = crate::StoreError::Unavailable {
            message: "down".to_string(),
        }
        .into();
        assert!(transient.is_retryable());

        let permanent: HandlerError = crate::StoreError::NotFound {
            resource: "task".to_string(),
            id: "TASK-1".to_string(),
        }
        .into();
        assert!(!permanent.is_retryable());
    }
}
