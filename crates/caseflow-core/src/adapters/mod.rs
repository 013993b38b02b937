//! # Infrastructure Adapters
//!
//! In-memory implementations of the storage contracts, used by the test
//! suites and by the default service wiring until a database-backed
//! deployment is configured.

pub mod memory;

pub use memory::{
    MemoryActivityLog, MemoryEventStore, MemoryQuoteStore, MemorySubscriptionStore,
    MemoryTaskStore, MemoryTicketStore,
};
