//! Pelagius - load order master lists for modding communities.
//!
//! Each tenant (a community) keeps a master load order, a set of skipped
//! entries and a map of reasons. Users submit their own load order and get
//! back a report of what is missing and what should not be there.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           API                                   │
//! │  Staff and channel checks, routes, request logging              │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┴─────────────────────────────────┐
//! │                          FILES                                  │
//! │  Archive, streamed update, validation, reconciliation           │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┴─────────────────────────────────┐
//! │                          STORE                                  │
//! │  Per-tenant staff, channels and settings on disk                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

// === Core Modules ===

/// Per-tenant state store.
pub mod store;

/// Managed files: archive, update and reconciliation.
pub mod files;

/// REST API.
pub mod api;

// === Re-exports ===

pub use files::{compare, FileArchiver, ReconcileInputs, UpdatePipeline};
pub use store::{Settings, StoreConfig, StoreError, TenantId, TenantStore};
