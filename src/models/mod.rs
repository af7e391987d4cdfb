//! Data models for scheduling inbox objects.
//!
//! `metadata` holds the typed snapshot a node is built from, `acl` the
//! access control entries and the fixed inbox policy.

pub mod acl;
pub mod metadata;
