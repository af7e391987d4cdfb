//! src/services/backend.rs
//!
//! The storage collaborator a scheduling object node talks to. Nodes only
//! ever fetch one object or delete one object; listing and delivery belong
//! to whoever owns the inbox collection.

use crate::errors::SchedulingResult;
use crate::models::metadata::ObjectMetadata;

#[allow(async_fn_in_trait)]
pub trait SchedulingBackend {
    /// Load the full record, payload included.
    ///
    /// Returns `SchedulingError::NotFound` when the pair is unknown.
    async fn fetch_scheduling_object(
        &self,
        principal_uri: &str,
        uri: &str,
    ) -> SchedulingResult<ObjectMetadata>;

    async fn delete_scheduling_object(&self, principal_uri: &str, uri: &str)
    -> SchedulingResult<()>;
}
