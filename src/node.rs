//! src/node.rs
//!
//! SchedulingObject — one iTIP message inside a principal's scheduling inbox.
//! The node answers resource queries from its metadata snapshot and reaches
//! the backend at most once to load a missing payload. Content and ACL
//! writes are always refused; deletion is forwarded to the backend.

use crate::errors::{SchedulingError, SchedulingResult};
use crate::models::acl::{AccessControlEntry, Acl, Privilege};
use crate::models::metadata::{ObjectMetadata, content_etag};
use crate::services::backend::SchedulingBackend;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

const CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// A scheduling message resource, scoped to a single request.
///
/// Nodes are not shared between tasks; every loading operation takes
/// `&mut self`.
pub struct SchedulingObject<B> {
    backend: Arc<B>,
    uri: String,
    principal_uri: String,
    snapshot: ObjectMetadata,
}

impl<B: SchedulingBackend> SchedulingObject<B> {
    /// Build a node from a (possibly partial) metadata snapshot.
    ///
    /// Never contacts the backend. Fails when the snapshot has no `uri`.
    pub fn new(backend: Arc<B>, metadata: ObjectMetadata) -> SchedulingResult<Self> {
        let Some(uri) = metadata.uri.clone() else {
            return Err(SchedulingError::InvalidConfiguration(
                "the uri field is required".into(),
            ));
        };

        Ok(Self {
            backend,
            uri,
            principal_uri: metadata.principal_uri.clone(),
            snapshot: metadata,
        })
    }

    pub fn get_name(&self) -> &str {
        &self.uri
    }

    /// The current snapshot, including anything a fetch backfilled.
    pub fn metadata(&self) -> &ObjectMetadata {
        &self.snapshot
    }

    /// Whether the payload is already cached.
    pub fn is_loaded(&self) -> bool {
        self.snapshot.calendar_data.is_some()
    }

    /// Return the payload, fetching the full record on first use.
    ///
    /// The fetched record replaces the snapshot, so etag, size and
    /// modification time may change along with the payload. An ACL override
    /// given at construction survives unless the backend supplies its own.
    pub async fn get_content(&mut self) -> SchedulingResult<Bytes> {
        if let Some(data) = &self.snapshot.calendar_data {
            return Ok(data.clone());
        }

        debug!(
            "fetching scheduling object {} for {}",
            self.uri, self.principal_uri
        );
        let mut fetched = self
            .backend
            .fetch_scheduling_object(&self.principal_uri, &self.uri)
            .await?;

        let data = match fetched.calendar_data.take() {
            Some(data) => data,
            None => {
                warn!(
                    "backend returned no calendar data for {}/{}; caching empty payload",
                    self.principal_uri, self.uri
                );
                Bytes::new()
            }
        };

        fetched.uri = Some(self.uri.clone());
        fetched.principal_uri = self.principal_uri.clone();
        fetched.calendar_data = Some(data.clone());
        if fetched.acl == Acl::Default {
            fetched.acl = std::mem::take(&mut self.snapshot.acl);
        }
        self.snapshot = fetched;

        Ok(data)
    }

    /// Always refused: scheduling objects can be deleted but never edited.
    pub fn put_content(&self, _data: impl AsRef<[u8]>) -> SchedulingResult<()> {
        warn!("rejected content update of scheduling object {}", self.uri);
        Err(SchedulingError::OperationNotSupported(
            "updating scheduling objects is not allowed",
        ))
    }

    /// Remove the object from the backend. The node keeps its snapshot;
    /// dropping it from any listing is the caller's job.
    pub async fn delete(&self) -> SchedulingResult<()> {
        debug!(
            "deleting scheduling object {} for {}",
            self.uri, self.principal_uri
        );
        self.backend
            .delete_scheduling_object(&self.principal_uri, &self.uri)
            .await
    }

    pub fn get_content_type(&self) -> String {
        match &self.snapshot.component {
            Some(component) => format!("{CONTENT_TYPE}; component={component}"),
            None => CONTENT_TYPE.to_string(),
        }
    }

    /// Stored etag if present, otherwise the quoted md5 of the payload.
    ///
    /// Without a stored etag this may fetch the payload.
    pub async fn get_etag(&mut self) -> SchedulingResult<String> {
        if let Some(etag) = &self.snapshot.etag {
            return Ok(etag.clone());
        }
        let data = self.get_content().await?;
        Ok(content_etag(&data))
    }

    pub fn get_last_modified(&self) -> Option<i64> {
        self.snapshot.last_modified
    }

    /// Stored size if present (even if stale), otherwise the payload length.
    pub async fn get_size(&mut self) -> SchedulingResult<u64> {
        if let Some(size) = self.snapshot.size {
            return Ok(size);
        }
        let data = self.get_content().await?;
        Ok(data.len() as u64)
    }

    pub fn get_owner(&self) -> &str {
        &self.principal_uri
    }

    /// Scheduling objects have no group principal.
    pub fn get_group(&self) -> Option<&str> {
        None
    }

    pub fn get_acl(&self) -> Vec<AccessControlEntry> {
        self.snapshot.acl.resolve(&self.principal_uri)
    }

    pub fn set_acl(&self, _entries: Vec<AccessControlEntry>) -> SchedulingResult<()> {
        warn!("rejected ACL change on scheduling object {}", self.uri);
        Err(SchedulingError::OperationNotSupported(
            "changing ACL is not yet supported",
        ))
    }

    /// `None` tells the evaluator to use its default privilege hierarchy.
    pub fn get_supported_privilege_set(&self) -> Option<Vec<Privilege>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const ALICE: &str = "principals/alice";
    const INVITE: &str = "BEGIN:VCALENDAR\r\nMETHOD:REQUEST\r\nBEGIN:VEVENT\r\nUID:lunch\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    /// In-memory backend that records every call it receives.
    #[derive(Default)]
    struct RecordingBackend {
        objects: Mutex<HashMap<(String, String), ObjectMetadata>>,
        fetches: Mutex<Vec<(String, String)>>,
        deletes: Mutex<Vec<(String, String)>>,
    }

    impl RecordingBackend {
        fn with_object(meta: ObjectMetadata) -> Arc<Self> {
            let backend = Self::default();
            let key = (meta.principal_uri.clone(), meta.uri.clone().unwrap());
            backend.objects.lock().unwrap().insert(key, meta);
            Arc::new(backend)
        }

        fn fetch_count(&self) -> usize {
            self.fetches.lock().unwrap().len()
        }
    }

    impl SchedulingBackend for RecordingBackend {
        async fn fetch_scheduling_object(
            &self,
            principal_uri: &str,
            uri: &str,
        ) -> SchedulingResult<ObjectMetadata> {
            let key = (principal_uri.to_string(), uri.to_string());
            self.fetches.lock().unwrap().push(key.clone());
            self.objects
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .ok_or_else(|| SchedulingError::NotFound {
                    principal_uri: principal_uri.to_string(),
                    uri: uri.to_string(),
                })
        }

        async fn delete_scheduling_object(
            &self,
            principal_uri: &str,
            uri: &str,
        ) -> SchedulingResult<()> {
            let key = (principal_uri.to_string(), uri.to_string());
            self.deletes.lock().unwrap().push(key.clone());
            self.objects.lock().unwrap().remove(&key);
            Ok(())
        }
    }

    fn stored_invite() -> ObjectMetadata {
        ObjectMetadata::new(ALICE, "invite.ics")
            .with_calendar_data(INVITE)
            .with_etag("\"stored-etag\"")
            .with_size(INVITE.len() as u64)
            .with_last_modified(1_700_000_000)
            .with_component("VEVENT")
    }

    #[test]
    fn construction_requires_uri() {
        let backend = Arc::new(RecordingBackend::default());

        let mut meta = stored_invite();
        meta.uri = None;
        let err = SchedulingObject::new(backend.clone(), meta).err().unwrap();
        assert!(matches!(err, SchedulingError::InvalidConfiguration(_)));

        assert_eq!(backend.fetch_count(), 0);
    }

    #[test]
    fn empty_uri_is_still_a_uri() {
        let backend = Arc::new(RecordingBackend::default());
        let node = SchedulingObject::new(backend.clone(), ObjectMetadata::new(ALICE, "")).unwrap();
        assert_eq!(node.get_name(), "");
        assert_eq!(backend.fetch_count(), 0);
    }

    #[tokio::test]
    async fn preloaded_content_never_hits_backend() {
        let backend = Arc::new(RecordingBackend::default());
        let mut node = SchedulingObject::new(backend.clone(), stored_invite()).unwrap();

        assert!(node.is_loaded());
        assert_eq!(node.get_content().await.unwrap(), INVITE.as_bytes());
        assert_eq!(node.get_content().await.unwrap(), INVITE.as_bytes());
        assert_eq!(backend.fetch_count(), 0);
    }

    #[tokio::test]
    async fn first_content_read_fetches_once() {
        let backend = RecordingBackend::with_object(stored_invite());
        let mut node =
            SchedulingObject::new(backend.clone(), ObjectMetadata::new(ALICE, "invite.ics"))
                .unwrap();

        assert!(!node.is_loaded());
        assert_eq!(node.get_content().await.unwrap(), INVITE.as_bytes());
        assert!(node.is_loaded());
        node.get_content().await.unwrap();
        node.get_etag().await.unwrap();
        node.get_size().await.unwrap();

        assert_eq!(
            *backend.fetches.lock().unwrap(),
            vec![(ALICE.to_string(), "invite.ics".to_string())]
        );
    }

    #[tokio::test]
    async fn fetch_backfills_snapshot() {
        let backend = RecordingBackend::with_object(stored_invite());
        let mut node =
            SchedulingObject::new(backend.clone(), ObjectMetadata::new(ALICE, "invite.ics"))
                .unwrap();

        assert_eq!(node.get_last_modified(), None);
        node.get_content().await.unwrap();
        assert_eq!(node.get_last_modified(), Some(1_700_000_000));
        assert_eq!(node.get_etag().await.unwrap(), "\"stored-etag\"");
        assert_eq!(node.get_name(), "invite.ics");
        assert_eq!(node.get_owner(), ALICE);
    }

    #[tokio::test]
    async fn etag_without_stored_value_fetches_once_and_hashes_content() {
        let mut stored = stored_invite();
        stored.etag = None;
        let backend = RecordingBackend::with_object(stored);
        let mut node =
            SchedulingObject::new(backend.clone(), ObjectMetadata::new(ALICE, "invite.ics"))
                .unwrap();

        let etag = node.get_etag().await.unwrap();
        assert_eq!(etag, content_etag(INVITE.as_bytes()));
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(node.get_etag().await.unwrap(), etag);
        assert_eq!(backend.fetch_count(), 1);
    }

    #[tokio::test]
    async fn size_without_stored_value_fetches_once() {
        let mut stored = stored_invite();
        stored.size = None;
        let backend = RecordingBackend::with_object(stored);
        let mut node =
            SchedulingObject::new(backend.clone(), ObjectMetadata::new(ALICE, "invite.ics"))
                .unwrap();

        assert_eq!(node.get_size().await.unwrap(), INVITE.len() as u64);
        assert_eq!(node.get_size().await.unwrap(), INVITE.len() as u64);
        assert_eq!(backend.fetch_count(), 1);
    }

    #[tokio::test]
    async fn stored_etag_and_size_are_returned_verbatim() {
        let backend = Arc::new(RecordingBackend::default());
        let meta = ObjectMetadata::new(ALICE, "invite.ics")
            .with_etag("\"abc\"")
            .with_size(4096);
        let mut node = SchedulingObject::new(backend.clone(), meta).unwrap();

        assert_eq!(node.get_etag().await.unwrap(), "\"abc\"");
        assert_eq!(node.get_size().await.unwrap(), 4096);
        assert_eq!(backend.fetch_count(), 0);
    }

    #[tokio::test]
    async fn stale_stored_size_wins_over_content_length() {
        let backend = Arc::new(RecordingBackend::default());
        let meta = ObjectMetadata::new(ALICE, "invite.ics")
            .with_calendar_data(INVITE)
            .with_size(3);
        let mut node = SchedulingObject::new(backend, meta).unwrap();

        assert_eq!(node.get_size().await.unwrap(), 3);
        // The computed etag still follows the content, not the stored size.
        assert_eq!(node.get_etag().await.unwrap(), content_etag(INVITE.as_bytes()));
    }

    #[tokio::test]
    async fn identical_content_yields_identical_etags() {
        let backend = Arc::new(RecordingBackend::default());
        let mut first = SchedulingObject::new(
            backend.clone(),
            ObjectMetadata::new(ALICE, "a.ics").with_calendar_data(INVITE),
        )
        .unwrap();
        let mut second = SchedulingObject::new(
            backend.clone(),
            ObjectMetadata::new("principals/bob", "b.ics").with_calendar_data(INVITE),
        )
        .unwrap();
        let mut other = SchedulingObject::new(
            backend,
            ObjectMetadata::new(ALICE, "c.ics").with_calendar_data("BEGIN:VCALENDAR\r\n"),
        )
        .unwrap();

        let etag = first.get_etag().await.unwrap();
        assert_eq!(etag, second.get_etag().await.unwrap());
        assert_ne!(etag, other.get_etag().await.unwrap());
    }

    #[tokio::test]
    async fn missing_object_propagates_not_found() {
        let backend = Arc::new(RecordingBackend::default());
        let mut node =
            SchedulingObject::new(backend.clone(), ObjectMetadata::new(ALICE, "gone.ics"))
                .unwrap();

        let err = node.get_content().await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!node.is_loaded());
    }

    #[tokio::test]
    async fn writes_are_rejected_without_side_effects() {
        let backend = Arc::new(RecordingBackend::default());
        let mut node = SchedulingObject::new(backend.clone(), stored_invite()).unwrap();
        let acl_before = node.get_acl();

        let err = node.put_content("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n").unwrap_err();
        assert!(err.is_not_supported());
        assert_eq!(
            err.to_string(),
            "operation not supported: updating scheduling objects is not allowed"
        );

        let err = node.set_acl(Vec::new()).unwrap_err();
        assert!(err.is_not_supported());
        assert_eq!(
            err.to_string(),
            "operation not supported: changing ACL is not yet supported"
        );

        assert_eq!(node.get_content().await.unwrap(), INVITE.as_bytes());
        assert_eq!(node.get_acl(), acl_before);
        assert_eq!(backend.fetch_count(), 0);
        assert!(backend.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_forwards_principal_and_uri() {
        let backend = RecordingBackend::with_object(stored_invite());
        let node = SchedulingObject::new(backend.clone(), stored_invite()).unwrap();

        node.delete().await.unwrap();

        assert_eq!(
            *backend.deletes.lock().unwrap(),
            vec![(ALICE.to_string(), "invite.ics".to_string())]
        );
        assert_eq!(node.get_name(), "invite.ics");
    }

    #[test]
    fn content_type_carries_component() {
        let backend = Arc::new(RecordingBackend::default());
        let plain =
            SchedulingObject::new(backend.clone(), ObjectMetadata::new(ALICE, "a.ics")).unwrap();
        assert_eq!(plain.get_content_type(), "text/calendar; charset=utf-8");

        let event = SchedulingObject::new(
            backend,
            ObjectMetadata::new(ALICE, "b.ics").with_component("VEVENT"),
        )
        .unwrap();
        assert_eq!(
            event.get_content_type(),
            "text/calendar; charset=utf-8; component=VEVENT"
        );
    }

    #[test]
    fn default_acl_covers_owner_and_proxies() {
        let backend = Arc::new(RecordingBackend::default());
        let node =
            SchedulingObject::new(backend, ObjectMetadata::new(ALICE, "invite.ics")).unwrap();

        let acl = node.get_acl();
        assert_eq!(acl.len(), 5);
        assert_eq!(
            acl[0],
            AccessControlEntry::protected(Privilege::Read, "principals/alice")
        );
        assert_eq!(
            acl[1],
            AccessControlEntry::protected(Privilege::Write, "principals/alice")
        );
        assert_eq!(
            acl[2],
            AccessControlEntry::protected(Privilege::Read, "principals/alice/calendar-proxy-write")
        );
        assert_eq!(
            acl[3],
            AccessControlEntry::protected(Privilege::Write, "principals/alice/calendar-proxy-write")
        );
        assert_eq!(
            acl[4],
            AccessControlEntry::protected(Privilege::Read, "principals/alice/calendar-proxy-read")
        );
    }

    #[tokio::test]
    async fn acl_override_survives_payload_fetch() {
        let mut stored = stored_invite();
        stored.etag = None;
        stored.size = None;
        let backend = RecordingBackend::with_object(stored);
        let custom = vec![AccessControlEntry {
            privilege: Privilege::Read,
            principal: "principals/mailer".into(),
            protected: false,
        }];

        let mut restricted = SchedulingObject::new(
            backend.clone(),
            ObjectMetadata::new(ALICE, "invite.ics").with_acl(Acl::Override(custom.clone())),
        )
        .unwrap();
        restricted.get_content().await.unwrap();
        assert_eq!(restricted.get_acl(), custom);

        let mut empty = SchedulingObject::new(
            backend.clone(),
            ObjectMetadata::new(ALICE, "invite.ics").with_acl(Acl::Override(Vec::new())),
        )
        .unwrap();
        empty.get_etag().await.unwrap();
        empty.get_size().await.unwrap();
        assert!(empty.get_acl().is_empty());
        assert_eq!(backend.fetch_count(), 2);
    }

    #[test]
    fn acl_override_replaces_default() {
        let backend = Arc::new(RecordingBackend::default());
        let custom = vec![AccessControlEntry {
            privilege: Privilege::Read,
            principal: "principals/mailer".into(),
            protected: false,
        }];
        let node = SchedulingObject::new(
            backend,
            ObjectMetadata::new(ALICE, "invite.ics").with_acl(Acl::Override(custom.clone())),
        )
        .unwrap();

        assert_eq!(node.get_acl(), custom);
        assert_eq!(node.get_group(), None);
        assert_eq!(node.get_supported_privilege_set(), None);
    }
}
