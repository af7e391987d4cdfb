//! Metadata snapshot describing one scheduling object in an inbox.

use crate::models::acl::Acl;
use bytes::Bytes;
use serde::Serialize;

/// Top-level iCalendar components recognised when classifying a payload.
const COMPONENT_TYPES: [&str; 4] = ["VEVENT", "VTODO", "VJOURNAL", "VFREEBUSY"];

/// What the tree component or backend knows about a scheduling object.
///
/// Every optional field keeps its "absent" meaning: a missing payload is
/// fetched lazily, a missing etag or size is derived from the payload, and a
/// default ACL applies unless an override is given.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct ObjectMetadata {
    /// Basename within the inbox collection.
    pub uri: Option<String>,

    /// Identity URI of the owning principal.
    pub principal_uri: String,

    /// Raw iCalendar payload. Listings usually leave this out.
    #[serde(skip)]
    pub calendar_data: Option<Bytes>,

    /// Already quote-wrapped when present.
    pub etag: Option<String>,

    /// Payload length in bytes.
    pub size: Option<u64>,

    /// Unix timestamp.
    pub last_modified: Option<i64>,

    /// Component name such as `VEVENT`.
    pub component: Option<String>,

    #[serde(skip)]
    pub acl: Acl,
}

impl ObjectMetadata {
    pub fn new(principal_uri: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            principal_uri: principal_uri.into(),
            ..Self::default()
        }
    }

    pub fn with_calendar_data(mut self, data: impl Into<Bytes>) -> Self {
        self.calendar_data = Some(data.into());
        self
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_last_modified(mut self, timestamp: i64) -> Self {
        self.last_modified = Some(timestamp);
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_acl(mut self, acl: Acl) -> Self {
        self.acl = acl;
        self
    }
}

/// Quoted md5 hex digest of a payload. Equal content yields equal tags.
pub fn content_etag(data: &[u8]) -> String {
    format!("\"{:x}\"", md5::compute(data))
}

/// Name of the first top-level component found in an iCalendar payload.
///
/// Only `BEGIN:` lines are inspected; the payload is not otherwise parsed.
pub fn detect_component(data: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(data);
    text.lines()
        .filter_map(|line| line.trim_end().strip_prefix("BEGIN:"))
        .map(|name| name.to_ascii_uppercase())
        .find(|name| COMPONENT_TYPES.contains(&name.as_str()))
}
