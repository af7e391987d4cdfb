//! Access control entries and the fixed policy for scheduling inbox objects.

use serde::Serialize;
use std::fmt;

/// Suffix of the principal that may read and write on the owner's behalf.
pub const PROXY_WRITE_SUFFIX: &str = "/calendar-proxy-write";

/// Suffix of the principal that may only read on the owner's behalf.
pub const PROXY_READ_SUFFIX: &str = "/calendar-proxy-read";

/// A WebDAV privilege that can be granted on a scheduling object.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Privilege {
    #[serde(rename = "{DAV:}read")]
    Read,
    #[serde(rename = "{DAV:}write")]
    Write,
}

impl Privilege {
    /// Clark-notation name, as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::Read => "{DAV:}read",
            Privilege::Write => "{DAV:}write",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule granting a privilege to a principal.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AccessControlEntry {
    pub privilege: Privilege,

    /// URI of the principal receiving the privilege.
    pub principal: String,

    /// Protected entries cannot be removed by clients.
    pub protected: bool,
}

impl AccessControlEntry {
    pub fn protected(privilege: Privilege, principal: impl Into<String>) -> Self {
        Self {
            privilege,
            principal: principal.into(),
            protected: true,
        }
    }
}

/// Which ACL applies to a scheduling object.
///
/// An override replaces the default set entirely; the two are never merged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Acl {
    #[default]
    Default,
    Override(Vec<AccessControlEntry>),
}

impl Acl {
    /// Resolve to the concrete entry list for an object owned by `principal_uri`.
    pub fn resolve(&self, principal_uri: &str) -> Vec<AccessControlEntry> {
        match self {
            Acl::Default => default_acl(principal_uri),
            Acl::Override(entries) => entries.clone(),
        }
    }
}

impl From<Option<Vec<AccessControlEntry>>> for Acl {
    fn from(entries: Option<Vec<AccessControlEntry>>) -> Self {
        entries.map_or(Acl::Default, Acl::Override)
    }
}

/// The inbox default: the owner and its write proxy get read+write, the read
/// proxy gets read. Every entry is protected.
pub fn default_acl(principal_uri: &str) -> Vec<AccessControlEntry> {
    let proxy_write = format!("{principal_uri}{PROXY_WRITE_SUFFIX}");
    let proxy_read = format!("{principal_uri}{PROXY_READ_SUFFIX}");
    vec![
        AccessControlEntry::protected(Privilege::Read, principal_uri),
        AccessControlEntry::protected(Privilege::Write, principal_uri),
        AccessControlEntry::protected(Privilege::Read, proxy_write.clone()),
        AccessControlEntry::protected(Privilege::Write, proxy_write),
        AccessControlEntry::protected(Privilege::Read, proxy_read),
    ]
}
