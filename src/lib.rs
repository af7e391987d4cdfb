//! Scheduling inbox objects for a CalDAV-style server.
//!
//! A [`node::SchedulingObject`] wraps one iTIP message stored in a
//! principal's scheduling inbox. It loads its payload lazily through a
//! [`services::backend::SchedulingBackend`], applies the fixed inbox ACL
//! unless overridden, and refuses in-place edits.

pub mod errors;
pub mod models;
pub mod node;
pub mod services;

pub use errors::{SchedulingError, SchedulingResult};
pub use models::acl::{AccessControlEntry, Acl, Privilege};
pub use models::metadata::ObjectMetadata;
pub use node::SchedulingObject;
pub use services::backend::SchedulingBackend;
