pub mod backend;
pub mod sqlite_backend;
