//! Shutter Host Integration
//!
//! Concrete implementations of the host collaborators:
//! - **Permissions:** a policy-driven authorization provider and a
//!   capability report for the CLI
//! - **Library:** a directory-backed photo library

pub mod library;
pub mod permissions;

pub use library::DirectoryLibrary;
pub use permissions::PolicyPermissionProvider;
