//! Authorization contracts.

use shutter_common::types::{PermissionDomain, PermissionStatus};

/// Host authorization subsystem.
///
/// `status` answers synchronously from whatever the host already knows.
/// `request` asks the user and resolves once with their answer; callers
/// only issue it for an undetermined domain.
#[async_trait::async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Current status for a domain.
    fn status(&self, domain: PermissionDomain) -> PermissionStatus;

    /// Ask for access to a domain.
    async fn request(&self, domain: PermissionDomain) -> PermissionStatus;
}
