//! Permission gate.
//!
//! Resolves camera, microphone, and photo-library authorization through a
//! [`PermissionProvider`]. Undetermined domains are requested at most once
//! at a time: concurrent callers wait on the request already in flight.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use shutter_platform_core::{PermissionDomain, PermissionProvider, PermissionStatus};

/// Resolved status of every permission domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionSnapshot {
    pub camera: PermissionStatus,
    pub microphone: PermissionStatus,
    pub photo_library: PermissionStatus,
}

impl PermissionSnapshot {
    pub fn get(&self, domain: PermissionDomain) -> PermissionStatus {
        match domain {
            PermissionDomain::Camera => self.camera,
            PermissionDomain::Microphone => self.microphone,
            PermissionDomain::PhotoLibrary => self.photo_library,
        }
    }

    pub fn set(&mut self, domain: PermissionDomain, status: PermissionStatus) {
        match domain {
            PermissionDomain::Camera => self.camera = status,
            PermissionDomain::Microphone => self.microphone = status,
            PermissionDomain::PhotoLibrary => self.photo_library = status,
        }
    }

    /// Camera and microphone are both granted; the session may be configured.
    pub fn capture_granted(&self) -> bool {
        self.camera.is_granted() && self.microphone.is_granted()
    }

    /// First capture domain that blocks configuration.
    pub fn first_capture_denial(&self) -> Option<PermissionDomain> {
        [PermissionDomain::Camera, PermissionDomain::Microphone]
            .into_iter()
            .find(|d| !self.get(*d).is_granted())
    }

    pub fn all_granted(&self) -> bool {
        self.capture_granted() && self.photo_library.is_granted()
    }
}

type InFlight = watch::Receiver<Option<PermissionStatus>>;

/// Clears a domain's in-flight entry when the requesting caller finishes or
/// is dropped mid-request.
struct InFlightEntry<'a> {
    inflight: &'a Mutex<HashMap<PermissionDomain, InFlight>>,
    domain: PermissionDomain,
}

impl Drop for InFlightEntry<'_> {
    fn drop(&mut self) {
        self.inflight.lock().remove(&self.domain);
    }
}

/// Resolves permissions with one outstanding request per domain.
pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    inflight: Mutex<HashMap<PermissionDomain, InFlight>>,
}

impl PermissionGate {
    pub fn new(provider: Arc<dyn PermissionProvider>) -> Self {
        Self {
            provider,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Current status without requesting anything.
    pub fn status(&self, domain: PermissionDomain) -> PermissionStatus {
        self.provider.status(domain)
    }

    /// Resolve one domain, requesting it when undetermined.
    pub async fn resolve(&self, domain: PermissionDomain) -> PermissionStatus {
        loop {
            let status = self.provider.status(domain);
            if status != PermissionStatus::Undetermined {
                return status;
            }

            let (mut waiter, leader) = {
                let mut inflight = self.inflight.lock();
                match inflight.get(&domain) {
                    Some(rx) => (rx.clone(), None),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        inflight.insert(domain, rx.clone());
                        (rx, Some(tx))
                    }
                }
            };

            if let Some(tx) = leader {
                let entry = InFlightEntry {
                    inflight: &self.inflight,
                    domain,
                };
                tracing::info!(%domain, "Requesting permission");
                let resolved = self.provider.request(domain).await;
                drop(entry);
                let _ = tx.send(Some(resolved));
                tracing::info!(%domain, status = ?resolved, "Permission resolved");
                return resolved;
            }

            tracing::debug!(%domain, "Waiting on in-flight permission request");
            loop {
                let current = *waiter.borrow_and_update();
                if let Some(resolved) = current {
                    return resolved;
                }
                if waiter.changed().await.is_err() {
                    tracing::debug!(%domain, "In-flight permission request was abandoned");
                    break;
                }
            }
        }
    }

    /// Resolve all three domains concurrently.
    pub async fn resolve_all(&self) -> PermissionSnapshot {
        let (camera, microphone, photo_library) = tokio::join!(
            self.resolve(PermissionDomain::Camera),
            self.resolve(PermissionDomain::Microphone),
            self.resolve(PermissionDomain::PhotoLibrary),
        );
        PermissionSnapshot {
            camera,
            microphone,
            photo_library,
        }
    }
}
