//! Permission policy and reporting.
//!
//! Shutter needs camera, microphone, and photo library access. On a host
//! without an interactive authorization prompt the answers come from the
//! configured [`PermissionPolicy`].

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use shutter_common::config::PermissionPolicy;
use shutter_platform_core::{PermissionDomain, PermissionProvider, PermissionStatus};

/// Authorization provider driven by a [`PermissionPolicy`].
///
/// An undetermined domain resolves to the policy's `on_request` answer the
/// first time it is requested; the answer is then remembered.
pub struct PolicyPermissionProvider {
    policy: PermissionPolicy,
    statuses: Mutex<HashMap<PermissionDomain, PermissionStatus>>,
    requests: Mutex<HashMap<PermissionDomain, u32>>,
}

impl PolicyPermissionProvider {
    pub fn new(policy: PermissionPolicy) -> Self {
        let statuses = PermissionDomain::ALL
            .iter()
            .map(|d| (*d, policy.initial_status(*d)))
            .collect();
        Self {
            policy,
            statuses: Mutex::new(statuses),
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Change a domain's status, as when the user edits settings while the app runs.
    pub fn set_status(&self, domain: PermissionDomain, status: PermissionStatus) {
        self.statuses.lock().insert(domain, status);
    }

    /// How many times `request` was called for a domain.
    pub fn request_count(&self, domain: PermissionDomain) -> u32 {
        self.requests.lock().get(&domain).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl PermissionProvider for PolicyPermissionProvider {
    fn status(&self, domain: PermissionDomain) -> PermissionStatus {
        self.statuses.lock().get(&domain).copied().unwrap_or_default()
    }

    async fn request(&self, domain: PermissionDomain) -> PermissionStatus {
        *self.requests.lock().entry(domain).or_insert(0) += 1;

        if self.policy.response_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.policy.response_delay_ms)).await;
        }

        let mut statuses = self.statuses.lock();
        let current = statuses.get(&domain).copied().unwrap_or_default();
        let resolved = match current {
            PermissionStatus::Undetermined => self.policy.requested_status(domain),
            decided => decided,
        };
        statuses.insert(domain, resolved);
        tracing::info!(%domain, ?resolved, "Permission request resolved");
        resolved
    }
}

/// Report line for one permission domain.
#[derive(Debug, Clone)]
pub struct PermissionReport {
    pub domain: PermissionDomain,
    pub description: String,
    pub status: PermissionStatus,
    pub required: bool,
    pub fix_instructions: Option<String>,
}

/// Check all permission domains and report status.
pub fn check_permissions(provider: &dyn PermissionProvider) -> Vec<PermissionReport> {
    PermissionDomain::ALL
        .iter()
        .map(|domain| {
            let status = provider.status(*domain);
            let (description, required) = match domain {
                PermissionDomain::Camera => ("Camera access for preview and capture", true),
                PermissionDomain::Microphone => ("Microphone access for movie audio", true),
                PermissionDomain::PhotoLibrary => {
                    ("Add-only photo library access for saving", false)
                }
            };
            let fix_instructions = match status {
                PermissionStatus::Denied => Some(format!(
                    "Set permissions.initial.{} to \"granted\" in the Shutter config",
                    domain_key(*domain)
                )),
                PermissionStatus::Undetermined => {
                    Some("Access will be requested when the session starts".to_string())
                }
                PermissionStatus::Granted => None,
            };
            PermissionReport {
                domain: *domain,
                description: description.to_string(),
                status,
                required,
                fix_instructions,
            }
        })
        .collect()
}

fn domain_key(domain: PermissionDomain) -> &'static str {
    match domain {
        PermissionDomain::Camera => "camera",
        PermissionDomain::Microphone => "microphone",
        PermissionDomain::PhotoLibrary => "photo_library",
    }
}

/// Print a user-friendly permission report.
pub fn print_permission_report(reports: &[PermissionReport]) {
    println!("Shutter Permissions:");
    println!("{}", "-".repeat(60));

    for report in reports {
        let status = match report.status {
            PermissionStatus::Granted => "[OK]",
            PermissionStatus::Undetermined => "[PENDING]",
            PermissionStatus::Denied if report.required => "[DENIED - REQUIRED]",
            PermissionStatus::Denied => "[DENIED - OPTIONAL]",
        };

        println!("  {} {}: {}", status, report.domain, report.description);

        if let Some(ref fix) = report.fix_instructions {
            println!("    Fix: {fix}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn undetermined_resolves_to_policy_answer_once() {
        let mut policy = PermissionPolicy::default();
        policy
            .on_request
            .insert(PermissionDomain::Microphone, PermissionStatus::Denied);
        let provider = PolicyPermissionProvider::new(policy);

        assert_eq!(
            provider.status(PermissionDomain::Microphone),
            PermissionStatus::Undetermined
        );
        assert_eq!(
            provider.request(PermissionDomain::Microphone).await,
            PermissionStatus::Denied
        );
        assert_eq!(
            provider.request(PermissionDomain::Camera).await,
            PermissionStatus::Granted
        );
        assert_eq!(
            provider.status(PermissionDomain::Microphone),
            PermissionStatus::Denied
        );
        assert_eq!(provider.request_count(PermissionDomain::Microphone), 1);
    }

    #[tokio::test]
    async fn decided_status_is_not_overridden_by_request() {
        let provider = PolicyPermissionProvider::new(PermissionPolicy::uniform(
            PermissionStatus::Denied,
        ));
        assert_eq!(
            provider.request(PermissionDomain::Camera).await,
            PermissionStatus::Denied
        );
    }

    #[test]
    fn report_flags_denied_domains() {
        let provider = PolicyPermissionProvider::new(PermissionPolicy::all_granted());
        provider.set_status(PermissionDomain::Camera, PermissionStatus::Denied);

        let reports = check_permissions(&provider);
        assert_eq!(reports.len(), 3);
        let camera = &reports[0];
        assert_eq!(camera.status, PermissionStatus::Denied);
        assert!(camera.required);
        assert!(camera.fix_instructions.is_some());
        assert!(reports[2].fix_instructions.is_none());
    }
}
