//! In-memory stand-ins for the billing API and notification webhook.
use crate::gateway::{BillingApi, GatewayError, ProjectBillingInfo};
use crate::notifier::{NotificationMessage, Sender};
use std::sync::{Mutex, MutexGuard};

pub const BILLING_ACCOUNT: &str = "billingAccounts/012345-567890-ABCDEF";

#[derive(Debug, Default)]
pub struct FakeBillingState {
    pub info: ProjectBillingInfo,
    pub reads: usize,
    /// (project_id, billing_account_name) of every update call.
    pub updates: Vec<(String, String)>,
    pub fail_reads: bool,
    pub fail_updates: bool,
}

#[derive(Debug, Default)]
pub struct FakeBilling {
    state: Mutex<FakeBillingState>,
}

impl FakeBilling {
    pub fn enabled() -> Self {
        Self::with_info(ProjectBillingInfo {
            billing_account_name: BILLING_ACCOUNT.to_string(),
            billing_enabled: true,
            ..Default::default()
        })
    }

    pub fn disabled() -> Self {
        Self::with_info(ProjectBillingInfo::default())
    }

    pub fn unavailable() -> Self {
        let fake = Self::enabled();
        fake.state().fail_reads = true;
        fake
    }

    fn with_info(info: ProjectBillingInfo) -> Self {
        Self {
            state: Mutex::new(FakeBillingState {
                info,
                ..Default::default()
            }),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeBillingState> {
        self.state.lock().unwrap()
    }
}

impl BillingApi for FakeBilling {
    async fn get_billing_info<'s>(
        &'s self,
        project_id: &'s str,
    ) -> Result<ProjectBillingInfo, GatewayError> {
        let mut state = self.state();
        state.reads += 1;

        if state.fail_reads {
            return Err(GatewayError::Unavailable(anyhow::anyhow!(
                "connection refused"
            )));
        }
        Ok(ProjectBillingInfo {
            name: format!("projects/{project_id}/billingInfo"),
            project_id: project_id.to_string(),
            ..state.info.clone()
        })
    }

    async fn update_billing_account<'s>(
        &'s self,
        project_id: &'s str,
        billing_account_name: &'s str,
    ) -> Result<ProjectBillingInfo, GatewayError> {
        let mut state = self.state();

        if state.fail_updates {
            return Err(GatewayError::Status {
                status: reqwest::StatusCode::FORBIDDEN,
                body: "caller does not have permission".to_string(),
            });
        }
        state
            .updates
            .push((project_id.to_string(), billing_account_name.to_string()));
        state.info.billing_account_name = billing_account_name.to_string();
        state.info.billing_enabled = !billing_account_name.is_empty();

        Ok(ProjectBillingInfo {
            name: format!("projects/{project_id}/billingInfo"),
            project_id: project_id.to_string(),
            ..state.info.clone()
        })
    }
}

/// Records every attempted notification, and optionally fails them all.
#[derive(Debug, Default)]
pub struct RecordingSender {
    attempts: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingSender {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Sender for RecordingSender {
    async fn send<'s>(&'s self, message: &'s NotificationMessage) -> anyhow::Result<()> {
        self.attempts
            .lock()
            .unwrap()
            .push(message.as_str().to_string());

        if self.fail {
            anyhow::bail!("webhook responded with 502 Bad Gateway");
        }
        Ok(())
    }
}
