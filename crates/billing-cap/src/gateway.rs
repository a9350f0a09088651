//! Reads and mutates the billing state of a project.
//!
//! `BillingApi` is the raw account-control surface (Cloud Billing's
//! `projects.getBillingInfo` / `projects.updateBillingInfo`).
//! `BillingStateGateway` layers the safeguard's semantics on top of it:
//! billing is only ever detached after re-reading the project's current state,
//! and every failure is converted into a value rather than propagated.
//!
//! The re-read is the only guard against duplicate disablement. Alerts are
//! delivered at least once and invocations are not serialized, so two racing
//! invocations may both observe billing as enabled and both clear it. Clearing
//! an already-cleared account is a no-op on the API side, and no local lock is
//! taken here.
use crate::token::TokenSource;
use std::future::Future;

/// Billing information of a project, as returned by Cloud Billing.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBillingInfo {
    /// Resource name, like `projects/{project_id}/billingInfo`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_id: String,
    /// Associated billing account, like `billingAccounts/012345-567890-ABCDEF`.
    /// Empty if the project has no billing account.
    #[serde(default)]
    pub billing_account_name: String,
    #[serde(default)]
    pub billing_enabled: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The API could not be reached, or no access token could be obtained.
    #[error("billing API is unavailable")]
    Unavailable(#[source] anyhow::Error),
    #[error("billing API responded with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to read billing API response")]
    Decode(#[source] reqwest::Error),
}

pub trait BillingApi: std::fmt::Debug + Send + Sync + 'static {
    fn get_billing_info<'s>(
        &'s self,
        project_id: &'s str,
    ) -> impl Future<Output = Result<ProjectBillingInfo, GatewayError>> + Send + 's;

    /// Associate the project with `billing_account_name`. An empty name
    /// detaches the project from its billing account, disabling billing.
    fn update_billing_account<'s>(
        &'s self,
        project_id: &'s str,
        billing_account_name: &'s str,
    ) -> impl Future<Output = Result<ProjectBillingInfo, GatewayError>> + Send + 's;
}

/// Client of the Cloud Billing REST API.
#[derive(Debug, Clone)]
pub struct CloudBilling {
    base_url: url::Url,
    http: reqwest::Client,
    tokens: TokenSource,
}

impl CloudBilling {
    pub fn new(mut base_url: url::Url, http: reqwest::Client, tokens: TokenSource) -> Self {
        // `Url::join` replaces the final path segment unless it ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            http,
            tokens,
        }
    }

    fn billing_info_url(&self, project_id: &str) -> Result<url::Url, GatewayError> {
        self.base_url
            .join(&format!("projects/{project_id}/billingInfo"))
            .map_err(|err| GatewayError::Unavailable(err.into()))
    }

    async fn bearer(&self) -> Result<zeroize::Zeroizing<String>, GatewayError> {
        self.tokens
            .access_token(&self.http)
            .await
            .map_err(GatewayError::Unavailable)
    }
}

async fn decode(response: reqwest::Response) -> Result<ProjectBillingInfo, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Status { status, body });
    }
    response.json().await.map_err(GatewayError::Decode)
}

impl BillingApi for CloudBilling {
    async fn get_billing_info<'s>(
        &'s self,
        project_id: &'s str,
    ) -> Result<ProjectBillingInfo, GatewayError> {
        let url = self.billing_info_url(project_id)?;
        let token = self.bearer().await?;

        let response = self
            .http
            .get(url)
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|err| GatewayError::Unavailable(err.into()))?;

        decode(response).await
    }

    async fn update_billing_account<'s>(
        &'s self,
        project_id: &'s str,
        billing_account_name: &'s str,
    ) -> Result<ProjectBillingInfo, GatewayError> {
        let url = self.billing_info_url(project_id)?;
        let token = self.bearer().await?;

        let response = self
            .http
            .put(url)
            .bearer_auth(token.as_str())
            .json(&serde_json::json!({ "billingAccountName": billing_account_name }))
            .send()
            .await
            .map_err(|err| GatewayError::Unavailable(err.into()))?;

        decode(response).await
    }
}

/// Result of a request to disable billing.
#[derive(Debug)]
pub enum DisableOutcome {
    /// Billing was enabled and has now been detached.
    Disabled,
    /// Billing was already disabled. Nothing was mutated.
    AlreadyDisabled,
    /// The billing API failed. Billing may be in either state.
    Failed(GatewayError),
}

#[derive(Debug)]
pub struct BillingStateGateway<A> {
    api: A,
}

impl<A: BillingApi> BillingStateGateway<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn is_billing_enabled(&self, project_id: &str) -> Result<bool, GatewayError> {
        let info = self.api.get_billing_info(project_id).await?;
        tracing::debug!(
            %project_id,
            billing_enabled = info.billing_enabled,
            billing_account = %info.billing_account_name,
            "fetched project billing info"
        );
        Ok(info.billing_enabled)
    }

    /// Detach the project from its billing account, if and only if billing is
    /// currently enabled.
    pub async fn disable_billing(&self, project_id: &str) -> DisableOutcome {
        match self.try_disable_billing(project_id).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(%project_id, error = ?error, "failed to disable billing");
                DisableOutcome::Failed(error)
            }
        }
    }

    async fn try_disable_billing(&self, project_id: &str) -> Result<DisableOutcome, GatewayError> {
        if !self.is_billing_enabled(project_id).await? {
            tracing::info!(%project_id, "project billing already disabled");
            return Ok(DisableOutcome::AlreadyDisabled);
        }

        let updated = self.api.update_billing_account(project_id, "").await?;
        tracing::warn!(
            %project_id,
            billing_enabled = updated.billing_enabled,
            "disabled project billing"
        );
        Ok(DisableOutcome::Disabled)
    }
}
