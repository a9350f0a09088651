use crate::gateway::CloudBilling;
use crate::notifier::Channel;
use crate::safeguard::Safeguard;
use crate::threshold::Threshold;
use crate::token::{TokenSource, METADATA_TOKEN_URL};
use anyhow::Context;
use derivative::Derivative;

/// Settings of the safeguard, shared by every subcommand.
#[derive(Derivative, clap::Args)]
#[derivative(Debug)]
#[clap(rename_all = "kebab-case")]
pub struct SafeguardArgs {
    /// Project whose billing is disabled once its budget is exhausted.
    #[clap(long, env = "PROJECT_ID", value_parser = parse_project_id)]
    pub project_id: String,
    /// Discord-compatible webhook which receives operator notifications.
    /// If unset, notifications are only logged.
    #[derivative(Debug = "ignore")]
    #[clap(long, env = "DISCORD_WEBHOOK_URL", hide_env_values = true)]
    pub webhook_url: Option<url::Url>,
    /// Identifier of the budget whose notifications are handled.
    #[clap(long, env = "BUDGET_ID")]
    pub budget_id: Option<String>,
    /// Pub/Sub topic the budget publishes notifications to.
    #[clap(long, env = "PUBSUB_TOPIC", default_value = "loo_cap_billing")]
    pub topic: String,
    /// Fraction of the budget at which billing is disabled.
    #[clap(long, env = "DISABLE_BILLING_THRESHOLD", default_value = "1.0")]
    pub disable_threshold: Threshold,
    /// Base URL of the Cloud Billing API.
    #[clap(
        long,
        env = "BILLING_API_URL",
        default_value = "https://cloudbilling.googleapis.com/v1/"
    )]
    pub billing_api_url: url::Url,
    /// Static access token for the Cloud Billing API. If unset, tokens of the
    /// runtime service account are fetched from the metadata server.
    #[derivative(Debug = "ignore")]
    #[clap(long, env = "BILLING_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
    /// Metadata server endpoint which issues access tokens.
    #[clap(long, env = "GCE_METADATA_URL", default_value = METADATA_TOKEN_URL)]
    pub metadata_url: url::Url,
    /// Timeout of each outbound request, like "10s" or "1m".
    #[clap(long, env = "HTTP_TIMEOUT", default_value = "10s", value_parser = humantime::parse_duration)]
    pub http_timeout: std::time::Duration,
}

fn parse_project_id(arg: &str) -> Result<String, String> {
    let valid = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(arg.to_string())
    } else {
        Err(format!(
            "invalid project ID {arg:?}: expected lowercase letters, digits and hyphens"
        ))
    }
}

impl SafeguardArgs {
    pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .context("building HTTP client")
    }

    pub fn token_source(&self) -> TokenSource {
        match &self.access_token {
            Some(token) => TokenSource::fixed(token.as_str()),
            None => TokenSource::Metadata {
                url: self.metadata_url.clone(),
            },
        }
    }

    pub fn cloud_billing(&self, http: reqwest::Client) -> CloudBilling {
        CloudBilling::new(self.billing_api_url.clone(), http, self.token_source())
    }

    pub fn channel(&self, http: reqwest::Client) -> Channel {
        match &self.webhook_url {
            Some(url) => Channel::webhook(url.clone(), http),
            None => {
                tracing::warn!("no webhook URL configured; notifications will only be logged");
                Channel::Disabled
            }
        }
    }

    pub fn build(&self) -> anyhow::Result<Safeguard<CloudBilling, Channel>> {
        let http = self.http_client()?;
        Ok(Safeguard::new(
            self.project_id.clone(),
            self.disable_threshold,
            self.cloud_billing(http.clone()),
            self.channel(http),
        ))
    }
}
