use crate::config::SafeguardArgs;
use crate::gateway::BillingApi;
use anyhow::Context;

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
/// Print the current billing info of the project.
pub struct Status {
    #[clap(flatten)]
    pub safeguard: SafeguardArgs,
}

pub async fn do_status(cmd: &Status) -> anyhow::Result<()> {
    let http = cmd.safeguard.http_client()?;
    let info = cmd
        .safeguard
        .cloud_billing(http)
        .get_billing_info(&cmd.safeguard.project_id)
        .await
        .context("fetching project billing info")?;

    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
