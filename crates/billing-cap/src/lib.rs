use clap::Parser;

pub mod config;
pub mod event;
pub mod gateway;
pub mod logging;
pub mod notifier;
pub mod safeguard;
pub mod server;
pub mod threshold;
pub mod token;

mod handle;
mod status;
#[cfg(test)]
mod testing;

pub use config::SafeguardArgs;
pub use event::{parse_event, BudgetAlertEvent, MalformedEvent};
pub use gateway::{BillingApi, BillingStateGateway, CloudBilling, DisableOutcome, GatewayError};
pub use notifier::{Channel, NotificationChannel, NotificationMessage, Sender};
pub use safeguard::{Completion, Failure, Invocation, Safeguard};
pub use threshold::{evaluate, Evaluation, Threshold};
pub use token::TokenSource;

/// Billing-cap disables billing of a project once its budget is exhausted,
/// and reports each alert it handles to an operator webhook.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
pub struct Cli {
    #[clap(subcommand)]
    cmd: Command,
    #[clap(flatten)]
    pub log_args: logging::LogArgs,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    Serve(server::Serve),
    Handle(handle::Handle),
    Status(status::Status),
}

impl Cli {
    pub async fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Serve(serve) => server::do_serve(serve).await,
            Command::Handle(handle) => handle::do_handle(handle).await,
            Command::Status(status) => status::do_status(status).await,
        }
    }
}
