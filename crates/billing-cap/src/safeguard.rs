use crate::event::{self, BudgetAlertEvent, MalformedEvent};
use crate::gateway::{BillingApi, BillingStateGateway, DisableOutcome};
use crate::notifier::{NotificationChannel, NotificationMessage, Sender};
use crate::threshold::{Evaluation, Threshold};

/// How an invocation that processed a valid event ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Completion {
    /// Spend is below the threshold.
    NoAction,
    /// Billing was enabled, and this invocation disabled it.
    Disabled,
    /// Spend exceeded the threshold but billing was already disabled.
    AlreadyDisabled,
    /// Spend exceeded the threshold but the billing API failed. The
    /// informational notification is the only signal sent.
    GatewayError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Failure {
    MalformedEvent,
}

/// Terminal state of a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", content = "outcome", rename_all = "camelCase")]
pub enum Invocation {
    Completed(Completion),
    Failed(Failure),
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (status, outcome) = match self {
            Invocation::Completed(Completion::NoAction) => ("Completed", "no-action"),
            Invocation::Completed(Completion::Disabled) => ("Completed", "disabled"),
            Invocation::Completed(Completion::AlreadyDisabled) => ("Completed", "already-disabled"),
            Invocation::Completed(Completion::GatewayError) => ("Completed", "gateway-error"),
            Invocation::Failed(Failure::MalformedEvent) => ("Failed", "malformed-event"),
        };
        write!(f, "{status}({outcome})")
    }
}

/// Disables billing of a single project once its budget is exhausted.
///
/// Each call to `handle` is an independent invocation. Nothing is carried
/// between invocations: whether billing still needs to be disabled is decided
/// by re-reading the project's billing state every time. Failures of the
/// billing API and of notifications are isolated from one another and are
/// never returned to the caller.
#[derive(Debug)]
pub struct Safeguard<A, S> {
    project_id: String,
    threshold: Threshold,
    gateway: BillingStateGateway<A>,
    channel: NotificationChannel<S>,
}

impl<A: BillingApi, S: Sender> Safeguard<A, S> {
    pub fn new(project_id: impl Into<String>, threshold: Threshold, api: A, sender: S) -> Self {
        Self {
            project_id: project_id.into(),
            threshold,
            gateway: BillingStateGateway::new(api),
            channel: NotificationChannel::new(sender),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn billing_api(&self) -> &A {
        self.gateway.api()
    }

    pub fn sender(&self) -> &S {
        self.channel.sender()
    }

    /// Run the full pipeline over the raw body of a budget notification.
    #[tracing::instrument(skip_all, fields(project_id = %self.project_id, message_id))]
    pub async fn handle(&self, data: &[u8], message_id: Option<&str>) -> Invocation {
        if let Some(message_id) = message_id {
            tracing::Span::current().record("message_id", message_id);
        }

        match event::parse_event(data) {
            Ok(event) => self.process(event).await,
            Err(error) => self.fail(error).await,
        }
    }

    /// Report a message which could not be ingested at all.
    #[tracing::instrument(skip_all, fields(project_id = %self.project_id, message_id))]
    pub async fn reject(&self, error: MalformedEvent, message_id: Option<&str>) -> Invocation {
        if let Some(message_id) = message_id {
            tracing::Span::current().record("message_id", message_id);
        }
        self.fail(error).await
    }

    async fn fail(&self, error: MalformedEvent) -> Invocation {
        let error = anyhow::Error::new(error);
        tracing::error!(error = ?error, "error processing billing alert");

        self.channel
            .notify(NotificationMessage::new(format!(
                "❌ Error processing billing alert!\n{error:#}"
            )))
            .await;

        Invocation::Failed(Failure::MalformedEvent)
    }

    async fn process(&self, event: BudgetAlertEvent) -> Invocation {
        tracing::info!(
            budget_amount = event.budget_amount,
            cost_amount = event.cost_amount,
            currency_code = %event.currency_code,
            "received budget alert"
        );

        self.channel.notify(announcement(&event)).await;

        let Evaluation { exceeded } = self.threshold.evaluate(&event);
        if !exceeded {
            tracing::info!(
                threshold = self.threshold.fraction(),
                "spend is below the disable threshold"
            );
            return Invocation::Completed(Completion::NoAction);
        }

        let completion = match self.gateway.disable_billing(&self.project_id).await {
            DisableOutcome::Disabled => {
                self.channel
                    .notify(NotificationMessage::new(format!(
                        "⚠️ Project billing has been disabled!\nProject: {}",
                        self.project_id
                    )))
                    .await;
                Completion::Disabled
            }
            DisableOutcome::AlreadyDisabled => Completion::AlreadyDisabled,
            DisableOutcome::Failed(_) => Completion::GatewayError,
        };

        let invocation = Invocation::Completed(completion);
        tracing::info!(%invocation, "finished handling budget alert");
        invocation
    }
}

/// The informational notification sent for every valid alert.
fn announcement(event: &BudgetAlertEvent) -> NotificationMessage {
    let mut lines = vec!["🚨 Alert: Budget threshold exceeded!".to_string()];

    if let Some(name) = &event.budget_display_name {
        lines.push(format!("Budget: {name}"));
    }
    if let Some(threshold) = event.alert_threshold_exceeded {
        lines.push(format!("Threshold: {:.0}%", threshold * 100.0));
    }
    lines.push(format!(
        "Budget Amount: {}",
        money(event.budget_amount, &event.currency_code)
    ));
    lines.push(format!(
        "Current Cost: {}",
        money(event.cost_amount, &event.currency_code)
    ));
    if let Some(start) = &event.cost_interval_start {
        lines.push(format!("Interval Start: {start}"));
    }

    NotificationMessage::new(lines.join("\n"))
}

fn money(amount: f64, currency_code: &str) -> String {
    if currency_code.is_empty() {
        amount.to_string()
    } else {
        format!("{amount} {currency_code}")
    }
}
