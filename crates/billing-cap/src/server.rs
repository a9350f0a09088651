use crate::config::SafeguardArgs;
use crate::event::PushEnvelope;
use crate::gateway::BillingApi;
use crate::notifier::Sender;
use crate::safeguard::{Invocation, Safeguard};
use anyhow::Context;
use axum::extract::State;
use futures::FutureExt;
use std::sync::Arc;

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
/// Serve the Pub/Sub push endpoint which receives budget notifications.
pub struct Serve {
    #[clap(flatten)]
    pub safeguard: SafeguardArgs,
    /// Port to listen on.
    #[clap(long, env = "PORT", default_value = "8080")]
    pub port: u16,
}

/// Response body of the push endpoint.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(flatten)]
    pub invocation: Invocation,
}

impl axum::response::IntoResponse for PushResponse {
    fn into_response(self) -> axum::response::Response {
        // Every outcome is acknowledged. A non-2xx status would only cause
        // Pub/Sub to redeliver a message which will be handled the same way.
        (axum::http::StatusCode::OK, axum::Json(self)).into_response()
    }
}

pub fn router<A: BillingApi, S: Sender>(safeguard: Arc<Safeguard<A, S>>) -> axum::Router {
    axum::Router::new()
        .route("/", axum::routing::post(handle_push::<A, S>))
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .with_state(safeguard)
}

async fn handle_push<A: BillingApi, S: Sender>(
    State(safeguard): State<Arc<Safeguard<A, S>>>,
    body: axum::body::Bytes,
) -> PushResponse {
    let delivery = PushEnvelope::parse(&body).and_then(PushEnvelope::into_delivery);

    match delivery {
        Ok(delivery) => {
            tracing::debug!(
                message_id = ?delivery.message_id,
                attributes = ?delivery.attributes,
                "received push delivery"
            );
            let invocation = safeguard
                .handle(&delivery.data, delivery.message_id.as_deref())
                .await;
            PushResponse {
                message_id: delivery.message_id,
                invocation,
            }
        }
        Err(error) => PushResponse {
            message_id: None,
            invocation: safeguard.reject(error, None).await,
        },
    }
}

pub async fn do_serve(cmd: &Serve) -> anyhow::Result<()> {
    let safeguard = cmd.safeguard.build()?;

    tracing::info!(
        project_id = %cmd.safeguard.project_id,
        budget_id = ?cmd.safeguard.budget_id,
        topic = %cmd.safeguard.topic,
        port = cmd.port,
        "starting billing safeguard"
    );

    let listener = tokio::net::TcpListener::bind(format!("[::]:{}", cmd.port))
        .await
        .context("failed to bind server port")?;

    // Share-able future which completes when the server should exit.
    let shutdown = tokio::signal::ctrl_c().map(|_| ()).shared();

    let app = router(Arc::new(safeguard)).layer(tower_http::trace::TraceLayer::new_for_http());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("serving HTTP")?;

    tracing::info!("billing safeguard stopped");
    Ok(())
}
