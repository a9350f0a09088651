use crate::config::SafeguardArgs;
use crate::event::PushEnvelope;
use anyhow::Context;
use tokio::io::AsyncReadExt;

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
/// Handle a single budget notification read from a file or stdin, and print its outcome.
pub struct Handle {
    #[clap(flatten)]
    pub safeguard: SafeguardArgs,
    /// File holding the notification. Reads stdin if omitted or "-".
    #[clap(long)]
    pub event: Option<std::path::PathBuf>,
    /// The input is a Pub/Sub push envelope rather than a bare notification.
    #[clap(long)]
    pub envelope: bool,
}

pub async fn do_handle(cmd: &Handle) -> anyhow::Result<()> {
    let input = match &cmd.event {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        _ => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("reading stdin")?;
            buf
        }
    };

    let safeguard = cmd.safeguard.build()?;

    let invocation = if cmd.envelope {
        match PushEnvelope::parse(&input).and_then(PushEnvelope::into_delivery) {
            Ok(delivery) => {
                safeguard
                    .handle(&delivery.data, delivery.message_id.as_deref())
                    .await
            }
            Err(error) => safeguard.reject(error, None).await,
        }
    } else {
        safeguard.handle(&input, None).await
    };

    println!("{}", serde_json::to_string(&invocation)?);
    Ok(())
}
