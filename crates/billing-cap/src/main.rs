use billing_cap::Cli;
use clap::Parser;

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    billing_cap::logging::init_logging(&cli.log_args);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async move { cli.run().await });
    if let Err(err) = result.as_ref() {
        tracing::error!(error = ?err, "billing-cap failed");
    }

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    result
}
