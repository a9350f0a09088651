use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line, for log collectors.
    Json,
    Text,
    Color,
}

#[derive(Debug, clap::Args)]
pub struct LogArgs {
    /// Default verbosity of logs. RUST_LOG takes precedence when set.
    #[clap(long = "log.level", env = "LOG_LEVEL", value_enum, default_value = "info", global = true)]
    pub level: LogLevel,
    /// Format of logs written to stderr. Defaults to `color` when stderr is a
    /// terminal and `json` otherwise.
    #[clap(long = "log.format", env = "LOG_FORMAT", value_enum, global = true)]
    pub format: Option<LogFormat>,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

pub fn init_logging(args: &LogArgs) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(args.level).into())
        .from_env_lossy();

    let format = args.format.unwrap_or_else(|| {
        if atty::is(atty::Stream::Stderr) {
            LogFormat::Color
        } else {
            LogFormat::Json
        }
    });

    let builder = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(builder.json().flatten_event(true).finish())
        }
        LogFormat::Text => tracing::subscriber::set_global_default(builder.with_ansi(false).finish()),
        LogFormat::Color => tracing::subscriber::set_global_default(builder.with_ansi(true).finish()),
    };
    result.expect("setting tracing default failed");
}
