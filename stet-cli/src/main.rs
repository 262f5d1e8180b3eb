use anyhow::Context;
use clap::{Args, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use stet_cli::commands::{self, Command};
use stet_cli::output::{self, OutputFormat};
use stet_cli::profile;
use stet_http::{HttpTransport, HttpTransportConfig};
use stet_pis::{PaymentEngine, Settings};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "stet-cli",
    about = "Drive STET PSD2 payment initiations from the command line",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    debug: bool,

    /// Output format
    #[arg(long, global = true, default_value = "json")]
    format: String,

    /// Session file holding the payment and its state
    #[arg(long, global = true, env = "STET_SESSION", default_value = "stet-session.json")]
    session: PathBuf,

    #[command(flatten)]
    bank: BankArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct BankArgs {
    /// Base URL of the bank's STET API
    #[arg(long, global = true, env = "STET_BASE_URL")]
    base_url: Option<String>,

    /// OAuth2 token endpoint of the bank
    #[arg(long, global = true, env = "STET_TOKEN_URL")]
    token_url: Option<String>,

    #[arg(long, global = true, env = "STET_CLIENT_ID")]
    client_id: Option<String>,

    #[arg(long, global = true, env = "STET_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Where the bank sends the PSU back after authentication
    #[arg(long, global = true, env = "STET_REDIRECT_URI")]
    redirect_uri: Option<String>,

    /// Where the bank sends the PSU back after a failure [default: redirect URI]
    #[arg(long, global = true, env = "STET_ERROR_URI")]
    error_uri: Option<String>,

    /// Opaque state echoed on callbacks
    #[arg(long, global = true, env = "STET_REDIRECT_STATE")]
    redirect_state: Option<String>,

    /// STET version implemented by the bank
    #[arg(long, global = true, env = "STET_VERSION", default_value = "1.4.2")]
    stet_version: String,

    /// JSON bank profile applied on top of the version preset
    #[arg(long, global = true, env = "STET_PROFILE")]
    profile: Option<PathBuf>,

    /// Timeout of one bank call in seconds
    #[arg(long, global = true, default_value = "30")]
    timeout: u64,
}

fn build_engine(args: &BankArgs) -> anyhow::Result<PaymentEngine> {
    let config = profile::load_engine_config(&args.stet_version, args.profile.as_deref())
        .context("Failed to load the bank profile")?;

    let base_url = args.base_url.as_deref().context("--base-url is required")?;
    let token_url = args.token_url.as_deref().context("--token-url is required")?;
    let transport = HttpTransport::new(
        HttpTransportConfig::new(base_url, token_url).with_timeout(args.timeout),
    )?;

    let client_id = args.client_id.as_deref().context("--client-id is required")?;
    let redirect_uri = args
        .redirect_uri
        .as_deref()
        .context("--redirect-uri is required")?;
    let mut settings = Settings::new(client_id, redirect_uri);
    settings.client_secret = args.client_secret.clone();
    settings.error_uri = args.error_uri.clone();
    settings.redirect_state = args.redirect_state.clone();

    info!(
        "Using STET {} against {} as {}",
        config.version, base_url, client_id
    );
    Ok(PaymentEngine::new(config, settings, Arc::new(transport)))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let format = cli.format.parse::<OutputFormat>().unwrap_or_else(|_| {
        eprintln!("Warning: unknown format '{}', using json", cli.format);
        OutputFormat::Json
    });

    // Initialize logging to stderr
    let level = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("stet_cli={0},stet_pis={0},stet_http={0}", level).into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .init();

    // Show only reads the session file
    if let Command::Show = cli.command {
        match commands::show(&cli.session) {
            Ok(report) => output::print_success(format, &report),
            Err(e) => {
                output::print_error(format, &e.to_string());
                std::process::exit(1);
            }
        }
        return;
    }

    let engine = match build_engine(&cli.bank) {
        Ok(engine) => engine,
        Err(e) => {
            output::print_error(format, &format!("{:#}", e));
            std::process::exit(2);
        }
    };

    if let Err(e) = commands::handle(&cli.command, format, &engine, &cli.session).await {
        output::print_error(format, &e.to_string());
        std::process::exit(1);
    }
}
