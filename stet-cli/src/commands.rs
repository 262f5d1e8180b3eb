use crate::error::{Error, Result};
use crate::output::{print_success, OutputFormat};
use crate::session::Session;
use clap::Subcommand;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use stet_pis::model::extra;
use stet_pis::{Callback, CancellationReason, Confirmation, Outcome, Payment, PaymentEngine};
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a payment and send the PSU to the bank
    Create {
        /// JSON file describing the payment
        #[arg(long)]
        payment: PathBuf,
    },
    /// Continue the validation of the current payment
    Resume {
        /// Callback URL the PSU came back with, or "skipped"
        #[arg(long)]
        callback: Option<String>,
        /// PSU decision on a confirmation request (true/false)
        #[arg(long)]
        confirm: Option<Confirmation>,
    },
    /// Poll the bank while the PSU authenticates
    Check,
    /// Cancel the current payment
    Cancel {
        /// ordered_by_psu, duplicate, fraudulent or technical
        #[arg(long, default_value = "ordered_by_psu")]
        reason: CancellationReason,
        /// Callback URL the PSU came back with, or "skipped"
        #[arg(long)]
        callback: Option<String>,
        /// PSU decision on a confirmation request (true/false)
        #[arg(long)]
        confirm: Option<Confirmation>,
    },
    /// Poll the bank while the PSU authenticates a cancellation
    CheckCancel,
    /// Read the payer and instruction statuses from the bank
    Refresh,
    /// Print the session file
    Show,
}

/// What a command reports on stdout.
#[derive(Debug, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    pub payment_id: Option<String>,
    pub last_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
}

impl Report {
    fn new(session: &Session, outcome: Option<Outcome>) -> Self {
        Self {
            outcome,
            payment_id: session.payment.id.clone(),
            last_status: session.payment.extra.get(extra::LAST_STATUS).cloned(),
            payment: None,
        }
    }

    fn with_payment(mut self, session: &Session) -> Self {
        self.payment = Some(session.payment.clone());
        self
    }
}

/// Settings of `engine` with the PSU's callback and decision applied.
fn with_psu_input(
    engine: &PaymentEngine,
    callback: &Option<String>,
    confirm: &Option<Confirmation>,
) -> PaymentEngine {
    let settings = engine
        .settings()
        .clone()
        .with_callback(callback.as_deref().and_then(Callback::parse))
        .with_confirmation(*confirm);
    engine.clone().with_settings(settings)
}

/// Reads the session file without calling the bank.
pub fn show(session_path: &Path) -> Result<Report> {
    let session = Session::load(session_path)?;
    Ok(Report::new(&session, None).with_payment(&session))
}

/// Runs one command against the session file.
pub async fn run(cmd: &Command, engine: &PaymentEngine, session_path: &Path) -> Result<Report> {
    let mut session = match cmd {
        Command::Create { payment } => {
            if session_path.exists() {
                return Err(Error::invalid_parameter(format!(
                    "session file {} already exists",
                    session_path.display()
                )));
            }
            Session::new(serde_json::from_str(&fs::read_to_string(payment)?)?)
        }
        _ => Session::load(session_path)?,
    };
    let Session { payment, state } = &mut session;

    let result = match cmd {
        Command::Create { .. } => engine.create_and_validate(payment, state).await.map(Some),
        Command::Resume { callback, confirm } => with_psu_input(engine, callback, confirm)
            .create_and_validate(payment, state)
            .await
            .map(Some),
        Command::Check => engine
            .check_during_creation(payment, state)
            .await
            .map(Some),
        Command::Cancel {
            reason,
            callback,
            confirm,
        } => with_psu_input(engine, callback, confirm)
            .cancel(payment, state, *reason)
            .await
            .map(Some),
        Command::CheckCancel => engine
            .check_during_cancellation(payment, state)
            .await
            .map(Some),
        Command::Refresh => engine
            .refresh(payment, state)
            .await
            .map(|()| Some(Outcome::Completed)),
        Command::Show => Ok(None),
    };

    // The state moves forward even when the call ends in an error.
    if !matches!(cmd, Command::Show) {
        session.save(session_path)?;
    }
    let outcome = result?;
    if let Some(outcome) = &outcome {
        info!("{:?}", outcome);
    }

    let report = Report::new(&session, outcome);
    Ok(match cmd {
        Command::Refresh | Command::Show => report.with_payment(&session),
        _ => report,
    })
}

pub async fn handle(
    cmd: &Command,
    format: OutputFormat,
    engine: &PaymentEngine,
    session_path: &Path,
) -> Result<()> {
    let report = run(cmd, engine, session_path).await?;
    print_success(format, &report);
    Ok(())
}
