use std::{process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    Field, FirestoreConfig, FirestoreStore, FormState, RegisterApiSink, RegistrationForm,
    SubmissionOrchestrator,
};
use shared::domain::Interest;
use storage::Storage;
use tracing::{error, info};

/// Submits one volunteer registration to the document store and the review
/// spreadsheet.
#[derive(Parser, Debug)]
#[command(name = "register")]
struct Args {
    /// Base URL of the registration server (spreadsheet route).
    #[arg(long, env = "REGISTER_SERVER_URL", default_value = "http://127.0.0.1:3000")]
    server_url: String,

    #[arg(long, env = "FIREBASE_API_KEY")]
    firebase_api_key: Option<String>,
    #[arg(long, env = "FIREBASE_AUTH_DOMAIN")]
    firebase_auth_domain: Option<String>,
    #[arg(long, env = "FIREBASE_PROJECT_ID")]
    firebase_project_id: Option<String>,
    #[arg(long, env = "FIREBASE_STORAGE_BUCKET")]
    firebase_storage_bucket: Option<String>,
    #[arg(long, env = "FIREBASE_MESSAGING_SENDER_ID")]
    firebase_messaging_sender_id: Option<String>,
    #[arg(long, env = "FIREBASE_APP_ID")]
    firebase_app_id: Option<String>,
    /// Overrides the Firestore REST endpoint (emulators, tests).
    #[arg(long, env = "FIRESTORE_BASE_URL")]
    firestore_url: Option<String>,

    /// SQLite file holding document writes not yet acknowledged.
    #[arg(long, env = "REGISTER_QUEUE_DB", default_value = "sqlite://./data/pending_writes.db")]
    queue_db: String,
    #[arg(long, default_value_t = 4000)]
    store_timeout_ms: u64,
    #[arg(long, default_value_t = 5000)]
    reconnect_ms: u64,
    /// Keeps the process alive after the verdict so background writes can land.
    #[arg(long, default_value_t = 3000)]
    linger_ms: u64,

    #[arg(long, default_value = "")]
    name: String,
    #[arg(long, default_value = "")]
    mobile_number: String,
    #[arg(long, default_value = "")]
    email: String,
    #[arg(long, default_value = "")]
    apartment: String,
    #[arg(long, default_value = "")]
    locality: String,
    #[arg(long, default_value = "")]
    pincode: String,
    #[arg(long, default_value = "")]
    age: String,
    /// Repeat for several interests, e.g. `--interest yuva --interest it-milan`.
    #[arg(long = "interest")]
    interests: Vec<Interest>,
    #[arg(long, default_value = "")]
    notes: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let queue = Storage::new(&args.queue_db)
        .await
        .with_context(|| format!("failed to open offline queue at '{}'", args.queue_db))?;
    let store = Arc::new(
        FirestoreStore::new(firestore_config(&args, |key| std::env::var(key).ok()), queue)
            .context("document store configuration")?,
    );

    let replay = Arc::clone(&store);
    tokio::spawn(async move {
        match replay.replay_pending().await {
            Ok(summary) if summary.delivered + summary.rejected > 0 => info!(
                delivered = summary.delivered,
                rejected = summary.rejected,
                "replayed queued registrations"
            ),
            Ok(_) => {}
            Err(err) => error!(error = %err, "failed to replay queued registrations"),
        }
    });

    let orchestrator =
        SubmissionOrchestrator::new(store, Arc::new(RegisterApiSink::new(&args.server_url)))
            .with_store_timeout(Duration::from_millis(args.store_timeout_ms));

    let mut form = fill_form(&args);
    let state = form.submit(&orchestrator).await;
    if let Some(message) = form.message() {
        println!("{message}");
    }

    tokio::time::sleep(Duration::from_millis(args.linger_ms)).await;

    Ok(if state == FormState::Success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn fill_form(args: &Args) -> RegistrationForm {
    let mut form = RegistrationForm::new();
    form.set_field(Field::Name, args.name.as_str());
    form.set_field(Field::MobileNumber, args.mobile_number.as_str());
    form.set_field(Field::Email, args.email.as_str());
    form.set_field(Field::Apartment, args.apartment.as_str());
    form.set_field(Field::Locality, args.locality.as_str());
    form.set_field(Field::Pincode, args.pincode.as_str());
    form.set_field(Field::Age, args.age.as_str());
    form.set_field(Field::Notes, args.notes.as_str());
    for interest in &args.interests {
        form.toggle_interest(*interest, true);
    }
    form
}

/// Flags and `FIREBASE_*` win; `NEXT_PUBLIC_FIREBASE_*` fills the gaps.
fn firestore_config(args: &Args, lookup: impl Fn(&str) -> Option<String>) -> FirestoreConfig {
    let public = |name: &str| {
        lookup(&format!("NEXT_PUBLIC_FIREBASE_{name}")).filter(|value| !value.trim().is_empty())
    };
    let pick = |flag: &Option<String>, name: &str| {
        flag.clone()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| public(name))
    };

    let mut config = FirestoreConfig::for_project(
        pick(&args.firebase_project_id, "PROJECT_ID").unwrap_or_default(),
    );
    config.api_key = pick(&args.firebase_api_key, "API_KEY");
    config.auth_domain = pick(&args.firebase_auth_domain, "AUTH_DOMAIN");
    config.storage_bucket = pick(&args.firebase_storage_bucket, "STORAGE_BUCKET");
    config.messaging_sender_id = pick(&args.firebase_messaging_sender_id, "MESSAGING_SENDER_ID");
    config.app_id = pick(&args.firebase_app_id, "APP_ID");
    if let Some(base_url) = &args.firestore_url {
        config.base_url = base_url.clone();
    }
    config.reconnect_interval = Duration::from_millis(args.reconnect_ms);
    config
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
