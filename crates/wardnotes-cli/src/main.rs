//! `wardnotes`: admission notes from the command line.
//!
//! # Usage
//!
//! ```text
//! wardnotes --organization-id O1 admissions
//! wardnotes --user-id U1 send-text A2 "BP 120/80"
//! wardnotes --user-id U1 send-audio A2 ward-round.webm
//! wardnotes summary draft A2 > summary.json
//! ```

mod commands;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use wardnotes_client::{Gateway, HttpBackend};
use wardnotes_core::admission::SessionContext;

use self::{
  commands::Session,
  settings::{Overrides, Settings},
};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "wardnotes", version, about = "Admission notes timeline client")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "wardnotes.toml")]
  config: PathBuf,

  /// Base URL of the hospital API.
  #[arg(long, env = "WARDNOTES_API_URL")]
  api_url: Option<String>,

  /// Bearer token for the API.
  #[arg(long, env = "WARDNOTES_ACCESS_TOKEN", hide_env_values = true)]
  access_token: Option<String>,

  #[arg(long, env = "WARDNOTES_ORGANIZATION_ID")]
  organization_id: Option<String>,

  /// The signed-in user; notes are created in their name.
  #[arg(long, env = "WARDNOTES_USER_ID")]
  user_id: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List the organisation's admissions.
  Admissions,

  /// Show an admission's notes, summaries and prescriptions in time order.
  Timeline { admission: String },

  /// Add a text note.
  SendText { admission: String, content: String },

  /// Upload a file and attach it.
  Attach {
    admission: String,
    path:      PathBuf,
    /// MIME type; guessed from the extension when omitted.
    #[arg(long)]
    mime:      Option<String>,
  },

  /// Convert a recording to WAV, upload it, and transcribe it.
  SendAudio { admission: String, path: PathBuf },

  /// Transcribe an uploaded attachment again.
  Retranscribe { admission: String, file_name: String },

  /// Print a time-limited download link for an attachment.
  Download { admission: String, file_name: String },

  /// Discharge summaries.
  #[command(subcommand)]
  Summary(Authoring),

  /// Prescriptions.
  #[command(subcommand)]
  Prescription(Authoring),
}

#[derive(Subcommand, Debug)]
enum Authoring {
  /// Print an AI-generated draft as JSON.
  Draft { admission: String },

  /// Save a JSON document (as printed by `draft`).
  Save {
    admission: String,
    path:      PathBuf,
    /// Save as final rather than draft.
    #[arg(long = "final")]
    finalize:  bool,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<()> {
  let overrides = Overrides {
    api_url:         cli.api_url,
    access_token:    cli.access_token,
    organization_id: cli.organization_id,
    user_id:         cli.user_id,
  };
  let settings = Settings::load(&cli.config, &overrides)?;

  let gateway = Gateway::new(settings.gateway()).context("failed to build HTTP client")?;
  let mut backend = HttpBackend::new(gateway);
  if let Some(base) = &settings.blob_base_url {
    backend = backend.with_blob_base_url(base.clone());
  }
  let organization = settings.organization()?.to_string();
  let session = Session {
    backend: Arc::new(backend),
    ctx:     SessionContext::new(organization, settings.user_id.clone()),
  };

  match cli.command {
    Command::Admissions => session.admissions().await,
    Command::Timeline { admission } => {
      let notebook = session.open(&admission).await?;
      commands::print_timeline(&notebook.view().await);
      Ok(())
    }
    Command::SendText { admission, content } => session.send_text(&admission, &content).await,
    Command::Attach { admission, path, mime } => {
      session.attach(&admission, &path, mime.as_deref()).await
    }
    Command::SendAudio { admission, path } => session.send_audio(&admission, &path).await,
    Command::Retranscribe { admission, file_name } => {
      session.retranscribe(&admission, &file_name).await
    }
    Command::Download { admission, file_name } => session.download(&admission, &file_name).await,
    Command::Summary(Authoring::Draft { admission }) => session.draft_summary(&admission).await,
    Command::Summary(Authoring::Save { admission, path, finalize }) => {
      session.save_summary(&admission, &path, finalize).await
    }
    Command::Prescription(Authoring::Draft { admission }) => {
      session.draft_prescription(&admission).await
    }
    Command::Prescription(Authoring::Save { admission, path, finalize }) => {
      session.save_prescription(&admission, &path, finalize).await
    }
  }
}
