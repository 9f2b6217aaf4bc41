//! sanctuari server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) plus
//! `SANCTUARI_*` environment variables, opens the SQLite store, and serves the
//! JSON API over HTTP. The remaining subcommands administer the directory
//! and product questionnaires that RFQs draw from.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for an `[[accounts]]` entry:
//!
//! ```
//! cargo run -p sanctuari-server -- hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::{Parser, Subcommand};
use rand_core::OsRng;
use sanctuari_core::{
  directory::{MemberType, NewMember, NewProduct},
  questionnaire::{FieldType, NewQuestion},
};
use sanctuari_server::{ServerConfig, Service, app, service};
use sanctuari_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Sanctuari RFQ server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", env = "SANCTUARI_CONFIG")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
  /// Add an insurance product to the catalogue.
  AddProduct {
    #[arg(long)]
    name:        String,
    #[arg(long)]
    category:    String,
    #[arg(long)]
    description: Option<String>,
  },
  /// Add an insurer or broker to the network directory.
  AddMember {
    #[arg(long)]
    name:     String,
    /// `insurer` or `broker`.
    #[arg(long = "type")]
    kind:     MemberType,
    /// Repeat for each line of business.
    #[arg(long = "category", required = true)]
    categories: Vec<String>,
    #[arg(long)]
    email:    String,
  },
  /// Hide a member from listings and new distributions.
  DeactivateMember { id: Uuid },
  /// Append a question to a product's questionnaire.
  AddQuestion {
    #[arg(long)]
    product:  Uuid,
    #[arg(long)]
    text:     String,
    #[arg(long = "field-type", default_value = "text")]
    kind:     FieldType,
    /// Defaults to `General`.
    #[arg(long)]
    section:  Option<String>,
    /// Position within the product; after the last question if omitted.
    #[arg(long)]
    order:    Option<u32>,
    /// Repeat for each choice of a select, multiselect or radio question.
    #[arg(long = "option")]
    options:  Vec<String>,
    #[arg(long)]
    guidance: Option<String>,
    #[arg(long)]
    required: bool,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let command = cli.command.unwrap_or(Command::Serve);

  if let Command::HashPassword = command {
    let password = rpassword_or_stdin()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SANCTUARI"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let svc = service(store, server_cfg.workflow);

  match command {
    Command::Serve => serve(server_cfg, svc).await,
    Command::AddProduct { name, category, description } => {
      let product = svc
        .add_product(NewProduct { name, category, description })
        .await
        .context("failed to add product")?;
      println!("{}", product.product_id);
      Ok(())
    }
    Command::AddMember { name, kind, categories, email } => {
      let member = svc
        .add_member(NewMember {
          company_name: name,
          member_type: kind,
          categories,
          contact_email: email,
        })
        .await
        .context("failed to add member")?;
      println!("{}", member.member_id);
      Ok(())
    }
    Command::DeactivateMember { id } => {
      svc
        .set_member_active(id, false)
        .await
        .with_context(|| format!("failed to deactivate member {id}"))?;
      Ok(())
    }
    Command::AddQuestion {
      product,
      text,
      kind,
      section,
      order,
      options,
      guidance,
      required,
    } => {
      let question = svc
        .add_question(NewQuestion {
          product_id: product,
          section,
          order_index: order,
          question_text: text,
          field_type: kind,
          options,
          guidance_text: guidance,
          placeholder: None,
          required,
        })
        .await
        .context("failed to add question")?;
      println!("{}", question.question_id);
      Ok(())
    }
    Command::HashPassword => Ok(()),
  }
}

async fn serve(cfg: ServerConfig, svc: Service) -> anyhow::Result<()> {
  if cfg.accounts.0.is_empty() {
    tracing::warn!("no accounts configured; owner endpoints will reject every request");
  }

  let app = app(Arc::new(svc), Arc::new(cfg.accounts));
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn rpassword_or_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
