use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tiersnap_config::{Config, StoreBackend};
use tiersnap_notify::{Notifier, StderrNotifier, WebhookNotifier};
use tiersnap_retention::RetentionManager;
use tiersnap_snapshot::{Cipher, DumpProducer, DumpSettings, fetch_artifact};
use tiersnap_store::{FsStore, ObjectStore};

/// Tiersnap - tiered database backups in an object store
#[derive(Parser)]
#[command(name = "tiersnap")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the YAML configuration file
  #[arg(long, global = true, env = "TIERSNAP_CONFIG", default_value = "config.yaml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Bootstrap, refresh and prune every backup tier
  Manage,

  /// Download an artifact, decrypting it if needed
  Download {
    /// Key of the artifact, e.g. daily/2024-06-01_12-00-00.sql.gz
    key: String,

    /// Where to write the artifact (default: the key with '/' replaced by '-')
    #[arg(long)]
    output_file: Option<PathBuf>,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let config = match Config::load(&cli.config) {
    Ok(config) => config,
    Err(e) => {
      eprintln!("error: {}", e);
      return ExitCode::FAILURE;
    }
  };

  init_logging(config.app.output);

  let rt = match tokio::runtime::Runtime::new() {
    Ok(rt) => rt,
    Err(e) => {
      eprintln!("error: failed to start runtime: {}", e);
      return ExitCode::FAILURE;
    }
  };

  match cli.command {
    Commands::Manage => rt.block_on(manage(&config)),
    Commands::Download { key, output_file } => {
      match rt.block_on(download(&config, &key, output_file)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
          eprintln!("error: {:#}", e);
          ExitCode::FAILURE
        }
      }
    }
  }
}

/// `app.output` selects info level, otherwise only warnings and errors.
/// `RUST_LOG` overrides both.
fn init_logging(output: bool) {
  let default_level = if output { "info" } else { "warn" };
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr),
    )
    .with(filter)
    .init();
}

async fn manage(config: &Config) -> ExitCode {
  let started = Instant::now();
  let result = run_manage(config).await;
  let elapsed = started.elapsed().as_secs_f64();

  match result {
    Ok(()) => {
      info!("run completed in {:.2}s", elapsed);
      ExitCode::SUCCESS
    }
    Err(e) => {
      let message = format!("tiersnap run for bucket '{}' failed: {:#}", config.app.bucket, e);
      error!(elapsed_secs = elapsed, "{}", message);

      let notifier = build_notifier(config).await;
      if let Err(notify_error) = notifier.notify(&message).await {
        error!(error = %notify_error, "failed to deliver failure notification");
        eprintln!("{}", message);
      }
      ExitCode::FAILURE
    }
  }
}

async fn run_manage(config: &Config) -> Result<()> {
  let store = build_store(config).await?;

  let settings = DumpSettings {
    command: config.mysql.dump_command.clone(),
    host: config.mysql.host.clone(),
    port: config.mysql.port,
    dbname: config.mysql.dbname.clone(),
    username: config.mysql.username.clone(),
    password: config.mysql.password.clone(),
    add_drop_table: config.app.mirror_default_opt,
  };
  let mut producer = DumpProducer::new(
    store.clone(),
    settings,
    config.app.compression,
    config.app.add_sql_extension,
  );
  if let Some(cipher) = load_cipher(config)? {
    producer = producer.with_cipher(cipher);
  }

  let manager = RetentionManager::new(store, Arc::new(producer), config.app.maximum_backup_counts)
    .context("failed to create retention manager")?;

  let report = manager.manage().await.context("retention run failed")?;
  info!(
    markers = report.created_markers.len(),
    refreshed = report.refreshed.len(),
    pruned = report.pruned.len(),
    "bucket '{}' is up to date",
    config.app.bucket
  );
  Ok(())
}

async fn download(config: &Config, key: &str, output_file: Option<PathBuf>) -> Result<()> {
  tiersnap_artifact::tier_of(key)
    .and_then(|_| tiersnap_artifact::extension_of(key))
    .with_context(|| format!("invalid artifact key '{}'", key))?;

  let store = build_store(config).await?;
  let cipher = load_cipher(config)?;

  let data = fetch_artifact(store.as_ref(), key, cipher.as_ref())
    .await
    .with_context(|| format!("failed to download '{}'", key))?;

  let output = match output_file {
    Some(path) => path,
    None => default_output_path(key)?,
  };
  tokio::fs::write(&output, &data)
    .await
    .with_context(|| format!("failed to write {}", output.display()))?;

  info!(key, output = %output.display(), bytes = data.len(), "wrote artifact");
  Ok(())
}

fn default_output_path(key: &str) -> Result<PathBuf> {
  let cwd = std::env::current_dir().context("failed to determine current directory")?;
  Ok(cwd.join(key.replace('/', "-")))
}

fn load_cipher(config: &Config) -> Result<Option<Cipher>> {
  if !config.client_encryption.enabled {
    return Ok(None);
  }
  let Some(path) = config.client_encryption.key_file.as_deref() else {
    bail!("client encryption is enabled but no key file is configured");
  };
  let cipher = Cipher::from_key_file(path)
    .with_context(|| format!("failed to load encryption key from {}", path.display()))?;
  Ok(Some(cipher))
}

async fn build_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
  match config.store.backend {
    StoreBackend::Fs => {
      let Some(root) = config.store.root.as_deref() else {
        bail!("the fs backend requires store.root");
      };
      Ok(Arc::new(FsStore::new(root)))
    }
    StoreBackend::S3 => build_s3_store(config).await,
  }
}

#[cfg(feature = "s3")]
async fn build_s3_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
  let store = tiersnap_store::S3Store::from_env(
    config.app.bucket.clone(),
    config.store.region.clone(),
    config.store.endpoint.clone(),
  )
  .await;
  Ok(Arc::new(store))
}

#[cfg(not(feature = "s3"))]
async fn build_s3_store(_config: &Config) -> Result<Arc<dyn ObjectStore>> {
  bail!("the s3 backend is not available: rebuild with the `s3` feature")
}

/// SNS when a topic is configured, then a webhook, then standard error.
async fn build_notifier(config: &Config) -> Box<dyn Notifier> {
  if let Some(topic_arn) = &config.notify.sns_topic_arn {
    #[cfg(feature = "sns")]
    {
      let notifier =
        tiersnap_notify::SnsNotifier::from_env(topic_arn.clone(), config.store.region.clone())
          .await;
      return Box::new(notifier);
    }
    #[cfg(not(feature = "sns"))]
    tracing::warn!(topic_arn = %topic_arn, "sns notifications are not available in this build");
  }

  if let Some(url) = &config.notify.webhook_url {
    return Box::new(WebhookNotifier::new(url.clone()));
  }

  Box::new(StderrNotifier)
}
