use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ogen")]
#[command(about = "Bulk QA order generator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Batch commands
    Batch {
        #[command(subcommand)]
        cmd: BatchCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum BatchCmd {
    /// Run a batch in-process from a template file and print the summary JSON.
    Run {
        /// Order configuration YAML
        #[arg(long)]
        template: String,

        /// Layered settings paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Print a batch record
    Status {
        #[arg(long)]
        batch_id: String,
    },

    /// Request cancellation of a running batch
    Cancel {
        #[arg(long)]
        batch_id: String,
    },

    /// Delete batches, optionally deleting their remote orders first
    Delete {
        #[arg(long = "batch-id", required = true)]
        batch_ids: Vec<String>,

        #[arg(long, default_value_t = false)]
        purge_remote: bool,

        /// Layered settings paths; falls back to OGEN_CONFIG
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Write a batch's results as CSV
    Export {
        #[arg(long)]
        batch_id: String,

        #[arg(long)]
        out: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = ogen_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = ogen_db::status(&pool).await?;
                    println!("db_ok={} has_batches_table={}", s.ok, s.has_batches_table);
                }
                DbCmd::Migrate => {
                    ogen_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = ogen_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Batch { cmd } => match cmd {
            BatchCmd::Run {
                template,
                config_paths,
            } => commands::batch::batch_run(&template, &config_paths).await?,
            BatchCmd::Status { batch_id } => commands::batch::batch_status(&batch_id).await?,
            BatchCmd::Cancel { batch_id } => commands::batch::batch_cancel(&batch_id).await?,
            BatchCmd::Delete {
                batch_ids,
                purge_remote,
                config_paths,
            } => commands::batch::batch_delete(&batch_ids, purge_remote, &config_paths).await?,
            BatchCmd::Export { batch_id, out } => {
                commands::batch::batch_export(&batch_id, &out).await?
            }
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
