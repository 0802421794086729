//! Berth - runtime packaging and deployment
//!
//! Usage:
//!   berth deploy [ROOT]       # Deploy an application and wait for the watcher
//!   berth undeploy [ROOT]     # Undeploy it again
//!   berth start server-one    # Start a managed server
//!   berth assemble            # Build the runtime tree

mod output;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use berth_core::config::ConfigStore;
use berth_core::context::AppContext;
use berth_core::deploy::{AppDeployment, ArchiveOptions, create_archive};
use berth_core::outcome::Outcome;

use crate::output::{
    print_archive, print_assembly, print_deployment, print_lifecycle, print_plan, print_status,
};

#[derive(Parser)]
#[command(name = "berth")]
#[command(about = "Runtime packaging and deployment", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Path to berth.toml (defaults to ./berth.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Deployment directory watched by the runtime
    #[arg(long, global = true)]
    deploy_dir: Option<PathBuf>,

    /// Seconds to wait for confirmation
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy an application directory (or a prebuilt archive)
    Deploy {
        /// Application root
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Application name (defaults to the root's directory name)
        #[arg(long)]
        name: Option<String>,

        /// Web context path
        #[arg(long)]
        context_path: Option<String>,

        /// Application environment
        #[arg(long)]
        env: Option<String>,

        /// Deploy this archive instead of writing a descriptor
        #[arg(long, conflicts_with_all = ["context_path", "env"])]
        archive: Option<PathBuf>,
    },

    /// Undeploy an application
    #[command(alias = "rm")]
    Undeploy {
        /// Application root
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Application name (defaults to the root's directory name)
        #[arg(long)]
        name: Option<String>,

        /// Undeploy the archive artifact instead of the descriptor
        #[arg(long)]
        archive: bool,
    },

    /// Package an application directory into a deployable archive
    Archive {
        /// Application root
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Deploy the archive once written
        #[arg(long)]
        deploy: bool,

        /// Regex matched against whole relative paths; matching entries are skipped
        #[arg(long = "exclude", value_name = "PATTERN", num_args = 1..)]
        excludes: Vec<String>,
    },

    /// Start a managed server and wait until it reports STARTED
    Start { server: String },

    /// Stop a managed server and wait until it reports STOPPED
    Stop { server: String },

    /// Show a managed server's status
    Status {
        server: String,

        /// Wait until the server reports this status
        #[arg(long)]
        expect: Option<String>,
    },

    /// Print the resolved component installation order
    Plan,

    /// Assemble the runtime tree from distributions and built modules
    Assemble {
        /// Remove the build directory first
        #[arg(long)]
        clean: bool,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    // Logs go to stderr so JSON output on stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "berth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let ctx = build_context(&cli.global)?;
    let outcome = run_cli(&ctx, cli.command, cli.global.format)?;

    if let Some(outcome) = outcome.filter(|o| !o.is_confirmed()) {
        std::process::exit(outcome.exit_code());
    }
    Ok(())
}

fn build_context(global: &GlobalArgs) -> Result<AppContext> {
    let work_dir = std::env::current_dir().context("Failed to read current directory")?;
    let config_path = match &global.config {
        Some(path) => path.clone(),
        None => ConfigStore::default_path(&work_dir),
    };
    tracing::debug!(config = %config_path.display(), "loading configuration");
    let mut config = ConfigStore::from_path(config_path).load()?;

    if let Some(dir) = &global.deploy_dir {
        config.deploy.dir = Some(absolute(&work_dir, dir));
    }
    if let Some(timeout) = global.timeout {
        config.deploy.timeout_secs = timeout;
        config.server.timeout_secs = timeout;
    }
    config.validate()?;

    Ok(AppContext::new(config, work_dir))
}

/// Returns the outcome of commands that wait for confirmation.
fn run_cli(ctx: &AppContext, command: Commands, format: OutputFormat) -> Result<Option<Outcome>> {
    match command {
        Commands::Deploy {
            root,
            name,
            context_path,
            env,
            archive,
        } => {
            let client = ctx.deployment_client();
            let report = match archive {
                Some(archive) => client.deploy_archive(&ctx.resolve_path(&archive))?,
                None => {
                    let mut app = AppDeployment::new(ctx.resolve_path(&root));
                    app.name = name;
                    app.context_path = context_path;
                    app.env = env;
                    client.deploy_app(&app)?
                }
            };
            print_deployment(&report, format)?;
            Ok(Some(report.outcome))
        }
        Commands::Undeploy {
            root,
            name,
            archive,
        } => {
            let client = ctx.deployment_client();
            let mut app = AppDeployment::new(ctx.resolve_path(&root));
            app.name = name;
            let app_name = app.app_name()?;
            let artifact = if archive {
                client.archive_name(&app_name)
            } else {
                client.descriptor_name(&app_name)
            };
            let report = client.undeploy(&artifact)?;
            print_deployment(&report, format)?;
            Ok(Some(report.outcome))
        }
        Commands::Archive {
            root,
            deploy,
            excludes,
        } => run_archive(ctx, &root, deploy, excludes, format),
        Commands::Start { server } => {
            let report = ctx.lifecycle_client()?.start(&server);
            print_lifecycle(&report, format)?;
            Ok(Some(report.outcome))
        }
        Commands::Stop { server } => {
            let report = ctx.lifecycle_client()?.stop(&server);
            print_lifecycle(&report, format)?;
            Ok(Some(report.outcome))
        }
        Commands::Status { server, expect } => {
            let client = ctx.lifecycle_client()?;
            match expect {
                Some(expected) => {
                    let timeout = Duration::from_secs(ctx.config().server.timeout_secs);
                    let report = client.wait_for_status(&server, &expected, timeout);
                    print_lifecycle(&report, format)?;
                    Ok(Some(report.outcome))
                }
                None => {
                    let status = client.status(&server)?;
                    print_status(&server, &status, format)?;
                    Ok(None)
                }
            }
        }
        Commands::Plan => {
            let plan = ctx.assembler().plan()?;
            print_plan(&plan, format)?;
            Ok(None)
        }
        Commands::Assemble { clean } => {
            let assembler = ctx.assembler();
            if clean {
                assembler.clean()?;
            }
            let report = assembler.assemble()?;
            print_assembly(&report, format)?;
            Ok(None)
        }
    }
}

fn run_archive(
    ctx: &AppContext,
    root: &Path,
    deploy: bool,
    excludes: Vec<String>,
    format: OutputFormat,
) -> Result<Option<Outcome>> {
    let client = ctx.deployment_client();
    let root = ctx.resolve_path(root);
    let app_name = AppDeployment::new(&root).app_name()?;
    let output = root.join(client.archive_name(&app_name));

    let archive = create_archive(&ArchiveOptions {
        root,
        output,
        excludes,
    })?;
    print_archive(&archive, format)?;

    if !deploy {
        return Ok(None);
    }
    let report = client.deploy_archive(&archive.path)?;
    print_deployment(&report, format)?;
    Ok(Some(report.outcome))
}

fn absolute(work_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        work_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive_excludes(args: &[&str]) -> Vec<String> {
        match Cli::try_parse_from(args.iter().copied()).unwrap().command {
            Commands::Archive { excludes, .. } => excludes,
            _ => panic!("expected archive command"),
        }
    }

    #[test]
    fn exclude_accepts_several_patterns() {
        let excludes = archive_excludes(&[
            "berth",
            "archive",
            "app",
            "--exclude",
            "public/404.html",
            "config/.+",
            ".+file",
        ]);
        assert_eq!(excludes, ["public/404.html", "config/.+", ".+file"]);
    }

    #[test]
    fn exclude_can_be_repeated() {
        let excludes = archive_excludes(&[
            "berth", "archive", "app", "--exclude", "log", "--deploy", "--exclude", "tmp",
        ]);
        assert_eq!(excludes, ["log", "tmp"]);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
