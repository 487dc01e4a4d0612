//! reinforge — docking-guided REINVENT4 staged learning
//! Entry point for the `reinforge` binary.

use clap::{Parser, Subcommand};
use reinforge_config::PipelineConfig;
use reinforge_pipeline::{pipeline::warn_if_test_mode, LaunchMode, LaunchOutcome, Pipeline, ProcessRunner};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reinforge")]
#[command(about = "Selective-ligand generation: DockStream docking + REINVENT4 staged learning", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to reinforge.toml (falls back to REINFORGE_CONFIG, then ./reinforge.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use the production step budget instead of the short test run
    #[arg(long, global = true)]
    production: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Every step in order: workspace, receptors, configs, smoke test, launch
    Run {
        /// Leave the trainer running in the background
        #[arg(long, conflicts_with = "no_launch")]
        detach: bool,
        /// Stop after the smoke test and print the launch command
        #[arg(long)]
        no_launch: bool,
    },
    /// Create targets/, results/ and poses/
    Init,
    /// Convert receptor structures to PDBQT
    Prepare,
    /// Write the DockStream and REINVENT4 configurations
    Configs,
    /// Dock a reference ligand to validate the DockStream setup
    Smoke,
    /// Start REINVENT4 staged learning
    Launch {
        #[arg(long)]
        detach: bool,
    },
    /// Rank the generated molecules by total score
    Analyze {
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn launch_mode(detach: bool) -> LaunchMode {
    if detach {
        LaunchMode::Detached
    } else {
        LaunchMode::Foreground
    }
}

fn report_launch(outcome: &LaunchOutcome) {
    match outcome {
        LaunchOutcome::Completed => info!("🏁 Training finished"),
        LaunchOutcome::Detached { pid, pid_file } => {
            info!("PID {} written to {}", pid, pid_file.display());
            info!("   Stop with: kill {}", pid);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("reinforge=debug,info")),
        )
        .init();

    let cli = Cli::parse();

    info!("🧬 reinforge {}", env!("CARGO_PKG_VERSION"));

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if cli.production {
        config.learning.test_mode = false;
    }
    info!(
        "Configuration loaded: {} targets, workspace {}",
        config.targets.len(),
        config.root().display()
    );

    let mut pipeline = Pipeline::new(config, Arc::new(ProcessRunner::new()));

    match cli.command {
        Command::Run { detach, no_launch } => {
            warn_if_test_mode(pipeline.config());
            let launch = (!no_launch).then(|| launch_mode(detach));
            if let Some(outcome) = pipeline.run(launch).await? {
                report_launch(&outcome);
            }
        }
        Command::Init => {
            pipeline.init_workspace()?;
        }
        Command::Prepare => {
            pipeline.check_environments().await?;
            pipeline.init_workspace()?;
            pipeline.prepare_receptors().await?;
        }
        Command::Configs => {
            warn_if_test_mode(pipeline.config());
            let written = pipeline.write_configs().await?;
            info!("   Docking runs: {}", written.docking.run_ids().join(", "));
        }
        Command::Smoke => {
            let score = pipeline.smoke_test().await?;
            println!("{score}");
        }
        Command::Launch { detach } => {
            let outcome = pipeline.launch(launch_mode(detach)).await?;
            report_launch(&outcome);
        }
        Command::Analyze { top } => {
            let ranked = pipeline.analyze(top)?;
            info!(
                "📊 Top {} of {} molecules by total score",
                ranked.rows.len(),
                ranked.total_rows
            );
            println!("{}", ranked.render_table());
        }
    }

    Ok(())
}
