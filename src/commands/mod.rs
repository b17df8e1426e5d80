mod config_cmd;
mod exercises;
mod simulate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

pub use exercises::ExercisesCommand;
pub use simulate::SimulateCommand;

#[derive(Parser)]
#[command(name = "opticrep")]
#[command(about = "Camera-based rep counting and set logging", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Force offline mode (no durable storage)
    #[arg(long, global = true)]
    offline: bool,

    /// Path to configuration file
    #[arg(long, global = true, env = "OPTICREP_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported exercises and their detection thresholds
    Exercises(ExercisesCommand),

    /// Run the tracking pipeline against synthetic poses
    Simulate(SimulateCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigSubcommands),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Show current configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Initialize configuration with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Config::config_file(),
        }
    }

    pub async fn execute(self) -> Result<()> {
        if self.verbose {
            tracing::info!("Verbose mode enabled");
        }

        let config_path = self.config_path()?;

        match self.command {
            Commands::Exercises(cmd) => cmd.execute(),
            Commands::Simulate(cmd) => {
                let config = Config::load_from(&config_path)?;
                cmd.execute(&config, self.offline).await
            }
            Commands::Config(subcmd) => match subcmd {
                ConfigSubcommands::Show => config_cmd::show_config(&config_path),
                ConfigSubcommands::Path => {
                    println!("{}", config_path.display());
                    Ok(())
                }
                ConfigSubcommands::Init { force } => config_cmd::init_config(&config_path, force),
            },
            Commands::Completions { shell } => {
                generate_completions(shell);
                Ok(())
            }
        }
    }
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
