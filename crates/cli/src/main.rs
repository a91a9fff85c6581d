mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fwgen_lib::{Pipeline, PipelineConfig};

use crate::cmd::RequestArgs;
use crate::output::{OutputFormat, print_error};

/// fwgen - build and flash ESP firmware for a device configuration
#[derive(Parser)]
#[command(name = "fwgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Increase log verbosity (-v info, -vv debug)
  #[arg(short, long, global = true, action = clap::ArgAction::Count)]
  verbose: u8,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  /// Directory holding the shared source checkout and build workspaces
  #[arg(long, global = true, value_name = "DIR")]
  work_dir: Option<PathBuf>,

  /// Firmware template repository to clone
  #[arg(long, global = true, value_name = "URL")]
  repo_url: Option<String>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build firmware for a device configuration
  Build {
    #[command(flatten)]
    request: RequestArgs,
  },

  /// Build firmware and flash it to a device over the network
  Upload {
    #[command(flatten)]
    request: RequestArgs,

    /// Address of the device to flash (defaults to the request's static IP)
    #[arg(long, value_name = "IP")]
    device_ip: Option<String>,
  },

  /// List build toolchains and whether they are installed
  Tools,

  /// Print the firmware binary path of a finished build
  Path {
    /// Build id printed by `fwgen build`
    build_id: String,

    /// Copy the binary to this file
    #[arg(long, value_name = "FILE")]
    copy_to: Option<PathBuf>,
  },

  /// Remove the workspace of a finished build
  Clean {
    /// Build id printed by `fwgen build`
    build_id: String,
  },
}

fn init_logging(verbose: u8) {
  let default_level = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

#[tokio::main]
async fn main() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let mut config = PipelineConfig::from_env();
  if let Some(work_dir) = cli.work_dir {
    config = config.with_work_dir(work_dir);
  }
  if let Some(repo_url) = cli.repo_url {
    config = config.with_repo_url(repo_url);
  }
  let pipeline = Pipeline::new(config);

  let result = match cli.command {
    Commands::Build { request } => cmd::cmd_build(&pipeline, request, cli.output).await,
    Commands::Upload { request, device_ip } => cmd::cmd_upload(&pipeline, request, device_ip, cli.output).await,
    Commands::Tools => cmd::cmd_tools(&pipeline, cli.output),
    Commands::Path { build_id, copy_to } => cmd::cmd_path(&pipeline, &build_id, copy_to.as_deref(), cli.output).await,
    Commands::Clean { build_id } => cmd::cmd_clean(&pipeline, &build_id, cli.output).await,
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}
