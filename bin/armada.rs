use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::error;
use tracing_subscriber::EnvFilter;

use armada::{
    DockerRuntime, EnvironmentMode, FleetConfig, FleetError, Provisioner, ProvisionerSpec,
};

#[derive(Debug, Parser)]
struct CliOpts {
    /// Path to the fleet configuration file.
    #[clap(long, default_value = "armada.json")]
    config: PathBuf,
    /// Override the configured environment mode (production or testnet).
    #[clap(long)]
    environment: Option<EnvironmentMode>,
    #[clap(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, Parser)]
enum Command {
    /// Provision N new instances from the configured credential files.
    Launch {
        /// How many instances to provision.
        count: u32,
    },
    /// Pull the latest image and relaunch every tracked instance.
    Update,
    /// Stop and remove every tracked instance and its configuration.
    Delete,
    /// Print recent logs for one instance, or the whole fleet.
    Logs {
        /// Instance index; all tracked instances when omitted.
        #[clap(long)]
        index: Option<u32>,
        /// Number of log lines per instance.
        #[clap(long, default_value_t = 50)]
        tail: usize,
    },
    /// Show tracked instances next to the live container list.
    Status,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let opts = CliOpts::parse();
    let mut config = FleetConfig::load(&opts.config)?;
    if let Some(environment) = opts.environment {
        config.environment = environment;
    }
    let provisioner = Provisioner::new(config, DockerRuntime::new());

    match opts.cmd {
        Some(cmd) => run_command(&provisioner, cmd).await.map_err(Into::into),
        None => menu_loop(&provisioner).await,
    }
}

/// Dispatch one command to its handler.
async fn run_command(
    provisioner: &Provisioner<DockerRuntime>,
    cmd: Command,
) -> Result<(), FleetError> {
    match cmd {
        Command::Launch { count } => {
            let report = provisioner.launch(count).await?;
            println!("launch: {report}");
        }
        Command::Update => {
            let report = provisioner.update_all().await?;
            println!("update: {report}");
        }
        Command::Delete => {
            let report = provisioner.delete_all().await?;
            println!("delete: {report}");
        }
        Command::Logs { index, tail } => {
            let output = provisioner.logs(index, tail).await?;
            print!("{output}");
        }
        Command::Status => {
            let output = provisioner.status().await?;
            print!("{output}");
        }
    }

    Ok(())
}

/// Interactive menu over stdin. Precondition failures (privilege, missing or
/// under-populated source files) are fatal; anything else prints the error
/// and returns to the menu.
async fn menu_loop(provisioner: &Provisioner<DockerRuntime>) -> eyre::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        println!();
        println!("1) launch instances");
        println!("2) view logs");
        println!("3) update all instances");
        println!("4) delete all instances");
        println!("5) status");
        println!("6) exit");

        let Some(choice) = lines.next_line().await? else { break };
        let cmd = match choice.trim() {
            "1" => {
                let Some(count) = prompt_number(&mut lines, "how many instances?").await? else {
                    continue;
                };
                Command::Launch { count }
            }
            "2" => {
                let index =
                    prompt_number(&mut lines, "instance index (empty for all)?").await?;
                Command::Logs { index, tail: 50 }
            }
            "3" => Command::Update,
            "4" => Command::Delete,
            "5" => Command::Status,
            "6" | "exit" | "q" => break,
            other => {
                println!("unknown choice: {other}");
                continue;
            }
        };

        if let Err(err) = run_command(provisioner, cmd).await {
            if err.is_precondition() {
                return Err(err.into());
            }
            error!(error = %err, "Operation failed");
        }
    }

    Ok(())
}

/// Prompt for a number; an empty answer yields `None`.
async fn prompt_number(
    lines: &mut Lines<BufReader<Stdin>>,
    prompt: &str,
) -> eyre::Result<Option<u32>> {
    println!("{prompt}");

    let Some(answer) = lines.next_line().await? else { return Ok(None) };
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(None);
    }

    match answer.parse() {
        Ok(value) => Ok(Some(value)),
        Err(_) => {
            println!("not a number: {answer}");
            Ok(None)
        }
    }
}
