use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use reactor_cli::config::parse_assignment;
use reactor_cli::{LoggingConfig, ReactorConfig, Session, init_logging};
use reactor_engine::{Activation, ActorId, Dispatch, Outcome, Vars};
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(version = env!("REACTOR_VERSION"), about, long_about = None)]
struct Cli {
    /// Enables debug mode
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// Config file (default: <config dir>/reactor.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example config
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// List the configured triggers
    List,
    /// Compile every trigger and print parse warnings
    Check,
    /// Activate a trigger once
    Fire {
        trigger: String,

        /// Actor the event is about; omitting it skips the cooldown gate
        #[arg(short, long)]
        player: Option<Uuid>,

        /// Local variables, as key=value
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },
    /// Run a command trigger by name or alias
    Command {
        label: String,

        #[arg(short, long)]
        player: Option<Uuid>,

        args: Vec<String>,
    },
    /// Open a container trigger, click through it and close it
    Open {
        container: String,

        #[arg(short, long)]
        player: Option<Uuid>,

        /// Interaction actions, in order
        #[arg(short = 'k', long = "click")]
        clicks: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = match cli.config {
        Some(path) => path,
        None => ReactorConfig::default_path().context("Could not determine a config directory")?,
    };

    if let Commands::Init { force } = cli.command {
        let _guard = init_logging("reactor", &LoggingConfig::default(), cli.debug)?;
        ReactorConfig::write_example(&path, force)?;
        eprintln!("Config file created at: {}", path.display());
        return Ok(());
    }

    let config = ReactorConfig::load(&path)
        .with_context(|| format!("Run `reactor init` to create {}", path.display()))?;
    let _guard = init_logging("reactor", &config.logging, cli.debug)?;

    let session = Session::new(&config, true)?;
    info!("Session ready with {} trigger(s)", session.manager().len());

    match cli.command {
        Commands::Init { .. } => {}
        Commands::List => {
            for name in session.manager().names() {
                if let Some(trigger) = session.manager().get(&name) {
                    println!("{}", trigger);
                }
            }
        }
        Commands::Check => {
            for line in session.describe() {
                println!("{}", line);
            }
            println!("{} trigger(s) compiled", session.manager().len());
        }
        Commands::Fire {
            trigger,
            player,
            vars,
        } => {
            let mut locals = Vars::new();
            for raw in &vars {
                let (key, value) = parse_assignment(raw)?;
                locals.insert(key, value);
            }
            let activation = session.fire(&trigger, player.map(ActorId::from_uuid), locals)?;
            eprintln!("{}", describe(activation));
        }
        Commands::Command {
            label,
            player,
            args,
        } => {
            let activation = session.command(&label, player.map(ActorId::from_uuid), &args)?;
            eprintln!("{}", describe(activation));
        }
        Commands::Open {
            container,
            player,
            clicks,
        } => {
            let player = player.map(ActorId::from_uuid).unwrap_or_else(ActorId::random);
            let handle = session.open(&container, player, &clicks)?;
            eprintln!("Closed {}", handle);
        }
    }

    // Dropping the session waits for queued runs to finish
    drop(session);
    Ok(())
}

fn describe(activation: Activation) -> &'static str {
    match activation {
        Activation::Refused => "Refused: on cooldown",
        Activation::BindFailed => "Engine unavailable",
        Activation::Dispatched(Dispatch::Queued) => "Queued",
        Activation::Dispatched(Dispatch::Ran(Outcome::Completed))
        | Activation::Dispatched(Dispatch::HandedOff(Outcome::Completed)) => "Completed",
        Activation::Dispatched(Dispatch::Ran(Outcome::Failed))
        | Activation::Dispatched(Dispatch::HandedOff(Outcome::Failed)) => "Failed",
        Activation::Dispatched(Dispatch::TimedOut) => "Timed out waiting for the main thread",
        Activation::Dispatched(Dispatch::Rejected) => "Rejected by the main thread",
    }
}
