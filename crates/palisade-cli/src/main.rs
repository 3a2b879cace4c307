//! Palisade CLI - drive the content-defense engine from the command line

use std::sync::Arc;

use clap::Parser;
use palisade_core::{lockdown_audit_observer, GateDecision, Guard, GuardConfig, StatsStore, TracingAudit};
use palisade_lockdown::{CircuitBreaker, StateStore};

#[derive(Parser)]
#[command(name = "palisade")]
#[command(about = "Palisade - layered content defense for AI agents")]
struct Cli {
    /// Directory for persisted state (stats, lockdown)
    #[arg(long, default_value = ".palisade")]
    state_dir: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the inbound detection pipeline on a message
    Scan { text: String },
    /// Run the egress filter on outbound text
    Egress { text: String },
    /// Show guard and lockdown status
    Status,
    /// Control the kill switch
    Lockdown {
        #[arg(value_parser = ["on", "off", "status"])]
        action: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.state_dir)?;
    let state_dir = std::path::Path::new(&cli.state_dir);

    let lockdown_store = StateStore::new(state_dir.join("lockdown.json"));
    let breaker = CircuitBreaker::new(lockdown_store.load()?, lockdown_store);
    breaker.set_observer(lockdown_audit_observer(Arc::new(TracingAudit)));

    let guard = Guard::new(GuardConfig::default())
        .with_stats_store(StatsStore::new(state_dir.join("guard_stats.json")))
        .with_breaker(Arc::clone(&breaker));

    match cli.command {
        Some(Commands::Scan { text }) => {
            let check = breaker.check();
            if !check.allowed {
                println!("DENIED: {}", check.reason.unwrap_or_default());
                return Ok(());
            }
            let result = guard.run_guard(&text).await;
            let decision = GateDecision::from(&result);
            println!("{}", serde_json::to_string_pretty(&result)?);
            println!("decision: {}", serde_json::to_string(&decision)?);
        }
        Some(Commands::Egress { text }) => {
            let result = guard.run_egress(&text);
            println!("{}", result.text);
            if result.redacted {
                eprintln!("(sensitive data redacted)");
            }
        }
        Some(Commands::Status) => {
            println!("{}", serde_json::to_string_pretty(&guard.status())?);
            println!("{}", serde_json::to_string_pretty(&breaker.status())?);
        }
        Some(Commands::Lockdown { action }) => match action.as_str() {
            "on" => {
                breaker.activate("manual (cli)", true);
                println!("lockdown activated");
            }
            "off" => {
                breaker.deactivate();
                println!("lockdown deactivated");
            }
            _ => {
                let check = breaker.check();
                if check.allowed {
                    println!("lockdown: standby");
                } else {
                    println!("lockdown: {}", check.reason.unwrap_or_default());
                }
            }
        },
        None => {
            println!("Palisade v0.1.0 - Use --help for commands");
        }
    }

    Ok(())
}
