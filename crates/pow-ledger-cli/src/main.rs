use anyhow::Result;
use clap::{Parser, Subcommand};
use pow_ledger_core::{Chain, ChainConfig, MiningStrategy};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pow-ledger")]
#[command(about = "Mine, dump and verify an in-memory proof-of-work ledger")]
struct Cli {
    /// Required leading zero hex digits per block hash (max 8)
    #[arg(long, default_value_t = 3, global = true)]
    difficulty: u32,

    /// Search nonces on all cores instead of a single thread
    #[arg(long, global = true)]
    parallel: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine two payment blocks, tamper with one and show verification catching it
    Demo {
        /// Block to tamper with after the initial dump
        #[arg(long, default_value_t = 1)]
        tamper_index: usize,
    },
    /// Mine one block per payload, then dump and verify the chain
    Run {
        /// Payloads to append, in order
        #[arg(required = true)]
        payloads: Vec<String>,
        /// Tamper with this block index before verifying
        #[arg(long)]
        tamper: Option<usize>,
        /// Replacement payload used with --tamper
        #[arg(long, default_value = "tampered")]
        tamper_payload: String,
    },
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ChainConfig {
        difficulty: cli.difficulty,
        strategy: if cli.parallel {
            MiningStrategy::Parallel
        } else {
            MiningStrategy::Sequential
        },
    };
    let mut chain = Chain::with_config(config)?;
    info!("created chain with difficulty {}", chain.difficulty());

    match cli.cmd {
        Command::Demo { tamper_index } => {
            chain.append(vec!["Alice pays Bob 10 BTC"]);
            chain.append(vec!["Bob pays Charlie 5 BTC"]);

            println!("Initial chain:");
            print!("{chain}");
            report(&chain);

            tamper(&mut chain, tamper_index, "Alice pays Eve 100 BTC");

            println!("\nTampered chain:");
            print!("{chain}");
            report(&chain);
        }
        Command::Run {
            payloads,
            tamper: tamper_index,
            tamper_payload,
        } => {
            for payload in payloads {
                chain.append(payload);
            }
            if let Some(index) = tamper_index {
                tamper(&mut chain, index, &tamper_payload);
            }
            print!("{chain}");
            report(&chain);
        }
    }
    Ok(())
}

/// A rejected tamper is reported and the run continues.
fn tamper(chain: &mut Chain, index: usize, payload: &str) {
    if let Err(e) = chain.tamper(index, payload) {
        println!("{e}");
    }
}

fn report(chain: &Chain) {
    println!("Chain validity: {}", chain.verify());
    match chain.validate_work() {
        Ok(()) => println!("Proof-of-work check: ok"),
        Err(violation) => println!("Proof-of-work check: {violation}"),
    }
}
