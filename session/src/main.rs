use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use env_logger::Env;
use session::{simulate, SimulationConfig};

/// Play random players against each other in a simulated peer-to-peer room
#[derive(Debug, Parser)]
#[command(name = "simulate", version, about)]
struct Cli {
    /// Members of the room, the host included
    #[arg(long)]
    peers: Option<usize>,
    /// Most members the room admits
    #[arg(long)]
    capacity: Option<usize>,
    /// Stop after this many moves
    #[arg(long)]
    max_plies: Option<usize>,
    /// Seed for reproducible games
    #[arg(long)]
    seed: Option<u64>,
    /// Interleave message delivery at random
    #[arg(long)]
    shuffle: bool,
    /// YAML file with the same settings; flags given here win
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut SimulationConfig) {
        if let Some(peers) = self.peers {
            config.peers = peers;
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(max_plies) = self.max_plies {
            config.max_plies = max_plies;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.shuffle {
            config.shuffle = true;
        }
    }
}

fn main() -> ExitCode {
    let env = Env::default().filter_or("CHESS_P2P_LOG", "info");
    env_logger::Builder::from_env(env).init();

    let cli = Cli::parse();
    let mut config = match SimulationConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err}: {:?}", cli.config);
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut config);
    log::debug!("running with {config:?}");

    match simulate(&config) {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("simulation failed: {err}");
            ExitCode::FAILURE
        }
    }
}
