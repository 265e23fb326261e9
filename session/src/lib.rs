//! Game sessions: a local game, or one side of an online room
//!
//! A session binds the rules engine and turn sequence into a [`Game`]. Locally, one authority
//! registers both colors' actions directly. Online, every action goes through the room's chain
//! and a turn only counts once the host has accepted its block.

mod config;
mod game;
mod local;
mod online;
mod seats;
mod simulation;

pub use config::SimulationConfig;
pub use game::{Game, Outcome};
pub use local::LocalSession;
pub use online::OnlineSession;
pub use seats::SeatConfiguration;
pub use simulation::{simulate, LocalRoom, SimulationReport};

use turns::TurnId;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Rules(#[from] rules::Error),
    #[error(transparent)]
    Turn(#[from] turns::Error),
    #[error(transparent)]
    Room(#[from] room::Error),
    #[error(transparent)]
    Chain(#[from] chain::Error),
    #[error("the game is over: {0}")]
    GameOver(Outcome),
    #[error("turn {0} resolved without a complete action")]
    Unresolved(TurnId),
    #[error("the host left the room")]
    HostDisconnected,
    #[error("no host is known yet")]
    NoHost,
    #[error("{peer} does not hold the {color} seat")]
    NotSeated { peer: room::PeerId, color: board::Color },
    #[error("peers disagree on the chain: {0}")]
    Diverged(String),
    #[error("failed to read configuration")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration")]
    Yaml(#[from] serde_yaml::Error),
}
