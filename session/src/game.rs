use core::fmt;

use board::{Board, Color};
use rules::{GameStatus, RulesEngine};
use serde::{Deserialize, Serialize};
use turns::{Authority, Progress, Turn, TurnAction, TurnArena, TurnId, TurnKind};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Checkmate { winner: Color },
    Stalemate,
}
impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Checkmate { winner } => write!(f, "checkmate, {winner} wins"),
            Outcome::Stalemate => f.write_str("stalemate"),
        }
    }
}

/// The board, both colors' rules and the turn sequence, advanced only by registered actions
///
/// Every peer feeding the same actions in the same order ends in the same state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Game {
    board: Board,
    rules: RulesEngine,
    turns: TurnArena,
    outcome: Option<Outcome>,
    plies: usize,
}

impl Game {
    pub fn new(authority: Authority) -> Self {
        Self {
            board: Board::initial(),
            rules: RulesEngine::new(),
            turns: TurnArena::new(authority),
            outcome: None,
            plies: 0,
        }
    }

    /// Rebuild a game by registering each action in order
    pub fn replay<'a>(
        authority: Authority,
        actions: impl IntoIterator<Item = &'a TurnAction>,
    ) -> Result<Self> {
        let mut game = Self::new(authority);
        for action in actions {
            game.submit(*action)?;
        }
        Ok(game)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn rules(&self) -> &RulesEngine {
        &self.rules
    }

    pub fn turns(&self) -> &TurnArena {
        &self.turns
    }

    pub fn current_turn(&self) -> &Turn {
        self.turns.current()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// How many moves have been made
    pub fn plies(&self) -> usize {
        self.plies
    }

    /// Whether `color` owes a submission on the current turn
    pub fn awaits(&self, color: Color) -> bool {
        !self.is_over() && self.current_turn().awaits(color)
    }

    /// Register an action, applying it to the board once it completes its turn
    ///
    /// A rejected action changes nothing.
    pub fn submit(&mut self, action: TurnAction) -> Result<Progress> {
        if let Some(outcome) = self.outcome {
            return Err(Error::GameOver(outcome));
        }
        if let (TurnAction::Move { color, mv: Some(mv) }, TurnKind::Move { color: mover }) =
            (action, self.current_turn().kind())
        {
            if color == mover && !self.rules.is_legal(color, mv, &self.board)? {
                return Err(rules::Error::IllegalMove(mv).into());
            }
        }
        let progress = self.turns.register(action)?;
        if let Progress::Resolved(id) = progress {
            self.resolve(id)?;
        }
        Ok(progress)
    }

    /// Whether the action would be accepted, without registering it
    pub fn check(&self, action: TurnAction) -> Result<()> {
        self.clone().submit(action).map(drop)
    }

    fn resolve(&mut self, id: TurnId) -> Result<()> {
        let turn = self.turns.get(id).ok_or(Error::Unresolved(id))?;
        match turn.kind() {
            TurnKind::Move { color } => {
                let mv = turn.submitted_move().ok_or(Error::Unresolved(id))?;
                let applied = self.rules.apply_move(color, mv, &mut self.board)?;
                self.plies += 1;
                if applied.awaits_promotion {
                    self.turns.begin_promotion(color, mv.to, color.other());
                } else {
                    self.turns.begin_move(color.other());
                    self.settle(color.other())?;
                }
            }
            TurnKind::Promotion { color, position } => {
                let choice = turn.submitted_choice().ok_or(Error::Unresolved(id))?;
                self.rules.promote(color, position, choice, &mut self.board)?;
                self.settle(color.other())?;
            }
        }
        Ok(())
    }

    /// Decide whether `to_move` can carry on
    fn settle(&mut self, to_move: Color) -> Result<()> {
        self.outcome = match self.rules.status(to_move, &self.board)? {
            GameStatus::Checkmate => Some(Outcome::Checkmate {
                winner: to_move.other(),
            }),
            GameStatus::Stalemate => Some(Outcome::Stalemate),
            GameStatus::Ongoing | GameStatus::Check => None,
        };
        if let Some(outcome) = self.outcome {
            log::info!("game over after {} plies: {outcome}", self.plies);
        }
        Ok(())
    }
}
