//! Traits for an arbitrary player

use board::{Board, Color, Move, PieceKind, Position};
use rules::RulesEngine;
use turns::{Turn, TurnAction, TurnKind};

/// A player in a game
///
/// This trait is generic over how the player decides what to do, so interactive and automated
/// players can both implement this. A player only decides; sessions own the game and register
/// whatever the player picks.
pub trait Player {
    /// Decide on a move for `color`, or `None` if it has no legal move
    fn choose_move(&mut self, color: Color, board: &Board, rules: &RulesEngine) -> Option<Move>;

    /// Decide what the pawn of `color` on `position` becomes
    fn choose_promotion(&mut self, color: Color, position: Position, board: &Board) -> PieceKind;
}

/// What `color` submits on `turn`, if it owes a submission at all
///
/// The color not moving on a move turn acknowledges with `None` without consulting the player.
pub fn decide(
    player: &mut impl Player,
    color: Color,
    turn: &Turn,
    board: &Board,
    rules: &RulesEngine,
) -> Option<TurnAction> {
    if !turn.awaits(color) {
        return None;
    }
    match turn.kind() {
        TurnKind::Move { color: mover } if mover == color => {
            let mv = player.choose_move(color, board, rules)?;
            Some(TurnAction::Move {
                color,
                mv: Some(mv),
            })
        }
        TurnKind::Move { .. } => Some(TurnAction::Move { color, mv: None }),
        TurnKind::Promotion { position, .. } => Some(TurnAction::Choice {
            color,
            choice: player.choose_promotion(color, position, board),
        }),
    }
}
