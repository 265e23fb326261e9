//! A player which makes purely random moves

use board::{Board, Color, Move, PieceKind, Position};
use rules::RulesEngine;

use rand::{rngs::SmallRng, seq::IteratorRandom, SeedableRng};

/// A player which makes purely random moves
///
/// The name is pronounced like "Monkey"
#[derive(Debug)]
pub struct MonkePlayer {
    /// How we decide what to do
    rng: SmallRng,
}

impl MonkePlayer {
    /// Create a new player seeded from the operating system
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// Create a player whose choices are reproducible
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl players::Player for MonkePlayer {
    fn choose_move(&mut self, color: Color, board: &Board, rules: &RulesEngine) -> Option<Move> {
        match rules.legal_moves(color, board) {
            Ok(moves) => moves.into_iter().choose(&mut self.rng),
            Err(err) => {
                log::error!("failed to list {color}'s moves: {err}");
                None
            }
        }
    }

    fn choose_promotion(&mut self, _: Color, _: Position, _: &Board) -> PieceKind {
        PieceKind::PROMOTIONS
            .into_iter()
            .choose(&mut self.rng)
            .unwrap_or(PieceKind::Queen)
    }
}

impl Default for MonkePlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use players::Player;

    #[test]
    fn test_same_seed_same_game() {
        let rules = RulesEngine::new();
        let board = Board::initial();
        let mut a = MonkePlayer::seeded(7);
        let mut b = MonkePlayer::seeded(7);
        for _ in 0..10 {
            assert_eq!(
                a.choose_move(Color::White, &board, &rules),
                b.choose_move(Color::White, &board, &rules)
            );
        }
    }

    #[test]
    fn test_only_legal_moves_are_chosen() {
        let rules = RulesEngine::new();
        let board = Board::from_fen("7k/8/8/8/8/8/8/K7").unwrap();
        let legal = rules.legal_moves(Color::White, &board).unwrap();
        let mut monke = MonkePlayer::seeded(1);
        for _ in 0..20 {
            let mv = monke.choose_move(Color::White, &board, &rules).unwrap();
            assert!(legal.contains(&mv));
        }
    }

    #[test]
    fn test_no_moves_means_none() {
        let rules = RulesEngine::new();
        // Black is stalemated
        let board = Board::from_fen("7k/5Q2/6K1/8/8/8/8/8").unwrap();
        assert_eq!(
            MonkePlayer::seeded(3).choose_move(Color::Black, &board, &rules),
            None
        );
    }

    #[test]
    fn test_promotions_are_promotable() {
        let mut monke = MonkePlayer::seeded(11);
        for _ in 0..20 {
            let kind = monke.choose_promotion(Color::White, Position::new(0, 7), &Board::EMPTY);
            assert!(kind.is_promotable());
        }
    }
}
