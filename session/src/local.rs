use board::Color;
use players::Player;
use turns::{Authority, Progress, TurnAction};

use crate::{Game, Outcome, Result};

/// A game with one authority registering both colors' actions, with no network involved
#[derive(Clone, Debug)]
pub struct LocalSession {
    game: Game,
}

impl LocalSession {
    pub fn new() -> Self {
        Self {
            game: Game::new(Authority::Single),
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn submit(&mut self, action: TurnAction) -> Result<Progress> {
        self.game.submit(action)
    }

    /// Ask whichever player owes the current turn and register their answer
    ///
    /// Returns whether anything was played.
    pub fn play_turn(&mut self, white: &mut impl Player, black: &mut impl Player) -> Result<bool> {
        if self.game.is_over() {
            return Ok(false);
        }
        let color = self.game.current_turn().kind().color();
        let turn = self.game.current_turn();
        let action = match color {
            Color::White => players::decide(white, color, turn, self.game.board(), self.game.rules()),
            Color::Black => players::decide(black, color, turn, self.game.board(), self.game.rules()),
        };
        match action {
            Some(action) => {
                self.game.submit(action)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Play until the game ends or `max_plies` moves were made
    pub fn play(
        &mut self,
        white: &mut impl Player,
        black: &mut impl Player,
        max_plies: usize,
    ) -> Result<Option<Outcome>> {
        while self.game.plies() < max_plies && self.play_turn(white, black)? {}
        Ok(self.game.outcome())
    }
}

impl Default for LocalSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use monke::MonkePlayer;

    #[test]
    fn test_random_players_finish_or_hit_the_limit() {
        let mut session = LocalSession::new();
        let outcome = session
            .play(&mut MonkePlayer::seeded(1), &mut MonkePlayer::seeded(2), 60)
            .unwrap();
        let game = session.game();
        assert!(outcome.is_some() || game.plies() == 60);
        assert!(game.plies() <= 60);
    }

    #[test]
    fn test_same_seeds_replay_the_same_game() {
        let mut a = LocalSession::new();
        let mut b = LocalSession::new();
        a.play(&mut MonkePlayer::seeded(5), &mut MonkePlayer::seeded(6), 40)
            .unwrap();
        b.play(&mut MonkePlayer::seeded(5), &mut MonkePlayer::seeded(6), 40)
            .unwrap();
        assert_eq!(a.game(), b.game());
    }
}
