//! The rules engine: legal destinations, safe boards, and applying moves to a board
//!
//! Everything here is deterministic: the same board and the same castling history give the same
//! answers on every peer.

use std::collections::BTreeSet;

use board::{Board, Color, Move, Piece, PieceKind, Position};

mod bitboard;
pub mod movement;
mod rules;

pub use crate::bitboard::{Bitboard, SafeBoard};
pub use crate::movement::{Condition, Mode, Movement, Occupant, Threats};
pub use crate::rules::{CastleRights, Rules};

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Board(#[from] board::Error),
    #[error("no piece at {0}")]
    NoPiece(Position),
    #[error("piece at {0} doesn't belong to {1}")]
    WrongColor(Position, Color),
    #[error("move {0} is not legal")]
    IllegalMove(Move),
    #[error("cannot promote the piece at {0} into a {1:?}")]
    IllegalPromotion(Position, PieceKind),
}

/// Where a game stands for the side to move
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameStatus {
    Ongoing,
    Check,
    Checkmate,
    Stalemate,
}

/// What happened when a move was applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppliedMove {
    pub piece: Piece,
    pub captured: Option<Piece>,
    /// The rook's relocation, if this was a castle
    pub castle_rook: Option<Move>,
    /// The moved pawn reached its terminal rank and must be promoted before play continues
    pub awaits_promotion: bool,
}

/// Both colors' rules
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RulesEngine {
    white: Rules,
    black: Rules,
}

impl RulesEngine {
    /// The rules at the start of a game
    pub fn new() -> Self {
        Self {
            white: Rules::new(Color::White),
            black: Rules::new(Color::Black),
        }
    }

    /// Rules with the given castling rights, for positions set up mid-game
    pub fn with_castling(white: CastleRights, black: CastleRights) -> Self {
        Self {
            white: Rules::with_castling(Color::White, white),
            black: Rules::with_castling(Color::Black, black),
        }
    }

    pub fn rules(&self, color: Color) -> &Rules {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    fn rules_mut(&mut self, color: Color) -> &mut Rules {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    /// The destinations a piece of the given color and kind standing on `position` could move to
    ///
    /// The square itself is not consulted, so this also answers hypotheticals.
    pub fn possible_plays(
        &self,
        color: Color,
        kind: PieceKind,
        position: Position,
        board: &Board,
    ) -> Result<BTreeSet<Position>> {
        self.reachable(color, kind, position, board, Mode::Play)
    }

    /// The destinations of whatever piece stands on `position`
    pub fn plays_from(&self, position: Position, board: &Board) -> Result<BTreeSet<Position>> {
        let piece = board.get(position)?.ok_or(Error::NoPiece(position))?;
        self.possible_plays(piece.color, piece.kind, position, board)
    }

    fn reachable(
        &self,
        color: Color,
        kind: PieceKind,
        position: Position,
        board: &Board,
        mode: Mode,
    ) -> Result<BTreeSet<Position>> {
        let position = position.checked()?;
        let mut destinations = BTreeSet::new();
        for movement in self.rules(color).movements(kind) {
            movement.destinations(color, position, board, mode, self, &mut destinations)?;
        }
        Ok(destinations)
    }

    /// Every legal move for the given color, in board order
    pub fn legal_moves(&self, color: Color, board: &Board) -> Result<Vec<Move>> {
        let mut moves = Vec::new();
        for (from, piece) in board.pieces().filter(|(_, piece)| piece.color == color) {
            for to in self.possible_plays(color, piece.kind, from, board)? {
                moves.push(Move::new(from, to));
            }
        }
        Ok(moves)
    }

    /// Whether `color` may make the given move
    pub fn is_legal(&self, color: Color, mv: Move, board: &Board) -> Result<bool> {
        let Some(piece) = board.get(mv.from)? else {
            return Ok(false);
        };
        mv.to.checked()?;
        Ok(piece.color == color
            && self
                .possible_plays(color, piece.kind, mv.from, board)?
                .contains(&mv.to))
    }

    /// Make a legal move for `color`, updating the board and both colors' castling rights
    ///
    /// On error nothing is changed.
    pub fn apply_move(&mut self, color: Color, mv: Move, board: &mut Board) -> Result<AppliedMove> {
        let piece = board.get(mv.from)?.ok_or(Error::NoPiece(mv.from))?;
        if piece.color != color {
            return Err(Error::WrongColor(mv.from, color));
        }
        if !self
            .possible_plays(color, piece.kind, mv.from, board)?
            .contains(&mv.to)
        {
            return Err(Error::IllegalMove(mv));
        }

        board.set(mv.from, None)?;
        let captured = board.set(mv.to, Some(piece))?;
        let castle_rook = if piece.kind == PieceKind::King
            && (mv.to.column() - mv.from.column()).abs() == 2
        {
            let side = if mv.to.column() > mv.from.column() {
                CastleRights::KingSide
            } else {
                CastleRights::QueenSide
            };
            let rook_from = self.rules(color).rook_home(side);
            let rook_to = Position::new((mv.from.column() + mv.to.column()) / 2, mv.from.row());
            let rook = board.set(rook_from, None)?;
            board.set(rook_to, rook)?;
            Some(Move::new(rook_from, rook_to))
        } else {
            None
        };

        self.rules_mut(color).touch(mv.from);
        self.rules_mut(color.other()).touch(mv.to);

        let awaits_promotion =
            piece.kind == PieceKind::Pawn && mv.to.row() == color.promotion_row();
        log::debug!("{color} played {mv} ({piece:?})");
        Ok(AppliedMove {
            piece,
            captured,
            castle_rook,
            awaits_promotion,
        })
    }

    /// Replace a pawn on its terminal rank with a piece of the chosen kind
    pub fn promote(
        &self,
        color: Color,
        position: Position,
        kind: PieceKind,
        board: &mut Board,
    ) -> Result<()> {
        let pawn = Piece::new(PieceKind::Pawn, color);
        if board.get(position)? != Some(pawn)
            || position.row() != color.promotion_row()
            || !kind.is_promotable()
        {
            return Err(Error::IllegalPromotion(position, kind));
        }
        board.set(position, Some(Piece::new(kind, color)))?;
        Ok(())
    }

    /// Whether the king of the given color is currently attacked
    ///
    /// A board without that king is never in check.
    pub fn is_check(&self, color: Color, board: &Board) -> Result<bool> {
        match board.king(color) {
            Some(king) => Ok(!self.safe_board(color, board)?.is_safe(king)?),
            None => Ok(false),
        }
    }

    /// Combine "any legal move" with "king attacked"
    pub fn status(&self, color: Color, board: &Board) -> Result<GameStatus> {
        let check = self.is_check(color, board)?;
        let mut can_move = false;
        for (from, piece) in board.pieces().filter(|(_, piece)| piece.color == color) {
            if !self
                .possible_plays(color, piece.kind, from, board)?
                .is_empty()
            {
                can_move = true;
                break;
            }
        }
        Ok(match (check, can_move) {
            (false, true) => GameStatus::Ongoing,
            (true, true) => GameStatus::Check,
            (true, false) => GameStatus::Checkmate,
            (false, false) => GameStatus::Stalemate,
        })
    }
}

impl Threats for RulesEngine {
    /// Simulate every opposing piece's movements with the recursion guard set
    fn safe_board(&self, color: Color, board: &Board) -> Result<SafeBoard> {
        let mut attacked = Bitboard::empty();
        for (position, piece) in board.pieces().filter(|(_, piece)| piece.color != color) {
            for square in self.reachable(piece.color, piece.kind, position, board, Mode::Threat)? {
                attacked |= Bitboard::from_position(square)?;
            }
        }
        Ok(SafeBoard::from_attacked(attacked))
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new()
    }
}
