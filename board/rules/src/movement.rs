//! Composable movement predicates
//!
//! A [`Movement`] is an ordered list of offsets guarded by [`Condition`]s. A step from the old
//! position to `old + offset` is legal iff every condition holds for `(old, new, board)`.

use board::{Board, Color, PieceKind, Position};

use crate::{Result, SafeBoard};

/// What a square must hold, as seen by the moving color
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Occupant {
    Empty,
    Enemy,
    /// Empty, or an enemy piece that would be captured
    NotFriend,
    /// A friendly piece of the given kind
    Friend(PieceKind),
}
impl Occupant {
    fn matches(self, color: Color, board: &Board, square: Position) -> Result<bool> {
        let piece = board.get(square)?;
        Ok(match (self, piece) {
            (Occupant::Empty, None) => true,
            (Occupant::Enemy, Some(piece)) => piece.color != color,
            (Occupant::NotFriend, None) => true,
            (Occupant::NotFriend, Some(piece)) => piece.color != color,
            (Occupant::Friend(kind), Some(piece)) => piece.color == color && piece.kind == kind,
            _ => false,
        })
    }
}

/// A guard over `(old position, new position, board)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// The square at `offset` from the old position holds `occupant`
    ///
    /// An offset landing off the board never holds.
    Relative { offset: Position, occupant: Occupant },
    /// The new position holds `occupant`
    Destination(Occupant),
    /// The old position lies on the given row
    OriginRow(i8),
    /// The old position lies on the given column
    OriginColumn(i8),
    /// The mover's king is not attacked once the step is made, and each escort square (an offset
    /// from the old position) is not attacked before it
    KingSafety { escorts: Vec<Position> },
}

/// How conditions are evaluated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Producing steps a player may actually make
    Play,
    /// Mapping the squares a piece threatens while building a safe board
    ///
    /// This is the recursion guard: king safety holds trivially, and destination requirements are
    /// waived since a square is threatened whatever stands on it. Movements that never capture are
    /// skipped entirely.
    Threat,
}

/// Whatever can compute safe boards for king-safety conditions
pub trait Threats {
    /// The squares not attacked by the opponents of `color`
    fn safe_board(&self, color: Color, board: &Board) -> Result<SafeBoard>;
}

impl Condition {
    pub fn holds(
        &self,
        color: Color,
        old: Position,
        new: Position,
        board: &Board,
        mode: Mode,
        threats: &impl Threats,
    ) -> Result<bool> {
        match self {
            Condition::Relative { offset, occupant } => {
                let square = old + *offset;
                if !square.is_on_board() {
                    return Ok(false);
                }
                occupant.matches(color, board, square)
            }
            Condition::Destination(occupant) => match mode {
                Mode::Play => occupant.matches(color, board, new),
                Mode::Threat => Ok(true),
            },
            Condition::OriginRow(row) => Ok(old.row() == *row),
            Condition::OriginColumn(column) => Ok(old.column() == *column),
            Condition::KingSafety { escorts } => match mode {
                Mode::Threat => Ok(true),
                Mode::Play => king_safe_after(color, old, new, escorts, board, threats),
            },
        }
    }
}

fn king_safe_after(
    color: Color,
    old: Position,
    new: Position,
    escorts: &[Position],
    board: &Board,
    threats: &impl Threats,
) -> Result<bool> {
    if !escorts.is_empty() {
        let current = threats.safe_board(color, board)?;
        for escort in escorts {
            let square = old + *escort;
            if !square.is_on_board() || !current.is_safe(square)? {
                return Ok(false);
            }
        }
    }
    let mut after = board.clone();
    let piece = after.set(old, None)?;
    after.set(new, piece)?;
    // Boards set up without a king have nothing to protect
    let Some(king) = after.king(color) else {
        return Ok(true);
    };
    threats.safe_board(color, &after)?.is_safe(king)
}

/// An ordered set of offsets sharing the same guard conditions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Movement {
    offsets: Vec<Position>,
    conditions: Vec<Condition>,
    /// The offsets form a ray: stop after the first occupied square
    slides: bool,
    /// Whether this movement attacks its destination (pawn pushes and castling don't)
    threatens: bool,
}
impl Movement {
    /// Independent steps to each offset, like a knight's
    pub fn leap(offsets: impl IntoIterator<Item = Position>) -> Self {
        Self {
            offsets: offsets.into_iter().collect(),
            conditions: Vec::new(),
            slides: false,
            threatens: true,
        }
    }

    /// A ray of up to 7 squares in the given direction, blocked by the first occupied square
    pub fn ray(direction: Position) -> Self {
        let offsets = (1..8)
            .map(|distance| Position::new(direction.column() * distance, direction.row() * distance))
            .collect();
        Self {
            offsets,
            conditions: Vec::new(),
            slides: true,
            threatens: true,
        }
    }

    /// Add a guard condition
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Mark this movement as one that never captures
    pub fn quiet(mut self) -> Self {
        self.threatens = false;
        self
    }

    pub fn offsets(&self) -> &[Position] {
        &self.offsets
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Push every destination this movement reaches from `old` into `sink`
    pub fn destinations(
        &self,
        color: Color,
        old: Position,
        board: &Board,
        mode: Mode,
        threats: &impl Threats,
        sink: &mut impl Extend<Position>,
    ) -> Result<()> {
        if mode == Mode::Threat && !self.threatens {
            return Ok(());
        }
        for offset in &self.offsets {
            let new = old + *offset;
            if !new.is_on_board() {
                if self.slides {
                    break;
                }
                continue;
            }
            let mut legal = true;
            for condition in &self.conditions {
                if !condition.holds(color, old, new, board, mode, threats)? {
                    legal = false;
                    break;
                }
            }
            if legal {
                sink.extend(Some(new));
            }
            if self.slides && board.get(new)?.is_some() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use board::Piece;

    use crate::Bitboard;

    /// Every square is safe, so king safety always holds
    struct NoThreats;
    impl Threats for NoThreats {
        fn safe_board(&self, _: Color, _: &Board) -> Result<SafeBoard> {
            Ok(SafeBoard::from_attacked(Bitboard::empty()))
        }
    }

    fn reach(movement: &Movement, old: Position, board: &Board, mode: Mode) -> Vec<Position> {
        let mut out = Vec::new();
        movement
            .destinations(Color::White, old, board, mode, &NoThreats, &mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_ray_stops_at_first_blocker() {
        let board = Board::EMPTY
            .with(Position::new(0, 3), Piece::new(PieceKind::Pawn, Color::Black))
            .unwrap();
        let up = Movement::ray(Position::new(0, 1)).when(Condition::Destination(Occupant::NotFriend));
        assert_eq!(
            reach(&up, Position::new(0, 0), &board, Mode::Play),
            vec![Position::new(0, 1), Position::new(0, 2), Position::new(0, 3)],
        );
    }

    #[test]
    fn test_ray_excludes_friendly_blocker() {
        let board = Board::EMPTY
            .with(Position::new(0, 2), Piece::new(PieceKind::Pawn, Color::White))
            .unwrap();
        let up = Movement::ray(Position::new(0, 1)).when(Condition::Destination(Occupant::NotFriend));
        assert_eq!(
            reach(&up, Position::new(0, 0), &board, Mode::Play),
            vec![Position::new(0, 1)],
        );
        // A defended piece still counts as threatened
        assert_eq!(
            reach(&up, Position::new(0, 0), &board, Mode::Threat),
            vec![Position::new(0, 1), Position::new(0, 2)],
        );
    }

    #[test]
    fn test_quiet_movements_never_threaten() {
        let push = Movement::leap([Position::new(0, 1)])
            .when(Condition::Destination(Occupant::Empty))
            .quiet();
        assert_eq!(
            reach(&push, Position::new(4, 1), &Board::EMPTY, Mode::Play),
            vec![Position::new(4, 2)],
        );
        assert!(reach(&push, Position::new(4, 1), &Board::EMPTY, Mode::Threat).is_empty());
    }

    #[test]
    fn test_relative_and_origin_conditions() {
        let double = Movement::leap([Position::new(0, 2)])
            .when(Condition::OriginRow(1))
            .when(Condition::Relative {
                offset: Position::new(0, 1),
                occupant: Occupant::Empty,
            });
        assert_eq!(
            reach(&double, Position::new(4, 1), &Board::EMPTY, Mode::Play),
            vec![Position::new(4, 3)],
        );
        assert!(reach(&double, Position::new(4, 2), &Board::EMPTY, Mode::Play).is_empty());
        let blocked = Board::EMPTY
            .with(Position::new(4, 2), Piece::new(PieceKind::Knight, Color::Black))
            .unwrap();
        assert!(reach(&double, Position::new(4, 1), &blocked, Mode::Play).is_empty());
    }

    #[test]
    fn test_off_board_offsets_are_skipped() {
        let knight = Movement::leap([Position::new(1, 2), Position::new(-1, 2), Position::new(-2, -1)]);
        assert_eq!(
            reach(&knight, Position::new(0, 0), &Board::EMPTY, Mode::Play),
            vec![Position::new(1, 2)],
        );
    }
}
