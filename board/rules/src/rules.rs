//! Per-color rules: a data-driven movement table plus castling flags

use board::{Color, PieceKind, Position};

use crate::movement::{Condition, Movement, Occupant};

bitflags::bitflags! {
    /// Which castles are still available (the king and that rook haven't moved yet)
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CastleRights: u8 {
        const QueenSide = 0b0000_0001;
        const KingSide = 0b0000_0010;
    }
}

/// The rules for one color
///
/// The king's table only carries the castling movements whose flag is still set. Flags are only
/// ever cleared, and clearing one rebuilds the table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rules {
    color: Color,
    castling: CastleRights,
    table: [Vec<Movement>; 6],
}

impl Rules {
    /// The rules at the start of a game, with both castles available
    pub fn new(color: Color) -> Self {
        Self::with_castling(color, CastleRights::all())
    }

    pub fn with_castling(color: Color, castling: CastleRights) -> Self {
        Self {
            color,
            castling,
            table: movement_table(color, castling),
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn castling(&self) -> CastleRights {
        self.castling
    }

    /// The movements available to the given kind of piece
    pub fn movements(&self, kind: PieceKind) -> &[Movement] {
        &self.table[kind as usize]
    }

    /// The square the king starts on
    pub fn king_home(&self) -> Position {
        Position::new(4, self.color.home_row())
    }

    /// The square the rook for the given castle starts on
    pub fn rook_home(&self, side: CastleRights) -> Position {
        let column = if side == CastleRights::KingSide { 7 } else { 0 };
        Position::new(column, self.color.home_row())
    }

    /// Note that this color's piece left, or an enemy landed on, the given square
    ///
    /// Touching the king's or a rook's home square permanently clears the matching flags.
    pub(crate) fn touch(&mut self, square: Position) {
        let lost = if square == self.king_home() {
            CastleRights::all()
        } else if square == self.rook_home(CastleRights::KingSide) {
            CastleRights::KingSide
        } else if square == self.rook_home(CastleRights::QueenSide) {
            CastleRights::QueenSide
        } else {
            CastleRights::empty()
        };
        self.revoke(lost);
    }

    fn revoke(&mut self, lost: CastleRights) {
        let remaining = self.castling - lost;
        if remaining != self.castling {
            log::debug!("{} castling rights now {:?}", self.color, remaining);
            self.castling = remaining;
            self.table = movement_table(self.color, remaining);
        }
    }
}

const ORTHOGONAL: [Position; 4] = [
    Position::new(0, 1),
    Position::new(0, -1),
    Position::new(1, 0),
    Position::new(-1, 0),
];

const DIAGONAL: [Position; 4] = [
    Position::new(1, 1),
    Position::new(1, -1),
    Position::new(-1, 1),
    Position::new(-1, -1),
];

const KNIGHT: [Position; 8] = [
    Position::new(1, 2),
    Position::new(-1, 2),
    Position::new(1, -2),
    Position::new(-1, -2),
    Position::new(2, 1),
    Position::new(2, -1),
    Position::new(-2, 1),
    Position::new(-2, -1),
];

/// An ordinary move or capture that must not leave the king attacked
fn capturing(movement: Movement) -> Movement {
    movement
        .when(Condition::Destination(Occupant::NotFriend))
        .when(Condition::KingSafety { escorts: vec![] })
}

fn rays(directions: &[Position]) -> Vec<Movement> {
    directions
        .iter()
        .map(|&direction| capturing(Movement::ray(direction)))
        .collect()
}

fn pawn_movements(color: Color) -> Vec<Movement> {
    let ahead = Position::new(0, 1).oriented(color);
    vec![
        Movement::leap([ahead])
            .when(Condition::Destination(Occupant::Empty))
            .when(Condition::KingSafety { escorts: vec![] })
            .quiet(),
        Movement::leap([Position::new(0, 2).oriented(color)])
            .when(Condition::OriginRow(color.pawn_row()))
            .when(Condition::Relative {
                offset: ahead,
                occupant: Occupant::Empty,
            })
            .when(Condition::Destination(Occupant::Empty))
            .when(Condition::KingSafety { escorts: vec![] })
            .quiet(),
        Movement::leap([
            Position::new(1, 1).oriented(color),
            Position::new(-1, 1).oriented(color),
        ])
        .when(Condition::Destination(Occupant::Enemy))
        .when(Condition::KingSafety { escorts: vec![] }),
    ]
}

/// The king's two-square step towards a rook, with everything between them empty and no square
/// the king stands on or crosses attacked
fn castle(color: Color, side: CastleRights) -> Movement {
    let direction = if side == CastleRights::KingSide { 1 } else { -1 };
    let rook_distance = if side == CastleRights::KingSide { 3 } else { 4 };
    let mut movement = Movement::leap([Position::new(2 * direction, 0)])
        .when(Condition::OriginRow(color.home_row()))
        .when(Condition::OriginColumn(4));
    for distance in 1..rook_distance {
        movement = movement.when(Condition::Relative {
            offset: Position::new(distance * direction, 0),
            occupant: Occupant::Empty,
        });
    }
    movement
        .when(Condition::Relative {
            offset: Position::new(rook_distance * direction, 0),
            occupant: Occupant::Friend(PieceKind::Rook),
        })
        .when(Condition::KingSafety {
            escorts: vec![Position::ORIGIN, Position::new(direction, 0)],
        })
        .quiet()
}

fn king_movements(color: Color, castling: CastleRights) -> Vec<Movement> {
    let mut movements = vec![capturing(Movement::leap(
        ORTHOGONAL.into_iter().chain(DIAGONAL),
    ))];
    for side in [CastleRights::KingSide, CastleRights::QueenSide] {
        if castling.contains(side) {
            movements.push(castle(color, side));
        }
    }
    movements
}

/// Indexed by `PieceKind as usize`
fn movement_table(color: Color, castling: CastleRights) -> [Vec<Movement>; 6] {
    [
        pawn_movements(color),
        rays(&ORTHOGONAL),
        vec![capturing(Movement::leap(KNIGHT))],
        rays(&DIAGONAL),
        rays(&[ORTHOGONAL, DIAGONAL].concat()),
        king_movements(color, castling),
    ]
}
