//! Random board-model values for property tests

use quickcheck::{Arbitrary, Gen};

use crate::{Board, Color, Move, Piece, PieceKind, Position};

impl Arbitrary for Color {
    fn arbitrary(g: &mut Gen) -> Self {
        *g.choose(&Color::BOTH).unwrap_or(&Color::White)
    }
}

impl Arbitrary for PieceKind {
    fn arbitrary(g: &mut Gen) -> Self {
        *g.choose(&PieceKind::KINDS).unwrap_or(&PieceKind::Pawn)
    }
}

impl Arbitrary for Piece {
    fn arbitrary(g: &mut Gen) -> Self {
        Self::new(PieceKind::arbitrary(g), Color::arbitrary(g))
    }
}

/// Only ever produces squares on the board
impl Arbitrary for Position {
    fn arbitrary(g: &mut Gen) -> Self {
        Self::new((u8::arbitrary(g) % 8) as i8, (u8::arbitrary(g) % 8) as i8)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let (column, row) = (self.column(), self.row());
        Box::new(
            (0..column)
                .map(move |c| Position::new(c, row))
                .chain((0..row).map(move |r| Position::new(column, r))),
        )
    }
}

impl Arbitrary for Move {
    fn arbitrary(g: &mut Gen) -> Self {
        Self::new(Position::arbitrary(g), Position::arbitrary(g))
    }
}

/// A sparse random position with exactly one king per color
///
/// Pawns never land on either back rank, so every generated board could arise in play.
impl Arbitrary for Board {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut board = Board::EMPTY;
        let mut free: Vec<Position> = Position::all().collect();
        let take = |g: &mut Gen, free: &mut Vec<Position>, pawn: bool| loop {
            let idx = usize::arbitrary(g) % free.len();
            let position = free[idx];
            if !pawn || (1..7).contains(&position.row()) {
                return free.swap_remove(idx);
            }
        };
        for color in Color::BOTH {
            let square = take(g, &mut free, false);
            let _ = board.set(square, Some(Piece::new(PieceKind::King, color)));
        }
        let extra = usize::arbitrary(g) % 12;
        for _ in 0..extra {
            let piece = Piece::arbitrary(g);
            if piece.kind == PieceKind::King {
                continue;
            }
            let square = take(g, &mut free, piece.kind == PieceKind::Pawn);
            let _ = board.set(square, Some(piece));
        }
        board
    }
}
