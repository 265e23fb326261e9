//! The board model shared by every peer: squares, pieces, and the 8×8 grid they sit on
//!
//! Coordinates are `(column, row)` pairs. Column 0 is the `a` file and row 0 is the first rank
//! (white's back rank), so white pawns move towards larger rows and black pawns towards smaller
//! ones. The grid is stored row-major, `squares[row][column]`.

use core::{
    fmt,
    ops::{Add, Sub},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "quickcheck"))]
mod arbitrary;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("coordinate {0:?} is outside the board")]
    InvalidCoordinate(Position),
    #[error("board position string was invalid")]
    InvalidSquareName,
    #[error("move string was invalid")]
    InvalidMove,
    #[error("invalid FEN piece placement: {0}")]
    InvalidFen(String),
}

/// The types of pieces there are
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PieceKind {
    Pawn,
    Rook,
    Knight,
    Bishop,
    Queen,
    King,
}
impl PieceKind {
    /// All the kinds of pieces there are
    pub const KINDS: [PieceKind; 6] = [
        Self::Pawn,
        Self::Rook,
        Self::Knight,
        Self::Bishop,
        Self::Queen,
        Self::King,
    ];

    /// The kinds a pawn may promote into
    pub const PROMOTIONS: [PieceKind; 4] = [Self::Queen, Self::Rook, Self::Bishop, Self::Knight];

    /// The capitalized version of the letter used for this piece in FEN
    pub const fn fen_letter(self) -> char {
        match self {
            Self::Pawn => 'P',
            Self::Rook => 'R',
            Self::Knight => 'N',
            Self::Bishop => 'B',
            Self::Queen => 'Q',
            Self::King => 'K',
        }
    }

    /// Whether a pawn can promote into this kind of piece
    pub const fn is_promotable(self) -> bool {
        match self {
            PieceKind::Pawn | PieceKind::King => false,
            PieceKind::Rook | PieceKind::Queen | PieceKind::Knight | PieceKind::Bishop => true,
        }
    }
}

/// The colors a piece can have
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Color {
    White,
    Black,
}
impl Color {
    pub const BOTH: [Color; 2] = [Color::White, Color::Black];

    pub const fn other(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// The row direction this color's pawns advance in
    pub const fn forward(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    /// The row the king and rooks of this color start on
    pub const fn home_row(self) -> i8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }

    /// The row the pawns of this color start on
    pub const fn pawn_row(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => 6,
        }
    }

    /// The terminal rank, on which this color's pawns promote
    pub const fn promotion_row(self) -> i8 {
        self.other().home_row()
    }
}
impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Color::White => "white",
            Color::Black => "black",
        })
    }
}

/// A piece
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
}
impl Piece {
    pub const fn new(kind: PieceKind, color: Color) -> Self {
        Self { kind, color }
    }

    pub const fn fen_letter(self) -> char {
        match self.color {
            Color::White => self.kind.fen_letter().to_ascii_uppercase(),
            Color::Black => self.kind.fen_letter().to_ascii_lowercase(),
        }
    }

    /// Parse the FEN letter for a piece, with the case giving the color
    pub const fn from_fen_letter(letter: char) -> Option<Self> {
        let kind = match letter.to_ascii_uppercase() {
            'P' => PieceKind::Pawn,
            'R' => PieceKind::Rook,
            'N' => PieceKind::Knight,
            'B' => PieceKind::Bishop,
            'Q' => PieceKind::Queen,
            'K' => PieceKind::King,
            _ => return None,
        };
        let color = if letter.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Some(Self { kind, color })
    }
}

/// A coordinate pair on (or, as an intermediate value, off) the board
///
/// This is an immutable value; adding or subtracting produces a new one. Offsets used by the
/// movement engine are themselves positions relative to the origin.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    column: i8,
    row: i8,
}
impl Position {
    /// The zero offset
    pub const ORIGIN: Self = Self::new(0, 0);

    pub const fn new(column: i8, row: i8) -> Self {
        Self { column, row }
    }

    pub const fn column(self) -> i8 {
        self.column
    }

    pub const fn row(self) -> i8 {
        self.row
    }

    /// Returns if this position lies within the 8×8 board
    ///
    /// ```
    /// use board::Position;
    /// assert!(Position::new(7, 0).is_on_board());
    /// assert!(!Position::new(8, 0).is_on_board());
    /// assert!(!Position::new(0, -1).is_on_board());
    /// ```
    pub const fn is_on_board(self) -> bool {
        0 <= self.column && self.column < 8 && 0 <= self.row && self.row < 8
    }

    /// Fails with [`Error::InvalidCoordinate`] when off the board
    pub fn checked(self) -> Result<Self> {
        if self.is_on_board() {
            Ok(self)
        } else {
            Err(Error::InvalidCoordinate(self))
        }
    }

    /// The index of this square in a row-major 64 square layout (a1 = 0, h8 = 63)
    pub fn index(self) -> Result<usize> {
        let position = self.checked()?;
        Ok((position.row as usize) * 8 + position.column as usize)
    }

    /// The same offset as seen by the given color, so black tables can be written from white's
    /// point of view
    pub const fn oriented(self, color: Color) -> Self {
        Self::new(self.column, self.row * color.forward())
    }

    /// An iterator over all valid squares on the board
    ///
    /// ```
    /// assert_eq!(board::Position::all().count(), 64);
    /// ```
    pub fn all() -> impl Iterator<Item = Self> {
        (0..64).map(|idx| Self::new(idx % 8, idx / 8))
    }
}
impl Add for Position {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.column + rhs.column, self.row + rhs.row)
    }
}
impl Sub for Position {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.column - rhs.column, self.row - rhs.row)
    }
}
impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}
impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_on_board() {
            write!(f, "{}{}", (b'a' + self.column as u8) as char, self.row + 1)
        } else {
            write!(f, "{self:?}")
        }
    }
}
impl FromStr for Position {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let &[file, rank] = s.as_bytes() else {
            return Err(Error::InvalidSquareName);
        };
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return Err(Error::InvalidSquareName);
        }
        Ok(Self::new((file - b'a') as i8, (rank - b'1') as i8))
    }
}

/// A move from one square to another, in the style of long algebraic notation (`e2e4`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Position,
    pub to: Position,
}
impl Move {
    pub const fn new(from: Position, to: Position) -> Self {
        Self { from, to }
    }
}
impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)
    }
}
impl FromStr for Move {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 4 || !s.is_ascii() {
            return Err(Error::InvalidMove);
        }
        Ok(Self {
            from: s[..2].parse()?,
            to: s[2..].parse()?,
        })
    }
}

/// The 8×8 grid of piece markers
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Board {
    squares: [[Option<Piece>; 8]; 8],
}
impl Board {
    /// A board with no pieces on it
    pub const EMPTY: Self = Self {
        squares: [[None; 8]; 8],
    };

    /// The FEN piece placement at the start of a game
    pub const INITIAL_PLACEMENT: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";

    /// The board at the start of a chess game
    pub fn initial() -> Self {
        let mut board = Self::EMPTY;
        let back_rank = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        for color in Color::BOTH {
            for (column, kind) in back_rank.into_iter().enumerate() {
                board.squares[color.home_row() as usize][column] = Some(Piece::new(kind, color));
                board.squares[color.pawn_row() as usize][column] =
                    Some(Piece::new(PieceKind::Pawn, color));
            }
        }
        board
    }

    /// The piece at the given square, if any
    pub fn get(&self, position: Position) -> Result<Option<Piece>> {
        let position = position.checked()?;
        Ok(self.squares[position.row as usize][position.column as usize])
    }

    /// Put a piece (or nothing) on the given square, returning what was there
    ///
    /// Outside of setting up a position, only the rules engine's apply-move step should call this.
    pub fn set(&mut self, position: Position, piece: Option<Piece>) -> Result<Option<Piece>> {
        let position = position.checked()?;
        Ok(core::mem::replace(
            &mut self.squares[position.row as usize][position.column as usize],
            piece,
        ))
    }

    /// Builder-style [`Self::set`] for test and setup code
    pub fn with(mut self, position: Position, piece: Piece) -> Result<Self> {
        self.set(position, Some(piece))?;
        Ok(self)
    }

    /// Every occupied square, from a1 row by row to h8
    pub fn pieces(&self) -> impl Iterator<Item = (Position, Piece)> + '_ {
        Position::all().filter_map(|position| {
            self.squares[position.row as usize][position.column as usize]
                .map(|piece| (position, piece))
        })
    }

    /// Where the king of the given color stands
    pub fn king(&self, color: Color) -> Option<Position> {
        self.pieces()
            .find(|(_, piece)| *piece == Piece::new(PieceKind::King, color))
            .map(|(position, _)| position)
    }

    /// Parse the piece placement field of a FEN string
    ///
    /// Only the first space-separated field is read, so full FEN strings are accepted too.
    pub fn from_fen(fen: &str) -> Result<Self> {
        let placement = fen.split(' ').next().unwrap_or_default();
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(Error::InvalidFen(format!("expected 8 ranks, got {}", ranks.len())));
        }
        let mut board = Self::EMPTY;
        for (rank_idx, rank) in ranks.into_iter().enumerate() {
            let row = 7 - rank_idx;
            let mut column = 0;
            for c in rank.chars() {
                if let Some(skip) = c.to_digit(10) {
                    column += skip as usize;
                    continue;
                }
                let piece = Piece::from_fen_letter(c)
                    .ok_or_else(|| Error::InvalidFen(format!("unknown piece letter `{c}`")))?;
                if column >= 8 {
                    return Err(Error::InvalidFen(format!("rank `{rank}` is too long")));
                }
                board.squares[row][column] = Some(piece);
                column += 1;
            }
            if column != 8 {
                return Err(Error::InvalidFen(format!("rank `{rank}` doesn't cover 8 files")));
            }
        }
        Ok(board)
    }

    /// The FEN piece placement field for this board
    pub fn to_fen(&self) -> String {
        let mut fen = String::with_capacity(64);
        for row in (0..8).rev() {
            let mut empty = 0;
            for column in 0..8 {
                match self.squares[row][column] {
                    Some(piece) => {
                        if empty > 0 {
                            fen.push(char::from_digit(empty, 10).unwrap_or('8'));
                            empty = 0;
                        }
                        fen.push(piece.fen_letter());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push(char::from_digit(empty, 10).unwrap_or('8'));
            }
            if row > 0 {
                fen.push('/');
            }
        }
        fen
    }
}
impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}
impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Board").field(&self.to_fen()).finish()
    }
}
/// Draws the board with rank 8 on top, `.` for empty squares
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (0..8).rev() {
            for column in 0..8 {
                let c = self.squares[row][column].map_or('.', Piece::fen_letter);
                write!(f, "{c}")?;
            }
            writeln!(f, " {}", row + 1)?;
        }
        f.write_str("abcdefgh")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quickcheck::quickcheck;

    quickcheck! {
        fn test_square_name_round_trip(position: Position) -> bool {
            position == position.to_string().parse().unwrap()
        }

        fn test_fen_round_trip(board: Board) -> bool {
            board == Board::from_fen(&board.to_fen()).unwrap()
        }

        fn test_add_then_sub_is_identity(a: Position, b: Position) -> bool {
            a + b - b == a
        }
    }

    #[test]
    fn test_initial_board_matches_fen() {
        assert_eq!(
            Board::initial(),
            Board::from_fen(Board::INITIAL_PLACEMENT).unwrap()
        );
        assert_eq!(Board::initial().to_fen(), Board::INITIAL_PLACEMENT);
    }

    #[test]
    fn test_row_and_column_convention() {
        let board = Board::initial();
        let e1: Position = "e1".parse().unwrap();
        assert_eq!(e1, Position::new(4, 0));
        assert_eq!(
            board.get(e1).unwrap(),
            Some(Piece::new(PieceKind::King, Color::White))
        );
        assert_eq!(board.king(Color::Black), Some(Position::new(4, 7)));
    }

    #[test]
    fn test_off_board_access_is_an_error() {
        let mut board = Board::EMPTY;
        let off = Position::new(3, 8);
        assert_eq!(board.get(off), Err(Error::InvalidCoordinate(off)));
        assert_eq!(
            board.set(off, Some(Piece::new(PieceKind::Pawn, Color::White))),
            Err(Error::InvalidCoordinate(off))
        );
        assert_eq!(board, Board::EMPTY);
    }

    #[test]
    fn test_move_notation() {
        let mv: Move = "e2e4".parse().unwrap();
        assert_eq!(mv, Move::new(Position::new(4, 1), Position::new(4, 3)));
        assert_eq!(mv.to_string(), "e2e4");
        assert!("e2e9".parse::<Move>().is_err());
        assert!("e2".parse::<Move>().is_err());
    }

    #[test]
    fn test_bad_fen_is_rejected() {
        assert!(Board::from_fen("8/8/8").is_err());
        assert!(Board::from_fen("9/8/8/8/8/8/8/8").is_err());
        assert!(Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNX").is_err());
    }
}
