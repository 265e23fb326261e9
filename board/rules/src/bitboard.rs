use core::{
    fmt,
    ops::{BitOr, BitOrAssign},
};

use board::Position;

use crate::Result;

/// One bit per square, bit `row * 8 + column`
///
/// a1 is the lowest bit and h8 the highest.
#[repr(transparent)]
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bitboard(pub u64);

impl Bitboard {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The bitboard selecting only `position`
    ///
    /// ```
    /// use board::Position;
    /// use rules::Bitboard;
    /// assert_eq!(Bitboard::from_position(Position::new(1, 0)).unwrap(), Bitboard(0x02));
    /// assert!(Bitboard::from_position(Position::new(0, 8)).is_err());
    /// ```
    pub fn from_position(position: Position) -> Result<Self> {
        Ok(Self(1 << position.index()?))
    }

    pub fn contains_position(self, position: Position) -> Result<bool> {
        Ok(self.0 & Self::from_position(position)?.0 != 0)
    }

    /// Selected squares, a1 first, rank by rank
    pub fn positions(self) -> impl Iterator<Item = Position> {
        (0..64i8)
            .filter(move |&index| self.0 & (1 << index) != 0)
            .map(|index| Position::new(index % 8, index / 8))
    }

    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Bitboard {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
impl BitOrAssign for Bitboard {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitboard({:#018x})", self.0)
    }
}

/// The squares of a board that are not attacked by the opposing color
///
/// Derived from a board on demand and never mutated afterwards.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct SafeBoard {
    attacked: Bitboard,
}
impl SafeBoard {
    pub(crate) const fn from_attacked(attacked: Bitboard) -> Self {
        Self { attacked }
    }

    /// Whether no opposing piece attacks `position`
    pub fn is_safe(self, position: Position) -> Result<bool> {
        Ok(!self.attacked.contains_position(position)?)
    }

    pub const fn attacked(self) -> Bitboard {
        self.attacked
    }
}
impl fmt::Debug for SafeBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeBoard")
            .field("attacked", &self.attacked)
            .finish()
    }
}
/// Rank 8 on top, `x` for attacked squares and `.` for safe ones
///
/// ```
/// use board::{Board, Color};
/// use rules::{RulesEngine, Threats};
///
/// let board = Board::from_fen("8/8/8/8/8/8/8/R7").unwrap();
/// let safe = RulesEngine::new().safe_board(Color::Black, &board).unwrap();
/// assert!(safe.to_string().ends_with("x.......\n.xxxxxxx\n"));
/// ```
impl fmt::Display for SafeBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write;
        for row in (0..8).rev() {
            for column in 0..8 {
                let attacked = self.attacked.0 & (1 << (row * 8 + column)) != 0;
                f.write_char(if attacked { 'x' } else { '.' })?;
            }
            f.write_char('\n')?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quickcheck::{quickcheck, Arbitrary, Gen};

    impl Arbitrary for Bitboard {
        fn arbitrary(g: &mut Gen) -> Self {
            Self(u64::arbitrary(g))
        }
    }

    quickcheck! {
        fn test_positions_rebuild_the_bitboard(bitboard: Bitboard) -> bool {
            let mut rebuilt = Bitboard::empty();
            for position in bitboard.positions() {
                rebuilt |= Bitboard::from_position(position).unwrap();
            }
            rebuilt == bitboard && bitboard.positions().count() == bitboard.len() as usize
        }
    }

    #[test]
    fn test_safe_board_reads_bits() {
        let attacked = Bitboard::from_position(Position::new(4, 3)).unwrap();
        let safe = SafeBoard::from_attacked(attacked);
        assert!(!safe.is_safe(Position::new(4, 3)).unwrap());
        assert!(safe.is_safe(Position::new(3, 4)).unwrap());
        assert!(safe.is_safe(Position::new(9, 0)).is_err());
        assert_eq!(safe.attacked().len(), 1);
    }
}
