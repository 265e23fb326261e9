//! Turn sequencing
//!
//! Play alternates between move turns and, after a pawn reaches its terminal rank, a choice turn
//! for its promotion. Turns live in an arena and refer to each other by [`TurnId`], so a choice
//! turn's successor is an index rather than an owned turn.
//!
//! Registering against a turn that is not the active, pending one is always an error: replayed or
//! duplicated network messages must never resolve a turn twice.

use core::fmt;

use board::{Color, Move, PieceKind, Position};
use serde::{Deserialize, Serialize};

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("illegal turn state for turn {turn}: {violation}")]
    IllegalTurnState { turn: TurnId, violation: Violation },
    #[error("turn {turn} is a {category:?} turn")]
    WrongCategory { turn: TurnId, category: TurnCategory },
    #[error("{color} may not act on turn {turn}")]
    WrongColor { turn: TurnId, color: Color },
    #[error("{color} must submit a move on turn {turn}")]
    MissingMove { turn: TurnId, color: Color },
    #[error("{color} may not move on turn {turn}")]
    UnexpectedMove { turn: TurnId, color: Color },
    #[error("{0:?} is not a promotion choice")]
    InvalidChoice(PieceKind),
}

/// The ways a registration can violate the turn protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Violation {
    AlreadyResolved,
    AlreadySubmitted(Color),
}
impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::AlreadyResolved => f.write_str("already resolved"),
            Violation::AlreadySubmitted(color) => write!(f, "{color} already submitted"),
        }
    }
}

/// Index of a turn in the arena; turn `n` is the `n`th turn of the game, counting from zero
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TurnId(pub usize);
impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnCategory {
    Move,
    Choice,
}

/// The specific kind of a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnKind {
    /// `color` moves a piece
    Move { color: Color },
    /// `color` picks what its pawn on `position` becomes
    Promotion { color: Color, position: Position },
}
impl TurnKind {
    pub const fn category(self) -> TurnCategory {
        match self {
            TurnKind::Move { .. } => TurnCategory::Move,
            TurnKind::Promotion { .. } => TurnCategory::Choice,
        }
    }

    /// The color whose turn this is
    pub const fn color(self) -> Color {
        match self {
            TurnKind::Move { color } | TurnKind::Promotion { color, .. } => color,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    Pending,
    Resolved,
}

/// One color's submission for a turn
///
/// This is also what the chain orders: each block carries exactly one action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TurnAction {
    /// The color to move submits its move; under split control the other color submits `None`
    Move { color: Color, mv: Option<Move> },
    /// The promoting color picks a piece
    Choice { color: Color, choice: PieceKind },
}
impl TurnAction {
    pub const fn color(self) -> Color {
        match self {
            TurnAction::Move { color, .. } | TurnAction::Choice { color, .. } => color,
        }
    }

    pub const fn category(self) -> TurnCategory {
        match self {
            TurnAction::Move { .. } => TurnCategory::Move,
            TurnAction::Choice { .. } => TurnCategory::Choice,
        }
    }
}
impl fmt::Display for TurnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnAction::Move { color, mv: Some(mv) } => write!(f, "{color} {mv}"),
            TurnAction::Move { color, mv: None } => write!(f, "{color} acknowledges"),
            TurnAction::Choice { color, choice } => write!(f, "{color} promotes to {choice:?}"),
        }
    }
}

/// Who submits on a move turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authority {
    /// One authority plays both colors; the mover's submission completes the turn
    Single,
    /// Each color submits independently; the turn completes once both have
    Split,
}
impl Authority {
    const fn required(self) -> usize {
        match self {
            Authority::Single => 1,
            Authority::Split => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    id: TurnId,
    kind: TurnKind,
    state: TurnState,
    required: usize,
    actions: Vec<TurnAction>,
    next: Option<TurnId>,
}
impl Turn {
    fn new(id: TurnId, kind: TurnKind, required: usize) -> Self {
        Self {
            id,
            kind,
            state: TurnState::Pending,
            required,
            actions: Vec::with_capacity(required),
            next: None,
        }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn kind(&self) -> TurnKind {
        self.kind
    }

    pub fn category(&self) -> TurnCategory {
        self.kind.category()
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == TurnState::Pending
    }

    /// The submissions registered so far, in arrival order
    pub fn actions(&self) -> &[TurnAction] {
        &self.actions
    }

    /// For a choice turn, the turn that becomes active once it resolves
    pub fn next(&self) -> Option<TurnId> {
        self.next
    }

    /// Whether `color` still owes a submission on this turn
    pub fn awaits(&self, color: Color) -> bool {
        let involved = match self.kind {
            TurnKind::Move { .. } => self.required == 2 || color == self.kind.color(),
            TurnKind::Promotion { .. } => color == self.kind.color(),
        };
        self.is_pending() && involved && !self.actions.iter().any(|a| a.color() == color)
    }

    /// The move made on this turn, once submitted
    pub fn submitted_move(&self) -> Option<Move> {
        self.actions.iter().find_map(|action| match action {
            TurnAction::Move { mv, .. } => *mv,
            TurnAction::Choice { .. } => None,
        })
    }

    /// The piece picked on this turn, once submitted
    pub fn submitted_choice(&self) -> Option<PieceKind> {
        self.actions.iter().find_map(|action| match action {
            TurnAction::Choice { choice, .. } => Some(*choice),
            TurnAction::Move { .. } => None,
        })
    }

    fn check_pending(&self, color: Color) -> Result<()> {
        let violation = if !self.is_pending() {
            Violation::AlreadyResolved
        } else if self.actions.iter().any(|a| a.color() == color) {
            Violation::AlreadySubmitted(color)
        } else {
            return Ok(());
        };
        Err(Error::IllegalTurnState {
            turn: self.id,
            violation,
        })
    }

    fn push(&mut self, action: TurnAction) -> Progress {
        self.actions.push(action);
        if self.actions.len() >= self.required {
            self.state = TurnState::Resolved;
            Progress::Resolved(self.id)
        } else {
            Progress::Waiting(self.id)
        }
    }
}

/// The outcome of a successful registration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// The turn still awaits submissions
    Waiting(TurnId),
    /// The turn is complete and its action must now be applied
    Resolved(TurnId),
}

/// Every turn of one game
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnArena {
    turns: Vec<Turn>,
    active: TurnId,
    /// The turn resolved most recently
    last_resolved: Option<TurnId>,
    authority: Authority,
}

impl TurnArena {
    /// A fresh game: white's first move turn is active
    pub fn new(authority: Authority) -> Self {
        Self {
            turns: vec![Turn::new(
                TurnId(0),
                TurnKind::Move {
                    color: Color::White,
                },
                authority.required(),
            )],
            active: TurnId(0),
            last_resolved: None,
            authority,
        }
    }

    pub fn authority(&self) -> Authority {
        self.authority
    }

    /// The turn that currently accepts registrations
    pub fn current(&self) -> &Turn {
        &self.turns[self.active.0]
    }

    pub fn get(&self, id: TurnId) -> Option<&Turn> {
        self.turns.get(id.0)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Register a move (or, for the color not moving under split control, `None`)
    pub fn register_move(&mut self, mv: Option<Move>, color: Color) -> Result<Progress> {
        if let Err(err) = self.check_move(mv, color) {
            return Err(self.replayed(color, TurnCategory::Move, err));
        }
        let progress = self.push_action(TurnAction::Move { color, mv });
        log::trace!("registered move {mv:?} for {color}: {progress:?}");
        Ok(progress)
    }

    /// Register the piece a pawn promotes into; resolving the choice activates its successor
    pub fn register_choice(&mut self, choice: PieceKind, color: Color) -> Result<Progress> {
        if let Err(err) = self.check_choice(choice, color) {
            return Err(self.replayed(color, TurnCategory::Choice, err));
        }
        let progress = self.push_action(TurnAction::Choice { color, choice });
        if let Some(next) = self.current().next {
            self.active = next;
        }
        Ok(progress)
    }

    fn check_move(&self, mv: Option<Move>, color: Color) -> Result<()> {
        let turn = self.current();
        turn.check_pending(color)?;
        let TurnKind::Move { color: mover } = turn.kind else {
            return Err(Error::WrongCategory {
                turn: turn.id,
                category: turn.category(),
            });
        };
        match (mv, color == mover) {
            (Some(_), true) => Ok(()),
            (None, true) => Err(Error::MissingMove { turn: turn.id, color }),
            (Some(_), false) => Err(Error::UnexpectedMove { turn: turn.id, color }),
            (None, false) if self.authority == Authority::Split => Ok(()),
            (None, false) => Err(Error::WrongColor { turn: turn.id, color }),
        }
    }

    fn check_choice(&self, choice: PieceKind, color: Color) -> Result<()> {
        let turn = self.current();
        turn.check_pending(color)?;
        if turn.category() != TurnCategory::Choice {
            return Err(Error::WrongCategory {
                turn: turn.id,
                category: turn.category(),
            });
        }
        if color != turn.kind.color() {
            return Err(Error::WrongColor { turn: turn.id, color });
        }
        if !choice.is_promotable() {
            return Err(Error::InvalidChoice(choice));
        }
        Ok(())
    }

    /// A registration the active turn refuses is a replay when `color` already submitted this
    /// category of action on the turn that resolved just before it
    fn replayed(&self, color: Color, category: TurnCategory, err: Error) -> Error {
        if matches!(err, Error::IllegalTurnState { .. } | Error::InvalidChoice(_)) {
            return err;
        }
        let Some(last) = self.last_resolved.filter(|last| *last != self.active) else {
            return err;
        };
        let submitted = self.turns[last.0]
            .actions
            .iter()
            .any(|action| action.color() == color && action.category() == category);
        if submitted {
            Error::IllegalTurnState {
                turn: last,
                violation: Violation::AlreadyResolved,
            }
        } else {
            err
        }
    }

    fn push_action(&mut self, action: TurnAction) -> Progress {
        let progress = self.turns[self.active.0].push(action);
        if let Progress::Resolved(id) = progress {
            self.last_resolved = Some(id);
        }
        progress
    }

    /// Register whichever kind of action this is
    pub fn register(&mut self, action: TurnAction) -> Result<Progress> {
        match action {
            TurnAction::Move { color, mv } => self.register_move(mv, color),
            TurnAction::Choice { color, choice } => self.register_choice(choice, color),
        }
    }

    /// After a resolved move turn, open the next move turn for `color`
    pub fn begin_move(&mut self, color: Color) -> TurnId {
        let id = self.push(TurnKind::Move { color });
        self.active = id;
        id
    }

    /// After a move that promotes, open a choice turn whose successor is `color`'s move turn
    ///
    /// The successor exists from now on but only becomes active once the choice resolves.
    pub fn begin_promotion(&mut self, promoting: Color, position: Position, then: Color) -> TurnId {
        let choice = self.push(TurnKind::Promotion {
            color: promoting,
            position,
        });
        let successor = self.push(TurnKind::Move { color: then });
        self.turns[choice.0].next = Some(successor);
        self.active = choice;
        choice
    }

    fn push(&mut self, kind: TurnKind) -> TurnId {
        let id = TurnId(self.turns.len());
        let required = match kind.category() {
            TurnCategory::Move => self.authority.required(),
            TurnCategory::Choice => 1,
        };
        self.turns.push(Turn::new(id, kind, required));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quickcheck::quickcheck;

    fn mv(notation: &str) -> Move {
        notation.parse().unwrap()
    }

    fn a8() -> Position {
        "a8".parse().unwrap()
    }

    quickcheck! {
        fn test_resolved_turn_rejects_everything(action: Option<Move>, color: Color, choice: PieceKind) -> bool {
            let mut arena = TurnArena::new(Authority::Single);
            arena.register_move(Some(mv("e2e4")), Color::White).unwrap();
            let before = arena.clone();
            let move_err = arena.register_move(action, color);
            let choice_err = arena.register_choice(choice, color);
            matches!(move_err, Err(Error::IllegalTurnState { violation: Violation::AlreadyResolved, .. }))
                && matches!(choice_err, Err(Error::IllegalTurnState { violation: Violation::AlreadyResolved, .. }))
                && arena == before
        }
    }

    #[test]
    fn test_single_authority_resolves_on_first_move() {
        let mut arena = TurnArena::new(Authority::Single);
        assert_eq!(
            arena.register_move(Some(mv("e2e4")), Color::White),
            Ok(Progress::Resolved(TurnId(0)))
        );
        assert_eq!(arena.current().submitted_move(), Some(mv("e2e4")));
        assert_eq!(arena.begin_move(Color::Black), TurnId(1));
        assert_eq!(arena.current().kind(), TurnKind::Move { color: Color::Black });
    }

    #[test]
    fn test_single_authority_rejects_acknowledgements() {
        let mut arena = TurnArena::new(Authority::Single);
        assert_eq!(
            arena.register_move(None, Color::Black),
            Err(Error::WrongColor {
                turn: TurnId(0),
                color: Color::Black
            })
        );
        assert_eq!(
            arena.register_move(None, Color::White),
            Err(Error::MissingMove {
                turn: TurnId(0),
                color: Color::White
            })
        );
    }

    #[test]
    fn test_split_authority_waits_for_both_colors() {
        let mut arena = TurnArena::new(Authority::Split);
        assert!(arena.current().awaits(Color::Black));
        assert_eq!(
            arena.register_move(None, Color::Black),
            Ok(Progress::Waiting(TurnId(0)))
        );
        assert!(!arena.current().awaits(Color::Black));
        assert_eq!(
            arena.register_move(None, Color::Black),
            Err(Error::IllegalTurnState {
                turn: TurnId(0),
                violation: Violation::AlreadySubmitted(Color::Black)
            })
        );
        assert_eq!(
            arena.register_move(Some(mv("d2d4")), Color::Black),
            Err(Error::IllegalTurnState {
                turn: TurnId(0),
                violation: Violation::AlreadySubmitted(Color::Black)
            })
        );
        assert_eq!(
            arena.register_move(Some(mv("d2d4")), Color::White),
            Ok(Progress::Resolved(TurnId(0)))
        );
        assert_eq!(arena.current().submitted_move(), Some(mv("d2d4")));
    }

    #[test]
    fn test_choice_turn_activates_successor_once() {
        let mut arena = TurnArena::new(Authority::Single);
        arena.register_move(Some(mv("a7a8")), Color::White).unwrap();
        let choice = arena.begin_promotion(Color::White, a8(), Color::Black);
        let successor = arena.get(choice).unwrap().next().unwrap();
        assert_eq!(arena.current().id(), choice);
        assert!(arena.get(successor).unwrap().is_pending());

        // Moving is not allowed while the choice is pending
        assert!(matches!(
            arena.register_move(Some(mv("e7e5")), Color::Black),
            Err(Error::WrongCategory { .. })
        ));
        assert_eq!(
            arena.register_choice(PieceKind::Queen, Color::Black),
            Err(Error::WrongColor {
                turn: choice,
                color: Color::Black
            })
        );
        assert_eq!(
            arena.register_choice(PieceKind::Pawn, Color::White),
            Err(Error::InvalidChoice(PieceKind::Pawn))
        );
        assert_eq!(arena.current().id(), choice);

        assert_eq!(
            arena.register_choice(PieceKind::Knight, Color::White),
            Ok(Progress::Resolved(choice))
        );
        assert_eq!(arena.current().id(), successor);
        assert_eq!(
            arena.get(choice).unwrap().submitted_choice(),
            Some(PieceKind::Knight)
        );

        // A replayed choice is refused as such, even though its successor is now active
        let before = arena.clone();
        assert_eq!(
            arena.register_choice(PieceKind::Knight, Color::White),
            Err(Error::IllegalTurnState {
                turn: choice,
                violation: Violation::AlreadyResolved
            })
        );
        assert_eq!(arena, before);
        assert_eq!(arena.get(choice).unwrap().actions().len(), 1);

        // Black never submitted a choice, so this is just the wrong kind of turn
        assert!(matches!(
            arena.register_choice(PieceKind::Knight, Color::Black),
            Err(Error::WrongCategory { .. })
        ));
    }

    #[test]
    fn test_replayed_move_after_next_turn_opens() {
        let mut arena = TurnArena::new(Authority::Single);
        arena.register_move(Some(mv("e2e4")), Color::White).unwrap();
        arena.begin_move(Color::Black);
        let before = arena.clone();
        assert_eq!(
            arena.register_move(Some(mv("e2e4")), Color::White),
            Err(Error::IllegalTurnState {
                turn: TurnId(0),
                violation: Violation::AlreadyResolved
            })
        );
        assert_eq!(arena, before);
        assert_eq!(
            arena.register_move(Some(mv("e7e5")), Color::Black),
            Ok(Progress::Resolved(TurnId(1)))
        );
    }

    #[test]
    fn test_replayed_acknowledgement_under_split_control() {
        let mut arena = TurnArena::new(Authority::Split);
        arena.register_move(None, Color::Black).unwrap();
        arena.register_move(Some(mv("e2e4")), Color::White).unwrap();
        arena.begin_move(Color::Black);
        // Black moves now, so a second `None` from black can only be the old acknowledgement
        assert_eq!(
            arena.register_move(None, Color::Black),
            Err(Error::IllegalTurnState {
                turn: TurnId(0),
                violation: Violation::AlreadyResolved
            })
        );
        assert_eq!(
            arena.register_move(None, Color::White),
            Ok(Progress::Waiting(TurnId(1)))
        );
    }

    #[test]
    fn test_turn_actions_serialize_with_kind_tag() {
        let action = TurnAction::Choice {
            color: Color::Black,
            choice: PieceKind::Rook,
        };
        assert_eq!(
            serde_json::to_value(action).unwrap(),
            serde_json::json!({"kind": "choice", "color": "black", "choice": "rook"})
        );
        let acknowledgement = TurnAction::Move {
            color: Color::White,
            mv: None,
        };
        assert_eq!(
            serde_json::to_value(acknowledgement).unwrap(),
            serde_json::json!({"kind": "move", "color": "white", "mv": null})
        );
        assert_eq!(action.to_string(), "black promotes to Rook");
    }
}
