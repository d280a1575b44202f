//! Move-attribute flag set (spec §4.B).

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct FlagBits: u16 {
        const NORMAL         = 1 << 0;
        const CAPTURE        = 1 << 1;
        const EN_PASSANT     = 1 << 2;
        const DOUBLE_ADVANCE = 1 << 3;
        const PROMOTION      = 1 << 4;
        const KSIDE_CASTLE   = 1 << 5;
        const QSIDE_CASTLE   = 1 << 6;
        const CHECK          = 1 << 7;
        const CHECKMATE      = 1 << 8;
        const MOVE_BLOCKED   = 1 << 9;
        const MOVE_ILLEGAL   = 1 << 10;
        const PINNED         = 1 << 11;
    }
}

/// One attribute a [`Move`](crate::mv::Move) can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Normal,
    Capture,
    EnPassant,
    DoubleAdvance,
    Promotion,
    KsideCastle,
    QsideCastle,
    Check,
    Checkmate,
    MoveBlocked,
    MoveIllegal,
    Pinned,
}

impl Flag {
    const fn bits(self) -> FlagBits {
        match self {
            Flag::Normal => FlagBits::NORMAL,
            Flag::Capture => FlagBits::CAPTURE,
            Flag::EnPassant => FlagBits::EN_PASSANT,
            Flag::DoubleAdvance => FlagBits::DOUBLE_ADVANCE,
            Flag::Promotion => FlagBits::PROMOTION,
            Flag::KsideCastle => FlagBits::KSIDE_CASTLE,
            Flag::QsideCastle => FlagBits::QSIDE_CASTLE,
            Flag::Check => FlagBits::CHECK,
            Flag::Checkmate => FlagBits::CHECKMATE,
            Flag::MoveBlocked => FlagBits::MOVE_BLOCKED,
            Flag::MoveIllegal => FlagBits::MOVE_ILLEGAL,
            Flag::Pinned => FlagBits::PINNED,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagError {
    #[error("flag {0:?} is not present")]
    NotPresent(Flag),
}

/// An unordered set of [`Flag`]s attached to a move. Multiple flags may
/// coexist (e.g. a blocked castle is both `KsideCastle` and `MoveBlocked`).
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(FlagBits);

impl Flags {
    pub fn new() -> Self {
        Self(FlagBits::empty())
    }

    pub fn add(&mut self, flag: Flag) {
        self.0 |= flag.bits();
    }

    /// Removes `flag`. If it isn't present and `silent` is false, this is an
    /// error (logged and returned); with `silent` it is a no-op.
    pub fn remove(&mut self, flag: Flag, silent: bool) -> Result<(), FlagError> {
        if !self.contains(flag) {
            if silent {
                return Ok(());
            }
            crate::logging::warn_precondition(format!("attempted to remove absent flag {flag:?}"));
            return Err(FlagError::NotPresent(flag));
        }
        self.0 &= !flag.bits();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.0 = FlagBits::empty();
    }

    pub fn contains(&self, flag: Flag) -> bool {
        self.0.contains(flag.bits())
    }

    pub fn copy(&self) -> Self {
        *self
    }

    /// Removes `old` (honouring `silent` as in [`Self::remove`]) then adds
    /// `new`.
    pub fn replace(&mut self, old: Flag, new: Flag, silent: bool) -> Result<(), FlagError> {
        self.remove(old, silent)?;
        self.add(new);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.bits().count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let present: Vec<_> = [
            Flag::Normal,
            Flag::Capture,
            Flag::EnPassant,
            Flag::DoubleAdvance,
            Flag::Promotion,
            Flag::KsideCastle,
            Flag::QsideCastle,
            Flag::Check,
            Flag::Checkmate,
            Flag::MoveBlocked,
            Flag::MoveIllegal,
            Flag::Pinned,
        ]
        .into_iter()
        .filter(|&fl| self.contains(fl))
        .collect();
        f.debug_list().entries(present).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_and_contains() {
        let mut flags = Flags::new();
        assert!(!flags.contains(Flag::Capture));
        flags.add(Flag::Capture);
        assert!(flags.contains(Flag::Capture));
        assert_eq!(flags.len(), 1);
    }

    #[test]
    fn multiple_flags_coexist() {
        let mut flags = Flags::new();
        flags.add(Flag::KsideCastle);
        flags.add(Flag::MoveBlocked);
        assert!(flags.contains(Flag::KsideCastle));
        assert!(flags.contains(Flag::MoveBlocked));
        assert_eq!(flags.len(), 2);
    }

    #[test]
    fn remove_absent_errors_unless_silent() {
        let mut flags = Flags::new();
        assert_eq!(
            flags.remove(Flag::Check, false),
            Err(FlagError::NotPresent(Flag::Check))
        );
        assert_eq!(flags.remove(Flag::Check, true), Ok(()));
    }

    #[test]
    fn replace() {
        let mut flags = Flags::new();
        flags.add(Flag::Normal);
        flags.replace(Flag::Normal, Flag::Capture, false).unwrap();
        assert!(!flags.contains(Flag::Normal));
        assert!(flags.contains(Flag::Capture));
    }

    #[test]
    fn clear_and_copy() {
        let mut flags = Flags::new();
        flags.add(Flag::Check);
        flags.add(Flag::Checkmate);
        let copy = flags.copy();
        flags.clear();
        assert!(flags.is_empty());
        assert!(copy.contains(Flag::Check));
        assert!(copy.contains(Flag::Checkmate));
    }
}
