//! Thin wrapper over the [`log`] facade: the "logging sink" collaborator
//! from spec §6. A failed precondition (bad FEN, undo past the start of
//! history, removing an absent flag) logs here and returns the documented
//! sentinel (`false`/`None`/unchanged state) rather than panicking.

/// Logs a board/move precondition failure at `warn` level.
pub(crate) fn warn_precondition(detail: impl std::fmt::Display) {
    log::warn!("{detail}");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn does_not_panic() {
        warn_precondition("example precondition failure");
    }
}
