use crate::core::{Attribution, Choice, ConstraintResult, Error};
use std::fmt::Debug;

pub const ILLEGAL_ACTION: Error = Error::new_const("A violation already exists; can't apply further actions.");
pub const UNDO_MISMATCH: Error = Error::new_const("Undo value mismatch");

/// Constraints generally can't refuse an action (the engine has already
/// committed to it), so an action that breaks a rule is latched here instead.
/// The latch reports as a contradiction until the offending action is undone,
/// at which point the constraint is as it was.
#[derive(Debug, Clone)]
pub struct IllegalMove<X: Copy + PartialEq + Debug, V: Choice> {
    action: Option<(X, V, Attribution)>,
}

impl <X: Copy + PartialEq + Debug, V: Choice> IllegalMove<X, V> {
    pub fn new() -> Self { Self { action: None } }

    pub fn set(&mut self, slot: X, value: V, attr: Attribution) {
        self.action = Some((slot, value, attr));
    }

    pub fn check_unset(&self) -> Result<(), Error> {
        if self.action.is_some() {
            Err(ILLEGAL_ACTION)
        } else {
            Ok(())
        }
    }

    pub fn reset(&mut self) {
        self.action = None;
    }

    /// Returns true if the undone action was the latched one (and so has
    /// already been fully handled), false if the caller should undo it in
    /// its own state.
    pub fn undo(&mut self, slot: X, value: V) -> Result<bool, Error> {
        if let Some((x, v, _)) = self.action {
            if x == slot && v == value {
                self.action = None;
                Ok(true)
            } else {
                Err(UNDO_MISMATCH)
            }
        } else {
            Ok(false)
        }
    }

    pub fn to_contradiction(&self) -> Option<ConstraintResult<X, V>> {
        self.action.map(|(_, _, attr)| {
            ConstraintResult::Contradiction(attr)
        })
    }

    pub fn write_dbg(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some((x, v, a)) = &self.action {
            write!(f, "Illegal move: {:?}={} ({})\n", x, v, a.name())?;
        }
        Ok(())
    }

    pub fn debug_at(&self, slot: X) -> Option<String> {
        if let Some((x, v, a)) = &self.action {
            if *x == slot {
                return Some(format!("Illegal move: {:?}={} ({})", x, v, a.name()));
            }
        }
        None
    }
}
