use crate::constraint::Constraint;
use crate::core::{Choice, Space};

/// A selector finds the slot to branch on next. Since the values at a given
/// slot are a mutually exclusive and exhaustive set of guesses, the choice of
/// slot (not the choice of value) is where search-tree shape is decided.
/// Returning None signals that the space is complete.
pub trait Selector<V: Choice, S: Space<V>, C: Constraint<V, S>> {
    // Note: the selector must not suggest already filled slots.
    fn next_slot(&self, space: &S, constraint: &C) -> Option<S::Slot>;
}

/// Branch on the leftmost open slot. Always correct, and the only sensible
/// policy for cursor-shaped spaces where one slot is open at a time.
#[derive(Debug, Clone, Copy)]
pub struct FirstOpen;

impl <V: Choice, S: Space<V>, C: Constraint<V, S>> Selector<V, S, C> for FirstOpen {
    fn next_slot(&self, space: &S, _: &C) -> Option<S::Slot> {
        space.open_slots().into_iter().next()
    }
}

/// Branch on the open slot with the fewest remaining candidates, ties broken
/// by first-found. Counting costs a candidate enumeration per open slot, but
/// the reduced branching factor pays for it many times over on grids that
/// plain left-to-right order would grind on.
#[derive(Debug, Clone, Copy)]
pub struct MinRemaining;

impl <V: Choice, S: Space<V>, C: Constraint<V, S>> Selector<V, S, C> for MinRemaining {
    fn next_slot(&self, space: &S, constraint: &C) -> Option<S::Slot> {
        let mut best: Option<(S::Slot, usize)> = None;
        for slot in space.open_slots() {
            let count = constraint.candidates(space, slot).len();
            match best {
                Some((_, best_count)) if best_count <= count => {},
                _ => { best = Some((slot, count)); },
            }
            if count == 0 {
                // Nothing beats a slot we can immediately fail on.
                break;
            }
        }
        best.map(|(slot, _)| slot)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::test_util::{LineSpace, LineVal};
    use crate::core::{ConstraintResult, Stateful, Value};

    type FiveCells = LineSpace<5>;

    /// Each slot i admits digits 1..=i+1; slot 0 is forced.
    #[derive(Debug)]
    struct Staircase;
    impl Stateful<usize, LineVal> for Staircase {}
    impl Constraint<LineVal, FiveCells> for Staircase {
        fn check(&self, _: &FiveCells) -> ConstraintResult<usize, LineVal> {
            ConstraintResult::Ok
        }
        fn allows(&self, _: &FiveCells, slot: usize, value: LineVal) -> bool {
            (value.0 as usize) <= slot + 1
        }
        fn candidates(&self, space: &FiveCells, slot: usize) -> Vec<LineVal> {
            LineVal::possibilities().into_iter()
                .filter(|v| self.allows(space, slot, *v))
                .collect()
        }
    }

    #[test]
    fn test_first_open_goes_left_to_right() {
        let mut space = FiveCells::new();
        let constraint = Staircase;
        assert_eq!(Selector::next_slot(&FirstOpen, &space, &constraint), Some(0));
        space.apply(0, LineVal(1)).unwrap();
        space.apply(1, LineVal(2)).unwrap();
        assert_eq!(Selector::next_slot(&FirstOpen, &space, &constraint), Some(2));
    }

    #[test]
    fn test_min_remaining_picks_narrowest() {
        let mut space = FiveCells::new();
        let constraint = Staircase;
        // Slot 0 has 1 candidate, the fewest.
        assert_eq!(Selector::next_slot(&MinRemaining, &space, &constraint), Some(0));
        space.apply(0, LineVal(1)).unwrap();
        // Now slot 1 (2 candidates) beats slots 2-4.
        assert_eq!(Selector::next_slot(&MinRemaining, &space, &constraint), Some(1));
    }

    #[test]
    fn test_selectors_report_complete() {
        let mut space = FiveCells::new();
        let constraint = Staircase;
        for i in 0..5 {
            space.apply(i, LineVal(1)).unwrap();
        }
        assert_eq!(Selector::next_slot(&FirstOpen, &space, &constraint), None);
        assert_eq!(Selector::next_slot(&MinRemaining, &space, &constraint), None);
    }
}
