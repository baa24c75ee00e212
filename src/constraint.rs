use std::{fmt::Debug, marker::PhantomData};
use crate::core::{Choice, ConstraintResult, Error, Space, Stateful};

/// Constraints check that the current state of the space is valid and
/// enumerate the values that remain legal at a slot. The ideal Constraint
/// will:
/// - Keep its internal bookkeeping updated by implementing Stateful so that
///   both `check` and `candidates` stay cheap.
/// - Return early from `check` when it hits a Contradiction or a Certainty.
/// - Answer `allows` in O(1) without side effects.
/// - Be able to provide a useful explanation (for debugging purposes) for
///   any contradictions.
///
/// It's acceptable to implement a constraint that only ever returns
/// Contradiction (if found) or Ok from `check` and leaves `candidates` to a
/// primary constraint it is conjoined with. It just makes the engine's work
/// more difficult.
pub trait Constraint<V: Choice, S: Space<V>> where Self: Stateful<S::Slot, V> + Debug {
    /// Check that the Constraint is satisfied by the space (and any internal
    /// state from past actions).
    fn check(&self, space: &S) -> ConstraintResult<S::Slot, V>;
    /// Membership test: may `value` go into `slot` right now? Side-effect
    /// free, and cheap enough to call in a loop.
    fn allows(&self, space: &S, slot: S::Slot, value: V) -> bool;
    /// The ordered legal values at `slot`, re-derived from current state on
    /// every call. The order determines which solution is found first and
    /// the enumeration order of all solutions.
    fn candidates(&self, space: &S, slot: S::Slot) -> Vec<V>;
    /// Provide debug information at a particular slot (if any is available).
    fn debug_at(&self, space: &S, slot: S::Slot) -> Option<String> {
        let _ = space;
        let _ = slot;
        None
    }
}

/// Conjunction of two constraints. The first operand is the primary one: it
/// produces the candidate ordering, which the second merely filters.
pub struct ConstraintConjunction<V, S, X, Y>
where
    V: Choice, S: Space<V>, X: Constraint<V, S>, Y: Constraint<V, S>
{
    pub x: X,
    pub y: Y,
    pub _marker: PhantomData<(V, S)>,
}

impl <V, S, X, Y> ConstraintConjunction<V, S, X, Y>
where
    V: Choice, S: Space<V>, X: Constraint<V, S>, Y: Constraint<V, S>
{
    pub fn new(x: X, y: Y) -> Self {
        ConstraintConjunction { x, y, _marker: PhantomData }
    }
}

impl <V, S, X, Y> Debug for ConstraintConjunction<V, S, X, Y>
where
    V: Choice, S: Space<V>, X: Constraint<V, S>, Y: Constraint<V, S>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.x, self.y)
    }
}

impl <V, S, X, Y> Stateful<S::Slot, V> for ConstraintConjunction<V, S, X, Y>
where
    V: Choice, S: Space<V>, X: Constraint<V, S>, Y: Constraint<V, S>
{
    fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }

    fn apply(&mut self, slot: S::Slot, value: V) -> Result<(), Error> {
        let xres = self.x.apply(slot, value);
        let yres = self.y.apply(slot, value);
        if xres.is_err() { xres } else { yres }
    }

    fn undo(&mut self, slot: S::Slot, value: V) -> Result<(), Error> {
        let xres = self.x.undo(slot, value);
        let yres = self.y.undo(slot, value);
        if xres.is_err() { xres } else { yres }
    }
}

impl <V, S, X, Y> Constraint<V, S> for ConstraintConjunction<V, S, X, Y>
where
    V: Choice, S: Space<V>, X: Constraint<V, S>, Y: Constraint<V, S>
{
    fn check(&self, space: &S) -> ConstraintResult<S::Slot, V> {
        match self.x.check(space) {
            ConstraintResult::Contradiction(a) => ConstraintResult::Contradiction(a),
            ConstraintResult::Certainty(d, a) => ConstraintResult::Certainty(d, a),
            ConstraintResult::Ok => self.y.check(space),
        }
    }

    fn allows(&self, space: &S, slot: S::Slot, value: V) -> bool {
        self.x.allows(space, slot, value) && self.y.allows(space, slot, value)
    }

    fn candidates(&self, space: &S, slot: S::Slot) -> Vec<V> {
        self.x.candidates(space, slot).into_iter()
            .filter(|v| self.y.allows(space, slot, *v))
            .collect()
    }

    fn debug_at(&self, space: &S, slot: S::Slot) -> Option<String> {
        let xd = self.x.debug_at(space, slot);
        let yd = self.y.debug_at(space, slot);
        if let Some(xds) = &xd {
            if let Some(yds) = yd {
                Some(xds.clone() + "\n" + &yds)
            } else {
                xd
            }
        } else {
            yd
        }
    }
}

/// Arbitrarily many constraints behind one interface. As with the
/// conjunction, the first constraint is the primary one for candidate
/// ordering.
pub struct MultiConstraint<V: Choice, S: Space<V>> {
    constraints: Vec<Box<dyn Constraint<V, S>>>,
}

impl <V: Choice, S: Space<V>> MultiConstraint<V, S> {
    pub fn new(constraints: Vec<Box<dyn Constraint<V, S>>>) -> Self {
        MultiConstraint { constraints }
    }
}

impl <V: Choice, S: Space<V>> Debug for MultiConstraint<V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for c in &self.constraints {
            write!(f, "{:?}", c)?
        }
        Ok(())
    }
}

impl <V: Choice, S: Space<V>> Stateful<S::Slot, V> for MultiConstraint<V, S> {
    fn reset(&mut self) {
        for c in &mut self.constraints {
            c.reset();
        }
    }

    fn apply(&mut self, slot: S::Slot, value: V) -> Result<(), Error> {
        let mut res = Ok(());
        for c in &mut self.constraints {
            let maybe_err = c.apply(slot, value);
            if maybe_err.is_err() {
                res = maybe_err;
            }
        }
        res
    }

    fn undo(&mut self, slot: S::Slot, value: V) -> Result<(), Error> {
        let mut res = Ok(());
        for c in &mut self.constraints {
            let maybe_err = c.undo(slot, value);
            if maybe_err.is_err() {
                res = maybe_err;
            }
        }
        res
    }
}

impl <V: Choice, S: Space<V>> Constraint<V, S> for MultiConstraint<V, S> {
    fn check(&self, space: &S) -> ConstraintResult<S::Slot, V> {
        for c in &self.constraints {
            match c.check(space) {
                ConstraintResult::Contradiction(a) => return ConstraintResult::Contradiction(a),
                ConstraintResult::Certainty(d, a) => return ConstraintResult::Certainty(d, a),
                ConstraintResult::Ok => {},
            }
        }
        ConstraintResult::Ok
    }

    fn allows(&self, space: &S, slot: S::Slot, value: V) -> bool {
        self.constraints.iter().all(|c| c.allows(space, slot, value))
    }

    fn candidates(&self, space: &S, slot: S::Slot) -> Vec<V> {
        let Some((first, rest)) = self.constraints.split_first() else {
            return vec![];
        };
        first.candidates(space, slot).into_iter()
            .filter(|v| rest.iter().all(|c| c.allows(space, slot, *v)))
            .collect()
    }

    fn debug_at(&self, space: &S, slot: S::Slot) -> Option<String> {
        let somes = self.constraints.iter()
            .filter_map(|c| c.debug_at(space, slot))
            .collect::<Vec<String>>();
        if somes.is_empty() {
            None
        } else {
            Some(somes.join("\n"))
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;
    use crate::core::Choice;

    pub fn assert_contradiction<X: Copy + Debug, V: Choice>(
        cr: ConstraintResult<X, V>,
        expected_attribution: &'static str,
    ) {
        if let ConstraintResult::Contradiction(a) = cr {
            let actual_attribution = a.name();
            assert_eq!(
                actual_attribution, expected_attribution,
                "Expected Contradiction to be attributed to {}; got {}",
                expected_attribution, actual_attribution,
            );
        } else {
            panic!("Expected a contradiction; got: {:?}", cr);
        }
    }

    pub fn assert_no_contradiction<X: Copy + Debug, V: Choice>(
        cr: ConstraintResult<X, V>,
    ) {
        if let ConstraintResult::Contradiction(a) = cr {
            panic!("Expected no contradiction; got: {}", a.name());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use super::test_util::*;
    use crate::core::test_util::{LineSpace, LineVal};
    use crate::core::{Attribution, Value};

    type ThreeCells = LineSpace<3>;

    /// Supplies digits 1-9 at any open slot; the base enumeration the other
    /// test constraints filter.
    #[derive(Debug, Clone)]
    pub struct AnyDigit;
    impl Stateful<usize, LineVal> for AnyDigit {}
    impl Constraint<LineVal, ThreeCells> for AnyDigit {
        fn check(&self, _: &ThreeCells) -> ConstraintResult<usize, LineVal> {
            ConstraintResult::Ok
        }
        fn allows(&self, _: &ThreeCells, _: usize, _: LineVal) -> bool { true }
        fn candidates(&self, _: &ThreeCells, _: usize) -> Vec<LineVal> {
            LineVal::possibilities()
        }
    }

    #[derive(Debug, Clone)]
    pub struct BlacklistedVal(pub u8);
    impl Stateful<usize, LineVal> for BlacklistedVal {}
    impl Constraint<LineVal, ThreeCells> for BlacklistedVal {
        fn check(&self, space: &ThreeCells) -> ConstraintResult<usize, LineVal> {
            for i in 0..3 {
                if space.get(i) == Some(LineVal(self.0)) {
                    return ConstraintResult::Contradiction(Attribution::new("BLACKLISTED").unwrap());
                }
            }
            ConstraintResult::Ok
        }
        fn allows(&self, _: &ThreeCells, _: usize, value: LineVal) -> bool {
            value.0 != self.0
        }
        fn candidates(&self, space: &ThreeCells, slot: usize) -> Vec<LineVal> {
            LineVal::possibilities().into_iter()
                .filter(|v| self.allows(space, slot, *v))
                .collect()
        }
    }

    #[derive(Debug, Clone)]
    pub struct Mod(pub u8, pub u8);
    impl Stateful<usize, LineVal> for Mod {}
    impl Constraint<LineVal, ThreeCells> for Mod {
        fn check(&self, space: &ThreeCells) -> ConstraintResult<usize, LineVal> {
            for i in 0..3 {
                if let Some(v) = space.get(i) {
                    if v.0 % self.0 != self.1 {
                        return ConstraintResult::Contradiction(Attribution::new("WRONG_MOD").unwrap());
                    }
                }
            }
            ConstraintResult::Ok
        }
        fn allows(&self, _: &ThreeCells, _: usize, value: LineVal) -> bool {
            value.0 % self.0 == self.1
        }
        fn candidates(&self, space: &ThreeCells, slot: usize) -> Vec<LineVal> {
            LineVal::possibilities().into_iter()
                .filter(|v| self.allows(space, slot, *v))
                .collect()
        }
    }

    #[test]
    fn test_constraint_conjunction_simple() {
        let mut space = ThreeCells::new();
        let conjunction = ConstraintConjunction::new(BlacklistedVal(1), BlacklistedVal(2));
        assert_eq!(conjunction.check(&space), ConstraintResult::Ok);
        space.apply(0, LineVal(1)).unwrap();
        assert_contradiction(conjunction.check(&space), "BLACKLISTED");
        space.undo(0, LineVal(1)).unwrap();
        space.apply(0, LineVal(3)).unwrap();
        assert_eq!(conjunction.check(&space), ConstraintResult::Ok);
        space.apply(1, LineVal(2)).unwrap();
        assert_contradiction(conjunction.check(&space), "BLACKLISTED");
    }

    #[test]
    fn test_multi_constraint_simple() {
        let mut space = ThreeCells::new();
        let constraint = MultiConstraint::new(vec_box::vec_box![
            AnyDigit, BlacklistedVal(1), BlacklistedVal(2),
        ]);
        assert_eq!(constraint.check(&space), ConstraintResult::Ok);
        space.apply(0, LineVal(1)).unwrap();
        assert_contradiction(constraint.check(&space), "BLACKLISTED");
        space.undo(0, LineVal(1)).unwrap();
        space.apply(0, LineVal(3)).unwrap();
        assert_no_contradiction(constraint.check(&space));
        space.apply(1, LineVal(2)).unwrap();
        assert_contradiction(constraint.check(&space), "BLACKLISTED");
    }

    fn to_u8s(vals: Vec<LineVal>) -> Vec<u8> {
        vals.iter().map(|v| v.0).collect()
    }

    #[test]
    fn test_constraint_conjunction_candidates() {
        let space = ThreeCells::new();
        let conjunction = ConstraintConjunction::new(Mod(2, 1), Mod(3, 0));
        assert_no_contradiction(conjunction.check(&space));
        assert_eq!(to_u8s(conjunction.candidates(&space, 0)), vec![3, 9]);
        assert!(conjunction.allows(&space, 0, LineVal(9)));
        assert!(!conjunction.allows(&space, 0, LineVal(6)));
    }

    #[test]
    fn test_multi_constraint_candidates() {
        let space = ThreeCells::new();
        let constraint = MultiConstraint::new(vec_box::vec_box![
            Mod(2, 1), Mod(3, 0)
        ]);
        assert_no_contradiction(constraint.check(&space));
        assert_eq!(to_u8s(constraint.candidates(&space, 0)), vec![3, 9]);
        assert_eq!(to_u8s(constraint.candidates(&space, 2)), vec![3, 9]);
    }
}
