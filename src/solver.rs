use std::fmt::Debug;
use crate::core::{Attribution, BranchPoint, Choice, ConstraintResult, Error, Space, Stateful};
use crate::constraint::Constraint;
use crate::selector::Selector;

#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub struct InitializingState {
    // The index into the vector of givens for the next given to replay.
    pub next_given: usize,
}

#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub struct AdvancingState {
    // The number of possibilities at the BranchPoint where this advance was
    // taken.
    pub possibilities: usize,
    // The step at which this advance was taken.
    pub step: usize,
}

#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub struct BacktrackingState {}

/// The state of the DFS engine. At any point in time, the engine is either
/// initializing (replaying givens), advancing (ready to take a new action),
/// backtracking (undoing actions), or finished: InitFailed (the givens
/// already conflict), Solved, Exhausted (search space used up with no
/// solution left), or Aborted (the step limit bound before the search could
/// finish -- NOT proof that no solution exists).
#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub enum SearchState {
    Initializing(InitializingState),
    Advancing(AdvancingState),
    Backtracking(BacktrackingState),
    InitFailed,
    Solved,
    Exhausted,
    Aborted,
}

// A view on the state and associated data for the engine.
pub trait SearchView<V, S, R, C>
where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
    fn step_count(&self) -> usize;
    fn search_state(&self) -> SearchState;
    fn is_initializing(&self) -> bool;
    fn is_done(&self) -> bool;
    fn is_valid(&self) -> bool;
    fn most_recent_action(&self) -> Option<(S::Slot, V)>;
    fn backtracked_steps(&self) -> Option<usize>;
    fn selector(&self) -> &R;
    fn constraint(&self) -> &C;
    fn check_result(&self) -> ConstraintResult<S::Slot, V>;
    fn space(&self) -> &S;
}

// Mostly for debugging purposes, a StepObserver allows the caller of various
// engine methods to dump or otherwise inspect the state of the search after
// each step. When debugging failing tests, it is much easier to inject a
// StepObserver than it is to invert control and fully instrument the whole
// solving process.
pub trait StepObserver<V, S, R, C>
where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
    fn after_step(&mut self, search: &dyn SearchView<V, S, R, C>);
}

/// Collects completed assignments in discovery order. In first-solution mode
/// nothing is collected (the mutated space is the result); in enumerate mode
/// this is the result.
#[derive(Debug, Clone)]
pub struct SolutionSink<T> {
    found: Vec<T>,
}

impl <T> SolutionSink<T> {
    pub fn new() -> Self { Self { found: Vec::new() } }
    pub fn record(&mut self, solution: T) { self.found.push(solution); }
    pub fn len(&self) -> usize { self.found.len() }
    pub fn is_empty(&self) -> bool { self.found.is_empty() }
    pub fn as_slice(&self) -> &[T] { self.found.as_slice() }
    pub fn into_vec(self) -> Vec<T> { self.found }
}

pub const MANUAL_ATTRIBUTION: &str = "MANUAL_STEP";
pub const NO_CANDIDATES_ATTRIBUTION: &str = "DFS_NO_CANDIDATES";
pub const BRANCH_ATTRIBUTION: &str = "DFS_BRANCH_SLOT";
pub const COMPLETE_ATTRIBUTION: &str = "DFS_COMPLETE";

const NOT_INITIALIZED: Error = Error::new_const("Must finish initializing before stepping forward");
const SEARCH_ALREADY_DONE: Error = Error::new_const("Search already done");
const NO_CHOICE: Error = Error::new_const("Decision point has no choice");

/// DFS engine. If you want a lower-level API that allows for more control
/// over the search process, you can directly use this. Most users should
/// prefer FindFirst or FindAll, which are higher-level APIs. However, if you
/// are implementing manual exploration or debugging, this API may be useful.
pub struct DfsSearch<'a, V, S, R, C>
where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
    step: usize,
    space: &'a mut S,
    selector: &'a R,
    constraint: &'a mut C,
    givens: Vec<(S::Slot, V)>,
    last_given: Option<(S::Slot, V)>,
    check_result: ConstraintResult<S::Slot, V>,
    next_decision: Option<BranchPoint<S::Slot, V>>,
    stack: Vec<BranchPoint<S::Slot, V>>,
    backtracked_steps: Option<usize>,
    step_limit: Option<usize>,
    manual_attr: Attribution,
    no_candidates_attr: Attribution,
    branch_attr: Attribution,
    complete_attr: Attribution,
    state: SearchState,
}

impl <'a, V, S, R, C> Debug
for DfsSearch<'a, V, S, R, C>
where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Space:\n{:?}\nConstraint:\n{:?}\n", self.space, self.constraint)
    }
}

impl <'a, V, S, R, C> SearchView<V, S, R, C>
for DfsSearch<'a, V, S, R, C>
where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
    fn step_count(&self) -> usize {
        self.step
    }

    fn search_state(&self) -> SearchState {
        self.state
    }

    fn is_initializing(&self) -> bool {
        matches!(self.state, SearchState::Initializing(_))
    }

    fn is_done(&self) -> bool {
        matches!(
            self.state,
            SearchState::InitFailed | SearchState::Solved
            | SearchState::Exhausted | SearchState::Aborted
        )
    }

    fn is_valid(&self) -> bool {
        !matches!(self.check_result, ConstraintResult::Contradiction(_))
    }

    fn most_recent_action(&self) -> Option<(S::Slot, V)> {
        if let Some(b) = self.stack.last() {
            b.chosen()
        } else {
            self.last_given
        }
    }

    fn backtracked_steps(&self) -> Option<usize> { self.backtracked_steps }

    fn selector(&self) -> &R {
        self.selector
    }

    fn constraint(&self) -> &C {
        self.constraint
    }

    fn check_result(&self) -> ConstraintResult<S::Slot, V> {
        self.check_result.clone()
    }

    fn space(&self) -> &S {
        self.space
    }
}

impl <'a, V, S, R, C> DfsSearch<'a, V, S, R, C>
where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
    pub fn new(
        space: &'a mut S,
        selector: &'a R,
        constraint: &'a mut C,
    ) -> Self {
        let givens = space.given_actions();
        DfsSearch {
            step: 0,
            space,
            selector,
            constraint,
            givens,
            last_given: None,
            check_result: ConstraintResult::Ok,
            next_decision: None,
            stack: Vec::new(),
            backtracked_steps: None,
            step_limit: None,
            manual_attr: Attribution::new(MANUAL_ATTRIBUTION).unwrap(),
            no_candidates_attr: Attribution::new(NO_CANDIDATES_ATTRIBUTION).unwrap(),
            branch_attr: Attribution::new(BRANCH_ATTRIBUTION).unwrap(),
            complete_attr: Attribution::new(COMPLETE_ATTRIBUTION).unwrap(),
            state: SearchState::Initializing(InitializingState { next_given: 0 }),
        }
    }

    /// Cap the number of steps the search may take. Once the cap binds, the
    /// search ends in SearchState::Aborted, which callers must not read as
    /// "no solution".
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    fn check_and_choose(&mut self) {
        self.check_result = self.constraint.check(self.space);
        self.next_decision = match self.check_result.clone() {
            ConstraintResult::Contradiction(_) => None,
            ConstraintResult::Certainty(d, a) => {
                Some(BranchPoint::unique(self.step+1, a, d.slot, d.value))
            },
            ConstraintResult::Ok => {
                match self.selector.next_slot(self.space, self.constraint) {
                    None => Some(BranchPoint::empty(self.step+1, self.complete_attr)),
                    Some(slot) => {
                        let values = self.constraint.candidates(self.space, slot);
                        if values.is_empty() {
                            // A dead slot is the normal signal to backtrack,
                            // not an error.
                            self.check_result = ConstraintResult::Contradiction(
                                self.no_candidates_attr);
                            None
                        } else {
                            Some(BranchPoint::for_slot(self.step+1, self.branch_attr, slot, values))
                        }
                    },
                }
            },
        };
    }

    fn apply(&mut self, decision: BranchPoint<S::Slot, V>) -> Result<(), Error> {
        if self.is_initializing() {
            return Err(NOT_INITIALIZED);
        } else if self.is_done() {
            return Err(SEARCH_ALREADY_DONE);
        } else if decision.chosen().is_none() {
            return Err(NO_CHOICE);
        }
        {
            let (slot, value) = decision.chosen().unwrap();
            self.space.apply(slot, value)?;
            if let Err(e) = self.constraint.apply(slot, value) {
                self.space.undo(slot, value)?;
                return Err(e);
            }
        }
        let decision_width = decision.remaining() + 1;
        self.stack.push(decision);
        self.check_and_choose();
        self.state = if self.is_valid() {
            SearchState::Advancing(AdvancingState {
                possibilities: decision_width,
                step: self.step,
            })
        } else {
            SearchState::Backtracking(BacktrackingState {})
        };
        Ok(())
    }

    fn unapply(&mut self, decision: &BranchPoint<S::Slot, V>) -> Result<(), Error> {
        let (slot, value) = decision.chosen().unwrap();
        if let Err(e) = self.space.undo(slot, value) {
            self.constraint.undo(slot, value)?;
            return Err(e);
        }
        self.constraint.undo(slot, value)
    }

    /// The stack of BranchPoints.
    pub fn stack(&self) -> &Vec<BranchPoint<S::Slot, V>> { &self.stack }

    /// Overriding any logic the engine has, manually do a move.
    pub fn manual_step(&mut self, slot: S::Slot, value: V) -> Result<(), Error> {
        self.step += 1;
        self.apply(BranchPoint::unique(self.step, self.manual_attr, slot, value))
    }

    /// Force the engine into the backtracking state. (Useful for
    /// exhaustively listing all solutions.)
    pub fn force_backtrack(&mut self) -> bool {
        if self.state == SearchState::Exhausted {
            return false;
        }
        self.step += 1;
        self.state = SearchState::Backtracking(BacktrackingState {});
        true
    }

    /// Undoes the previous action and applies the previous one from the same
    /// stack frame, if any. Unlike force_backtrack(), the engine will
    /// eventually revisit the state before retreat() was called. (Due to the
    /// way backtracking works, it may return immediately or take many steps
    /// to do so.) Returns false if there are no more actions to undo. Note
    /// that the step count continues to increase.
    pub fn retreat(&mut self) -> Result<bool, Error> {
        self.step += 1;
        if self.stack.is_empty() {
            return Ok(false);
        }
        let mut decision = self.stack.pop().unwrap();
        self.unapply(&decision)?;
        if decision.retreat() {
            self.apply(decision)?;
        } else {
            self.check_and_choose();
            let decision_width = match self.stack.last() {
                Some(d) => d.remaining() + 1,
                None => 0,
            };
            self.state = if self.is_valid() {
                SearchState::Advancing(AdvancingState {
                    possibilities: decision_width,
                    step: self.step,
                })
            } else {
                SearchState::Backtracking(BacktrackingState {})
            };
        }
        Ok(true)
    }

    pub fn step(&mut self) -> Result<(), Error> {
        if let Some(limit) = self.step_limit {
            if !self.is_done() && self.step >= limit {
                self.state = SearchState::Aborted;
                return Ok(());
            }
        }
        self.step += 1;
        match self.state {
            SearchState::Initializing(init) => {
                // Make sure that check_and_choose gets called once regardless
                // of whether there are any actual givens to fill in.
                if init.next_given == 0 {
                    self.check_and_choose();
                }
                if init.next_given < self.givens.len() {
                    let (slot, value) = self.givens[init.next_given];
                    self.space.apply(slot, value)?;
                    if let Err(e) = self.constraint.apply(slot, value) {
                        self.space.undo(slot, value)?;
                        return Err(e);
                    }
                    self.last_given = Some((slot, value));
                    self.check_and_choose();
                    self.state = if self.is_valid() {
                        SearchState::Initializing(InitializingState {
                            next_given: init.next_given + 1,
                        })
                    } else {
                        SearchState::InitFailed
                    };
                } else {
                    self.state = if self.is_valid() {
                        SearchState::Advancing(AdvancingState {
                            possibilities: 0,
                            step: self.step,
                        })
                    } else {
                        // The empty assignment is already contradictory; let
                        // the backtracking arm notice the empty stack and
                        // report exhaustion.
                        SearchState::Backtracking(BacktrackingState {})
                    };
                }
                Ok(())
            }
            SearchState::InitFailed => Err(SEARCH_ALREADY_DONE),
            SearchState::Solved => Err(SEARCH_ALREADY_DONE),
            SearchState::Exhausted => Err(SEARCH_ALREADY_DONE),
            SearchState::Aborted => Err(SEARCH_ALREADY_DONE),
            SearchState::Advancing(_) => {
                // Take a new action
                let decision = self.next_decision.as_ref().unwrap();
                if decision.chosen().is_some() {
                    self.apply(decision.clone())?;
                } else {
                    self.state = SearchState::Solved;
                }
                self.backtracked_steps = None;
                Ok(())
            }
            SearchState::Backtracking(_) => {
                if self.stack.is_empty() {
                    self.state = SearchState::Exhausted;
                    self.backtracked_steps = Some(self.step);
                    return Ok(());
                }
                // Backtrack, attempting to advance an existing action set
                let mut decision = self.stack.pop().unwrap();
                self.backtracked_steps = Some(self.step - decision.branch_step);
                self.unapply(&decision)?;
                match decision.advance() {
                    Some(_) => {
                        self.apply(decision)?;
                        Ok(())
                    }
                    None => {
                        self.state = SearchState::Backtracking(BacktrackingState {});
                        Ok(())
                    },
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.space.reset();
        self.constraint.reset();
        self.check_result = ConstraintResult::Ok;
        self.next_decision = None;
        self.stack.clear();
        self.last_given = None;
        self.state = SearchState::Initializing(InitializingState { next_given: 0 });
        self.step = 0;
        self.backtracked_steps = None;
    }
}

/// Find the first solution using the given selector and constraints. The
/// solved assignment is left in the space (the last successful choice is
/// deliberately not undone).
pub struct FindFirst<'a, V, S, R, C>
where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
    search: DfsSearch<'a, V, S, R, C>,
    observer: Option<&'a mut dyn StepObserver<V, S, R, C>>,
}

impl <'a, V, S, R, C> SearchView<V, S, R, C>
for FindFirst<'a, V, S, R, C>
where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
    fn step_count(&self) -> usize { self.search.step_count() }
    fn search_state(&self) -> SearchState { self.search.search_state() }
    fn is_initializing(&self) -> bool { self.search.is_initializing() }
    fn is_done(&self) -> bool { self.search.is_done() }
    fn is_valid(&self) -> bool { self.search.is_valid() }
    fn most_recent_action(&self) -> Option<(S::Slot, V)> {
        self.search.most_recent_action()
    }
    fn backtracked_steps(&self) -> Option<usize> { self.search.backtracked_steps() }
    fn selector(&self) -> &R {
        self.search.selector()
    }
    fn constraint(&self) -> &C {
        self.search.constraint()
    }
    fn check_result(&self) -> ConstraintResult<S::Slot, V> {
        self.search.check_result()
    }
    fn space(&self) -> &S { self.search.space() }
}

impl <'a, V, S, R, C> FindFirst<'a, V, S, R, C>
where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
    pub fn new(
        space: &'a mut S,
        selector: &'a R,
        constraint: &'a mut C,
        observer: Option<&'a mut dyn StepObserver<V, S, R, C>>,
    ) -> Self {
        FindFirst {
            search: DfsSearch::new(space, selector, constraint),
            observer,
        }
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.search = self.search.with_step_limit(limit);
        self
    }

    pub fn step(&mut self) -> Result<&dyn SearchView<V, S, R, C>, Error> {
        self.search.step()?;
        Ok(&self.search)
    }

    pub fn solve(&mut self) -> Result<Option<&dyn SearchView<V, S, R, C>>, Error> {
        while !self.search.is_done() {
            self.search.step()?;
            if let Some(observer) = &mut self.observer {
                observer.after_step(&self.search);
            }
        }
        if self.search.search_state() == SearchState::Solved {
            Ok(Some(&self.search))
        } else {
            Ok(None)
        }
    }
}

/// Find all solutions using the given selector and constraints. Each
/// complete assignment is copied into the sink and the search then forces a
/// backtrack and keeps going, so the traversal is the same one FindFirst
/// makes; nothing about the descent itself is duplicated.
pub struct FindAll<'a, V, S, R, C>
where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
    search: DfsSearch<'a, V, S, R, C>,
    sink: SolutionSink<S::Solution>,
    observer: Option<&'a mut dyn StepObserver<V, S, R, C>>,
}

impl <'a, V, S, R, C> SearchView<V, S, R, C>
for FindAll<'a, V, S, R, C>
where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
    fn step_count(&self) -> usize { self.search.step_count() }
    fn search_state(&self) -> SearchState { self.search.search_state() }
    fn is_initializing(&self) -> bool { self.search.is_initializing() }
    fn is_done(&self) -> bool {
        matches!(
            self.search.search_state(),
            SearchState::InitFailed | SearchState::Exhausted | SearchState::Aborted
        )
    }
    fn is_valid(&self) -> bool { self.search.is_valid() }
    fn most_recent_action(&self) -> Option<(S::Slot, V)> {
        self.search.most_recent_action()
    }
    fn backtracked_steps(&self) -> Option<usize> { self.search.backtracked_steps() }
    fn selector(&self) -> &R {
        self.search.selector()
    }
    fn constraint(&self) -> &C {
        self.search.constraint()
    }
    fn check_result(&self) -> ConstraintResult<S::Slot, V> {
        self.search.check_result()
    }
    fn space(&self) -> &S { self.search.space() }
}

impl <'a, V, S, R, C> FindAll<'a, V, S, R, C>
where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
    pub fn new(
        space: &'a mut S,
        selector: &'a R,
        constraint: &'a mut C,
        observer: Option<&'a mut dyn StepObserver<V, S, R, C>>,
    ) -> Self {
        FindAll {
            search: DfsSearch::new(space, selector, constraint),
            sink: SolutionSink::new(),
            observer,
        }
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.search = self.search.with_step_limit(limit);
        self
    }

    pub fn step(&mut self) -> Result<&dyn SearchView<V, S, R, C>, Error> {
        if self.search.search_state() == SearchState::Solved {
            self.sink.record(self.search.space().snapshot());
            self.search.force_backtrack();
        }
        self.search.step()?;
        Ok(&self.search)
    }

    // Returns the number of steps taken and the number of solutions found.
    // The solutions themselves are in solutions()/into_solutions().
    pub fn solve_all(&mut self) -> Result<(usize, usize), Error> {
        let mut steps = 0;
        while !self.is_done() {
            self.step()?;
            steps += 1;
            if let Some(observer) = &mut self.observer {
                observer.after_step(&self.search);
            }
        }
        Ok((steps, self.sink.len()))
    }

    pub fn solutions(&self) -> &[S::Solution] { self.sink.as_slice() }

    pub fn into_solutions(self) -> Vec<S::Solution> { self.sink.into_vec() }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;

    /// Replayer for a space with pre-filled entries. This is helpful if
    /// you'd like to check what a constraint makes of a set of givens
    /// without running a search afterwards.
    pub struct Replay<'a, V, S, R, C>
    where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
        search: DfsSearch<'a, V, S, R, C>,
    }

    impl <'a, V, S, R, C> Replay<'a, V, S, R, C>
    where V: Choice, S: Space<V>, R: Selector<V, S, C>, C: Constraint<V, S> {
        pub fn new(
            space: &'a mut S,
            selector: &'a R,
            constraint: &'a mut C,
        ) -> Self {
            Self { search: DfsSearch::new(space, selector, constraint) }
        }

        /// Replay all the given actions against the constraint and report
        /// the final ConstraintResult (or the contradiction detected during
        /// the replay).
        pub fn replay(&mut self) -> Result<ConstraintResult<S::Slot, V>, Error> {
            while self.search.is_initializing() {
                self.search.step()?;
                let result = self.search.check_result();
                if let ConstraintResult::Contradiction(_) = result {
                    return Ok(result);
                }
            }
            Ok(self.search.check_result())
        }

        pub fn search_state(&self) -> SearchState { self.search.search_state() }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::test_util::{LineSpace, LineVal};
    use crate::core::{Attribution, Stateful, Value};
    use crate::selector::{FirstOpen, MinRemaining};

    /// Digits on the line must be strictly ascending left to right.
    #[derive(Debug)]
    struct Ascending<const N: usize>;
    impl <const N: usize> Stateful<usize, LineVal> for Ascending<N> {}
    impl <const N: usize> Constraint<LineVal, LineSpace<N>> for Ascending<N> {
        fn check(&self, space: &LineSpace<N>) -> ConstraintResult<usize, LineVal> {
            for i in 1..N {
                if let (Some(a), Some(b)) = (space.get(i-1), space.get(i)) {
                    if a.0 >= b.0 {
                        return ConstraintResult::Contradiction(
                            Attribution::new("NOT_ASCENDING").unwrap());
                    }
                }
            }
            ConstraintResult::Ok
        }
        fn allows(&self, space: &LineSpace<N>, slot: usize, value: LineVal) -> bool {
            if slot > 0 {
                if let Some(left) = space.get(slot-1) {
                    if left.0 >= value.0 {
                        return false;
                    }
                }
            }
            if slot + 1 < N {
                if let Some(right) = space.get(slot+1) {
                    if value.0 >= right.0 {
                        return false;
                    }
                }
            }
            true
        }
        fn candidates(&self, space: &LineSpace<N>, slot: usize) -> Vec<LineVal> {
            LineVal::possibilities().into_iter()
                .filter(|v| self.allows(space, slot, *v))
                .collect()
        }
    }

    /// Base enumeration that must never be consulted; used for boundary
    /// tests where the space is already complete.
    #[derive(Debug)]
    struct Untouchable;
    impl Stateful<usize, LineVal> for Untouchable {}
    impl <const N: usize> Constraint<LineVal, LineSpace<N>> for Untouchable {
        fn check(&self, _: &LineSpace<N>) -> ConstraintResult<usize, LineVal> {
            ConstraintResult::Ok
        }
        fn allows(&self, _: &LineSpace<N>, _: usize, _: LineVal) -> bool { true }
        fn candidates(&self, _: &LineSpace<N>, _: usize) -> Vec<LineVal> {
            panic!("candidates() must not be called for a complete space");
        }
    }

    #[test]
    fn test_find_first_ascending() -> Result<(), Error> {
        let mut space = LineSpace::<3>::new();
        let selector = FirstOpen;
        let mut constraint = Ascending::<3>;
        let mut finder = FindFirst::new(&mut space, &selector, &mut constraint, None);
        let maybe_solution = finder.solve()?;
        assert!(maybe_solution.is_some());
        assert_eq!(maybe_solution.unwrap().space().to_string(), "123");
        Ok(())
    }

    #[test]
    fn test_find_first_min_remaining_agrees() -> Result<(), Error> {
        let mut space = LineSpace::<3>::new();
        let selector = MinRemaining;
        let mut constraint = Ascending::<3>;
        let mut finder = FindFirst::new(&mut space, &selector, &mut constraint, None);
        let maybe_solution = finder.solve()?;
        assert!(maybe_solution.is_some());
        assert_eq!(maybe_solution.unwrap().space().to_string(), "123");
        Ok(())
    }

    #[test]
    fn test_find_all_ascending() -> Result<(), Error> {
        let mut space = LineSpace::<3>::new();
        let selector = FirstOpen;
        let mut constraint = Ascending::<3>;
        let mut finder = FindAll::new(&mut space, &selector, &mut constraint, None);
        let (steps, solution_count) = finder.solve_all()?;
        // 9 choose 3 ascending triples.
        assert_eq!(solution_count, 84);
        assert!(steps > 84);
        assert_eq!(finder.solutions()[0], "123");
        assert_eq!(finder.solutions()[1], "124");
        assert_eq!(finder.solutions()[83], "789");
        Ok(())
    }

    #[test]
    fn test_find_all_is_idempotent() -> Result<(), Error> {
        let run = || -> Result<Vec<String>, Error> {
            let mut space = LineSpace::<3>::new();
            let selector = FirstOpen;
            let mut constraint = Ascending::<3>;
            let mut finder = FindAll::new(&mut space, &selector, &mut constraint, None);
            finder.solve_all()?;
            Ok(finder.into_solutions())
        };
        assert_eq!(run()?, run()?);
        Ok(())
    }

    #[test]
    fn test_complete_space_solves_without_candidates() -> Result<(), Error> {
        let mut space = LineSpace::<3>::new();
        space.apply(0, LineVal(1)).unwrap();
        space.apply(1, LineVal(2)).unwrap();
        space.apply(2, LineVal(3)).unwrap();
        let selector = FirstOpen;
        let mut constraint = Untouchable;
        let mut finder = FindFirst::new(&mut space, &selector, &mut constraint, None);
        let maybe_solution = finder.solve()?;
        assert!(maybe_solution.is_some());
        // One step to leave Initializing, one to notice completeness.
        assert_eq!(maybe_solution.unwrap().step_count(), 2);
        Ok(())
    }

    #[test]
    fn test_unsatisfiable_exhausts() -> Result<(), Error> {
        // A two-cell ascending line where the left cell is pinned to 9 can
        // never complete.
        let mut space = LineSpace::<2>::new();
        let selector = FirstOpen;
        let mut constraint = Ascending::<2>;
        let mut search = DfsSearch::new(&mut space, &selector, &mut constraint);
        while !search.is_done() {
            if search.search_state() == SearchState::Advancing(AdvancingState { possibilities: 0, step: 1 }) {
                // Pin the left cell manually before the engine branches.
                search.manual_step(0, LineVal(9))?;
                continue;
            }
            search.step()?;
        }
        assert_eq!(search.search_state(), SearchState::Exhausted);
        Ok(())
    }

    #[test]
    fn test_step_limit_aborts() -> Result<(), Error> {
        let mut space = LineSpace::<3>::new();
        let selector = FirstOpen;
        let mut constraint = Ascending::<3>;
        let mut finder = FindAll::new(&mut space, &selector, &mut constraint, None)
            .with_step_limit(10);
        let (_, solution_count) = finder.solve_all()?;
        // The cap binds long before the 84 solutions are enumerated, and the
        // outcome is distinguishable from exhaustion.
        assert_eq!(finder.search_state(), SearchState::Aborted);
        assert!(solution_count < 84);
        Ok(())
    }

    struct ContraCounter(pub usize);
    impl <const N: usize, R, C> StepObserver<LineVal, LineSpace<N>, R, C> for ContraCounter
    where R: Selector<LineVal, LineSpace<N>, C>, C: Constraint<LineVal, LineSpace<N>> {
        fn after_step(&mut self, search: &dyn SearchView<LineVal, LineSpace<N>, R, C>) {
            if !search.is_valid() {
                self.0 += 1;
            }
        }
    }

    #[test]
    fn test_observer_sees_dead_ends() -> Result<(), Error> {
        let mut space = LineSpace::<3>::new();
        let selector = FirstOpen;
        let mut constraint = Ascending::<3>;
        let mut counter = ContraCounter(0);
        let mut finder = FindAll::new(&mut space, &selector, &mut constraint, Some(&mut counter));
        finder.solve_all()?;
        // Every cell choice that leaves no room to its right is a dead end
        // the observer must have seen.
        assert!(counter.0 > 0);
        Ok(())
    }

    #[test]
    fn test_most_recent_action_and_width() -> Result<(), Error> {
        let mut space = LineSpace::<3>::new();
        let selector = FirstOpen;
        let mut constraint = Ascending::<3>;
        let mut search = DfsSearch::new(&mut space, &selector, &mut constraint);
        search.step()?; // leave Initializing
        assert_eq!(search.most_recent_action(), None);
        search.step()?; // branch on slot 0
        assert_eq!(search.most_recent_action(), Some((0, LineVal(1))));
        match search.search_state() {
            SearchState::Advancing(AdvancingState { possibilities, .. }) => {
                assert_eq!(possibilities, 9);
            },
            other => panic!("Expected Advancing; got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_retreat_revisits_same_solution() -> Result<(), Error> {
        // First runthrough to collect the solution.
        let expected_solution = {
            let mut space = LineSpace::<4>::new();
            let selector = FirstOpen;
            let mut constraint = Ascending::<4>;
            let mut search = DfsSearch::new(&mut space, &selector, &mut constraint);
            while !search.is_done() {
                search.step()?;
            }
            assert_eq!(search.search_state(), SearchState::Solved);
            space.to_string()
        };
        // Next runthrough does undo every once in a while.
        let actual_solution = {
            let mut space = LineSpace::<4>::new();
            let selector = FirstOpen;
            let mut constraint = Ascending::<4>;
            let mut search = DfsSearch::new(&mut space, &selector, &mut constraint);
            let mut i = 1;
            while !search.is_done() {
                if i % 3 == 0 {
                    search.retreat()?;
                } else {
                    search.step()?;
                }
                i += 1;
            }
            space.to_string()
        };
        assert_eq!(actual_solution, expected_solution);
        Ok(())
    }

    #[test]
    fn test_reset_allows_rerun() -> Result<(), Error> {
        let mut space = LineSpace::<3>::new();
        let selector = FirstOpen;
        let mut constraint = Ascending::<3>;
        let mut search = DfsSearch::new(&mut space, &selector, &mut constraint);
        while !search.is_done() {
            search.step()?;
        }
        assert_eq!(search.search_state(), SearchState::Solved);
        let first = search.space().snapshot();
        search.reset();
        while !search.is_done() {
            search.step()?;
        }
        assert_eq!(search.space().snapshot(), first);
        Ok(())
    }
}
