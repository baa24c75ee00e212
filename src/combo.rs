use std::fmt::Display;

use crate::constraint::Constraint;
use crate::core::{Attribution, ConstraintResult, Error, Space, Stateful};
use crate::selector::FirstOpen;
use crate::solver::FindAll;

/// A number drawn from the candidate pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pick(pub u32);

impl Display for Pick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const ZERO_CANDIDATE_ERROR: Error = Error::new_const("Candidates must be positive");
pub const DUPLICATE_CANDIDATE_ERROR: Error = Error::new_const("Candidates must be distinct");
pub const BAD_SLOT_ERROR: Error = Error::new_const("Slot is not the next pick position");
pub const UNKNOWN_CANDIDATE_ERROR: Error = Error::new_const("Value is not in the candidate pool");
pub const OUT_OF_ORDER_ERROR: Error = Error::new_const("Picks must be non-decreasing");
pub const NO_SUCH_PICK_ERROR: Error = Error::new_const("No such pick to undo");
pub const SUM_OVERFLOW_ERROR: Error = Error::new_const("Partial sum overflowed");

/// The growing combination for fixed-sum enumeration: a non-decreasing
/// sequence of pool values together with its running sum. Numbers may repeat;
/// the non-decreasing order is what makes each combination canonical, so the
/// search never produces two orderings of the same multiset.
#[derive(Debug, Clone)]
pub struct ComboSpace {
    pool: Vec<u32>,
    target: u32,
    picks: Vec<usize>,
    sum: u32,
}

impl ComboSpace {
    /// The pool is sorted ascending up front; candidate enumeration depends
    /// on it for the monotonic overshoot cutoff.
    pub fn new(pool: &[u32], target: u32) -> Result<Self, Error> {
        let mut sorted = pool.to_vec();
        sorted.sort_unstable();
        for pair in sorted.windows(2) {
            if pair[0] == pair[1] {
                return Err(DUPLICATE_CANDIDATE_ERROR);
            }
        }
        if sorted.first() == Some(&0) {
            return Err(ZERO_CANDIDATE_ERROR);
        }
        Ok(Self { pool: sorted, target, picks: Vec::new(), sum: 0 })
    }

    pub fn pool(&self) -> &[u32] { &self.pool }
    pub fn target(&self) -> u32 { self.target }
    pub fn sum(&self) -> u32 { self.sum }

    /// Index of the smallest pool entry the next pick may use. Reuse of the
    /// most recent pick is allowed, so this is its index, not its successor.
    pub fn start_index(&self) -> usize {
        self.picks.last().copied().unwrap_or(0)
    }

    pub fn chosen(&self) -> Vec<u32> {
        self.picks.iter().map(|i| self.pool[*i]).collect()
    }
}

impl Stateful<usize, Pick> for ComboSpace {
    fn reset(&mut self) {
        self.picks.clear();
        self.sum = 0;
    }

    fn apply(&mut self, slot: usize, value: Pick) -> Result<(), Error> {
        if slot != self.picks.len() {
            return Err(BAD_SLOT_ERROR);
        }
        let idx = self.pool.binary_search(&value.0).map_err(|_| UNKNOWN_CANDIDATE_ERROR)?;
        if idx < self.start_index() {
            return Err(OUT_OF_ORDER_ERROR);
        }
        self.sum = self.sum.checked_add(value.0).ok_or(SUM_OVERFLOW_ERROR)?;
        self.picks.push(idx);
        Ok(())
    }

    fn undo(&mut self, slot: usize, value: Pick) -> Result<(), Error> {
        if self.picks.is_empty() || slot != self.picks.len() - 1 {
            return Err(NO_SUCH_PICK_ERROR);
        }
        let idx = *self.picks.last().unwrap();
        if self.pool[idx] != value.0 {
            return Err(Error::new_const("Undo value mismatch"));
        }
        self.picks.pop();
        self.sum -= value.0;
        Ok(())
    }
}

impl Space<Pick> for ComboSpace {
    type Slot = usize;
    type Solution = Vec<u32>;

    fn open_slots(&self) -> Vec<usize> {
        if self.sum == self.target {
            vec![]
        } else {
            vec![self.picks.len()]
        }
    }

    fn given_actions(&self) -> Vec<(usize, Pick)> { vec![] }

    fn snapshot(&self) -> Vec<u32> {
        self.chosen()
    }
}

pub const OVER_TARGET_ATTRIBUTION: &str = "SUM_OVER_TARGET";

/// Keeps the running sum within the target and enumerates the picks that
/// preserve that. Because the pool is sorted ascending, enumeration stops at
/// the first overshooting value; every later value would overshoot too.
#[derive(Debug)]
pub struct SumBound {
    over_attr: Attribution,
}

impl SumBound {
    pub fn new() -> Self {
        Self { over_attr: Attribution::new(OVER_TARGET_ATTRIBUTION).unwrap() }
    }
}

impl Stateful<usize, Pick> for SumBound {}

impl Constraint<Pick, ComboSpace> for SumBound {
    fn check(&self, space: &ComboSpace) -> ConstraintResult<usize, Pick> {
        if space.sum() > space.target() {
            ConstraintResult::Contradiction(self.over_attr)
        } else {
            ConstraintResult::Ok
        }
    }

    fn allows(&self, space: &ComboSpace, _: usize, value: Pick) -> bool {
        match space.pool().binary_search(&value.0) {
            Ok(idx) => {
                idx >= space.start_index()
                    && space.sum().checked_add(value.0).is_some_and(|s| s <= space.target())
            },
            Err(_) => false,
        }
    }

    fn candidates(&self, space: &ComboSpace, _: usize) -> Vec<Pick> {
        let mut values = Vec::new();
        for i in space.start_index()..space.pool().len() {
            let c = space.pool()[i];
            if space.sum() + c > space.target() {
                break;
            }
            values.push(Pick(c));
        }
        values
    }

    fn debug_at(&self, space: &ComboSpace, _: usize) -> Option<String> {
        Some(format!("SumBound: sum={} target={}", space.sum(), space.target()))
    }
}

/// All distinct combinations of pool values (with repetition) summing to
/// exactly `target`, each non-decreasing, in discovery order.
pub fn combination_sum(pool: &[u32], target: u32) -> Result<Vec<Vec<u32>>, Error> {
    let mut space = ComboSpace::new(pool, target)?;
    let selector = FirstOpen;
    let mut constraint = SumBound::new();
    let mut finder = FindAll::new(&mut space, &selector, &mut constraint, None);
    finder.solve_all()?;
    Ok(finder.into_solutions())
}
