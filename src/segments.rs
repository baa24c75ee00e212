use std::fmt::Display;

use crate::constraint::Constraint;
use crate::core::{Attribution, ConstraintResult, Error, Space, Stateful};
use crate::selector::FirstOpen;
use crate::solver::FindAll;

/// Length in digits of the next segment cut off the remaining text.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SegLen(pub usize);

impl Display for SegLen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const NON_DIGIT_ERROR: Error = Error::new_const("Text must consist of decimal digits");
pub const ZERO_QUOTA_ERROR: Error = Error::new_const("Segment quota must be positive");
pub const BAD_CURSOR_ERROR: Error = Error::new_const("Slot is not the current cursor");
pub const ZERO_SEGMENT_ERROR: Error = Error::new_const("Segments must be non-empty");
pub const SEGMENT_OVERRUN_ERROR: Error = Error::new_const("Segment runs past the end of the text");
pub const QUOTA_EXHAUSTED_ERROR: Error = Error::new_const("All segments already placed");
pub const NO_SUCH_SEGMENT_ERROR: Error = Error::new_const("No such segment to undo");

/// A digit string being split into exactly `quota` segments, each a number
/// in 0..=bound with no leading zeros. For IP addresses: quota 4, bound 255.
#[derive(Debug, Clone)]
pub struct SegmentSpace {
    digits: Vec<char>,
    quota: usize,
    bound: u32,
    max_len: usize,
    cuts: Vec<usize>,
}

impl SegmentSpace {
    pub fn new(text: &str, quota: usize, bound: u32) -> Result<Self, Error> {
        if quota == 0 {
            return Err(ZERO_QUOTA_ERROR);
        }
        let digits: Vec<char> = text.chars().collect();
        if digits.iter().any(|c| !c.is_ascii_digit()) {
            return Err(NON_DIGIT_ERROR);
        }
        let max_len = bound.to_string().len();
        Ok(Self { digits, quota, bound, max_len, cuts: Vec::new() })
    }

    pub fn len(&self) -> usize { self.digits.len() }
    pub fn quota(&self) -> usize { self.quota }
    pub fn bound(&self) -> u32 { self.bound }
    /// The longest a segment can be: the decimal width of the bound.
    pub fn max_len(&self) -> usize { self.max_len }
    pub fn placed(&self) -> usize { self.cuts.len() }

    /// Digits consumed so far; the slot the next segment starts at.
    pub fn cursor(&self) -> usize {
        self.cuts.last().copied().unwrap_or(0)
    }

    /// Numeric value of the digit run starting at `start`, `len` digits
    /// long. Wide enough that a max_len run can't overflow.
    pub fn value_of(&self, start: usize, len: usize) -> u64 {
        self.digits[start..start + len].iter()
            .fold(0u64, |acc, c| acc * 10 + c.to_digit(10).unwrap() as u64)
    }

    pub fn segments(&self) -> Vec<String> {
        let mut start = 0;
        self.cuts.iter().map(|end| {
            let segment: String = self.digits[start..*end].iter().collect();
            start = *end;
            segment
        }).collect()
    }

    pub fn dotted(&self) -> String {
        self.segments().join(".")
    }
}

impl Stateful<usize, SegLen> for SegmentSpace {
    fn reset(&mut self) {
        self.cuts.clear();
    }

    fn apply(&mut self, slot: usize, value: SegLen) -> Result<(), Error> {
        if slot != self.cursor() {
            return Err(BAD_CURSOR_ERROR);
        }
        if value.0 == 0 {
            return Err(ZERO_SEGMENT_ERROR);
        }
        if self.cuts.len() == self.quota {
            return Err(QUOTA_EXHAUSTED_ERROR);
        }
        if slot + value.0 > self.digits.len() {
            return Err(SEGMENT_OVERRUN_ERROR);
        }
        self.cuts.push(slot + value.0);
        Ok(())
    }

    fn undo(&mut self, slot: usize, value: SegLen) -> Result<(), Error> {
        let previous = if self.cuts.len() >= 2 { self.cuts[self.cuts.len() - 2] } else { 0 };
        match self.cuts.last() {
            Some(end) if *end == slot + value.0 && previous == slot => {
                self.cuts.pop();
                Ok(())
            },
            _ => Err(NO_SUCH_SEGMENT_ERROR),
        }
    }
}

impl Space<SegLen> for SegmentSpace {
    type Slot = usize;
    type Solution = String;

    fn open_slots(&self) -> Vec<usize> {
        if self.cuts.len() == self.quota {
            vec![]
        } else {
            vec![self.cursor()]
        }
    }

    fn given_actions(&self) -> Vec<(usize, SegLen)> { vec![] }

    fn snapshot(&self) -> String {
        self.dotted()
    }
}

pub const LEADING_ZERO_ATTRIBUTION: &str = "SEGMENT_LEADING_ZERO";
pub const OVER_BOUND_ATTRIBUTION: &str = "SEGMENT_OVER_BOUND";
pub const TRAILING_DIGITS_ATTRIBUTION: &str = "SEGMENT_TRAILING_DIGITS";
pub const TEXT_TOO_LONG_ATTRIBUTION: &str = "SEGMENT_TEXT_TOO_LONG";
pub const TEXT_TOO_SHORT_ATTRIBUTION: &str = "SEGMENT_TEXT_TOO_SHORT";

/// The segment legality rules: numeric range, no leading zeros, and enough
/// (but not too many) digits left for the segments still to come. The
/// remaining-length window is what keeps the search from descending into
/// splits that cannot possibly come out even.
///
/// All the state this constraint judges lives in the space itself, so it
/// carries none of its own.
#[derive(Debug)]
pub struct SegmentRule {
    leading_zero_attr: Attribution,
    over_bound_attr: Attribution,
    trailing_attr: Attribution,
    too_long_attr: Attribution,
    too_short_attr: Attribution,
}

impl SegmentRule {
    pub fn new() -> Self {
        Self {
            leading_zero_attr: Attribution::new(LEADING_ZERO_ATTRIBUTION).unwrap(),
            over_bound_attr: Attribution::new(OVER_BOUND_ATTRIBUTION).unwrap(),
            trailing_attr: Attribution::new(TRAILING_DIGITS_ATTRIBUTION).unwrap(),
            too_long_attr: Attribution::new(TEXT_TOO_LONG_ATTRIBUTION).unwrap(),
            too_short_attr: Attribution::new(TEXT_TOO_SHORT_ATTRIBUTION).unwrap(),
        }
    }

    fn segment_ok(&self, space: &SegmentSpace, slot: usize, len: usize) -> bool {
        if len == 0 || len > space.max_len() || slot + len > space.len() {
            return false;
        }
        if len > 1 && space.digits[slot] == '0' {
            return false;
        }
        space.value_of(slot, len) <= space.bound() as u64
    }
}

impl Stateful<usize, SegLen> for SegmentRule {}

impl Constraint<SegLen, SegmentSpace> for SegmentRule {
    fn check(&self, space: &SegmentSpace) -> ConstraintResult<usize, SegLen> {
        let mut start = 0;
        for end in &space.cuts {
            let len = end - start;
            if len > 1 && space.digits[start] == '0' {
                return ConstraintResult::Contradiction(self.leading_zero_attr);
            }
            if len > space.max_len() || space.value_of(start, len) > space.bound() as u64 {
                return ConstraintResult::Contradiction(self.over_bound_attr);
            }
            start = *end;
        }
        let remaining_segments = space.quota() - space.placed();
        let remaining_digits = space.len() - space.cursor();
        if remaining_segments == 0 {
            if remaining_digits > 0 {
                return ConstraintResult::Contradiction(self.trailing_attr);
            }
        } else {
            if remaining_digits > remaining_segments * space.max_len() {
                return ConstraintResult::Contradiction(self.too_long_attr);
            }
            if remaining_digits < remaining_segments {
                return ConstraintResult::Contradiction(self.too_short_attr);
            }
        }
        ConstraintResult::Ok
    }

    fn allows(&self, space: &SegmentSpace, slot: usize, value: SegLen) -> bool {
        if space.placed() == space.quota() || !self.segment_ok(space, slot, value.0) {
            return false;
        }
        let remaining_segments = space.quota() - space.placed() - 1;
        let remaining_digits = space.len() - slot - value.0;
        remaining_digits <= remaining_segments * space.max_len()
            && remaining_digits >= remaining_segments
    }

    fn candidates(&self, space: &SegmentSpace, slot: usize) -> Vec<SegLen> {
        (1..=space.max_len())
            .map(SegLen)
            .filter(|len| self.allows(space, slot, *len))
            .collect()
    }

    fn debug_at(&self, space: &SegmentSpace, _: usize) -> Option<String> {
        Some(format!(
            "SegmentRule: placed={}/{} cursor={}/{}",
            space.placed(), space.quota(), space.cursor(), space.len(),
        ))
    }
}

/// All ways to read `text` as a dotted IPv4 address: four segments, each
/// 0-255, no leading zeros, in discovery order.
pub fn restore_ip_addresses(text: &str) -> Result<Vec<String>, Error> {
    segment_text(text, 4, 255)
}

/// The general form: split into exactly `quota` segments bounded by
/// `bound`.
pub fn segment_text(text: &str, quota: usize, bound: u32) -> Result<Vec<String>, Error> {
    let mut space = SegmentSpace::new(text, quota, bound)?;
    let selector = FirstOpen;
    let mut constraint = SegmentRule::new();
    let mut finder = FindAll::new(&mut space, &selector, &mut constraint, None);
    finder.solve_all()?;
    Ok(finder.into_solutions())
}
