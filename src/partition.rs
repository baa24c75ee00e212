use std::fmt::Display;

use crate::constraint::Constraint;
use crate::core::{Attribution, ConstraintResult, Error, Space, Stateful};
use crate::illegal::IllegalMove;
use crate::selector::FirstOpen;
use crate::solver::FindAll;

/// Length in characters of the next piece cut off the remaining text.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PieceLen(pub usize);

impl Display for PieceLen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Precomputed palindrome lookup for every substring, filled once by the
/// usual expanding-length recurrence: a substring is a palindrome when its
/// end characters match and its interior (if any) already was one.
#[derive(Debug, Clone)]
pub struct PalindromeTable {
    n: usize,
    table: Vec<bool>,
}

impl PalindromeTable {
    pub fn build(chars: &[char]) -> Self {
        let n = chars.len();
        let mut table = vec![false; n * n];
        for len in 1..=n {
            for i in 0..=(n - len) {
                let j = i + len - 1;
                table[i * n + j] = chars[i] == chars[j] && (len <= 2 || table[(i + 1) * n + (j - 1)]);
            }
        }
        Self { n, table }
    }

    /// Whether chars[i..=j] reads the same both ways.
    pub fn is_palindrome(&self, i: usize, j: usize) -> bool {
        i <= j && j < self.n && self.table[i * self.n + j]
    }
}

pub const BAD_CURSOR_ERROR: Error = Error::new_const("Slot is not the current cursor");
pub const ZERO_PIECE_ERROR: Error = Error::new_const("Pieces must be non-empty");
pub const PIECE_OVERRUN_ERROR: Error = Error::new_const("Piece runs past the end of the text");
pub const NO_SUCH_CUT_ERROR: Error = Error::new_const("No such cut to undo");

/// The text being partitioned plus the cuts made so far, recorded as
/// cumulative end offsets. The pieces concatenate back to exactly the prefix
/// consumed so far, with no gaps or overlaps, by construction.
#[derive(Debug, Clone)]
pub struct PartitionSpace {
    chars: Vec<char>,
    cuts: Vec<usize>,
}

impl PartitionSpace {
    pub fn new(text: &str) -> Self {
        Self { chars: text.chars().collect(), cuts: Vec::new() }
    }

    pub fn len(&self) -> usize { self.chars.len() }
    pub fn chars(&self) -> &[char] { &self.chars }

    /// Characters consumed so far; the slot the next piece starts at.
    pub fn cursor(&self) -> usize {
        self.cuts.last().copied().unwrap_or(0)
    }

    pub fn pieces(&self) -> Vec<String> {
        let mut start = 0;
        self.cuts.iter().map(|end| {
            let piece: String = self.chars[start..*end].iter().collect();
            start = *end;
            piece
        }).collect()
    }
}

impl Stateful<usize, PieceLen> for PartitionSpace {
    fn reset(&mut self) {
        self.cuts.clear();
    }

    fn apply(&mut self, slot: usize, value: PieceLen) -> Result<(), Error> {
        if slot != self.cursor() {
            return Err(BAD_CURSOR_ERROR);
        }
        if value.0 == 0 {
            return Err(ZERO_PIECE_ERROR);
        }
        if slot + value.0 > self.chars.len() {
            return Err(PIECE_OVERRUN_ERROR);
        }
        self.cuts.push(slot + value.0);
        Ok(())
    }

    fn undo(&mut self, slot: usize, value: PieceLen) -> Result<(), Error> {
        let previous = if self.cuts.len() >= 2 { self.cuts[self.cuts.len() - 2] } else { 0 };
        match self.cuts.last() {
            Some(end) if *end == slot + value.0 && previous == slot => {
                self.cuts.pop();
                Ok(())
            },
            _ => Err(NO_SUCH_CUT_ERROR),
        }
    }
}

impl Space<PieceLen> for PartitionSpace {
    type Slot = usize;
    type Solution = Vec<String>;

    fn open_slots(&self) -> Vec<usize> {
        if self.cursor() == self.chars.len() {
            vec![]
        } else {
            vec![self.cursor()]
        }
    }

    fn given_actions(&self) -> Vec<(usize, PieceLen)> { vec![] }

    fn snapshot(&self) -> Vec<String> {
        self.pieces()
    }
}

pub const NOT_PALINDROME_ATTRIBUTION: &str = "PIECE_NOT_PALINDROME";

/// Admits only palindromic pieces. The table is built once per input; the
/// per-candidate test is a single lookup.
#[derive(Debug)]
pub struct PalindromeCheck {
    table: PalindromeTable,
    not_palindrome_attr: Attribution,
    illegal: IllegalMove<usize, PieceLen>,
}

impl PalindromeCheck {
    pub fn new(space: &PartitionSpace) -> Self {
        Self {
            table: PalindromeTable::build(space.chars()),
            not_palindrome_attr: Attribution::new(NOT_PALINDROME_ATTRIBUTION).unwrap(),
            illegal: IllegalMove::new(),
        }
    }
}

impl Stateful<usize, PieceLen> for PalindromeCheck {
    fn reset(&mut self) {
        self.illegal.reset();
    }

    fn apply(&mut self, slot: usize, value: PieceLen) -> Result<(), Error> {
        self.illegal.check_unset()?;
        if !self.table.is_palindrome(slot, slot + value.0 - 1) {
            self.illegal.set(slot, value, self.not_palindrome_attr);
        }
        Ok(())
    }

    fn undo(&mut self, slot: usize, value: PieceLen) -> Result<(), Error> {
        self.illegal.undo(slot, value)?;
        Ok(())
    }
}

impl Constraint<PieceLen, PartitionSpace> for PalindromeCheck {
    fn check(&self, _: &PartitionSpace) -> ConstraintResult<usize, PieceLen> {
        if let Some(contradiction) = self.illegal.to_contradiction() {
            return contradiction;
        }
        ConstraintResult::Ok
    }

    fn allows(&self, space: &PartitionSpace, slot: usize, value: PieceLen) -> bool {
        value.0 >= 1
            && slot + value.0 <= space.len()
            && self.table.is_palindrome(slot, slot + value.0 - 1)
    }

    fn candidates(&self, space: &PartitionSpace, slot: usize) -> Vec<PieceLen> {
        (1..=(space.len() - slot))
            .filter(|len| self.table.is_palindrome(slot, slot + len - 1))
            .map(PieceLen)
            .collect()
    }

    fn debug_at(&self, _: &PartitionSpace, slot: usize) -> Option<String> {
        self.illegal.debug_at(slot).map(|s| format!("PalindromeCheck:\n  {}", s))
    }
}

/// All partitions of `text` into palindromic pieces, shortest-first-piece
/// order.
pub fn palindrome_partitions(text: &str) -> Result<Vec<Vec<String>>, Error> {
    let mut space = PartitionSpace::new(text);
    let selector = FirstOpen;
    let mut constraint = PalindromeCheck::new(&space);
    let mut finder = FindAll::new(&mut space, &selector, &mut constraint, None);
    finder.solve_all()?;
    Ok(finder.into_solutions())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constraint::test_util::assert_contradiction;

    fn parts(pieces: &[&str]) -> Vec<String> {
        pieces.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_palindrome_table() {
        let chars: Vec<char> = "abba".chars().collect();
        let table = PalindromeTable::build(&chars);
        assert!(table.is_palindrome(0, 0));
        assert!(table.is_palindrome(1, 2));
        assert!(table.is_palindrome(0, 3));
        assert!(!table.is_palindrome(0, 1));
        assert!(!table.is_palindrome(2, 4));
    }

    #[test]
    fn test_partitions_aab() {
        let partitions = palindrome_partitions("aab").unwrap();
        assert_eq!(partitions, vec![parts(&["a", "a", "b"]), parts(&["aa", "b"])]);
    }

    #[test]
    fn test_partitions_aba() {
        let partitions = palindrome_partitions("aba").unwrap();
        assert_eq!(partitions, vec![parts(&["a", "b", "a"]), parts(&["aba"])]);
    }

    #[test]
    fn test_partitions_degenerate_inputs() {
        assert_eq!(palindrome_partitions("a").unwrap(), vec![parts(&["a"])]);
        assert_eq!(palindrome_partitions("abc").unwrap(), vec![parts(&["a", "b", "c"])]);
        // The empty text has exactly one partition: the empty one.
        assert_eq!(palindrome_partitions("").unwrap(), vec![Vec::<String>::new()]);
    }

    #[test]
    fn test_partitions_are_sound() {
        let input = "abracadabra";
        for partition in palindrome_partitions(input).unwrap() {
            assert_eq!(partition.concat(), input);
            for piece in &partition {
                assert!(piece.chars().rev().eq(piece.chars()), "{:?} is not a palindrome", piece);
            }
        }
    }

    /// Brute force over every cut mask of a short string.
    fn brute_force_partitions(s: &str) -> Vec<Vec<String>> {
        let chars: Vec<char> = s.chars().collect();
        let n = chars.len();
        let mut result = Vec::new();
        for mask in 0u32..(1 << n.saturating_sub(1)) {
            let mut pieces = Vec::new();
            let mut start = 0;
            for i in 0..n {
                if i + 1 == n || mask & (1 << i) != 0 {
                    pieces.push(chars[start..=i].iter().collect::<String>());
                    start = i + 1;
                }
            }
            if pieces.iter().all(|p| p.chars().rev().eq(p.chars())) {
                result.push(pieces);
            }
        }
        result
    }

    #[test]
    fn test_partitions_complete_against_brute_force() {
        for input in ["aabba", "racecar", "zzzzz"] {
            let mut found = palindrome_partitions(input).unwrap();
            let mut expected = brute_force_partitions(input);
            found.sort();
            expected.sort();
            assert_eq!(found, expected, "mismatch for {:?}", input);
        }
    }

    #[test]
    fn test_partitions_are_idempotent() {
        assert_eq!(
            palindrome_partitions("aabba").unwrap(),
            palindrome_partitions("aabba").unwrap(),
        );
    }

    #[test]
    fn test_space_apply_undo() {
        let mut space = PartitionSpace::new("aab");
        assert_eq!(space.apply(1, PieceLen(1)), Err(BAD_CURSOR_ERROR));
        assert_eq!(space.apply(0, PieceLen(0)), Err(ZERO_PIECE_ERROR));
        assert_eq!(space.apply(0, PieceLen(4)), Err(PIECE_OVERRUN_ERROR));
        space.apply(0, PieceLen(2)).unwrap();
        space.apply(2, PieceLen(1)).unwrap();
        assert_eq!(space.pieces(), vec!["aa".to_string(), "b".to_string()]);
        assert_eq!(space.open_slots(), Vec::<usize>::new());
        assert_eq!(space.undo(0, PieceLen(2)), Err(NO_SUCH_CUT_ERROR));
        space.undo(2, PieceLen(1)).unwrap();
        space.undo(0, PieceLen(2)).unwrap();
        assert_eq!(space.cursor(), 0);
    }

    #[test]
    fn test_non_palindromic_piece_latches() {
        let mut space = PartitionSpace::new("aab");
        let mut constraint = PalindromeCheck::new(&space);
        space.apply(0, PieceLen(3)).unwrap();
        constraint.apply(0, PieceLen(3)).unwrap();
        assert_contradiction(constraint.check(&space), NOT_PALINDROME_ATTRIBUTION);
        constraint.undo(0, PieceLen(3)).unwrap();
        space.undo(0, PieceLen(3)).unwrap();
        assert_eq!(constraint.check(&space), ConstraintResult::Ok);
    }
}
