use std::fmt::{Debug, Display};

use crate::constraint::Constraint;
use crate::core::{full_set, to_value, Attribution, CertainDecision, ConstraintResult, Error, Space, Stateful, UVGrid, UVSet, UVUnwrapped, UVWrapped, UVal, Value};
use crate::illegal::IllegalMove;
use crate::selector::MinRemaining;
use crate::solver::{FindAll, FindFirst};

/// Grid position as (row, column).
pub type Cell = [usize; 2];

/// Digit in an inclusive range, the value type for board puzzles.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Digit<const MIN: u8, const MAX: u8>(u8);

impl <const MIN: u8, const MAX: u8> Display for Digit<MIN, MAX> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.val())
    }
}

impl <const MIN: u8, const MAX: u8> Digit<MIN, MAX> {
    pub fn new(value: u8) -> Self {
        assert!(value >= MIN && value <= MAX, "Digit out of bounds");
        Digit(value)
    }

    pub fn val(self) -> u8 {
        self.0
    }
}

impl <const MIN: u8, const MAX: u8> Value for Digit<MIN, MAX> {
    type U = u8;

    fn parse(s: &str) -> Result<Self, Error> {
        let value = s.parse::<u8>().map_err(|_| Error::new(format!("Invalid digit: {:?}", s)))?;
        if value < MIN || value > MAX {
            return Err(Error::new(format!("Digit out of bounds: {} ({}-{})", value, MIN, MAX)));
        }
        Ok(Digit(value))
    }

    fn cardinality() -> usize {
        (MAX - MIN + 1) as usize
    }

    fn possibilities() -> Vec<Self> {
        (MIN..=MAX).map(Digit).collect()
    }

    fn from_uval(u: UVal<u8, UVUnwrapped>) -> Self {
        Digit(u.value() + MIN)
    }

    fn to_uval(self) -> UVal<u8, UVWrapped> {
        UVal::new(self.0 - MIN)
    }
}

/// Row/column/box geometry of an N x M board: br x bc boxes, each bh x bw
/// cells.
#[derive(Clone, Copy, Debug)]
pub struct Houses<const N: usize, const M: usize> {
    br: usize,
    bc: usize,
    bh: usize,
    bw: usize,
}

impl <const N: usize, const M: usize> Houses<N, M> {
    pub fn new(br: usize, bc: usize, bh: usize, bw: usize) -> Self {
        if N != br * bh {
            panic!("Houses expected N == br*bh, but {} != {}*{}", N, br, bh);
        } else if M != bc * bw {
            panic!("Houses expected M == bc*bw, but {} != {}*{}", M, bc, bw);
        }
        Self { br, bc, bh, bw }
    }

    pub const fn rows(&self) -> usize { N }
    pub const fn cols(&self) -> usize { M }
    pub fn boxes(&self) -> usize { self.br * self.bc }
    pub fn box_dims(&self) -> (usize, usize) { (self.bh, self.bw) }

    /// Which box a cell is in.
    pub fn box_of(&self, cell: Cell) -> usize {
        self.bc * (cell[0] / self.bh) + (cell[1] / self.bw)
    }
}

pub fn nine_houses() -> Houses<9, 9> {
    Houses::new(3, 3, 3, 3)
}
pub fn six_houses() -> Houses<6, 6> {
    Houses::new(3, 2, 2, 3)
}
pub fn four_houses() -> Houses<4, 4> {
    Houses::new(2, 2, 2, 2)
}

pub const OUT_OF_BOUNDS_ERROR: Error = Error::new_const("Out of bounds");
pub const ALREADY_FILLED_ERROR: Error = Error::new_const("Cell already filled");
pub const NO_SUCH_ACTION_ERROR: Error = Error::new_const("No such action to undo");
pub const UNDO_MISMATCH_ERROR: Error = Error::new_const("Undo value mismatch");

/// Standard rectangular board. Givens are held separately from the working
/// grid and replayed through the engine, so the constraint sees them the
/// same way it sees search moves.
#[derive(Clone)]
pub struct Board<const N: usize, const M: usize, const MIN: u8, const MAX: u8> {
    grid: UVGrid<u8>,
    given: UVGrid<u8>,
    houses: Houses<N, M>,
}

impl <const N: usize, const M: usize, const MIN: u8, const MAX: u8> Board<N, M, MIN, MAX> {
    pub fn new(houses: Houses<N, M>) -> Self {
        Self { grid: UVGrid::new(N, M), given: UVGrid::new(N, M), houses }
    }

    pub fn houses(&self) -> &Houses<N, M> { &self.houses }

    /// Parse the usual dotted layout: one line per row, '.' for an empty
    /// cell, a digit otherwise. Surrounding whitespace and blank lines are
    /// ignored.
    pub fn parse(s: &str, houses: Houses<N, M>) -> Result<Self, Error> {
        let mut given = UVGrid::new(N, M);
        let lines: Vec<&str> = s.lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect();
        if lines.len() != N {
            return Err(Error::new(format!("Invalid number of rows: {}", lines.len())));
        }
        for (r, line) in lines.iter().enumerate() {
            if line.chars().count() != M {
                return Err(Error::new(format!("Invalid number of columns in row {}: {:?}", r, line)));
            }
            for (c, ch) in line.chars().enumerate() {
                if ch == '.' {
                    continue;
                }
                let v = Digit::<MIN, MAX>::parse(ch.to_string().as_str())?;
                given.set(r, c, Some(v.to_uval()));
            }
        }
        Ok(Self { grid: UVGrid::new(N, M), given, houses })
    }

    /// The digit currently assigned to a cell (given cells count once the
    /// engine has replayed them).
    pub fn get(&self, cell: Cell) -> Option<Digit<MIN, MAX>> {
        if cell[0] >= N || cell[1] >= M {
            return None;
        }
        self.grid.get(cell[0], cell[1]).map(to_value)
    }

    fn shown(&self, cell: Cell) -> Option<Digit<MIN, MAX>> {
        self.grid.get(cell[0], cell[1])
            .or_else(|| self.given.get(cell[0], cell[1]))
            .map(to_value)
    }

    pub fn serialize(&self) -> String {
        let mut result = String::new();
        for r in 0..N {
            for c in 0..M {
                if let Some(v) = self.shown([r, c]) {
                    result.push_str(v.val().to_string().as_str());
                } else {
                    result.push('.');
                }
            }
            result.push('\n');
        }
        result
    }
}

impl <const N: usize, const M: usize, const MIN: u8, const MAX: u8> Debug for Board<N, M, MIN, MAX> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl <const N: usize, const M: usize, const MIN: u8, const MAX: u8> Display for Board<N, M, MIN, MAX> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl <const N: usize, const M: usize, const MIN: u8, const MAX: u8>
Stateful<Cell, Digit<MIN, MAX>> for Board<N, M, MIN, MAX> {
    fn reset(&mut self) {
        self.grid = UVGrid::new(N, M);
    }

    fn apply(&mut self, cell: Cell, value: Digit<MIN, MAX>) -> Result<(), Error> {
        if cell[0] >= N || cell[1] >= M {
            return Err(OUT_OF_BOUNDS_ERROR);
        }
        if self.grid.get(cell[0], cell[1]).is_some() {
            return Err(ALREADY_FILLED_ERROR);
        }
        self.grid.set(cell[0], cell[1], Some(value.to_uval()));
        Ok(())
    }

    fn undo(&mut self, cell: Cell, value: Digit<MIN, MAX>) -> Result<(), Error> {
        if cell[0] >= N || cell[1] >= M {
            return Err(OUT_OF_BOUNDS_ERROR);
        }
        match self.grid.get(cell[0], cell[1]) {
            None => return Err(NO_SUCH_ACTION_ERROR),
            Some(v) => {
                if v != value.to_uval() {
                    return Err(UNDO_MISMATCH_ERROR);
                }
            }
        }
        self.grid.set(cell[0], cell[1], None);
        Ok(())
    }
}

impl <const N: usize, const M: usize, const MIN: u8, const MAX: u8>
Space<Digit<MIN, MAX>> for Board<N, M, MIN, MAX> {
    type Slot = Cell;
    type Solution = Vec<Vec<u8>>;

    fn open_slots(&self) -> Vec<Cell> {
        let mut open = Vec::new();
        for r in 0..N {
            for c in 0..M {
                if self.grid.get(r, c).is_none() {
                    open.push([r, c]);
                }
            }
        }
        open
    }

    fn given_actions(&self) -> Vec<(Cell, Digit<MIN, MAX>)> {
        let mut actions = Vec::new();
        for r in 0..N {
            for c in 0..M {
                if let Some(v) = self.given.get(r, c) {
                    actions.push(([r, c], to_value(v)));
                }
            }
        }
        actions
    }

    fn snapshot(&self) -> Vec<Vec<u8>> {
        (0..N).map(|r| {
            (0..M).map(|c| {
                self.grid.get(r, c).map(|v| to_value::<Digit<MIN, MAX>>(v).val()).unwrap_or(0)
            }).collect()
        }).collect()
    }
}

pub const ROW_CONFLICT_ATTRIBUTION: &str = "ROW_CONFLICT";
pub const COL_CONFLICT_ATTRIBUTION: &str = "COL_CONFLICT";
pub const BOX_CONFLICT_ATTRIBUTION: &str = "BOX_CONFLICT";
pub const NO_DIGIT_ATTRIBUTION: &str = "HOUSE_NO_DIGIT";
pub const NAKED_SINGLE_ATTRIBUTION: &str = "HOUSE_NAKED_SINGLE";

/// The one constraint of a standard board: within every row, column, and
/// box, each digit appears at most once. Occupancy is tracked per house as a
/// bitmask of still-available digits; apply and undo are exact inverses of
/// one another, which is what makes backtracking sound.
pub struct HouseChecker<const N: usize, const M: usize, const MIN: u8, const MAX: u8> {
    houses: Houses<N, M>,
    row: [UVSet<u8>; N],
    col: [UVSet<u8>; M],
    boxes: Box<[UVSet<u8>]>,
    row_attr: Attribution,
    col_attr: Attribution,
    box_attr: Attribution,
    no_digit_attr: Attribution,
    naked_single_attr: Attribution,
    illegal: IllegalMove<Cell, Digit<MIN, MAX>>,
}

impl <const N: usize, const M: usize, const MIN: u8, const MAX: u8> HouseChecker<N, M, MIN, MAX> {
    pub fn new(board: &Board<N, M, MIN, MAX>) -> Self {
        Self {
            houses: *board.houses(),
            row: std::array::from_fn(|_| full_set::<Digit<MIN, MAX>>()),
            col: std::array::from_fn(|_| full_set::<Digit<MIN, MAX>>()),
            boxes: vec![full_set::<Digit<MIN, MAX>>(); board.houses().boxes()].into_boxed_slice(),
            row_attr: Attribution::new(ROW_CONFLICT_ATTRIBUTION).unwrap(),
            col_attr: Attribution::new(COL_CONFLICT_ATTRIBUTION).unwrap(),
            box_attr: Attribution::new(BOX_CONFLICT_ATTRIBUTION).unwrap(),
            no_digit_attr: Attribution::new(NO_DIGIT_ATTRIBUTION).unwrap(),
            naked_single_attr: Attribution::new(NAKED_SINGLE_ATTRIBUTION).unwrap(),
            illegal: IllegalMove::new(),
        }
    }

    /// Still-available digits at a cell, as the intersection of its three
    /// houses.
    fn available(&self, cell: Cell) -> UVSet<u8> {
        let b = self.houses.box_of(cell);
        let mut avail = self.row[cell[0]].intersection(&self.col[cell[1]]);
        avail.intersect_with(&self.boxes[b]);
        avail
    }
}

fn unpack_digits<const MIN: u8, const MAX: u8>(s: &UVSet<u8>) -> Vec<u8> {
    s.iter().map(|u| to_value::<Digit<MIN, MAX>>(u).val()).collect()
}

impl <const N: usize, const M: usize, const MIN: u8, const MAX: u8>
Debug for HouseChecker<N, M, MIN, MAX> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.illegal.write_dbg(f)?;
        write!(f, "Unused digits by row:\n")?;
        for r in 0..N {
            write!(f, " {}: {:?}\n", r, unpack_digits::<MIN, MAX>(&self.row[r]))?;
        }
        write!(f, "Unused digits by col:\n")?;
        for c in 0..M {
            write!(f, " {}: {:?}\n", c, unpack_digits::<MIN, MAX>(&self.col[c]))?;
        }
        write!(f, "Unused digits by box:\n")?;
        for b in 0..self.houses.boxes() {
            write!(f, " {}: {:?}\n", b, unpack_digits::<MIN, MAX>(&self.boxes[b]))?;
        }
        Ok(())
    }
}

impl <const N: usize, const M: usize, const MIN: u8, const MAX: u8>
Stateful<Cell, Digit<MIN, MAX>> for HouseChecker<N, M, MIN, MAX> {
    fn reset(&mut self) {
        self.row = std::array::from_fn(|_| full_set::<Digit<MIN, MAX>>());
        self.col = std::array::from_fn(|_| full_set::<Digit<MIN, MAX>>());
        self.boxes = vec![full_set::<Digit<MIN, MAX>>(); self.houses.boxes()].into_boxed_slice();
        self.illegal.reset();
    }

    fn apply(&mut self, cell: Cell, value: Digit<MIN, MAX>) -> Result<(), Error> {
        // In theory we could allow multiple illegal moves and just
        // invalidate and recalculate the masks or something, but it seems
        // hard.
        self.illegal.check_unset()?;
        let uv = value.to_uval();
        let b = self.houses.box_of(cell);
        if !self.row[cell[0]].contains(uv) {
            self.illegal.set(cell, value, self.row_attr);
            return Ok(());
        } else if !self.col[cell[1]].contains(uv) {
            self.illegal.set(cell, value, self.col_attr);
            return Ok(());
        } else if !self.boxes[b].contains(uv) {
            self.illegal.set(cell, value, self.box_attr);
            return Ok(());
        }
        self.row[cell[0]].remove(uv);
        self.col[cell[1]].remove(uv);
        self.boxes[b].remove(uv);
        Ok(())
    }

    fn undo(&mut self, cell: Cell, value: Digit<MIN, MAX>) -> Result<(), Error> {
        if self.illegal.undo(cell, value)? {
            return Ok(());
        }
        let uv = value.to_uval();
        let b = self.houses.box_of(cell);
        self.row[cell[0]].insert(uv);
        self.col[cell[1]].insert(uv);
        self.boxes[b].insert(uv);
        Ok(())
    }
}

impl <const N: usize, const M: usize, const MIN: u8, const MAX: u8>
Constraint<Digit<MIN, MAX>, Board<N, M, MIN, MAX>> for HouseChecker<N, M, MIN, MAX> {
    fn check(&self, board: &Board<N, M, MIN, MAX>) -> ConstraintResult<Cell, Digit<MIN, MAX>> {
        if let Some(contradiction) = self.illegal.to_contradiction() {
            return contradiction;
        }
        for r in 0..N {
            for c in 0..M {
                if board.get([r, c]).is_some() {
                    continue;
                }
                let avail = self.available([r, c]);
                if avail.is_empty() {
                    return ConstraintResult::Contradiction(self.no_digit_attr);
                } else if avail.len() == 1 {
                    let v: Digit<MIN, MAX> = to_value(avail.iter().next().unwrap());
                    return ConstraintResult::Certainty(
                        CertainDecision::new([r, c], v),
                        self.naked_single_attr,
                    );
                }
            }
        }
        ConstraintResult::Ok
    }

    fn allows(&self, _: &Board<N, M, MIN, MAX>, cell: Cell, value: Digit<MIN, MAX>) -> bool {
        let uv = value.to_uval();
        self.row[cell[0]].contains(uv)
            && self.col[cell[1]].contains(uv)
            && self.boxes[self.houses.box_of(cell)].contains(uv)
    }

    fn candidates(&self, _: &Board<N, M, MIN, MAX>, cell: Cell) -> Vec<Digit<MIN, MAX>> {
        self.available(cell).iter().map(to_value).collect()
    }

    fn debug_at(&self, _: &Board<N, M, MIN, MAX>, cell: Cell) -> Option<String> {
        if let Some(s) = self.illegal.debug_at(cell) {
            return Some(format!("HouseChecker:\n  {}", s));
        }
        Some(format!(
            "HouseChecker:\n  available: {:?}",
            unpack_digits::<MIN, MAX>(&self.available(cell)),
        ))
    }
}

pub type NineDigit = Digit<1, 9>;
pub type NineBoard = Board<9, 9, 1, 9>;
pub type SixDigit = Digit<1, 6>;
pub type SixBoard = Board<6, 6, 1, 6>;
pub type FourDigit = Digit<1, 4>;
pub type FourBoard = Board<4, 4, 1, 4>;

pub fn parse_nine(s: &str) -> Result<NineBoard, Error> {
    NineBoard::parse(s, nine_houses())
}
pub fn parse_six(s: &str) -> Result<SixBoard, Error> {
    SixBoard::parse(s, six_houses())
}
pub fn parse_four(s: &str) -> Result<FourBoard, Error> {
    FourBoard::parse(s, four_houses())
}

/// Solve in place with the minimum-remaining-candidates selector. Returns
/// whether a solution was found; on success the board holds it.
pub fn solve<const N: usize, const M: usize, const MIN: u8, const MAX: u8>(
    board: &mut Board<N, M, MIN, MAX>,
) -> Result<bool, Error> {
    let selector = MinRemaining;
    let mut checker = HouseChecker::new(board);
    let mut finder = FindFirst::new(board, &selector, &mut checker, None);
    Ok(finder.solve()?.is_some())
}

/// Enumerate every completion of the board, in discovery order.
pub fn enumerate<const N: usize, const M: usize, const MIN: u8, const MAX: u8>(
    board: &mut Board<N, M, MIN, MAX>,
) -> Result<Vec<Vec<Vec<u8>>>, Error> {
    let selector = MinRemaining;
    let mut checker = HouseChecker::new(board);
    let mut finder = FindAll::new(board, &selector, &mut checker, None);
    finder.solve_all()?;
    Ok(finder.into_solutions())
}
