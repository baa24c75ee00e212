use std::collections::HashMap;
use std::sync::Mutex;
use std::{borrow::Cow, marker::PhantomData};
use std::fmt::{Debug, Display};
use bit_set::BitSet;
use num::{PrimInt, Unsigned};

/// Error type. This is used to indicate something wrong with either the
/// input/space/constraints or with the algorithm itself. Violations of
/// constraints or exhaustion of the search space are not errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Error(Cow<'static, str>);
impl Error {
    pub const fn new_const(s: &'static str) -> Self {
        Error(Cow::Borrowed(s))
    }

    pub fn new<S: Into<String>>(s: S) -> Self {
        Error(Cow::Owned(s.into()))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bound on the values the engine branches over. Nothing more than the
/// obvious: cheap to copy, printable, comparable. Values that additionally
/// live in packed containers implement [`Value`] on top of this.
pub trait Choice: Copy + Clone + Display + Debug + PartialEq + Eq {}
impl <T: Copy + Clone + Display + Debug + PartialEq + Eq> Choice for T {}

pub trait UInt: PrimInt + Unsigned + TryInto<usize> + Debug {
    fn from_usize(u: usize) -> Self;
    fn as_usize(&self) -> usize;
}
impl UInt for u8 {
    fn from_usize(u: usize) -> Self { u.try_into().unwrap() }
    fn as_usize(&self) -> usize { *self as usize }
}
impl UInt for u16 {
    fn from_usize(u: usize) -> Self { u.try_into().unwrap() }
    fn as_usize(&self) -> usize { *self as usize }
}
impl UInt for u32 {
    fn from_usize(u: usize) -> Self { u.try_into().unwrap() }
    fn as_usize(&self) -> usize { *self as usize }
}

// Packed values are represented as unsigned integers, but containers should
// not hand them out as such. Instead of directly exposing UInts, we use a
// wrapper to avoid accidental misuse: These aren't the values you're looking
// for! They are just for containers that need to store them!
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UVWrapped;
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UVUnwrapped;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UVal<U: UInt, S> {
    u: U,
    _state: PhantomData<S>,
}

impl <U: UInt> UVal<U, UVWrapped> {
    pub fn new(v: U) -> Self {
        UVal { u: v, _state: PhantomData }
    }

    pub(self) fn unwrap(self) -> UVal<U, UVUnwrapped> {
        UVal { u: self.u, _state: PhantomData }
    }
}

impl <U: UInt> UVal<U, UVUnwrapped> {
    pub fn value(&self) -> U {
        self.u
    }
}

/// Values drawn from a small finite domain, packable into [`UVSet`]s and
/// [`UVGrid`]s. It's entirely up to the Value, Space, and Constraint
/// implementations to interpret the underlying integers.
pub trait Value: Choice {
    type U: UInt;

    fn cardinality() -> usize;
    fn possibilities() -> Vec<Self>;
    fn parse(s: &str) -> Result<Self, Error>;

    fn from_uval(u: UVal<Self::U, UVUnwrapped>) -> Self;
    fn to_uval(self) -> UVal<Self::U, UVWrapped>;
}

/// This converts an extracted item from a container to a Value, making use of
/// the private API to do so.
pub fn to_value<V: Value>(u: UVal<V::U, UVWrapped>) -> V {
    V::from_uval(u.unwrap())
}

/// Rectangular grid of optional packed values; the underlying storage for
/// board-shaped spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct UVGrid<U: UInt> {
    rows: usize,
    cols: usize,
    grid: Box<[Option<U>]>,
}

impl<U: UInt> UVGrid<U> {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            grid: vec![None; rows * cols].into_boxed_slice(),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<UVal<U, UVWrapped>> {
        self.grid[row * self.cols + col].map(|v| UVal::new(v))
    }

    pub fn set(&mut self, row: usize, col: usize, value: Option<UVal<U, UVWrapped>>) {
        self.grid[row * self.cols + col] = value.map(|v| v.unwrap().value());
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}

/// A set of packed values (e.g., that are still available, that have been
/// seen, etc.), represented as a bitset over the domain.
#[derive(Debug, Clone, PartialEq)]
pub struct UVSet<U: UInt> {
    s: BitSet,
    _marker: PhantomData<U>,
}

pub fn empty_set<V: Value>() -> UVSet<V::U> {
    UVSet {
        s: BitSet::with_capacity(V::cardinality()),
        _marker: PhantomData,
    }
}

fn leading_ones(n: usize) -> Vec<u8> {
    let full = n / 8;
    let remaining = n % 8;
    let mut result = vec![u8::MAX; full];
    if remaining > 0 {
        result.push(u8::MAX << (8 - remaining));
    }
    result
}

pub fn full_set<V: Value>() -> UVSet<V::U> {
    let n = V::cardinality();
    let mut s = UVSet {
        s: BitSet::with_capacity(n),
        _marker: PhantomData,
    };
    let ones = leading_ones(n);
    s.s.union_with(&BitSet::from_bytes(ones.as_slice()));
    s
}

pub fn singleton_set<V: Value>(v: V) -> UVSet<V::U> {
    let mut s = empty_set::<V>();
    s.insert(v.to_uval());
    s
}

pub fn pack_values<V: Value>(vals: &[V]) -> UVSet<V::U> {
    let mut res = empty_set::<V>();
    for v in vals {
        res.insert(v.to_uval());
    }
    res
}

pub fn unpack_values<V: Value>(s: &UVSet<V::U>) -> Vec<V> {
    s.iter().map(|u| { to_value::<V>(u) }).collect::<Vec<_>>()
}

impl <U: UInt> UVSet<U> {
    pub fn insert(&mut self, value: UVal<U, UVWrapped>) {
        self.s.insert(value.unwrap().value().as_usize());
    }

    pub fn remove(&mut self, value: UVal<U, UVWrapped>) {
        self.s.remove(value.unwrap().value().as_usize());
    }

    pub fn contains(&self, value: UVal<U, UVWrapped>) -> bool {
        self.s.contains(value.unwrap().value().as_usize())
    }

    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }

    pub fn len(&self) -> usize {
        self.s.len()
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = UVal<U, UVWrapped>> + 'a {
        self.s.iter().map(|i| UVal::new(U::from_usize(i)))
    }

    pub fn intersect_with(&mut self, other: &UVSet<U>) {
        self.s.intersect_with(&other.s);
    }

    pub fn intersection(&self, other: &UVSet<U>) -> UVSet<U> {
        let mut i = self.clone();
        i.s.intersect_with(&other.s);
        i
    }
}

struct ConstStringRegistry {
    mapping: HashMap<&'static str, usize>,
    next_id: usize,
}

impl ConstStringRegistry {
    pub fn new() -> Self { Self { mapping: HashMap::new(), next_id: 0 } }
    pub fn register(&mut self, name: &'static str) -> usize {
        if let Some(id) = self.mapping.get(name) {
            *id
        } else {
            let id = self.next_id;
            self.mapping.insert(name, id);
            self.next_id += 1;
            id
        }
    }
    pub fn name(&self, id: usize) -> Option<&'static str> {
        for (name, registered_id) in self.mapping.iter() {
            if *registered_id == id {
                return Some(name);
            }
        }
        None
    }
}

lazy_static::lazy_static! {
    static ref ATTRIBUTION_REGISTRY: Mutex<ConstStringRegistry> = {
        Mutex::new(ConstStringRegistry::new())
    };
}

const EMPTY_ATTRIBUTION_NAME: Error = Error::new_const("Attribution names must be non-empty");

/// An interned compile-time name, attached to contradictions and decisions so
/// that both can be traced back to whatever reported them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribution {
    name: &'static str,
    id: usize,
}

impl Attribution {
    pub fn new(name: &'static str) -> Result<Self, Error> {
        if name.is_empty() {
            return Err(EMPTY_ATTRIBUTION_NAME);
        }
        let id = ATTRIBUTION_REGISTRY.lock().unwrap().register(name);
        Ok(Attribution { name, id })
    }

    pub fn name(&self) -> &'static str { self.name }
    pub fn id(&self) -> usize { self.id }
}

// NOTE: This is an expensive operation, so only use it for human-interface
// purposes (e.g., debugging, logging, etc.) and not during the solving
// process.
pub fn readable_attribution(id: usize) -> Option<&'static str> {
    ATTRIBUTION_REGISTRY.lock().unwrap().name(id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertainDecision<X: Copy, V: Choice> {
    pub slot: X,
    pub value: V,
}

impl <X: Copy, V: Choice> CertainDecision<X, V> {
    pub fn new(slot: X, value: V) -> Self {
        Self { slot, value }
    }
}

/// Constraint checks may hit upon either a contradiction or a certainty
/// before the selector is ever consulted. This is a simple enum to represent
/// this short-circuiting.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintResult<X: Copy, V: Choice> {
    Contradiction(Attribution),
    Certainty(CertainDecision<X, V>, Attribution),
    Ok,
}

/// A decision point in the search. This includes the specific value that was
/// chosen, the slot that was modified, and the alternative values that have
/// not been tried yet.
#[derive(Debug, Clone)]
pub enum BranchOver<X: Copy, V: Choice> {
    Empty,
    Slot(X, Vec<V>, usize),
}

#[derive(Debug, Clone)]
pub struct BranchPoint<X: Copy, V: Choice> {
    pub branch_step: usize,
    pub branch_attribution: Attribution,
    pub choices: BranchOver<X, V>,
}

impl <X: Copy, V: Choice> BranchPoint<X, V> {
    pub fn unique(step: usize, attribution: Attribution, slot: X, value: V) -> Self {
        Self::for_slot(step, attribution, slot, vec![value])
    }

    pub fn empty(step: usize, attribution: Attribution) -> Self {
        BranchPoint { branch_step: step, branch_attribution: attribution, choices: BranchOver::Empty }
    }

    pub fn for_slot(step: usize, attribution: Attribution, slot: X, values: Vec<V>) -> Self {
        if values.is_empty() {
            panic!("Cannot create a BranchPoint for a slot with no values");
        }
        BranchPoint {
            branch_step: step,
            branch_attribution: attribution,
            choices: BranchOver::Slot(slot, values, 0),
        }
    }

    pub fn chosen(&self) -> Option<(X, V)> {
        match &self.choices {
            BranchOver::Empty => None,
            BranchOver::Slot(x, vs, i) => Some((*x, vs[*i])),
        }
    }

    pub fn remaining(&self) -> usize {
        match &self.choices {
            BranchOver::Empty => 0,
            BranchOver::Slot(_, vs, i) => vs.len() - 1 - i,
        }
    }

    pub fn advance(&mut self) -> Option<(X, V)> {
        match &mut self.choices {
            BranchOver::Empty => None,
            BranchOver::Slot(slot, values, i) => {
                if *i < values.len() - 1 {
                    *i += 1;
                    Some((*slot, values[*i]))
                } else {
                    None
                }
            },
        }
    }

    // Opposite of advance. Returns true if this decision should be
    // re-applied, or false if it should be left off the stack.
    pub fn retreat(&mut self) -> bool {
        match &mut self.choices {
            BranchOver::Empty => false,
            BranchOver::Slot(_, _, i) => {
                if *i == 0 {
                    false
                } else {
                    *i -= 1;
                    true
                }
            },
        }
    }
}

/// The space itself as well as other components can be stateful (i.e., they
/// respond to actions taken during the search). The trait provides a default
/// do-nothing implementation so that non-stateful components that are
/// required to be stateful for some reason can be trivially stateful.
pub trait Stateful<X: Copy, V: Choice> {
    fn reset(&mut self) {}
    fn apply(&mut self, slot: X, value: V) -> Result<(), Error> {
        let _ = slot;
        let _ = value;
        Ok(())
    }
    fn undo(&mut self, slot: X, value: V) -> Result<(), Error> {
        let _ = slot;
        let _ = value;
        Ok(())
    }
}

/// Trait for representing whatever is being solved or enumerated in its
/// current state of being (partially) filled in: a board being completed, a
/// combination being extended, a string being cut into pieces. The search
/// engine drives it exclusively through this interface.
pub trait Space<V: Choice> where Self: Debug + Stateful<Self::Slot, V> {
    /// Where the next choice goes. A grid cell for board problems, a cursor
    /// for sequence problems.
    type Slot: Copy + PartialEq + Debug;
    /// An owned copy of a completed assignment, safe to keep after the
    /// search moves on.
    type Solution: Clone + PartialEq + Debug;

    /// The slots still awaiting a choice, in default visiting order. Empty
    /// means the state is complete.
    fn open_slots(&self) -> Vec<Self::Slot>;
    /// Pre-filled entries to replay through the engine before the search
    /// proper begins.
    fn given_actions(&self) -> Vec<(Self::Slot, V)>;
    fn snapshot(&self) -> Self::Solution;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;

    /// Values for use in testing; digits 1-9 on a line.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct LineVal(pub u8);
    impl Display for LineVal {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }
    impl Value for LineVal {
        type U = u8;
        fn parse(s: &str) -> Result<Self, Error> {
            match s.parse::<u8>() {
                Ok(u) if (1..=9).contains(&u) => Ok(Self(u)),
                _ => Err(Error::new_const("not a digit 1-9")),
            }
        }
        fn cardinality() -> usize { 9 }
        fn possibilities() -> Vec<Self> { (1..=9).map(LineVal).collect() }
        fn from_uval(u: UVal<u8, UVUnwrapped>) -> Self { LineVal(u.value()+1) }
        fn to_uval(self) -> UVal<u8, UVWrapped> { UVal::new(self.0-1) }
    }

    /// Trivial one-dimensional space: N cells on a line, slots visited left
    /// to right.
    #[derive(Debug, Clone)]
    pub struct LineSpace<const N: usize> {
        pub grid: UVGrid<u8>,
    }

    impl <const N: usize> LineSpace<N> {
        pub fn new() -> Self { Self { grid: UVGrid::new(1, N) } }

        pub fn get(&self, i: usize) -> Option<LineVal> {
            self.grid.get(0, i).map(to_value)
        }

        pub fn to_string(&self) -> String {
            (0..N).map(|i| {
                if let Some(v) = self.get(i) {
                    format!("{}", v.0)
                } else {
                    ".".to_string()
                }
            }).collect::<Vec<_>>().join("")
        }
    }

    impl <const N: usize> Stateful<usize, LineVal> for LineSpace<N> {
        fn reset(&mut self) { self.grid = UVGrid::new(1, N); }
        fn apply(&mut self, slot: usize, value: LineVal) -> Result<(), Error> {
            if self.grid.get(0, slot).is_some() {
                return Err(Error::new_const("Cell already filled"));
            }
            self.grid.set(0, slot, Some(value.to_uval()));
            Ok(())
        }
        fn undo(&mut self, slot: usize, value: LineVal) -> Result<(), Error> {
            match self.grid.get(0, slot) {
                Some(v) if v == value.to_uval() => {},
                _ => return Err(Error::new_const("Undo value mismatch")),
            }
            self.grid.set(0, slot, None);
            Ok(())
        }
    }

    impl <const N: usize> Space<LineVal> for LineSpace<N> {
        type Slot = usize;
        type Solution = String;
        fn open_slots(&self) -> Vec<usize> {
            (0..N).filter(|i| self.get(*i).is_none()).collect()
        }
        fn given_actions(&self) -> Vec<(usize, LineVal)> { vec![] }
        fn snapshot(&self) -> String { self.to_string() }
    }

    /// Unwrapping UVals is private to the core module, but it's valuable to
    /// check that the to_uval/from_uval methods successfully round-trip
    /// values.
    pub fn round_trip_value<V: Value>(v: V) -> V {
        let u: UVal<V::U, UVWrapped> = v.to_uval();
        V::from_uval(u.unwrap())
    }
}
