// Copyright 2018 Steven Bosnick
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE-2.0 or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms

// Positions of the linearized regular expression, packed into 64 bits.
//
// The packed layout is part of the compiler's state identity: position sets
// compare and deduplicate by the packed values, so the field placement is
// observable and fixed:
//
//   bits  0-15  loc     source location, or the sub-pattern index when the
//                       ACCEPT flag is set
//   bits 16-31  iter    iteration tag distinguishing the unrolled copies of
//                       a bounded repeat
//   bit  44     TICKED  the position sits on the tail side of a trailing
//                       context X/Y
//   bit  45     GREEDY  the position belongs to a greedy quantifier and
//                       refuses lazy tags
//   bit  46     ANCHOR  the position is an anchored-start boundary
//   bit  47     ACCEPT  the position marks a final state
//   bits 48-63  lazy    source location of the governing lazy quantifier,
//                       or 0 for none
//
// Keeping lazy in the top bits makes every lazy-tagged position sort after
// every untagged one, which the lazy trimming pass in the subset
// construction relies on.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// An index into the regular expression source text.
pub type Location = u32;

const LOC_MASK: u64 = 0xffff;
const ITER_MASK: u64 = 0xffff_0000;
const TICKED: u64 = 1 << 44;
const GREEDY: u64 = 1 << 45;
const ANCHOR: u64 = 1 << 46;
const ACCEPT: u64 = 1 << 47;
const LAZY_SHIFT: u64 = 48;
const POS_MASK: u64 = 0xffff_ffff;

/// A packed position of the linearized regular expression.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(u64);

impl Position {
    pub fn new(loc: Location) -> Position {
        debug_assert!(u64::from(loc) <= LOC_MASK);
        Position(u64::from(loc) & LOC_MASK)
    }

    /// The source location, or the sub-pattern index of an accept position.
    pub fn loc(&self) -> Location {
        (self.0 & LOC_MASK) as Location
    }

    /// The sub-pattern index carried by an accept position.
    pub fn accepts(&self) -> u16 {
        (self.0 & LOC_MASK) as u16
    }

    pub fn iter(&self) -> u16 {
        ((self.0 & ITER_MASK) >> 16) as u16
    }

    pub fn with_iter(&self, iter: u16) -> Position {
        Position((self.0 & !ITER_MASK) | (u64::from(iter) << 16))
    }

    pub fn is_ticked(&self) -> bool {
        self.0 & TICKED != 0
    }

    pub fn ticked(&self, on: bool) -> Position {
        Position(if on { self.0 | TICKED } else { self.0 & !TICKED })
    }

    pub fn is_greedy(&self) -> bool {
        self.0 & GREEDY != 0
    }

    pub fn greedy(&self, on: bool) -> Position {
        Position(if on { self.0 | GREEDY } else { self.0 & !GREEDY })
    }

    pub fn is_anchor(&self) -> bool {
        self.0 & ANCHOR != 0
    }

    pub fn anchor(&self, on: bool) -> Position {
        Position(if on { self.0 | ANCHOR } else { self.0 & !ANCHOR })
    }

    pub fn is_accept(&self) -> bool {
        self.0 & ACCEPT != 0
    }

    pub fn accept(&self, on: bool) -> Position {
        Position(if on { self.0 | ACCEPT } else { self.0 & !ACCEPT })
    }

    /// The location of the governing lazy quantifier, or 0 for none.
    pub fn lazy(&self) -> Location {
        (self.0 >> LAZY_SHIFT) as Location
    }

    pub fn lazy_at(&self, loc: Location) -> Position {
        debug_assert!(u64::from(loc) <= LOC_MASK);
        Position((self.0 & !(LOC_MASK << LAZY_SHIFT)) | (u64::from(loc) << LAZY_SHIFT))
    }

    /// Strip the flag and lazy fields, keeping loc and iter only.
    ///
    /// This is the form the follow map is keyed by: followers of a position
    /// do not depend on how the position is flagged inside a state.
    pub fn pos(&self) -> Position {
        Position(self.0 & POS_MASK)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.loc())?;
        if self.iter() != 0 {
            write!(f, ".{}", self.iter())?;
        }
        if self.is_accept() {
            write!(f, "#")?;
        }
        if self.is_anchor() {
            write!(f, "^")?;
        }
        if self.is_greedy() {
            write!(f, "!")?;
        }
        if self.is_ticked() {
            write!(f, "'")?;
        }
        if self.lazy() != 0 {
            write!(f, "?{}", self.lazy())?;
        }
        Ok(())
    }
}

/// An ordered set of positions; the identity of a DFA state.
pub type Positions = BTreeSet<Position>;

/// The follow map: for every position, the positions that may come next.
pub type Follow = BTreeMap<Position, Positions>;
