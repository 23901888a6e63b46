// Copyright 2018 Steven Bosnick
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE-2.0 or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms

//! A library for compiling lexer-style regular expressions into compact
//! deterministic finite automaton opcode tables.
//!
//! The compiler implements the position-set construction of Aho, Sethi and
//! Ullman (firstpos/lastpos/followpos over a linearized regular expression)
//! followed by a subset construction that is specialized for lexing: one
//! pattern is the `|`-separated union of sub-patterns numbered from 1, each
//! accepting state remembers which sub-pattern it accepts, quantifiers may
//! be lazy as well as greedy, and a trailing context `X/Y` matches `X` only
//! when followed by `Y` without consuming `Y`.
//!
//! The result of a compilation is a [`Pattern`]: an immutable opcode array
//! plus metadata, ready to be executed by a table-driven matcher engine.
//!
//! ```
//! use lexpat::Pattern;
//!
//! let pattern = Pattern::new("if|else|[a-z]+").unwrap();
//! assert_eq!(pattern.size(), 3);
//! assert_eq!(pattern.subpattern(2), "else");
//! ```
//!
//! [`Pattern`]: pattern/struct.Pattern.html

#![deny(missing_docs)]

extern crate arrayvec;
#[macro_use]
extern crate failure;
extern crate indexmap;
extern crate itertools;
#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate assert_matches;

#[cfg(test)]
#[macro_use]
extern crate proptest;

pub mod alphabet;
pub mod error;
pub mod opcode;
pub mod options;
pub mod pattern;
pub mod utf8;

mod compile;
mod encode;
mod intervals;
mod parser;
mod position;

pub use error::{ErrorKind, PatternError, Result};
pub use options::Options;
pub use pattern::Pattern;
pub use position::Location;
pub use utf8::utf8;
