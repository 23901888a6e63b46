// Copyright 2018 Steven Bosnick
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE-2.0 or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms

//! The compiled pattern and its construction entry points.
//!
//! A [`Pattern`] owns the opcode table compiled from a regular expression
//! together with the metadata a matcher engine and its host need: how many
//! sub-patterns the pattern unites, their source text, which of them are
//! reachable, and the size of the automaton. A pattern is immutable once
//! constructed and can be shared across threads.
//!
//! [`Pattern`]: struct.Pattern.html

use std::borrow::Cow;

use compile;
use encode;
use error::Result;
use opcode::{self, Index, Opcode};
use options::Options;
use parser::{Parser, Scanner};
use position::Location;

/// A regular expression compiled into a DFA opcode table.
///
/// The lifetime parameter tracks an adopted opcode table: a pattern built
/// by [`new`], [`with_options`] or [`compile`] owns its table and is
/// `Pattern<'static>`, while [`from_opcodes`] borrows the caller's table.
///
/// [`new`]: #method.new
/// [`with_options`]: #method.with_options
/// [`compile`]: #method.compile
/// [`from_opcodes`]: #method.from_opcodes
#[derive(Debug)]
pub struct Pattern<'a> {
    rex: String,
    end: Vec<Location>,
    subs: Index,
    acc: Vec<bool>,
    vno: usize,
    eno: usize,
    opc: Cow<'a, [Opcode]>,
}

impl Pattern<'static> {
    /// Compile a pattern with default options.
    pub fn new(regex: &str) -> Result<Pattern<'static>> {
        Pattern::compile(regex, &Options::default())
    }

    /// Compile a pattern with options given as an option string.
    ///
    /// See [`Options::parse`] for the option string format.
    ///
    /// [`Options::parse`]: ../options/struct.Options.html#method.parse
    pub fn with_options(regex: &str, options: &str) -> Result<Pattern<'static>> {
        Pattern::compile(regex, &Options::parse(options)?)
    }

    /// Compile a pattern with an explicit options record.
    ///
    /// On failure no partial pattern is observable; when `Options::w` is
    /// set the error is also written to standard error.
    pub fn compile(regex: &str, opt: &Options) -> Result<Pattern<'static>> {
        match Pattern::build(regex, opt) {
            Ok(pattern) => Ok(pattern),
            Err(err) => {
                if opt.w {
                    eprintln!("{}", err);
                }
                Err(err)
            }
        }
    }

    fn build(regex: &str, opt: &Options) -> Result<Pattern<'static>> {
        debug!("compiling pattern {:?}", regex);
        let parsed = Parser::new(regex, opt).parse()?;
        let mut acc = vec![false; parsed.end.len()];
        let scan = Scanner::new(regex, opt);
        let dfa = compile::compile(&scan, &parsed, &mut acc)?;
        let code = encode::encode(&dfa, regex)?;
        encode::export(&dfa, &code, opt);
        Ok(Pattern {
            rex: regex.to_string(),
            subs: parsed.end.len() as Index,
            end: parsed.end,
            acc,
            vno: dfa.states.len(),
            eno: dfa.edge_count,
            opc: Cow::Owned(code),
        })
    }
}

impl<'a> Pattern<'a> {
    /// Adopt a pre-compiled opcode table.
    ///
    /// The table is borrowed, not copied; the caller keeps it alive for
    /// the pattern's lifetime. Only the opcode words, the sub-pattern
    /// count and reachability are available on such a pattern: the source
    /// text is not retained, and the node and edge counts report 0.
    pub fn from_opcodes(code: &'a [Opcode]) -> Pattern<'a> {
        let mut subs: Index = 0;
        for &op in code {
            if opcode::is_take(op) && !opcode::is_redo(op) && opcode::index_of(op) > subs {
                subs = opcode::index_of(op);
            }
        }
        let mut acc = vec![false; usize::from(subs)];
        for &op in code {
            if opcode::is_take(op) && !opcode::is_redo(op) {
                acc[usize::from(opcode::index_of(op)) - 1] = true;
            }
        }
        Pattern {
            rex: String::new(),
            end: Vec::new(),
            subs,
            acc,
            vno: 0,
            eno: 0,
            opc: Cow::Borrowed(code),
        }
    }

    /// The number of sub-patterns (top-level alternatives), numbered from
    /// 1.
    pub fn size(&self) -> Index {
        self.subs
    }

    /// The source text of sub-pattern `choice`, or `""` when `choice` is
    /// out of range or the pattern was adopted from an opcode table.
    pub fn subpattern(&self, choice: Index) -> &str {
        if choice == 0 || usize::from(choice) > self.end.len() {
            return "";
        }
        let hi = self.end[usize::from(choice) - 1] as usize;
        let lo = if choice == 1 {
            0
        } else {
            self.end[usize::from(choice) - 2] as usize + 1
        };
        &self.rex[lo..hi]
    }

    /// Check whether some input can reach an accept for sub-pattern
    /// `choice`.
    pub fn reachable(&self, choice: Index) -> bool {
        choice >= 1
            && usize::from(choice) <= self.acc.len()
            && self.acc[usize::from(choice) - 1]
    }

    /// The number of DFA states, or 0 for an adopted pattern.
    pub fn nodes(&self) -> usize {
        self.vno
    }

    /// The number of DFA transitions, or 0 for an adopted pattern.
    pub fn edges(&self) -> usize {
        self.eno
    }

    /// The size of the opcode table in words.
    pub fn words(&self) -> usize {
        self.opc.len()
    }

    /// The opcode table for matcher consumption.
    pub fn opcodes(&self) -> &[Opcode] {
        &self.opc
    }
}
