// Copyright 2018 Steven Bosnick
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE-2.0 or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms

// The regular expression parser.
//
// Four recursive descent levels build the position-set view of the pattern
// directly, without an intermediate syntax tree: parse1 handles alternation
// inside groups, parse2 concatenation (and the X/Y trailing context split),
// parse3 quantifiers and parse4 atoms. Each level returns a Frag carrying
// the firstpos/lastpos/nullable triple of the fragment it consumed, while
// follow links, modifier scopes and lookahead regions accumulate on the
// Parser itself.
//
// The parser creates a Position for every consuming atom and for every
// zero-width boundary; the character set an atom stands for is not stored
// but recomputed from the source text during subset construction (see
// Scanner::chars_at). That keeps positions down to one packed word each,
// and it is why the scanning helpers here are shared with the compile pass.

use std::cmp;
use std::collections::{BTreeMap, BTreeSet};

use alphabet::{self, Char, CharSet, META_BOB, META_BOL, META_BWB, META_BWE, META_DED, META_EOB,
               META_EOL, META_EWB, META_EWE, META_IND, META_NWB, META_NWE};
use error::{ErrorKind, PatternError, Result};
use intervals::Ranges;
use opcode::{Index, IMAX};
use options::Options;
use position::{Follow, Location, Position, Positions};

/// Scope ranges of the scoped modifiers, keyed by the modifier letter.
pub type Modifiers = BTreeMap<u8, Ranges>;

/// A trailing context region: where the lookahead part of an alternative
/// lives in the source, and at which locations it can begin.
#[derive(Clone, Debug, Default)]
pub struct LookAhead {
    pub span: Ranges,
    pub first: BTreeSet<Location>,
}

/// Everything the parse pass produces for the compile pass.
#[derive(Debug, Default)]
pub struct Parsed {
    pub startpos: Positions,
    pub follow: Follow,
    pub modifiers: Modifiers,
    pub lookahead: BTreeMap<Index, LookAhead>,
    pub end: Vec<Location>,
    pub redo: BTreeSet<Index>,
}

/// The result of parsing one fragment of the pattern.
struct Frag {
    first: Positions,
    last: Positions,
    nullable: bool,
    lazypos: Positions,
    copies: u16,
    is_anchor: bool,
}

impl Frag {
    fn empty() -> Frag {
        Frag {
            first: Positions::new(),
            last: Positions::new(),
            nullable: true,
            lazypos: Positions::new(),
            copies: 1,
            is_anchor: false,
        }
    }

    fn atom(p: Position) -> Frag {
        let mut first = Positions::new();
        first.insert(p);
        Frag {
            last: first.clone(),
            first,
            nullable: false,
            lazypos: Positions::new(),
            copies: 1,
            is_anchor: false,
        }
    }

    fn anchor(p: Position) -> Frag {
        let mut frag = Frag::atom(p);
        frag.is_anchor = true;
        frag
    }
}

/// A zero-width boundary named by an escape or anchor atom.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    Word,
    NonWord,
    WordBegin,
    WordEnd,
    BufferBegin,
    BufferEnd,
    Indent,
    Dedent,
}

impl Boundary {
    /// The meta character set for this boundary, picked for a position at
    /// the begin of a pattern or elsewhere.
    pub fn chars(self, at_begin: bool) -> CharSet {
        let mut set = CharSet::new();
        match (self, at_begin) {
            (Boundary::Word, true) => {
                set.insert(META_BWB);
                set.insert(META_EWB);
            }
            (Boundary::Word, false) => {
                set.insert(META_BWE);
                set.insert(META_EWE);
            }
            (Boundary::NonWord, true) => set.insert(META_NWB),
            (Boundary::NonWord, false) => set.insert(META_NWE),
            (Boundary::WordBegin, true) => set.insert(META_BWB),
            (Boundary::WordBegin, false) => set.insert(META_BWE),
            (Boundary::WordEnd, true) => set.insert(META_EWB),
            (Boundary::WordEnd, false) => set.insert(META_EWE),
            (Boundary::BufferBegin, _) => set.insert(META_BOB),
            (Boundary::BufferEnd, _) => set.insert(META_EOB),
            (Boundary::Indent, _) => set.insert(META_IND),
            (Boundary::Dedent, _) => set.insert(META_DED),
        }
        set
    }
}

/// A decoded escape sequence.
#[derive(Debug)]
pub enum Esc {
    /// A literal byte, `\n` or `\x41`.
    Byte(u8),
    /// A class shorthand, `\d` or `\W`.
    Class(CharSet),
    /// A zero-width boundary, `\b` or `\A`.
    Meta(Boundary),
}

enum Item {
    Byte(u8),
    Set(CharSet),
}

/// Read-only scanning over the pattern source, shared by the parse and
/// compile passes.
pub struct Scanner<'a> {
    pub rex: &'a str,
    pub opt: &'a Options,
}

impl<'a> Scanner<'a> {
    pub fn new(rex: &'a str, opt: &'a Options) -> Scanner<'a> {
        Scanner { rex, opt }
    }

    /// The byte at `loc`, or 0 past the end of the pattern.
    pub fn at(&self, loc: Location) -> u8 {
        self.rex.as_bytes().get(loc as usize).cloned().unwrap_or(0)
    }

    pub fn err(&self, kind: ErrorKind, message: &str, loc: Location) -> PatternError {
        PatternError::new(kind, message, loc, self.rex)
    }

    fn err_syntax(&self, message: &str, loc: Location) -> PatternError {
        self.err(ErrorKind::RegexSyntax, message, loc)
    }

    /// Detect an escape at `loc`: either the escape character followed by
    /// the escaped character, or the bracketed form `[[:c:]]` standing for
    /// the single escaped character `c`.
    ///
    /// Returns the escaped character and the location just past the
    /// introducer (the escaped character itself).
    fn escape_prefix(&self, loc: Location) -> Option<(u8, Location, bool)> {
        if let Some(e) = self.opt.e {
            if self.at(loc) == e && self.at(loc + 1) != 0 {
                return Some((self.at(loc + 1), loc + 1, false));
            }
        }
        if self.at(loc) == b'['
            && self.at(loc + 1) == b'['
            && self.at(loc + 2) == b':'
            && self.at(loc + 4) == b':'
            && self.at(loc + 5) == b']'
            && self.at(loc + 6) == b']'
        {
            return Some((self.at(loc + 3), loc + 3, true));
        }
        None
    }

    pub fn has_escape_at(&self, loc: Location) -> bool {
        self.escape_prefix(loc).is_some()
    }

    /// Decode the escape at `loc` and return it with the location just past
    /// it. Inside a bracket list `\b` is a backspace and boundary escapes
    /// are invalid.
    pub fn scan_esc(&self, loc: Location, in_list: bool) -> Result<(Esc, Location)> {
        let (e, at_e, bracketed) = self
            .escape_prefix(loc)
            .ok_or_else(|| self.err_syntax("trailing escape", loc))?;
        let end = if bracketed { loc + 7 } else { at_e + 1 };
        let esc = match e {
            b'0'..=b'7' if !bracketed => {
                let mut value: u32 = 0;
                let mut k = at_e;
                while k < at_e + 3 && (b'0'..=b'7').contains(&self.at(k)) {
                    value = value * 8 + u32::from(self.at(k) - b'0');
                    k += 1;
                }
                return Ok((Esc::Byte((value & 0xff) as u8), k));
            }
            b'x' if !bracketed => {
                let mut value: u32 = 0;
                let mut k = at_e + 1;
                while k < at_e + 3 && self.at(k).is_ascii_hexdigit() {
                    value = value * 16 + u32::from(hex_value(self.at(k)));
                    k += 1;
                }
                if k == at_e + 1 {
                    return Err(self.err_syntax("invalid hex escape", loc));
                }
                return Ok((Esc::Byte(value as u8), k));
            }
            b'c' if !bracketed => {
                let c = self.at(at_e + 1);
                if c == 0 {
                    return Err(self.err_syntax("invalid control escape", loc));
                }
                return Ok((Esc::Byte(c & 0x1f), at_e + 2));
            }
            b'a' => Esc::Byte(0x07),
            b'e' => Esc::Byte(0x1b),
            b'f' => Esc::Byte(0x0c),
            b'n' => Esc::Byte(0x0a),
            b'r' => Esc::Byte(0x0d),
            b't' => Esc::Byte(0x09),
            b'v' => Esc::Byte(0x0b),
            b'b' if in_list => Esc::Byte(0x08),
            b'b' => Esc::Meta(Boundary::Word),
            b'B' => Esc::Meta(Boundary::NonWord),
            b'<' => Esc::Meta(Boundary::WordBegin),
            b'>' => Esc::Meta(Boundary::WordEnd),
            b'A' => Esc::Meta(Boundary::BufferBegin),
            b'Z' => Esc::Meta(Boundary::BufferEnd),
            b'i' => Esc::Meta(Boundary::Indent),
            b'j' => Esc::Meta(Boundary::Dedent),
            b'd' => Esc::Class(class_digit()),
            b'D' => Esc::Class(class_digit().negate256()),
            b's' => Esc::Class(class_space()),
            b'S' => Esc::Class(class_space().negate256()),
            b'w' => Esc::Class(class_word()),
            b'W' => Esc::Class(class_word().negate256()),
            b'l' => Esc::Class(class_lower()),
            b'u' => Esc::Class(class_upper()),
            b'h' => Esc::Class(class_blank()),
            b'H' => Esc::Class(class_blank().negate256()),
            c if c.is_ascii_alphanumeric() => {
                return Err(self.err_syntax("unknown escape", loc));
            }
            c => Esc::Byte(c),
        };
        if in_list {
            if let Esc::Meta(_) = esc {
                return Err(self.err(
                    ErrorKind::RegexList,
                    "boundary escape in bracket list",
                    loc,
                ));
            }
        }
        Ok((esc, end))
    }

    /// Parse the bracket list starting at `loc` (which holds the `[`).
    ///
    /// Returns the character set of the list and the location past the
    /// closing `]`. Shared by the parse pass (for validation and length)
    /// and the compile pass (for the set itself, with case folding already
    /// applied when `fold` is set).
    pub fn parse_list(&self, lloc: Location, fold: bool) -> Result<(CharSet, Location)> {
        let mut loc = lloc + 1;
        let mut negate = false;
        if self.at(loc) == b'^' {
            negate = true;
            loc += 1;
        }
        let mut set = CharSet::new();
        let mut first = true;
        loop {
            let c = self.at(loc);
            if c == 0 {
                return Err(self.err_syntax("missing ]", lloc));
            }
            if c == b']' && !first {
                loc += 1;
                break;
            }
            first = false;
            let (item, next) = self.list_item(loc)?;
            match item {
                Item::Set(cs) => {
                    set = set.union(&cs);
                    loc = next;
                }
                Item::Byte(lo) => {
                    if self.at(next) == b'-' && self.at(next + 1) != b']' && self.at(next + 1) != 0
                    {
                        let (hi, next) = self.list_item(next + 1)?;
                        match hi {
                            Item::Byte(hi) => {
                                if lo > hi {
                                    return Err(self.err(
                                        ErrorKind::RegexList,
                                        "invalid range in bracket list",
                                        loc,
                                    ));
                                }
                                set.insert_range(Char::from(lo), Char::from(hi));
                                loc = next;
                            }
                            Item::Set(_) => {
                                return Err(self.err(
                                    ErrorKind::RegexList,
                                    "invalid range in bracket list",
                                    loc,
                                ));
                            }
                        }
                    } else {
                        set.insert(Char::from(lo));
                        loc = next;
                    }
                }
            }
        }
        if fold {
            set = set.fold_case();
        }
        if negate {
            set = set.negate256();
        }
        Ok((set, loc))
    }

    fn list_item(&self, loc: Location) -> Result<(Item, Location)> {
        let c = self.at(loc);
        if !self.opt.b && self.opt.e == Some(c) {
            let (esc, end) = self.scan_esc(loc, true)?;
            match esc {
                Esc::Byte(b) => Ok((Item::Byte(b), end)),
                Esc::Class(cs) => Ok((Item::Set(cs), end)),
                Esc::Meta(_) => Err(self.err(
                    ErrorKind::RegexList,
                    "boundary escape in bracket list",
                    loc,
                )),
            }
        } else if c == b'[' && self.at(loc + 1) == b':' {
            let start = loc + 2;
            let mut k = start;
            while self.at(k).is_ascii_lowercase() {
                k += 1;
            }
            if self.at(k) != b':' || self.at(k + 1) != b']' || k == start {
                return Err(self.err(ErrorKind::RegexList, "malformed POSIX class", loc));
            }
            let name = &self.rex[start as usize..k as usize];
            match alphabet::posix_class(name) {
                Some(cs) => Ok((Item::Set(cs), k + 2)),
                None => Err(self.err(ErrorKind::RegexList, "unknown POSIX class", loc)),
            }
        } else {
            Ok((Item::Byte(c), loc + 1))
        }
    }

    /// Try to read a `{n}`, `{n,}` or `{n,m}` bound at `loc`.
    ///
    /// Returns `None` when the braces do not form a bound, and an error
    /// when they do but the bound is out of range.
    pub fn scan_bounds(&self, loc: Location) -> Result<Option<(u16, Option<u16>, Location)>> {
        debug_assert_eq!(self.at(loc), b'{');
        let (n, mut k) = match self.scan_number(loc + 1) {
            Some(nk) => nk,
            None => return Ok(None),
        };
        let m = if self.at(k) == b',' {
            k += 1;
            if self.at(k) == b'}' {
                None
            } else {
                match self.scan_number(k) {
                    Some((m, k2)) => {
                        k = k2;
                        Some(m)
                    }
                    None => return Ok(None),
                }
            }
        } else {
            Some(n)
        };
        if self.at(k) != b'}' {
            return Ok(None);
        }
        if n > 255 || m.map_or(false, |m| m > 255) {
            return Err(self.err(ErrorKind::RegexRange, "repeat bound exceeds 255", loc));
        }
        if m.map_or(false, |m| n > m) {
            return Err(self.err(
                ErrorKind::RegexRange,
                "repeat range lower bound exceeds upper bound",
                loc,
            ));
        }
        Ok(Some((n as u16, m.map(|m| m as u16), k + 1)))
    }

    fn scan_number(&self, loc: Location) -> Option<(u32, Location)> {
        let mut k = loc;
        let mut value: u32 = 0;
        while self.at(k).is_ascii_digit() && value < 0x10000 {
            value = value * 10 + u32::from(self.at(k) - b'0');
            k += 1;
        }
        if k == loc {
            None
        } else {
            Some((value, k))
        }
    }

    /// Check whether a `$` just before `loc` sits at the end of an
    /// alternative or group.
    pub fn at_end_context(&self, loc: Location) -> bool {
        let c = self.at(loc);
        c == 0 || c == b'|' || c == b')'
    }

    /// Compute the character set consumed by the position `p`.
    ///
    /// This re-reads the atom at the position's source location, honoring
    /// the case, dot-all and quotation modifier scopes recorded by the
    /// parse pass.
    pub fn chars_at(&self, p: Position, modifiers: &Modifiers) -> Result<CharSet> {
        let loc = p.loc();
        let c = self.at(loc);
        let fold = self.opt.i || is_modified(b'i', modifiers, loc);
        if is_modified(b'q', modifiers, loc) {
            return Ok(byte_set(c, fold));
        }
        if self.has_escape_at(loc) {
            let (esc, _) = self.scan_esc(loc, false)?;
            return Ok(match esc {
                Esc::Byte(b) => byte_set(b, fold),
                Esc::Class(cs) => if fold {
                    cs.fold_case()
                } else {
                    cs
                },
                Esc::Meta(boundary) => boundary.chars(p.is_anchor()),
            });
        }
        Ok(match c {
            b'.' => {
                if self.opt.s || is_modified(b's', modifiers, loc) {
                    CharSet::range(0x00, 0xff)
                } else {
                    CharSet::range(0x00, 0xff).difference(&CharSet::single(Char::from(b'\n')))
                }
            }
            b'[' => self.parse_list(loc, fold)?.0,
            b'^' if p.is_anchor() => CharSet::single(META_BOL),
            b'$' if self.at_end_context(loc + 1) => CharSet::single(META_EOL),
            _ => byte_set(c, fold),
        })
    }
}

/// Check whether `loc` lies inside the recorded scope of a modifier.
pub fn is_modified(mode: u8, modifiers: &Modifiers, loc: Location) -> bool {
    modifiers.get(&mode).map_or(false, |r| r.contains(loc))
}

fn byte_set(c: u8, fold: bool) -> CharSet {
    let set = CharSet::single(Char::from(c));
    if fold {
        set.fold_case()
    } else {
        set
    }
}

fn hex_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => c - b'A' + 10,
    }
}

fn class_digit() -> CharSet {
    CharSet::range(0x30, 0x39)
}

fn class_space() -> CharSet {
    let mut set = CharSet::range(0x09, 0x0d);
    set.insert(0x20);
    set
}

fn class_word() -> CharSet {
    let mut set = class_digit();
    set.insert_range(0x41, 0x5a);
    set.insert(0x5f);
    set.insert_range(0x61, 0x7a);
    set
}

fn class_lower() -> CharSet {
    CharSet::range(0x61, 0x7a)
}

fn class_upper() -> CharSet {
    CharSet::range(0x41, 0x5a)
}

fn class_blank() -> CharSet {
    let mut set = CharSet::single(0x09);
    set.insert(0x20);
    set
}

/// The recursive descent parser.
pub struct Parser<'a> {
    scan: Scanner<'a>,
    follow: Follow,
    modifiers: Modifiers,
    lookahead: BTreeMap<Index, LookAhead>,
    end: Vec<Location>,
    redo: BTreeSet<Index>,
    choice: Index,
    xmode: bool,
    qmode: bool,
    depth: u32,
}

impl<'a> Parser<'a> {
    pub fn new(rex: &'a str, opt: &'a Options) -> Parser<'a> {
        Parser {
            xmode: opt.x,
            scan: Scanner::new(rex, opt),
            follow: Follow::new(),
            modifiers: Modifiers::new(),
            lookahead: BTreeMap::new(),
            end: Vec::new(),
            redo: BTreeSet::new(),
            choice: 1,
            qmode: false,
            depth: 0,
        }
    }

    /// Parse the whole pattern: every top-level alternative becomes a
    /// sub-pattern with its own accept position.
    pub fn parse(mut self) -> Result<Parsed> {
        if self.scan.rex.len() >= usize::from(IMAX) {
            return Err(self
                .scan
                .err(ErrorKind::CodeOverflow, "pattern is too long", 0));
        }
        let mut loc: Location = 0;
        let mut startpos = Positions::new();
        loop {
            let frag = self.parse2(true, &mut loc)?;
            if self.scan.at(loc) == b')' {
                return Err(self.scan.err_syntax("unbalanced )", loc));
            }
            let ticked = self.lookahead.contains_key(&self.choice);
            let mut accepts = Positions::new();
            let accept = Position::new(Location::from(self.choice))
                .accept(true)
                .ticked(ticked);
            if frag.lazypos.is_empty() {
                accepts.insert(accept);
            } else {
                for l in &frag.lazypos {
                    accepts.insert(accept.lazy_at(l.loc()));
                }
            }
            for p in &frag.last {
                self.follow
                    .entry(p.pos())
                    .or_insert_with(Positions::new)
                    .extend(accepts.iter().cloned());
            }
            startpos.extend(frag.first.iter().cloned());
            if frag.nullable {
                startpos.extend(accepts.iter().cloned());
            }
            self.end.push(loc);
            if self.scan.at(loc) != b'|' {
                break;
            }
            loc += 1;
            if self.choice >= IMAX - 1 {
                return Err(self
                    .scan
                    .err(ErrorKind::CodeOverflow, "too many alternatives", loc));
            }
            self.choice += 1;
        }
        debug!(
            "parsed {} sub-pattern(s), {} follow set(s)",
            self.end.len(),
            self.follow.len()
        );
        Ok(Parsed {
            startpos,
            follow: self.follow,
            modifiers: self.modifiers,
            lookahead: self.lookahead,
            end: self.end,
            redo: self.redo,
        })
    }

    fn parse1(&mut self, begin: bool, loc: &mut Location) -> Result<Frag> {
        let mut frag = self.parse2(begin, loc)?;
        while self.scan.at(*loc) == b'|' {
            *loc += 1;
            let alt = self.parse2(begin, loc)?;
            frag.first.extend(alt.first.iter().cloned());
            frag.last.extend(alt.last.iter().cloned());
            frag.nullable = frag.nullable || alt.nullable;
            frag.lazypos.extend(alt.lazypos.iter().cloned());
            frag.copies = cmp::max(frag.copies, alt.copies);
            frag.is_anchor = false;
        }
        Ok(frag)
    }

    fn parse2(&mut self, begin: bool, loc: &mut Location) -> Result<Frag> {
        let mut begin = begin;
        let mut frag = Frag::empty();
        loop {
            if self.xmode && !self.qmode {
                self.skip_space(loc);
            }
            let c = self.scan.at(*loc);
            if c == 0 || c == b')' {
                break;
            }
            if c == b'|' && !self.qmode {
                break;
            }
            if c == b'/' && !self.qmode && self.depth == 0 {
                self.parse_lookahead(&mut frag, loc)?;
                break;
            }
            let atom = self.parse3(begin, loc)?;
            if !atom.is_anchor {
                begin = false;
            }
            self.concat_onto(&mut frag, atom);
        }
        Ok(frag)
    }

    fn parse3(&mut self, begin: bool, loc: &mut Location) -> Result<Frag> {
        let start = *loc;
        let mut frag = self.parse4(begin, loc)?;
        loop {
            if self.xmode && !self.qmode {
                self.skip_space(loc);
            }
            let qloc = *loc;
            match self.scan.at(*loc) {
                c @ b'*' | c @ b'+' | c @ b'?' => {
                    if frag.is_anchor {
                        return Err(self.scan.err_syntax("quantified anchor", qloc));
                    }
                    *loc += 1;
                    let lazy = self.eat_lazy(loc);
                    tag_first(&mut frag, lazy);
                    if c != b'?' {
                        self.loop_back(&frag);
                    }
                    if c != b'+' {
                        frag.nullable = true;
                    }
                }
                b'{' if !self.qmode => match self.scan.scan_bounds(*loc)? {
                    Some((n, m, end)) => {
                        if frag.is_anchor {
                            return Err(self.scan.err_syntax("quantified anchor", qloc));
                        }
                        *loc = end;
                        let lazy = self.eat_lazy(loc);
                        self.apply_bounds(&mut frag, (start, qloc), n, m, lazy)?;
                    }
                    None => break,
                },
                _ => break,
            }
        }
        Ok(frag)
    }

    fn parse4(&mut self, begin: bool, loc: &mut Location) -> Result<Frag> {
        let c = self.scan.at(*loc);
        if self.qmode {
            let p = Position::new(*loc);
            *loc += 1;
            return Ok(Frag::atom(p));
        }
        if c != b'(' && self.scan.has_escape_at(*loc) {
            let (esc, end) = self.scan.scan_esc(*loc, false)?;
            let frag = match esc {
                Esc::Byte(_) | Esc::Class(_) => Frag::atom(Position::new(*loc)),
                Esc::Meta(_) => Frag::anchor(Position::new(*loc).anchor(begin)),
            };
            *loc = end;
            return Ok(frag);
        }
        match c {
            b'(' => self.parse_group(begin, loc),
            b'[' => {
                let (_, end) = self.scan.parse_list(*loc, false)?;
                let p = Position::new(*loc);
                *loc = end;
                Ok(Frag::atom(p))
            }
            b'"' if self.scan.opt.q => self.parse_quote(loc),
            b'.' => {
                let p = Position::new(*loc);
                *loc += 1;
                Ok(Frag::atom(p))
            }
            b'^' if begin => {
                let p = Position::new(*loc).anchor(true);
                *loc += 1;
                Ok(Frag::anchor(p))
            }
            b'$' if self.scan.at_end_context(*loc + 1) => {
                let p = Position::new(*loc);
                *loc += 1;
                Ok(Frag::anchor(p))
            }
            b'{' => self.parse_brace(loc),
            b'*' | b'+' | b'?' => Err(self.scan.err_syntax("nothing to repeat", *loc)),
            b'^' | b'$' if self.scan.opt.r => {
                Err(self.scan.err_syntax("misplaced anchor", *loc))
            }
            _ => {
                let p = Position::new(*loc);
                *loc += 1;
                Ok(Frag::atom(p))
            }
        }
    }

    fn parse_group(&mut self, begin: bool, loc: &mut Location) -> Result<Frag> {
        let open = *loc;
        *loc += 1;
        self.depth += 1;
        let frag = if self.scan.at(*loc) == b'?' {
            *loc += 1;
            let negative = self.scan.at(*loc) == b'^';
            if negative {
                *loc += 1;
            }
            let mut modes = Vec::new();
            loop {
                match self.scan.at(*loc) {
                    m @ b'i' | m @ b'm' | m @ b'q' | m @ b's' | m @ b'x' => {
                        modes.push(m);
                        *loc += 1;
                    }
                    _ => break,
                }
            }
            if self.scan.at(*loc) != b':' {
                return Err(self.scan.err_syntax("unsupported (?...) group", open));
            }
            *loc += 1;
            if negative {
                self.redo.insert(self.choice);
            }
            let start = *loc;
            let saved = (self.xmode, self.qmode);
            for &m in &modes {
                match m {
                    b'x' => self.xmode = true,
                    b'q' => self.qmode = true,
                    _ => {}
                }
            }
            let inner = self.parse1(begin, loc)?;
            self.xmode = saved.0;
            self.qmode = saved.1;
            for &m in &modes {
                self.mark_modifier(m, start, *loc);
            }
            inner
        } else {
            self.parse1(begin, loc)?
        };
        if self.scan.at(*loc) != b')' {
            return Err(self.scan.err_syntax("missing )", open));
        }
        *loc += 1;
        self.depth -= 1;
        Ok(frag)
    }

    fn parse_quote(&mut self, loc: &mut Location) -> Result<Frag> {
        let open = *loc;
        *loc += 1;
        let start = *loc;
        let mut frag = Frag::empty();
        loop {
            match self.scan.at(*loc) {
                0 => return Err(self.scan.err_syntax("missing closing quote", open)),
                b'"' => break,
                _ => {
                    let atom = Frag::atom(Position::new(*loc));
                    self.concat_onto(&mut frag, atom);
                    *loc += 1;
                }
            }
        }
        self.mark_modifier(b'q', start, *loc);
        *loc += 1;
        Ok(frag)
    }

    fn parse_brace(&mut self, loc: &mut Location) -> Result<Frag> {
        if self.scan.scan_bounds(*loc)?.is_some() {
            return Err(self.scan.err_syntax("nothing to repeat", *loc));
        }
        if self.scan.opt.l && self.scan.at(*loc + 1).is_ascii_alphabetic() {
            return Err(self.scan.err_syntax("undefined name", *loc));
        }
        if self.scan.opt.r {
            return Err(self.scan.err_syntax("misplaced {", *loc));
        }
        let p = Position::new(*loc);
        *loc += 1;
        Ok(Frag::atom(p))
    }

    fn parse_lookahead(&mut self, frag: &mut Frag, loc: &mut Location) -> Result<()> {
        let slash = *loc;
        if self.lookahead.contains_key(&self.choice) {
            return Err(self.scan.err_syntax("multiple trailing contexts", slash));
        }
        *loc += 1;
        let y_start = *loc;
        // reserve the slot so a second '/' inside Y is rejected
        self.lookahead.insert(self.choice, LookAhead::default());
        let y = self.parse2(false, loc)?;
        let y_end = *loc;
        let tick = |p: &Position| -> Position {
            if !p.is_accept() && y_start <= p.loc() && p.loc() < y_end {
                p.ticked(true)
            } else {
                *p
            }
        };
        let yfirst: Positions = y.first.iter().map(|p| tick(p)).collect();
        let ylast: Positions = y.last.iter().map(|p| tick(p)).collect();
        for vs in self.follow.values_mut() {
            let ticked: Positions = vs.iter().map(|p| tick(p)).collect();
            *vs = ticked;
        }
        let mut la = LookAhead::default();
        la.span.insert(y_start, y_end);
        la.first = yfirst.iter().map(|p| p.loc()).collect();
        self.lookahead.insert(self.choice, la);
        let y = Frag {
            first: yfirst,
            last: ylast,
            nullable: y.nullable,
            lazypos: y.lazypos,
            copies: y.copies,
            is_anchor: false,
        };
        self.concat_onto(frag, y);
        Ok(())
    }

    /// Concatenate `atom` onto `frag`, updating the follow map.
    fn concat_onto(&mut self, frag: &mut Frag, atom: Frag) {
        for p in &frag.last {
            self.follow
                .entry(p.pos())
                .or_insert_with(Positions::new)
                .extend(atom.first.iter().cloned());
        }
        if frag.nullable {
            frag.first.extend(atom.first.iter().cloned());
        }
        if atom.nullable {
            frag.last.extend(atom.last.iter().cloned());
        } else {
            frag.last = atom.last;
        }
        // lazy origins stay in force to the end of the alternative so the
        // accept position is tagged and lazy trimming can end the match
        frag.lazypos.extend(atom.lazypos.iter().cloned());
        frag.nullable = frag.nullable && atom.nullable;
        frag.copies = cmp::max(frag.copies, atom.copies);
    }

    fn loop_back(&mut self, frag: &Frag) {
        for p in &frag.last {
            self.follow
                .entry(p.pos())
                .or_insert_with(Positions::new)
                .extend(frag.first.iter().cloned());
        }
    }

    fn eat_lazy(&mut self, loc: &mut Location) -> Option<Location> {
        if self.scan.at(*loc) == b'?' {
            let l = *loc;
            *loc += 1;
            Some(l)
        } else {
            None
        }
    }

    /// Unroll `X{n,m}` (or `X{n,}` when `m` is `None`) by cloning the
    /// fragment's follow structure once per iteration, tagging each clone
    /// with its iteration number so equal source locations from different
    /// iterations stay distinct during subset construction.
    fn apply_bounds(
        &mut self,
        frag: &mut Frag,
        span: (Location, Location),
        n: u16,
        m: Option<u16>,
        lazy: Option<Location>,
    ) -> Result<()> {
        if m == Some(0) {
            *frag = Frag::empty();
            return Ok(());
        }
        tag_first(frag, lazy);
        let d = frag.copies;
        let total = match m {
            Some(m) => m,
            None => cmp::max(n, 1),
        };
        let factor = u32::from(d) * u32::from(total);
        if factor > u32::from(IMAX) {
            return Err(self
                .scan
                .err(ErrorKind::RegexRange, "repeat unrolling is too large", span.0));
        }
        let shift = |p: &Position, i: u16| -> Position {
            p.with_iter((u32::from(p.iter()) + u32::from(i) * u32::from(d)) as u16)
        };
        let snapshot: Vec<(Position, Positions)> = self
            .follow
            .iter()
            .filter(|&(k, _)| span.0 <= k.loc() && k.loc() < span.1)
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        for i in 1..total {
            for &(k, ref vs) in &snapshot {
                let shifted: Positions = vs
                    .iter()
                    .map(|q| {
                        if !q.is_accept() && span.0 <= q.loc() && q.loc() < span.1 {
                            shift(q, i)
                        } else {
                            *q
                        }
                    })
                    .collect();
                self.follow
                    .entry(shift(&k, i))
                    .or_insert_with(Positions::new)
                    .extend(shifted);
            }
            let first: Positions = frag.first.iter().map(|p| shift(p, i)).collect();
            for p in &frag.last {
                self.follow
                    .entry(shift(p, i - 1).pos())
                    .or_insert_with(Positions::new)
                    .extend(first.iter().cloned());
            }
        }
        if m.is_none() {
            // n or more: the final copy loops on itself
            let first: Positions = frag.first.iter().map(|p| shift(p, total - 1)).collect();
            for p in &frag.last {
                self.follow
                    .entry(shift(p, total - 1).pos())
                    .or_insert_with(Positions::new)
                    .extend(first.iter().cloned());
            }
        }
        let inner_nullable = frag.nullable;
        let lo_copy = if n <= 1 || inner_nullable { 0 } else { n - 1 };
        let mut last = Positions::new();
        for i in lo_copy..total {
            for p in &frag.last {
                last.insert(shift(p, i));
            }
        }
        frag.last = last;
        frag.nullable = inner_nullable || n == 0;
        frag.copies = factor as u16;
        Ok(())
    }

    fn mark_modifier(&mut self, mode: u8, start: Location, end: Location) {
        self.modifiers
            .entry(mode)
            .or_insert_with(Ranges::new)
            .insert(start, end);
    }

    fn skip_space(&self, loc: &mut Location) {
        loop {
            match self.scan.at(*loc) {
                b' ' | b'\t' | b'\n' | b'\r' => *loc += 1,
                b'#' => {
                    while self.scan.at(*loc) != 0 && self.scan.at(*loc) != b'\n' {
                        *loc += 1;
                    }
                }
                _ => break,
            }
        }
    }
}

/// Tag the entry points of a quantified fragment: lazy quantifiers stamp
/// their location onto the firstpos so the subset construction can prefer
/// the shortest continuation, greedy ones set the greedy flag which blocks
/// lazy tags from leaking in from an enclosing lazy context.
fn tag_first(frag: &mut Frag, lazy: Option<Location>) {
    match lazy {
        Some(l) => {
            frag.first = frag
                .first
                .iter()
                .map(|p| if p.lazy() != 0 { *p } else { p.lazy_at(l) })
                .collect();
            frag.lazypos.insert(Position::new(l));
        }
        None => {
            frag.first = frag
                .first
                .iter()
                .map(|p| if p.lazy() != 0 { *p } else { p.greedy(true) })
                .collect();
        }
    }
}
