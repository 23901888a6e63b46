// Copyright 2018 Steven Bosnick
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE-2.0 or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms

// Subset construction over the parsed position sets.
//
// A DFA state is an ordered set of positions; the map from position set to
// state is an IndexMap so that lookup is O(1) on the set's hash while the
// insertion order doubles as the allocation order the encoder walks. State
// 0 is the start state.
//
// Lazy quantifier semantics are resolved here rather than in the matcher:
// a position tagged with a lazy origin spreads that tag to its followers
// (greedy positions refuse it), and trim_lazy drops every position that
// would continue a match which a lazy accept with the same origin already
// ends. A trimmed accepting state keeps no outgoing edges, which is
// exactly "prefer the shortest match".

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;

use alphabet::{Char, CharSet};
use error::Result;
use opcode::Index;
use parser::Parsed;
use parser::Scanner;
use position::Positions;

/// A DFA state under construction: its resolved accept, lookahead marks
/// and outgoing edges. The identity of the state (its position set) lives
/// as the key of the state table.
#[derive(Debug, Default)]
pub struct State {
    pub accept: Index,
    pub redo: bool,
    pub heads: BTreeSet<Index>,
    pub tails: BTreeSet<Index>,
    pub edges: BTreeMap<Char, (Char, usize)>,
}

/// The constructed automaton: states in allocation order plus the edge
/// count after compaction.
#[derive(Debug)]
pub struct Dfa {
    pub states: IndexMap<Positions, State>,
    pub edge_count: usize,
}

struct Move {
    chars: CharSet,
    follow: Positions,
}

/// Build the DFA for a parsed pattern.
///
/// `acc` must have one slot per sub-pattern; the slot of every sub-pattern
/// that some state accepts is set.
pub fn compile(scan: &Scanner, parsed: &Parsed, acc: &mut Vec<bool>) -> Result<Dfa> {
    let look_ids: BTreeMap<Index, Index> = parsed
        .lookahead
        .keys()
        .enumerate()
        .map(|(n, choice)| (*choice, n as Index))
        .collect();
    let mut states: IndexMap<Positions, State> = IndexMap::new();
    let mut start = parsed.startpos.clone();
    trim_lazy(&mut start);
    states.insert(start, State::default());
    let mut i = 0;
    while i < states.len() {
        let positions = match states.get_index(i) {
            Some((key, _)) => key.clone(),
            None => break,
        };
        let mut st = State::default();
        let mut moves: Vec<Move> = Vec::new();
        for p in &positions {
            if p.is_accept() {
                let choice = p.accepts();
                if st.accept == 0 || choice < st.accept {
                    st.accept = choice;
                }
                if p.is_ticked() {
                    if let Some(id) = look_ids.get(&choice) {
                        st.tails.insert(*id);
                    }
                }
            } else {
                let chars = scan.chars_at(*p, &parsed.modifiers)?;
                if chars.is_empty() {
                    continue;
                }
                let follow = match parsed.follow.get(&p.pos()) {
                    Some(follow) => follow,
                    None => continue,
                };
                let follow = if p.lazy() != 0 {
                    follow
                        .iter()
                        .map(|q| {
                            if q.lazy() != 0 || q.is_greedy() {
                                *q
                            } else {
                                q.lazy_at(p.lazy())
                            }
                        })
                        .collect()
                } else {
                    follow.clone()
                };
                transition(&mut moves, chars, follow);
            }
        }
        for (n, la) in parsed.lookahead.values().enumerate() {
            let entering = positions
                .iter()
                .any(|p| !p.is_accept() && p.is_ticked() && la.first.contains(&p.loc()));
            if entering {
                st.heads.insert(n as Index);
            }
        }
        if st.accept != 0 {
            st.redo = parsed.redo.contains(&st.accept);
            acc[usize::from(st.accept) - 1] = true;
        }
        for mv in moves {
            let mut follow = mv.follow;
            trim_lazy(&mut follow);
            if follow.is_empty() {
                continue;
            }
            let target = match states.get_index_of(&follow) {
                Some(target) => target,
                None => {
                    states.insert(follow, State::default());
                    states.len() - 1
                }
            };
            for (lo, hi) in mv.chars.iter() {
                st.edges.insert(lo, (hi, target));
            }
        }
        if let Some((_, slot)) = states.get_index_mut(i) {
            *slot = st;
        }
        i += 1;
    }
    compact(&mut states);
    let edge_count = states.values().map(|s| s.edges.len()).sum();
    debug!(
        "compiled {} DFA state(s) with {} edge(s)",
        states.len(),
        edge_count
    );
    Ok(Dfa { states, edge_count })
}

/// Insert a `(chars, follow)` pair into the move list, splitting existing
/// moves so the character sets of all moves stay pairwise disjoint and
/// merging follow sets where the sets overlap.
fn transition(moves: &mut Vec<Move>, chars: CharSet, follow: Positions) {
    let mut remaining = chars;
    let mut added: Vec<Move> = Vec::new();
    for mv in moves.iter_mut() {
        if remaining.is_empty() {
            break;
        }
        let common = mv.chars.intersect(&remaining);
        if common.is_empty() {
            continue;
        }
        remaining = remaining.difference(&common);
        if mv.follow == follow {
            continue;
        }
        if common == mv.chars {
            mv.follow.extend(follow.iter().cloned());
        } else {
            mv.chars = mv.chars.difference(&common);
            let mut merged = mv.follow.clone();
            merged.extend(follow.iter().cloned());
            added.push(Move {
                chars: common,
                follow: merged,
            });
        }
    }
    moves.extend(added);
    if !remaining.is_empty() {
        moves.push(Move {
            chars: remaining,
            follow,
        });
    }
}

/// Drop positions dominated under lazy semantics.
///
/// Lazy-tagged positions sort above all untagged ones, so scanning from
/// the top of the set finds lazy accepts first. Each lazy accept ends the
/// match for its operator: every other position carrying the same lazy
/// origin is removed and the accept is kept untagged.
fn trim_lazy(pos: &mut Positions) {
    loop {
        let lazy_accept = pos
            .iter()
            .rev()
            .take_while(|p| p.lazy() != 0)
            .find(|p| p.is_accept())
            .cloned();
        match lazy_accept {
            Some(accept) => {
                let origin = accept.lazy();
                let keep: Positions = pos.iter().filter(|q| q.lazy() != origin).cloned().collect();
                *pos = keep;
                pos.insert(accept.lazy_at(0));
            }
            None => break,
        }
    }
}

/// Merge adjacent equal-target edges of every state.
fn compact(states: &mut IndexMap<Positions, State>) {
    for st in states.values_mut() {
        let mut edges = BTreeMap::new();
        let mut run: Option<(Char, Char, usize)> = None;
        for (&lo, &(hi, target)) in &st.edges {
            run = match run {
                Some((rlo, rhi, rt)) if rt == target && u32::from(rhi) + 1 == u32::from(lo) => {
                    Some((rlo, hi, rt))
                }
                Some((rlo, rhi, rt)) => {
                    edges.insert(rlo, (rhi, rt));
                    Some((lo, hi, target))
                }
                None => Some((lo, hi, target)),
            };
        }
        if let Some((rlo, rhi, rt)) = run {
            edges.insert(rlo, (rhi, rt));
        }
        st.edges = edges;
    }
}
