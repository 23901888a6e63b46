// Copyright 2018 Steven Bosnick
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE-2.0 or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms

extern crate lexpat;
#[macro_use]
extern crate proptest;
extern crate regex;

use std::collections::HashMap;

use lexpat::alphabet::{META_BOB, META_BOL, META_BWB, META_BWE, META_EOB, META_EOL, META_EWB,
                       META_EWE, META_NWB, META_NWE};
use lexpat::{opcode, utf8, Pattern};
use proptest::prelude::*;

/// A match found by the reference interpreter.
#[derive(Debug, PartialEq)]
struct Match {
    end: usize,
    choice: u16,
    redo: bool,
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn meta_holds(meta: u16, input: &[u8], pos: usize) -> bool {
    let prev = if pos > 0 { Some(input[pos - 1]) } else { None };
    let next = input.get(pos).cloned();
    let prev_word = prev.map_or(false, is_word);
    let next_word = next.map_or(false, is_word);
    match meta {
        META_BOL => pos == 0 || prev == Some(b'\n'),
        META_EOL => pos == input.len() || next == Some(b'\n'),
        META_BOB => pos == 0,
        META_EOB => pos == input.len(),
        META_BWB | META_BWE => !prev_word && next_word,
        META_EWB | META_EWE => prev_word && !next_word,
        META_NWB | META_NWE => prev_word == next_word,
        _ => false,
    }
}

/// A reference interpreter for the opcode contract: scan a state block top
/// to bottom, record accepts, follow the first transfer whose condition
/// holds, and keep the longest match found.
fn run(pattern: &Pattern, input: &[u8]) -> Option<Match> {
    let code = pattern.opcodes();
    if code.is_empty() {
        return None;
    }
    let mut pc: usize = 0;
    let mut pos: usize = 0;
    let mut best: Option<Match> = None;
    let mut heads: HashMap<u16, usize> = HashMap::new();
    let mut steps = 0;
    'state: loop {
        steps += 1;
        assert!(steps <= 100_000, "interpreter ran away");
        let mut i = pc;
        let mut took = false;
        loop {
            let op = code[i];
            if opcode::is_halt(op) {
                return best;
            } else if opcode::is_redo(op) {
                best = Some(Match {
                    end: pos,
                    choice: 0,
                    redo: true,
                });
                took = true;
            } else if opcode::is_take(op) {
                best = Some(Match {
                    end: pos,
                    choice: opcode::index_of(op),
                    redo: false,
                });
                took = true;
            } else if opcode::is_tail(op) {
                if took {
                    if let Some(&head) = heads.get(&opcode::index_of(op)) {
                        if let Some(ref mut m) = best {
                            m.end = head;
                        }
                    }
                }
            } else if opcode::is_head(op) {
                heads.entry(opcode::index_of(op)).or_insert(pos);
            } else if opcode::is_meta_op(op) {
                if meta_holds(opcode::meta_of(op), input, pos) {
                    pc = usize::from(opcode::index_of(op));
                    continue 'state;
                }
            } else if pos < input.len() && opcode::is_match(op, input[pos]) {
                pos += 1;
                pc = usize::from(opcode::index_of(op));
                continue 'state;
            }
            i += 1;
            if i >= code.len() {
                return best;
            }
        }
    }
}

fn matched(pattern: &Pattern, input: &str) -> Option<(u16, usize)> {
    run(pattern, input.as_bytes()).map(|m| (m.choice, m.end))
}

#[test]
fn alternatives_accept_with_their_own_index() {
    let pattern = Pattern::new("a|b|c").expect("valid pattern");

    assert_eq!(pattern.size(), 3);
    assert_eq!(matched(&pattern, "a"), Some((1, 1)));
    assert_eq!(matched(&pattern, "b"), Some((2, 1)));
    assert_eq!(matched(&pattern, "c"), Some((3, 1)));
    assert_eq!(matched(&pattern, "d"), None);
}

#[test]
fn kleene_star_prefix_matches() {
    let pattern = Pattern::new("a*b").expect("valid pattern");

    assert_eq!(matched(&pattern, ""), None);
    assert_eq!(matched(&pattern, "b"), Some((1, 1)));
    assert_eq!(matched(&pattern, "aaab"), Some((1, 4)));
    assert_eq!(matched(&pattern, "aaa"), None);
}

#[test]
fn bounded_repeat_matches_between_the_bounds() {
    let pattern = Pattern::new("a{2,4}").expect("valid pattern");

    assert_eq!(matched(&pattern, "a"), None);
    assert_eq!(matched(&pattern, "aa"), Some((1, 2)));
    assert_eq!(matched(&pattern, "aaaa"), Some((1, 4)));
    // the longest match of a longer run is the four-repeat prefix
    assert_eq!(matched(&pattern, "aaaaa"), Some((1, 4)));
}

#[test]
fn lazy_repeat_prefers_the_shortest_match() {
    let pattern = Pattern::new("a.*?b").expect("valid pattern");

    assert_eq!(matched(&pattern, "axxbyyb"), Some((1, 4)));
    assert_eq!(matched(&pattern, "ab"), Some((1, 2)));
    assert_eq!(matched(&pattern, "abyyb"), Some((1, 2)));
}

#[test]
fn greedy_repeat_prefers_the_longest_match() {
    let pattern = Pattern::new("a.*b").expect("valid pattern");

    assert_eq!(matched(&pattern, "axxbyyb"), Some((1, 7)));
}

#[test]
fn trailing_context_is_required_but_not_consumed() {
    let pattern = Pattern::new("foo/bar").expect("valid pattern");

    assert_eq!(matched(&pattern, "foobar"), Some((1, 3)));
    assert_eq!(matched(&pattern, "foobaz"), None);
    assert_eq!(matched(&pattern, "foo"), None);
}

#[test]
fn posix_class_with_case_folding() {
    let pattern = Pattern::with_options("[[:alpha:]]+", "i").expect("valid pattern");

    assert_eq!(matched(&pattern, "Hello"), Some((1, 5)));
    assert_eq!(matched(&pattern, "123"), None);
}

#[test]
fn buffer_anchors_pin_the_whole_input() {
    let pattern = Pattern::new(r"\A(ab|cd)\Z").expect("valid pattern");

    assert_eq!(matched(&pattern, "ab"), Some((1, 2)));
    assert_eq!(matched(&pattern, "cd"), Some((1, 2)));
    assert_eq!(matched(&pattern, "abc"), None);
}

#[test]
fn word_boundary_requires_a_word_edge() {
    let pattern = Pattern::new(r"\<if\>").expect("valid pattern");

    assert_eq!(matched(&pattern, "if"), Some((1, 2)));
    assert_eq!(matched(&pattern, "iffy"), None);
}

#[test]
fn line_anchors_match_around_newlines() {
    let pattern = Pattern::new("^ab$").expect("valid pattern");

    assert_eq!(matched(&pattern, "ab"), Some((1, 2)));
    assert_eq!(matched(&pattern, "ab\ncd"), Some((1, 2)));
    assert_eq!(matched(&pattern, "abc"), None);
}

#[test]
fn negative_pattern_reports_a_redo_match() {
    let pattern = Pattern::new(r"(?^:[ \t]+)|[a-z]+").expect("valid pattern");

    let skip = run(&pattern, b"   ").expect("whitespace matches");
    assert!(skip.redo);
    assert_eq!(skip.end, 3);

    let word = run(&pattern, b"abc").expect("word matches");
    assert!(!word.redo);
    assert_eq!(word.choice, 2);
}

#[test]
fn earlier_alternative_wins_on_equal_matches() {
    let pattern = Pattern::new("ab|ab|a").expect("valid pattern");

    assert_eq!(matched(&pattern, "ab"), Some((1, 2)));
    assert!(pattern.reachable(1));
    assert!(!pattern.reachable(2));
    assert!(pattern.reachable(3));
}

#[test]
fn longest_match_wins_across_alternatives() {
    let pattern = Pattern::new("a|ab").expect("valid pattern");

    assert_eq!(matched(&pattern, "ab"), Some((2, 2)));
    assert_eq!(matched(&pattern, "a"), Some((1, 1)));
}

#[test]
fn quotation_matches_operators_verbatim() {
    let pattern = Pattern::with_options("\"a*b\"", "q").expect("valid pattern");

    assert_eq!(matched(&pattern, "a*b"), Some((1, 3)));
    assert_eq!(matched(&pattern, "aab"), None);
}

#[test]
fn scoped_quotation_matches_operators_verbatim() {
    let pattern = Pattern::new("x(?q:a+)y").expect("valid pattern");

    assert_eq!(matched(&pattern, "xa+y"), Some((1, 4)));
    assert_eq!(matched(&pattern, "xaay"), None);
}

#[test]
fn scoped_case_folding_applies_inside_the_group_only() {
    let pattern = Pattern::new("a(?i:bc)d").expect("valid pattern");

    assert_eq!(matched(&pattern, "aBCd"), Some((1, 4)));
    assert_eq!(matched(&pattern, "Abcd"), None);
}

#[test]
fn free_spacing_mode_ignores_layout() {
    let pattern = Pattern::with_options("a b  # trailing comment\n c+", "x").expect("valid pattern");

    assert_eq!(matched(&pattern, "abccc"), Some((1, 5)));
    assert_eq!(matched(&pattern, "a b c"), None);
}

#[test]
fn utf8_expansion_matches_non_ascii_code_points() {
    let frag = utf8(0x80, 0x10_ffff, true, None);
    let pattern = Pattern::new(&frag).expect("expansion compiles");

    for &c in &[0x80u32, 0x7ff, 0x800, 0xffff, 0x1_0000, 0x10_ffff] {
        let bytes = utf8::encode(c);
        let m = run(&pattern, &bytes);
        assert_eq!(
            m.map(|m| m.end),
            Some(bytes.len()),
            "code point {:#x} must match",
            c
        );
    }
    assert_eq!(run(&pattern, b"a"), None);
    // over-long two byte form of NUL is rejected in strict mode
    assert_eq!(run(&pattern, b"\xc0\x80"), None);
}

#[test]
fn compiled_patterns_are_bitwise_deterministic() {
    let rex = r"(a|b)*abb|x{2,5}|foo/bar|[[:alpha:]_][[:alnum:]_]*";

    let first = Pattern::new(rex).expect("valid pattern");
    let second = Pattern::new(rex).expect("valid pattern");

    assert_eq!(first.nodes(), second.nodes());
    assert_eq!(first.edges(), second.edges());
    assert_eq!(first.opcodes(), second.opcodes());
}

#[test]
fn adopted_opcode_table_drives_the_same_matches() {
    let compiled = Pattern::new("if|[a-z]+").expect("valid pattern");
    let code = compiled.opcodes().to_vec();

    let adopted = Pattern::from_opcodes(&code);

    assert_eq!(matched(&adopted, "if"), Some((1, 2)));
    assert_eq!(matched(&adopted, "ifx"), Some((2, 3)));
    assert_eq!(adopted.size(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_utf8_strict_expansion_matches_exactly_the_range(
        x in any::<char>(),
        y in any::<char>(),
        c in any::<char>(),
    ) {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        let frag = utf8(a as i32, b as i32, true, None);
        let re = regex::bytes::RegexBuilder::new(&format!("\\A(?:{})\\z", frag))
            .unicode(false)
            .build()
            .expect("expansion is a valid regex");
        let mut buf = [0u8; 4];
        let bytes = c.encode_utf8(&mut buf).as_bytes();

        prop_assert_eq!(re.is_match(bytes), a <= c && c <= b);
    }

    #[test]
    fn prop_utf8_expansion_compiles_and_accepts_its_bounds(
        x in any::<char>(),
        y in any::<char>(),
    ) {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        let frag = utf8(a as i32, b as i32, true, None);
        let pattern = Pattern::new(&frag).expect("expansion compiles");

        for &c in &[a, b] {
            let bytes = utf8::encode(c as u32);
            let m = run(&pattern, &bytes);
            prop_assert_eq!(m.map(|m| m.end), Some(bytes.len()));
        }
    }

    #[test]
    fn prop_literal_alternation_accepts_each_literal(
        words in prop::collection::vec("[a-z]{1,6}", 1..5),
    ) {
        let rex = words.join("|");
        let pattern = Pattern::new(&rex).expect("valid pattern");

        for (k, word) in words.iter().enumerate() {
            let m = run(&pattern, word.as_bytes()).expect("literal matches");
            // an equal earlier alternative may shadow this one
            prop_assert!(m.choice as usize <= k + 1);
            prop_assert_eq!(m.end, word.len());
        }
    }
}
