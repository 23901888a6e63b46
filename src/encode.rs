// Copyright 2018 Steven Bosnick
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE-2.0 or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms

// Linear layout of the DFA as an opcode array.
//
// One block of opcodes per state, in state allocation order so the start
// state comes first. Within a block: the accept (take or redo), then tail
// and head lookahead marks, then meta transfers, then byte range transfers
// ascending, then halt. The halt is omitted when the final transfer covers
// every byte and therefore always fires. Two passes: block offsets first,
// then emission with the offsets patched into the transfer targets.

use std::fs::File;
use std::io::{self, Write};

use alphabet::{is_meta, meta_name, Char};
use compile::{Dfa, State};
use error::{ErrorKind, PatternError, Result};
use opcode::{self, Index, Opcode, IMAX};
use options::Options;

/// Encode the automaton as a flat opcode array.
pub fn encode(dfa: &Dfa, rex: &str) -> Result<Vec<Opcode>> {
    let mut offsets = Vec::with_capacity(dfa.states.len());
    let mut words: usize = 0;
    for st in dfa.states.values() {
        offsets.push(words);
        words += block_len(st);
    }
    if words >= usize::from(IMAX) {
        return Err(PatternError::new(
            ErrorKind::CodeOverflow,
            "compiled opcode table exceeds the index space",
            0,
            rex,
        ));
    }
    let mut code = Vec::with_capacity(words);
    for st in dfa.states.values() {
        emit_block(st, &offsets, &mut code);
    }
    debug_assert_eq!(code.len(), words);
    debug!("encoded {} opcode word(s)", code.len());
    Ok(code)
}

fn block_len(st: &State) -> usize {
    let mut len = 0;
    if st.accept != 0 {
        len += 1;
    }
    len += st.tails.len() + st.heads.len();
    for (&lo, &(hi, _)) in &st.edges {
        len += span_len(lo, hi);
    }
    if !ends_unconditional(st) {
        len += 1;
    }
    len
}

// meta transfers encode one meta character each
fn span_len(lo: Char, hi: Char) -> usize {
    if is_meta(lo) {
        usize::from(hi - lo) + 1
    } else {
        1
    }
}

fn ends_unconditional(st: &State) -> bool {
    st.edges.get(&0).map_or(false, |&(hi, _)| hi == 0xff)
}

fn emit_block(st: &State, offsets: &[usize], code: &mut Vec<Opcode>) {
    if st.accept != 0 {
        code.push(if st.redo {
            opcode::redo()
        } else {
            opcode::take(st.accept)
        });
    }
    for &tail in &st.tails {
        code.push(opcode::tail(tail));
    }
    for &head in &st.heads {
        code.push(opcode::head(head));
    }
    for (&lo, &(hi, target)) in st.edges.iter().filter(|&(&lo, _)| is_meta(lo)) {
        for meta in lo..=hi {
            code.push(opcode::goto(meta, meta, offsets[target] as Index));
        }
    }
    for (&lo, &(hi, target)) in st.edges.iter().filter(|&(&lo, _)| !is_meta(lo)) {
        code.push(opcode::goto(lo, hi, offsets[target] as Index));
    }
    if !ends_unconditional(st) {
        code.push(opcode::halt());
    }
}

/// Write the automaton or the opcode table to every export target of the
/// options. Export failures do not fail the compilation; they are logged.
pub fn export(dfa: &Dfa, code: &[Opcode], opt: &Options) {
    for path in &opt.f {
        let result = if path.ends_with(".gv") || path.ends_with(".dot") {
            export_dfa(dfa, &opt.n, path)
        } else {
            export_code(code, &opt.n, path)
        };
        match result {
            Ok(()) => debug!("exported `{}`", path),
            Err(err) => warn!("could not export `{}`: {}", path, err),
        }
    }
}

fn export_dfa(dfa: &Dfa, name: &str, path: &str) -> io::Result<()> {
    let name = if name.is_empty() { "dfa" } else { name };
    let mut file = File::create(path)?;
    writeln!(file, "digraph {} {{", name)?;
    writeln!(file, "  rankdir=LR;")?;
    writeln!(file, "  node [shape=circle];")?;
    for (i, st) in dfa.states.values().enumerate() {
        if st.accept != 0 {
            let action = if st.redo {
                "redo".to_string()
            } else {
                format!("[{}]", st.accept)
            };
            writeln!(
                file,
                "  N{} [shape=doublecircle,label=\"{} {}\"];",
                i, i, action
            )?;
        }
        for (&lo, &(hi, target)) in &st.edges {
            writeln!(
                file,
                "  N{} -> N{} [label=\"{}\"];",
                i,
                target,
                edge_label(lo, hi)
            )?;
        }
    }
    writeln!(file, "}}")
}

fn edge_label(lo: Char, hi: Char) -> String {
    if is_meta(lo) {
        if lo == hi {
            meta_name(lo).to_string()
        } else {
            format!("{}-{}", meta_name(lo), meta_name(hi))
        }
    } else if lo == hi {
        byte_label(lo as u8)
    } else {
        format!("{}-{}", byte_label(lo as u8), byte_label(hi as u8))
    }
}

fn byte_label(b: u8) -> String {
    if b.is_ascii_graphic() && b != b'"' && b != b'\\' {
        (b as char).to_string()
    } else {
        format!("\\\\x{:02x}", b)
    }
}

fn export_code(code: &[Opcode], name: &str, path: &str) -> io::Result<()> {
    let name = if name.is_empty() { "pattern" } else { name };
    let mut file = File::create(path)?;
    writeln!(
        file,
        "pub static {}: [u32; {}] = [",
        name.to_uppercase(),
        code.len()
    )?;
    for chunk in code.chunks(8) {
        let words: Vec<String> = chunk.iter().map(|op| format!("0x{:08x},", op)).collect();
        writeln!(file, "    {}", words.join(" "))?;
    }
    writeln!(file, "];")
}
