// Copyright 2018 Steven Bosnick
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE-2.0 or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms

//! Compiler options: global modifier modes, syntax switches and output
//! targets.
//!
//! [`Options`] is the explicit record the compiler works from. The textual
//! option string accepted by [`Pattern::with_options`] is a thin adapter
//! over it: runs of single-letter flags separated by `;`, `,` or spaces,
//! where a letter followed by `=` captures the rest of the token as its
//! value (`"i;f=table.rs;n=token"`).
//!
//! [`Options`]: struct.Options.html
//! [`Pattern::with_options`]: ../pattern/struct.Pattern.html#method.with_options

use error::{ErrorKind, PatternError, Result};

/// Global modifier modes, syntax flags, and compiler options.
#[derive(Clone, Debug)]
pub struct Options {
    /// Disable escape sequences inside bracket lists.
    pub b: bool,
    /// The escape character, or `None` for no escapes; `\\` by default.
    pub e: Option<u8>,
    /// Files to export the compiled automaton to.
    pub f: Vec<String>,
    /// Case insensitive matching, also scoped as `(?i:X)`.
    pub i: bool,
    /// Lex mode: `{name}` is a macro reference instead of a repeat bound.
    pub l: bool,
    /// Multi-line mode: `^` and `$` match around every newline, also
    /// scoped as `(?m:X)`.
    pub m: bool,
    /// The pattern name used in exported artifacts.
    pub n: String,
    /// Enable `"..."` verbatim quotation, also scoped as `(?q:X)`.
    pub q: bool,
    /// Raise syntax errors for constructs that would otherwise be accepted
    /// leniently.
    pub r: bool,
    /// Dot-all mode: `.` matches a newline, also scoped as `(?s:X)`.
    pub s: bool,
    /// Write the error message to standard error when compilation fails.
    pub w: bool,
    /// Free-spacing mode: unescaped whitespace is ignored and `#` starts a
    /// comment, also scoped as `(?x:X)`.
    pub x: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            b: false,
            e: Some(b'\\'),
            f: Vec::new(),
            i: false,
            l: false,
            m: false,
            n: String::new(),
            q: false,
            r: false,
            s: false,
            w: false,
            x: false,
        }
    }
}

impl Options {
    /// Decode an option string into an `Options` record.
    ///
    /// An unknown option letter raises [`ErrorKind::RegexSyntax`].
    ///
    /// [`ErrorKind::RegexSyntax`]: ../error/enum.ErrorKind.html
    pub fn parse(options: &str) -> Result<Options> {
        let mut opt = Options::default();
        let bytes = options.as_bytes();
        let mut k = 0;
        while k < bytes.len() {
            let c = bytes[k];
            if c == b';' || c == b',' || c == b' ' {
                k += 1;
                continue;
            }
            let value = if k + 1 < bytes.len() && bytes[k + 1] == b'=' {
                let start = k + 2;
                let mut end = start;
                while end < bytes.len() && bytes[end] != b';' && bytes[end] != b',' {
                    end += 1;
                }
                k = end;
                Some(&options[start..end])
            } else {
                k += 1;
                None
            };
            match (c, value) {
                (b'b', None) => opt.b = true,
                (b'e', Some(v)) => opt.e = v.bytes().next(),
                (b'f', Some(v)) => opt.f.push(v.to_string()),
                (b'i', None) => opt.i = true,
                (b'l', None) => opt.l = true,
                (b'm', None) => opt.m = true,
                (b'n', Some(v)) => opt.n = v.to_string(),
                (b'q', None) => opt.q = true,
                (b'r', None) => opt.r = true,
                (b's', None) => opt.s = true,
                (b'w', None) => opt.w = true,
                (b'x', None) => opt.x = true,
                _ => {
                    return Err(PatternError::new(
                        ErrorKind::RegexSyntax,
                        &format!("unknown option `{}`", c as char),
                        0,
                        options,
                    ))
                }
            }
        }
        Ok(opt)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_options_use_backslash_escapes() {
        let sut = Options::default();

        assert_eq!(sut.e, Some(b'\\'));
        assert!(!sut.i);
        assert!(sut.f.is_empty());
    }

    #[test]
    fn parse_accepts_a_run_of_flag_letters() {
        let sut = Options::parse("imsx").expect("valid options");

        assert!(sut.i);
        assert!(sut.m);
        assert!(sut.s);
        assert!(sut.x);
        assert!(!sut.q);
    }

    #[test]
    fn parse_accepts_semicolon_separated_values() {
        let sut = Options::parse("f=one.rs;n=token;f=two.gv").expect("valid options");

        assert_eq!(sut.f, vec!["one.rs".to_string(), "two.gv".to_string()]);
        assert_eq!(sut.n, "token");
    }

    #[test]
    fn parse_empty_escape_value_disables_escapes() {
        let sut = Options::parse("e=").expect("valid options");

        assert_eq!(sut.e, None);
    }

    #[test]
    fn parse_replaces_the_escape_character() {
        let sut = Options::parse("e=%").expect("valid options");

        assert_eq!(sut.e, Some(b'%'));
    }

    #[test]
    fn parse_rejects_unknown_options() {
        let result = Options::parse("z");

        assert_matches!(result, Err(ref e) if e.kind() == ErrorKind::RegexSyntax);
    }

    #[test]
    fn parse_rejects_flag_with_unexpected_value() {
        let result = Options::parse("i=yes");

        assert_matches!(result, Err(_));
    }
}
