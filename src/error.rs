// Copyright 2018 Steven Bosnick
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE-2.0 or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms

//! The error type raised while compiling a pattern.

use std::fmt::{self, Display};
use std::result;

use position::Location;

/// The kind of a [`PatternError`].
///
/// [`PatternError`]: struct.PatternError.html
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The regular expression is malformed: unbalanced parentheses, an
    /// unknown escape or `(?...)` construct, or an unknown compiler option.
    RegexSyntax,

    /// A `{n,m}` repetition range is invalid: `n` exceeds `m` or a bound
    /// overflows the supported maximum.
    RegexRange,

    /// A bracket list is malformed: an `a-b` range with `a` greater than
    /// `b`, or an unknown or empty class reference.
    RegexList,

    /// The compiled opcode table or a state index would exceed the 16 bit
    /// index space of the opcode format.
    CodeOverflow,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ErrorKind::RegexSyntax => write!(f, "regex syntax error"),
            ErrorKind::RegexRange => write!(f, "regex repeat range error"),
            ErrorKind::RegexList => write!(f, "regex bracket list error"),
            ErrorKind::CodeOverflow => write!(f, "compiled code is too large"),
        }
    }
}

/// The error type for pattern compilation.
///
/// A `PatternError` records what went wrong ([`ErrorKind`]), a human
/// readable message, the offending location in the source text (0 when no
/// location applies) and the source text itself.
///
/// [`ErrorKind`]: enum.ErrorKind.html
#[derive(Debug, Fail)]
#[fail(display = "{}: {} at position {} in {:?}", kind, message, loc, regex)]
pub struct PatternError {
    kind: ErrorKind,
    message: String,
    loc: Location,
    regex: String,
}

impl PatternError {
    pub(crate) fn new(kind: ErrorKind, message: &str, loc: Location, regex: &str) -> PatternError {
        PatternError {
            kind,
            message: message.to_string(),
            loc,
            regex: regex.to_string(),
        }
    }

    /// Get the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the human readable message for the error.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the location of the error in the source text, or 0 when the
    /// error has no particular location.
    pub fn location(&self) -> Location {
        self.loc
    }

    /// Get the source text the error was raised for.
    pub fn source_text(&self) -> &str {
        &self.regex
    }
}

/// A specialized `Result` type for pattern compilation.
pub type Result<T> = result::Result<T, PatternError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pattern_error_displays_kind_message_and_location() {
        let sut = PatternError::new(ErrorKind::RegexSyntax, "missing )", 3, "(ab");

        let display = sut.to_string();

        assert!(display.contains("regex syntax error"));
        assert!(display.contains("missing )"));
        assert!(display.contains("position 3"));
    }

    #[test]
    fn pattern_error_reports_its_parts() {
        let sut = PatternError::new(ErrorKind::RegexList, "invalid range", 2, "[b-a]");

        assert_eq!(sut.kind(), ErrorKind::RegexList);
        assert_eq!(sut.message(), "invalid range");
        assert_eq!(sut.location(), 2);
        assert_eq!(sut.source_text(), "[b-a]");
    }
}
