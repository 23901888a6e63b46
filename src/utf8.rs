// Copyright 2018 Steven Bosnick
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE-2.0 or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms

//! Expansion of Unicode scalar ranges into byte-level regex fragments.
//!
//! A pattern that should match Unicode text is compiled over bytes, so a
//! scalar range like `[α-ω]` has to become a union of UTF-8 byte sequence
//! patterns first. [`utf8`] produces that union: hex byte literals and
//! byte ranges, grouped and alternated per encoding length.
//!
//! [`utf8`]: fn.utf8.html

use arrayvec::ArrayVec;

/// Encode a code point as UTF-8 bytes.
///
/// Covers the full 31 bit code space with sequences up to 6 bytes long, so
/// ranges beyond the Unicode maximum expand without loss.
pub fn encode(w: u32) -> ArrayVec<[u8; 6]> {
    let mut buf = ArrayVec::new();
    if w < 0x80 {
        buf.push(w as u8);
    } else if w < 0x800 {
        buf.push(0xc0 | (w >> 6) as u8);
        buf.push(0x80 | (w & 0x3f) as u8);
    } else if w < 0x10000 {
        buf.push(0xe0 | (w >> 12) as u8);
        buf.push(0x80 | (w >> 6 & 0x3f) as u8);
        buf.push(0x80 | (w & 0x3f) as u8);
    } else if w < 0x20_0000 {
        buf.push(0xf0 | (w >> 18) as u8);
        buf.push(0x80 | (w >> 12 & 0x3f) as u8);
        buf.push(0x80 | (w >> 6 & 0x3f) as u8);
        buf.push(0x80 | (w & 0x3f) as u8);
    } else if w < 0x400_0000 {
        buf.push(0xf8 | (w >> 24) as u8);
        buf.push(0x80 | (w >> 18 & 0x3f) as u8);
        buf.push(0x80 | (w >> 12 & 0x3f) as u8);
        buf.push(0x80 | (w >> 6 & 0x3f) as u8);
        buf.push(0x80 | (w & 0x3f) as u8);
    } else {
        buf.push(0xfc | (w >> 30) as u8);
        buf.push(0x80 | (w >> 24 & 0x3f) as u8);
        buf.push(0x80 | (w >> 18 & 0x3f) as u8);
        buf.push(0x80 | (w >> 12 & 0x3f) as u8);
        buf.push(0x80 | (w >> 6 & 0x3f) as u8);
        buf.push(0x80 | (w & 0x3f) as u8);
    }
    buf
}

fn hex1(a: u8, esc: &str) -> String {
    format!("{}x{:02x}", esc, a)
}

fn hex2(a: u8, b: u8, esc: &str) -> String {
    if a == b {
        hex1(a, esc)
    } else {
        format!("[{}x{:02x}-{}x{:02x}]", esc, a, esc, b)
    }
}

// Minimum byte sequences per encoding length. The strict table forbids
// over-long forms; the lean table admits them.
const MIN_STRICT: [&'static [u8]; 6] = [
    b"\x00",
    b"\xc2\x80",
    b"\xe0\xa0\x80",
    b"\xf0\x90\x80\x80",
    b"\xf8\x88\x80\x80\x80",
    b"\xfc\x84\x80\x80\x80\x80",
];

const MIN_LEAN: [&'static [u8]; 6] = [
    b"\x00",
    b"\xc2\x80",
    b"\xe0\x80\x80",
    b"\xf0\x80\x80\x80",
    b"\xf8\x80\x80\x80\x80",
    b"\xfc\x80\x80\x80\x80\x80",
];

const MAX: [&'static [u8]; 6] = [
    b"\x7f",
    b"\xdf\xbf",
    b"\xef\xbf\xbf",
    b"\xf7\xbf\xbf\xbf",
    b"\xfb\xbf\xbf\xbf\xbf",
    b"\xfd\xbf\xbf\xbf\xbf\xbf",
];

/// Produce a byte-level regex fragment matching the UTF-8 encodings of the
/// code points in `[a, b]`.
///
/// Escapes are written with `esc`, which falls back to `\\` when `None` or
/// longer than three characters. A negative `a` yields the undefined-range
/// sentinel `{esc}x80`; `b` is raised to `a` when the range is inverted.
///
/// In strict mode continuation bytes are constrained to `[0x80, 0xbf]` and
/// minimum encodings exclude over-long forms; in lean mode continuation
/// bytes are `.` and over-long forms are admitted, which compiles to a
/// smaller automaton.
pub fn utf8(a: i32, b: i32, strict: bool, esc: Option<&str>) -> String {
    let esc = match esc {
        Some(e) if e.len() <= 3 => e,
        _ => "\\",
    };
    if a < 0 {
        return format!("{}x80", esc); // undefined
    }
    let b = if a > b { a } else { b };
    let (a, b) = (a as u32, b as u32);

    let min_utf8: &[&[u8]; 6] = if strict { &MIN_STRICT } else { &MIN_LEAN };
    let any = if strict {
        hex2(0x80, 0xbf, esc)
    } else {
        ".".to_string()
    };

    let at = encode(a);
    let bt = encode(b);
    let mut n = at.len();
    let m = bt.len();
    let mut lob: &[u8] = &at;
    let mut regex = String::new();
    while n <= m {
        let hib: &[u8] = if n < m { MAX[n - 1] } else { &bt };
        let mut i = 0;
        while i < n && lob[i] == hib[i] {
            regex.push_str(&hex1(lob[i], esc));
            i += 1;
        }
        // pattern compression: l == 0 when the low tail is the UTF-8 lower
        // bound, h == 0 when the high tail is the upper bound
        let l: u8 = if (i + 1..n).any(|k| lob[k] != 0x80) { 1 } else { 0 };
        let h: u8 = if (i + 1..n).any(|k| hib[k] != 0xbf) { 1 } else { 0 };
        if i + 1 < n {
            let j = i;
            if i != 0 {
                regex.push('(');
            }
            if l != 0 {
                // the wedge above the exact lower boundary sequence
                let mut p = 0;
                regex.push_str(&hex1(lob[i], esc));
                i += 1;
                while i + 1 < n {
                    if lob[i + 1] == 0x80 {
                        regex.push_str(&hex2(lob[i], 0xbf, esc));
                        i += 1;
                        while i < n && lob[i] == 0x80 {
                            regex.push_str(&any);
                            i += 1;
                        }
                    } else {
                        if lob[i] != 0xbf {
                            p += 1;
                            regex.push('(');
                            regex.push_str(&hex2(lob[i] + 1, 0xbf, esc));
                            for _ in i + 1..n {
                                regex.push_str(&any);
                            }
                            regex.push('|');
                        }
                        regex.push_str(&hex1(lob[i], esc));
                        i += 1;
                    }
                }
                if i < n {
                    regex.push_str(&hex2(lob[i], 0xbf, esc));
                }
                for _ in 0..p {
                    regex.push(')');
                }
                i = j;
            }
            if i + 1 < n && lob[i] + l <= hib[i] - h {
                // the uniform middle region
                if l != 0 {
                    regex.push('|');
                }
                regex.push_str(&hex2(lob[i] + l, hib[i] - h, esc));
                for _ in i + 1..n {
                    regex.push_str(&any);
                }
            }
            if h != 0 {
                // the wedge below the exact upper boundary sequence
                let mut p = 0;
                regex.push('|');
                regex.push_str(&hex1(hib[i], esc));
                i += 1;
                while i + 1 < n {
                    if hib[i + 1] == 0xbf {
                        regex.push_str(&hex2(0x80, hib[i], esc));
                        i += 1;
                        while i < n && hib[i] == 0xbf {
                            regex.push_str(&any);
                            i += 1;
                        }
                    } else {
                        if hib[i] != 0x80 {
                            p += 1;
                            regex.push('(');
                            regex.push_str(&hex2(0x80, hib[i] - 1, esc));
                            for _ in i + 1..n {
                                regex.push_str(&any);
                            }
                            regex.push('|');
                        }
                        regex.push_str(&hex1(hib[i], esc));
                        i += 1;
                    }
                }
                if i < n {
                    regex.push_str(&hex2(0x80, hib[i], esc));
                }
                for _ in 0..p {
                    regex.push(')');
                }
            }
            if j != 0 {
                regex.push(')');
            }
        } else if i < n {
            regex.push_str(&hex2(lob[i], hib[i], esc));
        }
        if n < m {
            lob = min_utf8[n];
            regex.push('|');
        }
        n += 1;
    }
    regex
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_matches_the_standard_library_for_scalar_values() {
        for &c in &['a', 'ß', 'ẞ', '€', '𝄞'] {
            let mut expected = [0u8; 4];
            let expected = c.encode_utf8(&mut expected).as_bytes().to_vec();

            let sut = encode(c as u32);

            assert_eq!(&sut[..], &expected[..]);
        }
    }

    #[test]
    fn encode_covers_the_31_bit_code_space() {
        assert_eq!(encode(0x7fff_ffff).len(), 6);
        assert_eq!(encode(0x400_0000)[0], 0xfc);
    }

    #[test]
    fn two_byte_full_range_is_lead_range_and_continuation_range() {
        let sut = utf8(0x80, 0x7ff, true, None);

        assert_eq!(sut, "[\\xc2-\\xdf][\\x80-\\xbf]");
    }

    #[test]
    fn ascii_range_is_a_single_byte_range() {
        let sut = utf8(0x00, 0x7f, true, None);

        assert_eq!(sut, "[\\x00-\\x7f]");
    }

    #[test]
    fn single_code_point_is_its_byte_literals() {
        let sut = utf8(0x20ac, 0x20ac, true, None);

        assert_eq!(sut, "\\xe2\\x82\\xac");
    }

    #[test]
    fn negative_start_is_the_undefined_sentinel() {
        let sut = utf8(-1, 0x10, true, None);

        assert_eq!(sut, "\\x80");
    }

    #[test]
    fn inverted_range_collapses_to_the_start_point() {
        let sut = utf8(0x41, 0x30, true, None);

        assert_eq!(sut, "\\x41");
    }

    #[test]
    fn custom_escape_is_used_when_short_enough() {
        assert_eq!(utf8(0x00, 0x7f, true, Some("%")), "[%x00-%x7f]");
        assert_eq!(utf8(0x00, 0x7f, true, Some("toolong")), "[\\x00-\\x7f]");
    }

    #[test]
    fn lean_mode_uses_dot_for_continuation_bytes() {
        let strict = utf8(0x80, 0x10_ffff, true, None);
        let lean = utf8(0x80, 0x10_ffff, false, None);

        assert!(!strict.contains('.'));
        assert!(lean.contains('.'));
    }

    #[test]
    fn alternation_spans_every_encoding_length_in_the_range() {
        let sut = utf8(0x20, 0x10_ffff, true, None);

        // one-, two-, three- and four-byte branches
        assert!(sut.matches('|').count() >= 3);
        assert!(sut.starts_with("[\\x20-\\x7f]|"));
    }
}
