// Copyright 2018 Steven Bosnick
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE-2.0 or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms

//! The alphabet the compiler works over: byte codes plus meta characters.
//!
//! A [`Char`] is an integer character code. Codes 0x00 through 0xFF are the
//! input bytes; codes above [`META_MIN`] are meta characters, synthetic
//! codes for zero-width boundary predicates (word, line, buffer and indent
//! boundaries) that the matcher engine evaluates against the input position
//! instead of consuming a byte. The numeric order of the meta codes is
//! observable in the opcode format and must not change.
//!
//! A [`CharSet`] is an ordered set of `Char` stored as coalesced closed
//! ranges, the form in which transitions are attached to DFA states.
//!
//! [`Char`]: type.Char.html
//! [`META_MIN`]: constant.META_MIN.html
//! [`CharSet`]: struct.CharSet.html

use std::cmp;
use std::iter::FromIterator;

use itertools::Itertools;

/// An integer character code: a byte 0x00-0xFF or a meta character.
pub type Char = u16;

/// The lower bound of the meta character range; not itself a character.
pub const META_MIN: Char = 0x100;
/// Non-word boundary before the match begins, `\Bx`.
pub const META_NWB: Char = 0x101;
/// Non-word boundary after the match ends, `x\B`.
pub const META_NWE: Char = 0x102;
/// Begin of a word where the match begins, `\<x`.
pub const META_BWB: Char = 0x103;
/// End of a word where the match begins, `\>x`.
pub const META_EWB: Char = 0x104;
/// Begin of a word where the match ends, `x\<`.
pub const META_BWE: Char = 0x105;
/// End of a word where the match ends, `x\>`.
pub const META_EWE: Char = 0x106;
/// Begin of a line, `^`.
pub const META_BOL: Char = 0x107;
/// End of a line, `$`.
pub const META_EOL: Char = 0x108;
/// Begin of the input buffer, `\A`.
pub const META_BOB: Char = 0x109;
/// End of the input buffer, `\Z`.
pub const META_EOB: Char = 0x10a;
/// Indent boundary, `\i`.
pub const META_IND: Char = 0x10b;
/// Dedent boundary, `\j`; the largest meta code.
pub const META_DED: Char = 0x10c;

/// Check whether a character code is a meta character.
pub fn is_meta(c: Char) -> bool {
    c > META_MIN
}

/// Get a short display name for a meta character code.
///
/// Returns `"?"` for a code outside the meta range.
pub fn meta_name(c: Char) -> &'static str {
    match c {
        META_NWB => "NWB",
        META_NWE => "NWE",
        META_BWB => "BWB",
        META_EWB => "EWB",
        META_BWE => "BWE",
        META_EWE => "EWE",
        META_BOL => "BOL",
        META_EOL => "EOL",
        META_BOB => "BOB",
        META_EOB => "EOB",
        META_IND => "IND",
        META_DED => "DED",
        _ => "?",
    }
}

/// An ordered set of [`Char`] stored as coalesced closed ranges.
///
/// The ranges are kept sorted, pairwise disjoint and non-adjacent, so the
/// representation of a given set is unique. Byte ranges never merge with
/// meta codes because [`META_MIN`] itself is never a member.
///
/// [`Char`]: type.Char.html
/// [`META_MIN`]: constant.META_MIN.html
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CharSet {
    ranges: Vec<(Char, Char)>,
}

impl CharSet {
    /// Create an empty set.
    pub fn new() -> CharSet {
        CharSet { ranges: Vec::new() }
    }

    /// Create a set holding the single character `c`.
    pub fn single(c: Char) -> CharSet {
        CharSet {
            ranges: vec![(c, c)],
        }
    }

    /// Create a set holding the closed range `lo..=hi`.
    pub fn range(lo: Char, hi: Char) -> CharSet {
        debug_assert!(lo <= hi);
        CharSet {
            ranges: vec![(lo, hi)],
        }
    }

    /// Check if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Get the smallest member of the set.
    pub fn lo(&self) -> Option<Char> {
        self.ranges.first().map(|r| r.0)
    }

    /// Get the largest member of the set.
    pub fn hi(&self) -> Option<Char> {
        self.ranges.last().map(|r| r.1)
    }

    /// Check if `c` is a member of the set.
    pub fn contains(&self, c: Char) -> bool {
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if c < lo {
                    cmp::Ordering::Greater
                } else if c > hi {
                    cmp::Ordering::Less
                } else {
                    cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Iterate the closed ranges of the set in increasing order.
    pub fn iter<'a>(&'a self) -> impl Iterator<Item = (Char, Char)> + 'a {
        self.ranges.iter().cloned()
    }

    /// Insert the single character `c`.
    pub fn insert(&mut self, c: Char) {
        self.insert_range(c, c);
    }

    /// Insert the closed range `lo..=hi`, merging with overlapping or
    /// adjacent ranges.
    pub fn insert_range(&mut self, lo: Char, hi: Char) {
        debug_assert!(lo <= hi);
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        let mut lo = lo;
        let mut hi = hi;
        let mut placed = false;
        for &(a, b) in &self.ranges {
            if (b as u32) + 1 < lo as u32 {
                out.push((a, b));
            } else if (hi as u32) + 1 < a as u32 {
                if !placed {
                    out.push((lo, hi));
                    placed = true;
                }
                out.push((a, b));
            } else {
                lo = cmp::min(lo, a);
                hi = cmp::max(hi, b);
            }
        }
        if !placed {
            out.push((lo, hi));
        }
        self.ranges = out;
    }

    /// The union of `self` and `other`.
    pub fn union(&self, other: &CharSet) -> CharSet {
        self.ranges
            .iter()
            .chain(other.ranges.iter())
            .cloned()
            .collect()
    }

    /// The intersection of `self` and `other`.
    pub fn intersect(&self, other: &CharSet) -> CharSet {
        let a = &self.ranges;
        let b = &other.ranges;
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            let lo = cmp::max(a[i].0, b[j].0);
            let hi = cmp::min(a[i].1, b[j].1);
            if lo <= hi {
                out.push((lo, hi));
            }
            if a[i].1 < b[j].1 {
                i += 1;
            } else {
                j += 1;
            }
        }
        CharSet { ranges: out }
    }

    /// The members of `self` that are not members of `other`.
    pub fn difference(&self, other: &CharSet) -> CharSet {
        let b = &other.ranges;
        let mut out = Vec::new();
        let mut j = 0;
        for &(start, hi) in &self.ranges {
            let mut lo = start;
            while j < b.len() && b[j].1 < lo {
                j += 1;
            }
            let mut k = j;
            while lo <= hi {
                if k >= b.len() || b[k].0 > hi {
                    out.push((lo, hi));
                    break;
                }
                let (blo, bhi) = b[k];
                if blo > lo {
                    out.push((lo, blo - 1));
                }
                if bhi >= hi {
                    break;
                }
                lo = bhi + 1;
                k += 1;
            }
        }
        CharSet { ranges: out }
    }

    /// The complement of the set within the byte range 0x00-0xFF.
    ///
    /// Meta characters are dropped; bracket list negation applies to input
    /// bytes only.
    pub fn negate256(&self) -> CharSet {
        let mut out = CharSet::new();
        let mut next: u32 = 0;
        for &(lo, hi) in self.ranges.iter().take_while(|r| r.0 <= 0xff) {
            if (lo as u32) > next {
                out.insert_range(next as Char, lo - 1);
            }
            next = cmp::min(hi, 0xff) as u32 + 1;
        }
        if next <= 0xff {
            out.insert_range(next as Char, 0xff);
        }
        out
    }

    /// Add the other ASCII case of every letter in the set.
    pub fn fold_case(&self) -> CharSet {
        let mut out = self.clone();
        for &(lo, hi) in &self.ranges {
            let l = cmp::max(lo, b'a' as Char);
            let h = cmp::min(hi, b'z' as Char);
            if l <= h {
                out.insert_range(l - 0x20, h - 0x20);
            }
            let l = cmp::max(lo, b'A' as Char);
            let h = cmp::min(hi, b'Z' as Char);
            if l <= h {
                out.insert_range(l + 0x20, h + 0x20);
            }
        }
        out
    }
}

impl FromIterator<(Char, Char)> for CharSet {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = (Char, Char)>,
    {
        let ranges = iter
            .into_iter()
            .sorted_by_key(|r| r.0)
            .coalesce(|a, b| {
                if (a.1 as u32) + 1 >= b.0 as u32 {
                    Ok((a.0, cmp::max(a.1, b.1)))
                } else {
                    Err((a, b))
                }
            })
            .collect();
        CharSet { ranges }
    }
}

/// Build the character set of a POSIX character class.
///
/// Returns `None` for a name that is not one of the fourteen POSIX class
/// names.
pub fn posix_class(name: &str) -> Option<CharSet> {
    let set = match name {
        "alnum" => vec![(0x30, 0x39), (0x41, 0x5a), (0x61, 0x7a)],
        "alpha" => vec![(0x41, 0x5a), (0x61, 0x7a)],
        "ascii" => vec![(0x00, 0x7f)],
        "blank" => vec![(0x09, 0x09), (0x20, 0x20)],
        "cntrl" => vec![(0x00, 0x1f), (0x7f, 0x7f)],
        "digit" => vec![(0x30, 0x39)],
        "graph" => vec![(0x21, 0x7e)],
        "lower" => vec![(0x61, 0x7a)],
        "print" => vec![(0x20, 0x7e)],
        "punct" => vec![(0x21, 0x2f), (0x3a, 0x40), (0x5b, 0x60), (0x7b, 0x7e)],
        "space" => vec![(0x09, 0x0d), (0x20, 0x20)],
        "upper" => vec![(0x41, 0x5a)],
        "word" => vec![(0x30, 0x39), (0x41, 0x5a), (0x5f, 0x5f), (0x61, 0x7a)],
        "xdigit" => vec![(0x30, 0x39), (0x41, 0x46), (0x61, 0x66)],
        _ => return None,
    };
    Some(set.into_iter().collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn insert_range_merges_overlapping_and_adjacent_ranges() {
        let mut sut = CharSet::new();
        sut.insert_range(b'b' as Char, b'd' as Char);
        sut.insert_range(b'e' as Char, b'g' as Char);
        sut.insert_range(b'a' as Char, b'c' as Char);

        let ranges: Vec<_> = sut.iter().collect();

        assert_eq!(ranges, vec![(b'a' as Char, b'g' as Char)]);
    }

    #[test]
    fn insert_range_keeps_disjoint_ranges_apart() {
        let mut sut = CharSet::new();
        sut.insert(b'a' as Char);
        sut.insert(b'x' as Char);

        let ranges: Vec<_> = sut.iter().collect();

        assert_eq!(
            ranges,
            vec![(b'a' as Char, b'a' as Char), (b'x' as Char, b'x' as Char)]
        );
    }

    #[test]
    fn byte_ranges_do_not_merge_with_meta_codes() {
        let mut sut = CharSet::new();
        sut.insert_range(0xfe, 0xff);
        sut.insert(META_NWB);

        assert_eq!(sut.iter().count(), 2);
    }

    #[test]
    fn contains_finds_members_and_rejects_non_members() {
        let sut = CharSet::range(b'b' as Char, b'd' as Char);

        assert!(!sut.contains(b'a' as Char));
        assert!(sut.contains(b'b' as Char));
        assert!(sut.contains(b'c' as Char));
        assert!(sut.contains(b'd' as Char));
        assert!(!sut.contains(b'e' as Char));
    }

    #[test]
    fn intersect_of_overlapping_ranges_is_the_overlap() {
        let a = CharSet::range(b'a' as Char, b'm' as Char);
        let b = CharSet::range(b'h' as Char, b'z' as Char);

        let sut = a.intersect(&b);

        assert_eq!(
            sut.iter().collect::<Vec<_>>(),
            vec![(b'h' as Char, b'm' as Char)]
        );
    }

    #[test]
    fn difference_splits_a_range() {
        let a = CharSet::range(0x00, 0xff);
        let b = CharSet::single(b'\n' as Char);

        let sut = a.difference(&b);

        assert_eq!(sut.iter().collect::<Vec<_>>(), vec![(0x00, 0x09), (0x0b, 0xff)]);
    }

    #[test]
    fn negate256_of_empty_set_is_all_bytes() {
        let sut = CharSet::new().negate256();

        assert_eq!(sut.iter().collect::<Vec<_>>(), vec![(0x00, 0xff)]);
    }

    #[test]
    fn negate256_drops_meta_characters() {
        let mut set = CharSet::range(0x01, 0xff);
        set.insert(META_BOL);

        let sut = set.negate256();

        assert_eq!(sut.iter().collect::<Vec<_>>(), vec![(0x00, 0x00)]);
    }

    #[test]
    fn fold_case_adds_the_other_case_of_letters() {
        let sut = CharSet::range(b'a' as Char, b'c' as Char).fold_case();

        assert!(sut.contains(b'A' as Char));
        assert!(sut.contains(b'B' as Char));
        assert!(sut.contains(b'C' as Char));
        assert!(sut.contains(b'b' as Char));
        assert!(!sut.contains(b'd' as Char));
    }

    #[test]
    fn posix_class_knows_alpha_and_rejects_unknown_names() {
        let alpha = posix_class("alpha").expect("alpha is a POSIX class");

        assert!(alpha.contains(b'q' as Char));
        assert!(alpha.contains(b'Q' as Char));
        assert!(!alpha.contains(b'9' as Char));
        assert!(posix_class("alphabet").is_none());
    }

    fn ranges() -> impl Strategy<Value = Vec<(Char, Char)>> {
        prop::collection::vec((0u16..0x100, 0u16..0x100), 0..6).prop_map(|v| {
            v.into_iter()
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_union_membership_is_either_membership(a in ranges(), b in ranges(), c in 0u16..0x100) {
            let sa: CharSet = a.into_iter().collect();
            let sb: CharSet = b.into_iter().collect();

            let sut = sa.union(&sb);

            prop_assert_eq!(sut.contains(c), sa.contains(c) || sb.contains(c));
        }

        #[test]
        fn prop_difference_membership_is_and_not(a in ranges(), b in ranges(), c in 0u16..0x100) {
            let sa: CharSet = a.into_iter().collect();
            let sb: CharSet = b.into_iter().collect();

            let sut = sa.difference(&sb);

            prop_assert_eq!(sut.contains(c), sa.contains(c) && !sb.contains(c));
        }

        #[test]
        fn prop_intersect_membership_is_both_membership(a in ranges(), b in ranges(), c in 0u16..0x100) {
            let sa: CharSet = a.into_iter().collect();
            let sb: CharSet = b.into_iter().collect();

            let sut = sa.intersect(&sb);

            prop_assert_eq!(sut.contains(c), sa.contains(c) && sb.contains(c));
        }
    }
}
