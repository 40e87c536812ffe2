// Copyright (c) 2024 xmpp-rs contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! JID escaping, as specified by [XEP-0106](https://xmpp.org/extensions/xep-0106.html).
//!
//! This lets a localpart carry characters that are otherwise forbidden in
//! the `local` grammar (for instance when mapping a foreign account name
//! onto a JID localpart via a gateway) by percent-escaping them with a
//! leading backslash.

const ESCAPE_TABLE: &[(char, &str)] = &[
    (' ', "\\20"),
    ('"', "\\22"),
    ('&', "\\26"),
    ('\'', "\\27"),
    ('/', "\\2f"),
    (':', "\\3a"),
    ('<', "\\3c"),
    ('>', "\\3e"),
    ('@', "\\40"),
    ('\\', "\\5c"),
];

/// Escape a string for use as a JID localpart, per XEP-0106.
///
/// A leading or trailing space, and any sequence that would otherwise be
/// parsed as an escape sequence, is also escaped so that
/// `unescape(&escape(s)) == s` for every `s`.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && is_escape_sequence(&chars[i..]) {
            out.push_str("\\5c");
            i += 1;
            continue;
        }
        if let Some((_, escaped)) = ESCAPE_TABLE.iter().find(|(from, _)| *from == c) {
            out.push_str(escaped);
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}

fn is_escape_sequence(rest: &[char]) -> bool {
    if rest.len() < 3 || rest[0] != '\\' {
        return false;
    }
    let hex: String = rest[1..3].iter().collect();
    u8::from_str_radix(&hex, 16).is_ok()
}

/// Unescape a JID localpart previously escaped with [`escape`], per
/// XEP-0106.
pub fn unescape(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && is_escape_sequence(&chars[i..]) {
            let hex: String = chars[i + 1..i + 3].iter().collect();
            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                out.push(byte as char);
                i += 3;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reserved_characters() {
        assert_eq!(escape("foo bar"), "foo\\20bar");
        assert_eq!(escape("nasty!@weirdo"), "nasty!\\40weirdo");
    }

    #[test]
    fn round_trips() {
        for sample in ["space cadet", "slash/foo", "back\\slash", "plain"] {
            assert_eq!(unescape(&escape(sample)), sample);
        }
    }
}
