//! Character reference decoding and escaping.
//!
//! Serializers only ever emit a handful of named references plus numeric
//! ones, so the named table is short. Unknown references are kept verbatim.

use std::borrow::Cow;

const NAMED: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
    ("copy", '\u{a9}'),
    ("reg", '\u{ae}'),
    ("trade", '\u{2122}'),
    ("hellip", '\u{2026}'),
    ("mdash", '\u{2014}'),
    ("ndash", '\u{2013}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("ldquo", '\u{201c}'),
    ("rdquo", '\u{201d}'),
    ("laquo", '\u{ab}'),
    ("raquo", '\u{bb}'),
    ("bull", '\u{2022}'),
    ("middot", '\u{b7}'),
    ("times", '\u{d7}'),
    ("divide", '\u{f7}'),
    ("deg", '\u{b0}'),
    ("sect", '\u{a7}'),
    ("para", '\u{b6}'),
    ("cent", '\u{a2}'),
    ("pound", '\u{a3}'),
    ("yen", '\u{a5}'),
    ("euro", '\u{20ac}'),
];

// Longest name in NAMED plus room for a numeric reference.
const MAX_REFERENCE_LEN: usize = 10;

pub fn decode(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp + 1..];
        // Only look as far as a reference can reach; `;` is ASCII so its
        // index is always a char boundary.
        match candidate
            .bytes()
            .take(MAX_REFERENCE_LEN + 1)
            .position(|b| b == b';')
            .filter(|&end| end > 0)
            .and_then(|end| resolve(&candidate[..end]).map(|ch| (ch, end)))
        {
            Some((ch, end)) => {
                out.push(ch);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push('&');
                rest = candidate;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn resolve(reference: &str) -> Option<char> {
    if let Some(numeric) = reference.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return Some(match code {
            0 => '\u{fffd}',
            code => char::from_u32(code).unwrap_or('\u{fffd}'),
        });
    }
    NAMED
        .iter()
        .find(|(name, _)| *name == reference)
        .map(|(_, ch)| *ch)
}

pub fn escape_text(input: &str, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

pub fn escape_attr(input: &str, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_and_numeric() {
        assert_eq!(decode("a &amp; b"), "a & b");
        assert_eq!(decode("&#169; &#xA9;"), "\u{a9} \u{a9}");
        assert_eq!(decode("&lt;div&gt;"), "<div>");
    }

    #[test]
    fn unknown_references_survive() {
        assert_eq!(decode("fish &chips; & co"), "fish &chips; & co");
        assert_eq!(decode("trailing &"), "trailing &");
    }

    #[test]
    fn references_longer_than_any_name_stay_literal() {
        assert_eq!(decode("&#x0000000041;"), "&#x0000000041;");
        assert_eq!(decode("&#000000065;"), "A");
        assert_eq!(decode("&é;&amp;"), "&é;&");
    }

    #[test]
    fn long_runs_of_bare_ampersands() {
        let run = format!("{};", "&".repeat(50_000));
        assert_eq!(decode(&run), run);
    }

    #[test]
    fn escaping_round_trips_through_decode() {
        let mut out = String::new();
        escape_attr("say \"<hi>\" & go", &mut out);
        assert_eq!(out, "say &quot;&lt;hi>&quot; &amp; go");
        assert_eq!(decode(&out), "say \"<hi>\" & go");
    }
}
