//! Reversible escaping for characters outside the Basic Multilingual Plane
//!
//! The comments table is written through a connection that may only accept
//! three-byte UTF-8 (MySQL `utf8`-style columns), so every scalar that needs a
//! four-byte encoding is stored as a bracketed escape token such as
//! `[\u1f600]`.
//!
//! A literal `[` that is directly followed by `\u` is escaped as well
//! (`[\u5b]`). Without that, user text that happens to look like a token would
//! be turned into a character on decode.

const TOKEN_OPEN: &str = "[\\u";
const MAX_HEX_DIGITS: usize = 6;

/// Replaces four-byte scalars with `[\uXXXX]` tokens
///
/// # Example
///
/// ```
/// use reply_harvest::codec::encode;
///
/// assert_eq!(encode("hi 😀"), "hi [\\u1f600]");
/// assert_eq!(encode("plain"), "plain");
/// ```
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for (idx, ch) in text.char_indices() {
        let needs_escape =
            ch.len_utf8() == 4 || (ch == '[' && text[idx + 1..].starts_with("\\u"));

        if needs_escape {
            push_token(&mut out, ch);
        } else {
            out.push(ch);
        }
    }

    out
}

/// Restores characters from `[\uXXXX]` tokens
///
/// Malformed tokens (bad hex, surrogates, missing `]`) are left untouched.
///
/// # Example
///
/// ```
/// use reply_harvest::codec::{decode, encode};
///
/// let original = "[\\u1f600] is not 😀";
/// assert_eq!(decode(&encode(original)), original);
/// ```
pub fn decode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(TOKEN_OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + TOKEN_OPEN.len()..];

        match parse_token_body(after_open) {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &after_open[consumed..];
            }
            None => {
                out.push('[');
                rest = &rest[start + 1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn push_token(out: &mut String, ch: char) {
    out.push_str(TOKEN_OPEN);
    out.push_str(&format!("{:x}", ch as u32));
    out.push(']');
}

/// Parses `<hex>]` and returns the character plus the number of bytes consumed
fn parse_token_body(body: &str) -> Option<(char, usize)> {
    let close = body.find(']')?;
    let digits = &body[..close];

    if digits.is_empty()
        || digits.len() > MAX_HEX_DIGITS
        || !digits.chars().all(|c| c.is_ascii_hexdigit())
    {
        return None;
    }

    let value = u32::from_str_radix(digits, 16).ok()?;
    let ch = char::from_u32(value)?;
    Some((ch, close + 1))
}
