// Quoting helpers for template string literals

/// Decode a double-quoted, back-quoted or single-quoted literal.
/// Returns None for malformed input.
pub fn unquote(literal: &str) -> Option<String> {
    let mut chars = literal.chars();
    let quote = chars.next()?;
    if literal.len() < 2 || !literal.ends_with(quote) {
        return None;
    }
    let body = &literal[1..literal.len() - 1];
    match quote {
        '`' => {
            if body.contains('`') {
                return None;
            }
            Some(body.replace('\r', ""))
        }
        '"' => unescape(body, '"'),
        '\'' => {
            let decoded = unescape(body, '\'')?;
            (decoded.chars().count() == 1).then_some(decoded)
        }
        _ => None,
    }
}

fn unescape(body: &str, quote: char) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == quote || c == '\n' {
            return None;
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next()? {
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\x0b',
            '\\' => '\\',
            '"' if quote == '"' => '"',
            '\'' if quote == '\'' => '\'',
            'x' => char::from(u8::from_str_radix(&take(&mut chars, 2)?, 16).ok()?),
            'u' => char::from_u32(u32::from_str_radix(&take(&mut chars, 4)?, 16).ok()?)?,
            'U' => char::from_u32(u32::from_str_radix(&take(&mut chars, 8)?, 16).ok()?)?,
            d @ '0'..='7' => {
                let rest = take(&mut chars, 2)?;
                let value = u32::from_str_radix(&format!("{}{}", d, rest), 8).ok()?;
                if value > 0xff {
                    return None;
                }
                char::from_u32(value)?
            }
            _ => return None,
        };
        out.push(escaped);
    }
    Some(out)
}

fn take(chars: &mut std::str::Chars<'_>, n: usize) -> Option<String> {
    let taken: String = chars.take(n).collect();
    (taken.chars().count() == n).then_some(taken)
}

/// Quote a string the way template names are printed in `define` and `template`
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c == '\x7f' => out.push_str(&format!("\\x{:02x}", c as u32)),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote_interpreted() {
        assert_eq!(unquote(r#""a/b.tpl""#).as_deref(), Some("a/b.tpl"));
        assert_eq!(unquote(r#""tab\there""#).as_deref(), Some("tab\there"));
        assert_eq!(unquote(r#""\x41\101\u00e9""#).as_deref(), Some("AAé"));
    }

    #[test]
    fn test_unquote_raw() {
        assert_eq!(unquote(r"`C:\dir\file`").as_deref(), Some(r"C:\dir\file"));
    }

    #[test]
    fn test_unquote_char() {
        assert_eq!(unquote("'a'").as_deref(), Some("a"));
        assert_eq!(unquote(r"'\n'").as_deref(), Some("\n"));
        assert_eq!(unquote("'ab'"), None);
    }

    #[test]
    fn test_unquote_rejects_malformed() {
        assert_eq!(unquote("\"abc"), None);
        assert_eq!(unquote(r#""bad \q escape""#), None);
        assert_eq!(unquote(r#""\'""#), None);
        assert_eq!(unquote("\""), None);
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("header"), "\"header\"");
        assert_eq!(quote("a\"b\\c\n"), r#""a\"b\\c\n""#);
        assert_eq!(quote("\x01"), r#""\x01""#);
    }
}
