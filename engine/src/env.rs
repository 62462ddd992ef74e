//! Shell-style environment variable expansion.
//!
//! Supports `$NAME`, `${NAME}` and the single-character special names
//! (`$1`, `$@`, ...). Unset variables expand to the empty string. A `$` that
//! is not followed by a name is kept.

/// Resolve a name from the process environment.
pub fn lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Expand variables using `lookup` to resolve names.
pub fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => {
                    let name = &braced[..end];
                    if !name.is_empty() {
                        out.push_str(&lookup(name).unwrap_or_default());
                    }
                    rest = &braced[end + 1..];
                }
                // Unterminated `${` is dropped.
                None => rest = braced,
            }
            continue;
        }

        match after.chars().next() {
            Some(c) if is_special(c) => {
                let (name, tail) = after.split_at(c.len_utf8());
                out.push_str(&lookup(name).unwrap_or_default());
                rest = tail;
            }
            _ => {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                if end == 0 {
                    out.push('$');
                } else {
                    out.push_str(&lookup(&after[..end]).unwrap_or_default());
                }
                rest = &after[end..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn is_special(c: char) -> bool {
    matches!(c, '*' | '#' | '$' | '@' | '!' | '?' | '-') || c.is_ascii_digit()
}
