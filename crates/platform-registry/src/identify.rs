//! URL glob matching.

/// Whole-string glob match: `*` matches any run (including empty), `?`
/// exactly one character, everything else literally. ASCII case-insensitive.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();

    let (mut p, mut t) = (0usize, 0usize);
    // Last `*` seen and the text position it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, absorbed)) => {
                    p = star + 1;
                    t = absorbed + 1;
                    backtrack = Some((star, absorbed + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_spans_any_run() {
        assert!(glob_match("*://boards.greenhouse.io/*", "https://boards.greenhouse.io/acme/jobs/1"));
        assert!(glob_match("*confirmation*", "https://x.com/apply/confirmation"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("*://jobs.lever.co/*", "https://jobs.lever.com/acme"));
    }

    #[test]
    fn question_mark_is_one_char() {
        assert!(glob_match("https://wd?.example.com/*", "https://wd5.example.com/job"));
        assert!(!glob_match("https://wd?.example.com/*", "https://wd.example.com/job"));
    }

    #[test]
    fn match_is_anchored() {
        assert!(!glob_match("example.com", "https://example.com"));
        assert!(glob_match("HTTPS://EXAMPLE.COM/*", "https://example.com/a"));
    }
}
