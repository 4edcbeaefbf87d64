//! Glob matching for the KEYS command.
//!
//! Supported syntax:
//! - `*` matches any run of characters, including none
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]`, `[^a-z]` match one character from (or outside) a class
//! - `\x` matches `x` literally
//!
//! Matching is byte-oriented and iterative: on a mismatch we backtrack to the
//! most recent `*` and let it swallow one more byte.

/// A compiled KEYS pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: Vec<u8>,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.as_bytes().to_vec(),
        }
    }

    /// True for `*`, which lets callers skip matching entirely.
    pub fn matches_all(&self) -> bool {
        self.pattern == b"*"
    }

    pub fn matches(&self, text: &str) -> bool {
        glob_match(&self.pattern, text.as_bytes())
    }
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    // (pattern index of the last `*`, text index it is currently anchored at)
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        let advanced = match pattern.get(p) {
            Some(b'*') => {
                star = Some((p, t));
                p += 1;
                continue;
            }
            Some(b'?') => {
                p += 1;
                t += 1;
                true
            }
            Some(b'[') => match match_class(&pattern[p..], text[t]) {
                Some((true, consumed)) => {
                    p += consumed;
                    t += 1;
                    true
                }
                _ => false,
            },
            Some(b'\\') if p + 1 < pattern.len() => {
                if pattern[p + 1] == text[t] {
                    p += 2;
                    t += 1;
                    true
                } else {
                    false
                }
            }
            Some(&c) if c == text[t] => {
                p += 1;
                t += 1;
                true
            }
            _ => false,
        };

        if !advanced {
            match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            }
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// Matches `c` against the class starting at `pattern[0] == b'['`.
///
/// Returns whether it matched and how many pattern bytes the class spans,
/// or `None` if the class is never closed.
fn match_class(pattern: &[u8], c: u8) -> Option<(bool, usize)> {
    let mut i = 1;
    let negate = pattern.get(1) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let lo = pattern[i].min(pattern[i + 2]);
            let hi = pattern[i].max(pattern[i + 2]);
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }

    if i >= pattern.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}
