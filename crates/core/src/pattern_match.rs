//! SQL LIKE pattern matching.
//!
//! Two wildcards are recognised:
//! - `%` matches zero or more characters
//! - `_` matches exactly one character
//!
//! Matching is case-sensitive and operates on Unicode scalar values. The
//! matcher backtracks only to the most recent `%`, so it runs in
//! `O(value * pattern)` worst case without recursion.

/// Returns true when `value` matches the LIKE `pattern`.
///
/// ```
/// use braid_core::pattern_match::like;
/// assert!(like("hello", "h%o"));
/// assert!(like("hello", "_ello"));
/// assert!(!like("hello", "world"));
/// ```
pub fn like(value: &str, pattern: &str) -> bool {
    let v: Vec<char> = value.chars().collect();
    let p: Vec<char> = pattern.chars().collect();

    let (mut vi, mut pi) = (0usize, 0usize);
    // (pattern index after the last '%', value index it was matched against)
    let mut resume: Option<(usize, usize)> = None;

    while vi < v.len() {
        match p.get(pi) {
            Some('%') => {
                pi += 1;
                resume = Some((pi, vi));
            }
            Some('_') => {
                vi += 1;
                pi += 1;
            }
            Some(&ch) if ch == v[vi] => {
                vi += 1;
                pi += 1;
            }
            _ => match resume {
                Some((rp, rv)) => {
                    pi = rp;
                    vi = rv + 1;
                    resume = Some((rp, rv + 1));
                }
                None => return false,
            },
        }
    }

    p[pi..].iter().all(|&c| c == '%')
}

/// Returns true when the pattern contains no wildcard, so LIKE degenerates
/// to equality.
pub fn is_literal(pattern: &str) -> bool {
    !pattern.contains(['%', '_'])
}
