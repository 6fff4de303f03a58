//! Shell-style wildcard matching for question patterns.
//!
//! Supports `*`, `?`, `[seq]` and `[!seq]` (with `a-z` ranges). Every other
//! character, including HTS context delimiters such as `^`, `-`, `+` and `/`,
//! matches itself. A `[` without a closing `]` is literal.

/// Whether `pattern` matches the whole of `text`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` and the text index it is currently absorbing up to.
    let mut star: Option<(usize, usize)> = None;

    while t < txt.len() {
        let step = match pat.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
                continue;
            }
            Some('?') => Some(p + 1),
            Some('[') => match class_at(&pat, p, txt[t]) {
                Some((true, next)) => Some(next),
                Some((false, _)) => None,
                None => (txt[t] == '[').then_some(p + 1),
            },
            Some(&c) => (c == txt[t]).then_some(p + 1),
            None => None,
        };

        match step {
            Some(next) => {
                p = next;
                t += 1;
            }
            None => match star {
                Some((star_p, star_t)) => {
                    star = Some((star_p, star_t + 1));
                    p = star_p + 1;
                    t = star_t + 1;
                }
                None => return false,
            },
        }
    }

    pat[p..].iter().all(|&c| c == '*')
}

/// Evaluate the bracket expression opening at `pat[open]` against `c`.
///
/// Returns whether `c` matched and the index just past the closing `]`, or
/// `None` when the bracket is unterminated.
fn class_at(pat: &[char], open: usize, c: char) -> Option<(bool, usize)> {
    let mut first = open + 1;
    let negate = pat.get(first) == Some(&'!');
    if negate {
        first += 1;
    }
    // A `]` directly after the opening bracket is a member, not the terminator.
    let close = (first + 1..pat.len()).find(|&j| pat[j] == ']')?;

    let mut matched = false;
    let mut k = first;
    while k < close {
        if k + 2 < close && pat[k + 1] == '-' {
            matched |= pat[k] <= c && c <= pat[k + 2];
            k += 3;
        } else {
            matched |= pat[k] == c;
            k += 1;
        }
    }
    Some((matched != negate, close + 1))
}
