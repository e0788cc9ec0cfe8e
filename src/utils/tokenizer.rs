//! Token extraction for the inverted index.
//!
//! A token is a literal piece of text that must appear, as a substring, in
//! every value a pattern can match. The host looks tokens up with a
//! partial (substring) match against stored tokens, so a token may only be
//! emitted when it is guaranteed to be present; when in doubt nothing is
//! emitted and the query degrades to "matches everything".

use crate::index::types::Key;
use memchr::memchr3;
use rustc_hash::FxHashSet;

/// Shortest literal run kept as a token
pub const MIN_TOKEN_LEN: usize = 2;

/// Which pattern language a query argument is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternMode {
    /// SQL LIKE: `%` matches any run, `_` any single character, `\` escapes
    Like,
    /// Regular expression
    Expression,
}

/// Extract tokens from a query pattern
pub fn pattern_tokens(pattern: &str, mode: PatternMode, min_len: usize) -> Vec<Key> {
    match mode {
        PatternMode::Like => like_tokens_with(pattern, min_len),
        PatternMode::Expression => regex_tokens_with(pattern, min_len),
    }
}

/// LIKE tokens with the default minimum length
pub fn like_tokens(pattern: &str) -> Vec<Key> {
    like_tokens_with(pattern, MIN_TOKEN_LEN)
}

/// Split a LIKE pattern on wildcard runs and keep the literal runs of at
/// least `min_len` characters.
///
/// With no qualifying run, the first literal run after the leading
/// wildcards is the single fallback token. An all-wildcard (or empty)
/// pattern yields no tokens.
pub fn like_tokens_with(pattern: &str, min_len: usize) -> Vec<Key> {
    if memchr3(b'%', b'_', b'\\', pattern.as_bytes()).is_none() {
        if pattern.is_empty() {
            return Vec::new();
        }
        return vec![Key::new(pattern)];
    }

    let mut runs = Vec::new();
    let mut run = String::new();
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '%' | '_' => {
                if !run.is_empty() {
                    runs.push(std::mem::take(&mut run));
                }
            }
            // A trailing backslash stands for itself
            '\\' => run.push(chars.next().unwrap_or('\\')),
            c => run.push(c),
        }
    }
    if !run.is_empty() {
        runs.push(run);
    }

    let tokens = dedup(
        runs.iter()
            .filter(|r| r.chars().count() >= min_len)
            .cloned(),
    );
    if !tokens.is_empty() {
        return tokens;
    }

    runs.into_iter().next().map(|r| vec![Key::from(r)]).unwrap_or_default()
}

/// Expression tokens with the default minimum length
pub fn regex_tokens(expression: &str) -> Vec<Key> {
    regex_tokens_with(expression, MIN_TOKEN_LEN)
}

/// Scan a regular expression for alphanumeric-or-space runs of at least
/// `min_len` characters.
///
/// Leading punctuation (anchors, dots) is stripped first, stopping at the
/// first `|` so an empty leading alternative is still seen. Characters made
/// optional anywhere in their quantifier chain (`?`, `*`, `{0,..}`, or a
/// stack such as `+*`) are dropped, a repeated character ends its run, and
/// escapes and bracket classes never contribute. Tokens inside
/// an alternated or optional group are discarded, and a top-level branch
/// without tokens cancels extraction entirely. When nothing qualifies, a
/// metacharacter-free expression is used whole.
pub fn regex_tokens_with(expression: &str, min_len: usize) -> Vec<Key> {
    if has_literal_altering_flag(expression) {
        return Vec::new();
    }

    let body = expression.trim_start_matches(|c: char| {
        c.is_ascii_punctuation() && !matches!(c, '\\' | '[' | '(' | '{' | '|')
    });
    let chars: Vec<char> = body.chars().collect();
    let mut scan = RegexScan::new(min_len);

    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '\\' => {
                scan.flush();
                i = skip_escape(&chars, i);
            }
            '[' => {
                scan.flush();
                i = skip_class(&chars, i);
            }
            '{' => {
                scan.flush();
                i = quantifier_end(&chars, i).unwrap_or(i + 1);
            }
            '(' => {
                scan.flush();
                scan.groups.push(Group {
                    start: scan.tokens.len(),
                    alternates: false,
                });
                i += 1;
                if chars.get(i) == Some(&'?') {
                    // Skip the group modifier, e.g. `?:` or `?P<name>`
                    while i < chars.len() && !matches!(chars[i], ':' | ')' | '>') {
                        i += 1;
                    }
                    if matches!(chars.get(i), Some(':') | Some('>')) {
                        i += 1;
                    }
                }
            }
            ')' => {
                scan.flush();
                let chain = quantifier_chain(&chars, i + 1);
                if let Some(group) = scan.groups.pop() {
                    if group.alternates || chain.allows_zero {
                        scan.tokens.truncate(group.start);
                    }
                }
                i = chain.end;
            }
            '|' => {
                scan.flush();
                match scan.groups.last_mut() {
                    Some(group) => group.alternates = true,
                    None => {
                        scan.alternated = true;
                        scan.end_branch();
                    }
                }
                i += 1;
            }
            c if c.is_alphanumeric() || c == ' ' => {
                let chain = quantifier_chain(&chars, i + 1);
                if chain.allows_zero {
                    scan.flush();
                } else {
                    scan.run.push(c);
                    if chain.repeats {
                        scan.flush();
                    }
                }
                i = chain.end;
            }
            _ => {
                scan.flush();
                i += 1;
            }
        }
    }
    scan.flush();
    // Unclosed groups
    if let Some(start) = scan.groups.iter().find(|g| g.alternates).map(|g| g.start) {
        scan.tokens.truncate(start);
    }
    if scan.alternated {
        scan.end_branch();
    }

    if scan.empty_branch {
        return Vec::new();
    }
    if !scan.tokens.is_empty() {
        return dedup(scan.tokens.into_iter());
    }
    if !body.is_empty() && !body.contains(is_regex_meta) {
        return vec![Key::new(body)];
    }
    Vec::new()
}

/// Tokens stored for a value in tokenizing mode: its alphanumeric-or-space
/// runs of at least `min_len` characters, plus the whole value (even when
/// empty). The whole value guarantees every literal run of a matching
/// pattern is a substring of at least one stored token.
pub fn value_tokens(value: &str, min_len: usize) -> Vec<Key> {
    let mut runs = Vec::new();
    let mut run = String::new();
    for ch in value.chars() {
        if ch.is_alphanumeric() || ch == ' ' {
            run.push(ch);
        } else if !run.is_empty() {
            runs.push(std::mem::take(&mut run));
        }
    }
    if !run.is_empty() {
        runs.push(run);
    }

    let runs = runs
        .into_iter()
        .filter(|r| r.chars().count() >= min_len && !r.trim().is_empty());
    dedup(runs.chain(std::iter::once(value.to_string())))
}

struct Group {
    start: usize,
    alternates: bool,
}

struct RegexScan {
    min_len: usize,
    run: String,
    tokens: Vec<String>,
    groups: Vec<Group>,
    alternated: bool,
    branch_start: usize,
    empty_branch: bool,
}

impl RegexScan {
    fn new(min_len: usize) -> Self {
        Self {
            min_len,
            run: String::new(),
            tokens: Vec::new(),
            groups: Vec::new(),
            alternated: false,
            branch_start: 0,
            empty_branch: false,
        }
    }

    fn flush(&mut self) {
        let run = std::mem::take(&mut self.run);
        if run.chars().count() >= self.min_len && !run.trim().is_empty() {
            self.tokens.push(run);
        }
    }

    /// Close a top-level alternative
    fn end_branch(&mut self) {
        if self.tokens.len() == self.branch_start {
            self.empty_branch = true;
        }
        self.branch_start = self.tokens.len();
    }
}

fn dedup(tokens: impl Iterator<Item = String>) -> Vec<Key> {
    let mut seen = FxHashSet::default();
    tokens
        .filter(|t| seen.insert(t.clone()))
        .map(Key::from)
        .collect()
}

fn is_regex_meta(c: char) -> bool {
    matches!(
        c,
        '\\' | '.' | '^' | '$' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}'
    )
}

/// `i` (case folding) or `x` (ignored whitespace) set anywhere: literals
/// in the expression no longer appear verbatim in matching values
fn has_literal_altering_flag(expression: &str) -> bool {
    expression.match_indices("(?").any(|(pos, _)| {
        expression[pos + 2..]
            .chars()
            .take_while(|c| c.is_ascii_alphabetic() || *c == '-')
            .take_while(|c| *c != '-')
            .any(|c| c == 'i' || c == 'x')
    })
}

/// Index just past the escape sequence starting at `start`
fn skip_escape(chars: &[char], start: usize) -> usize {
    let braced = |from: usize| {
        chars[from.min(chars.len())..]
            .iter()
            .position(|&c| c == '}')
            .map_or(chars.len(), |p| from + p + 1)
    };
    let end = match (chars.get(start + 1), chars.get(start + 2)) {
        (Some('x' | 'u' | 'U' | 'p' | 'P'), Some('{')) => braced(start + 2),
        (Some('x'), _) => start + 4,
        (Some('u'), _) => start + 6,
        (Some('U'), _) => start + 10,
        (Some('p' | 'P'), _) => start + 3,
        _ => start + 2,
    };
    end.min(chars.len())
}

/// Index just past the bracket class starting at `start`
fn skip_class(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    if chars.get(i) == Some(&'^') {
        i += 1;
    }
    // A leading ']' is a literal member
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            ']' => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

/// If a `{m}`, `{m,}` or `{m,n}` quantifier starts at `start`, return the
/// index past it
fn quantifier_end(chars: &[char], start: usize) -> Option<usize> {
    quantifier_bounds(chars, start).map(|(_, end)| end)
}

/// Parse `{n}`, `{n,}`, `{n,m}` or `{,m}` at `start`: the minimum count and
/// the index just past the closing brace
fn quantifier_bounds(chars: &[char], start: usize) -> Option<(u32, usize)> {
    let close = chars[start..].iter().position(|&c| c == '}')? + start;
    let inner: String = chars[start + 1..close].iter().filter(|c| **c != ' ').collect();
    let (min, max) = inner
        .split_once(',')
        .unwrap_or((inner.as_str(), inner.as_str()));
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !digits(min) || !digits(max) || (min.is_empty() && max.is_empty()) {
        return None;
    }
    let min = if min.is_empty() { 0 } else { min.parse().ok()? };
    Some((min, close + 1))
}

/// Combined effect of the quantifiers following an atom
struct QuantifierChain {
    allows_zero: bool,
    repeats: bool,
    /// Index just past the last quantifier
    end: usize,
}

/// Walk every quantifier stacked after the atom ending before `next`.
/// Nested repetition such as `b+*` or `a{2}{0,1}` makes the atom optional
/// if any link allows zero. A single `?` right after a quantifier is its
/// lazy suffix.
fn quantifier_chain(chars: &[char], next: usize) -> QuantifierChain {
    let mut chain = QuantifierChain {
        allows_zero: false,
        repeats: false,
        end: next,
    };
    let mut lazy_allowed = false;
    loop {
        match chars.get(chain.end) {
            Some('?') if lazy_allowed => {
                lazy_allowed = false;
                chain.end += 1;
                continue;
            }
            Some('?') => chain.allows_zero = true,
            Some('*') => {
                chain.allows_zero = true;
                chain.repeats = true;
            }
            Some('+') => chain.repeats = true,
            Some('{') => match quantifier_bounds(chars, chain.end) {
                Some((min, end)) => {
                    chain.allows_zero |= min == 0;
                    chain.repeats = true;
                    chain.end = end;
                    lazy_allowed = true;
                    continue;
                }
                None => break,
            },
            _ => break,
        }
        chain.end += 1;
        lazy_allowed = true;
    }
    chain
}
