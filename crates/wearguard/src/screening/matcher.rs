//! Byte-oriented matcher for the ruleset pattern language.
//!
//! Patterns follow the Lua string pattern dialect: `%a`-style classes, `[...]`
//! sets, the `* + - ?` quantifiers, `^`/`$` anchors, `%b` balanced pairs,
//! `%f` frontiers and captures with back references. Matching is purely
//! byte-wise; callers that want case-insensitive behaviour lower-case both
//! inputs beforehand.

use std::ops::Range;

const MAX_CAPTURES: usize = 32;
const MAX_DEPTH: usize = 200;
const ESCAPE: u8 = b'%';

/// Structural problems detected while interpreting a pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("malformed pattern (ends with '%')")]
    TrailingEscape,
    #[error("malformed pattern (missing ']')")]
    UnclosedSet,
    #[error("missing arguments to '%b'")]
    MissingBalanceArgs,
    #[error("missing '[' after '%f' in pattern")]
    MissingFrontierSet,
    #[error("invalid capture index %{0}")]
    InvalidCaptureIndex(u8),
    #[error("invalid pattern capture")]
    UnmatchedCaptureClose,
    #[error("unfinished capture")]
    UnfinishedCapture,
    #[error("too many captures")]
    TooManyCaptures,
    #[error("pattern too complex")]
    TooComplex,
}

/// Locate the first span of `subject` matched by `pattern`.
pub fn find(subject: &str, pattern: &str) -> Result<Option<Range<usize>>, PatternError> {
    let src = subject.as_bytes();
    let (pat, anchored) = match pattern.as_bytes() {
        [b'^', rest @ ..] => (rest, true),
        all => (all, false),
    };

    let mut state = MatchState::new(src, pat);
    let mut start = 0;
    loop {
        state.reset();
        if let Some(end) = state.do_match(start, 0)? {
            if state.has_open_capture() {
                return Err(PatternError::UnfinishedCapture);
            }
            return Ok(Some(start..end));
        }
        start += 1;
        if anchored || start > src.len() {
            return Ok(None);
        }
    }
}

/// Convenience wrapper over [`find`] for callers that only need a yes/no answer.
pub fn is_match(subject: &str, pattern: &str) -> Result<bool, PatternError> {
    find(subject, pattern).map(|span| span.is_some())
}

#[derive(Debug, Clone, Copy)]
enum CaptureLen {
    Position,
    Open,
    Closed(usize),
}

#[derive(Debug, Clone, Copy)]
struct Capture {
    start: usize,
    len: CaptureLen,
}

struct MatchState<'a> {
    src: &'a [u8],
    pat: &'a [u8],
    captures: Vec<Capture>,
    depth: usize,
}

impl<'a> MatchState<'a> {
    fn new(src: &'a [u8], pat: &'a [u8]) -> Self {
        Self {
            src,
            pat,
            captures: Vec::new(),
            depth: 0,
        }
    }

    fn reset(&mut self) {
        self.captures.clear();
        self.depth = 0;
    }

    fn has_open_capture(&self) -> bool {
        self.captures
            .iter()
            .any(|capture| matches!(capture.len, CaptureLen::Open))
    }

    /// Returns the end offset of a match of `pat[p..]` starting at `src[s..]`.
    fn do_match(&mut self, s: usize, p: usize) -> Result<Option<usize>, PatternError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(PatternError::TooComplex);
        }
        let result = self.match_here(s, p);
        self.depth -= 1;
        result
    }

    fn match_here(&mut self, mut s: usize, mut p: usize) -> Result<Option<usize>, PatternError> {
        let src = self.src;
        let pat = self.pat;

        loop {
            if p == pat.len() {
                return Ok(Some(s));
            }

            match pat[p] {
                b'(' => {
                    return if pat.get(p + 1) == Some(&b')') {
                        self.start_capture(s, p + 2, CaptureLen::Position)
                    } else {
                        self.start_capture(s, p + 1, CaptureLen::Open)
                    };
                }
                b')' => return self.end_capture(s, p + 1),
                b'$' if p + 1 == pat.len() => {
                    return Ok((s == src.len()).then_some(s));
                }
                ESCAPE => match pat.get(p + 1) {
                    Some(b'b') => match self.match_balance(s, p + 2)? {
                        Some(next) => {
                            s = next;
                            p += 4;
                            continue;
                        }
                        None => return Ok(None),
                    },
                    Some(b'f') => {
                        p += 2;
                        if pat.get(p) != Some(&b'[') {
                            return Err(PatternError::MissingFrontierSet);
                        }
                        let ep = self.class_end(p)?;
                        let previous = if s == 0 { 0 } else { src[s - 1] };
                        let current = src.get(s).copied().unwrap_or(0);
                        if !self.match_bracket_class(previous, p, ep - 1)
                            && self.match_bracket_class(current, p, ep - 1)
                        {
                            p = ep;
                            continue;
                        }
                        return Ok(None);
                    }
                    Some(&digit) if digit.is_ascii_digit() => {
                        match self.match_capture(s, digit)? {
                            Some(next) => {
                                s = next;
                                p += 2;
                                continue;
                            }
                            None => return Ok(None),
                        }
                    }
                    _ => {}
                },
                _ => {}
            }

            let ep = self.class_end(p)?;
            let matched = s < src.len() && self.single_match(src[s], p, ep);

            match pat.get(ep) {
                Some(b'?') => {
                    if matched {
                        if let Some(end) = self.do_match(s + 1, ep + 1)? {
                            return Ok(Some(end));
                        }
                    }
                    p = ep + 1;
                }
                Some(b'*') => return self.max_expand(s, p, ep),
                Some(b'+') => {
                    return if matched {
                        self.max_expand(s + 1, p, ep)
                    } else {
                        Ok(None)
                    };
                }
                Some(b'-') => return self.min_expand(s, p, ep),
                _ => {
                    if !matched {
                        return Ok(None);
                    }
                    s += 1;
                    p = ep;
                }
            }
        }
    }

    /// Index just past the single-character class starting at `p`.
    fn class_end(&self, p: usize) -> Result<usize, PatternError> {
        let pat = self.pat;
        let mut p = p;
        let c = pat[p];
        p += 1;

        match c {
            ESCAPE => {
                if p >= pat.len() {
                    return Err(PatternError::TrailingEscape);
                }
                Ok(p + 1)
            }
            b'[' => {
                if pat.get(p) == Some(&b'^') {
                    p += 1;
                }
                // The first member is literal even when it is ']'.
                loop {
                    if p >= pat.len() {
                        return Err(PatternError::UnclosedSet);
                    }
                    let member = pat[p];
                    p += 1;
                    if member == ESCAPE && p < pat.len() {
                        p += 1;
                    }
                    if pat.get(p) == Some(&b']') {
                        return Ok(p + 1);
                    }
                }
            }
            _ => Ok(p),
        }
    }

    fn single_match(&self, c: u8, p: usize, ep: usize) -> bool {
        match self.pat[p] {
            b'.' => true,
            ESCAPE => match_class(c, self.pat[p + 1]),
            b'[' => self.match_bracket_class(c, p, ep - 1),
            literal => literal == c,
        }
    }

    /// `p` points at the opening '[' and `ec` at the closing ']'.
    fn match_bracket_class(&self, c: u8, p: usize, ec: usize) -> bool {
        let pat = self.pat;
        let mut p = p;
        let mut found = true;
        if pat.get(p + 1) == Some(&b'^') {
            found = false;
            p += 1;
        }

        p += 1;
        while p < ec {
            if pat[p] == ESCAPE {
                p += 1;
                if match_class(c, pat[p]) {
                    return found;
                }
            } else if pat.get(p + 1) == Some(&b'-') && p + 2 < ec {
                if pat[p] <= c && c <= pat[p + 2] {
                    return found;
                }
                p += 2;
            } else if pat[p] == c {
                return found;
            }
            p += 1;
        }

        !found
    }

    fn max_expand(&mut self, s: usize, p: usize, ep: usize) -> Result<Option<usize>, PatternError> {
        let src = self.src;
        let mut count = 0;
        while s + count < src.len() && self.single_match(src[s + count], p, ep) {
            count += 1;
        }

        loop {
            if let Some(end) = self.do_match(s + count, ep + 1)? {
                return Ok(Some(end));
            }
            if count == 0 {
                return Ok(None);
            }
            count -= 1;
        }
    }

    fn min_expand(&mut self, s: usize, p: usize, ep: usize) -> Result<Option<usize>, PatternError> {
        let src = self.src;
        let mut s = s;
        loop {
            if let Some(end) = self.do_match(s, ep + 1)? {
                return Ok(Some(end));
            }
            if s < src.len() && self.single_match(src[s], p, ep) {
                s += 1;
            } else {
                return Ok(None);
            }
        }
    }

    fn start_capture(
        &mut self,
        s: usize,
        p: usize,
        len: CaptureLen,
    ) -> Result<Option<usize>, PatternError> {
        if self.captures.len() >= MAX_CAPTURES {
            return Err(PatternError::TooManyCaptures);
        }
        self.captures.push(Capture { start: s, len });
        let result = self.do_match(s, p)?;
        if result.is_none() {
            self.captures.pop();
        }
        Ok(result)
    }

    fn end_capture(&mut self, s: usize, p: usize) -> Result<Option<usize>, PatternError> {
        let index = self
            .captures
            .iter()
            .rposition(|capture| matches!(capture.len, CaptureLen::Open))
            .ok_or(PatternError::UnmatchedCaptureClose)?;

        let start = self.captures[index].start;
        self.captures[index].len = CaptureLen::Closed(s - start);
        let result = self.do_match(s, p)?;
        if result.is_none() {
            self.captures[index].len = CaptureLen::Open;
        }
        Ok(result)
    }

    /// `p` points at the two delimiter bytes following `%b`.
    fn match_balance(&self, s: usize, p: usize) -> Result<Option<usize>, PatternError> {
        let (src, pat) = (self.src, self.pat);
        if p + 1 >= pat.len() {
            return Err(PatternError::MissingBalanceArgs);
        }
        if src.get(s) != Some(&pat[p]) {
            return Ok(None);
        }

        let (open, close) = (pat[p], pat[p + 1]);
        let mut depth = 1usize;
        for (offset, &c) in src[s + 1..].iter().enumerate() {
            if c == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(Some(s + 1 + offset + 1));
                }
            } else if c == open {
                depth += 1;
            }
        }
        Ok(None)
    }

    fn match_capture(&self, s: usize, digit: u8) -> Result<Option<usize>, PatternError> {
        let index = usize::from(digit.wrapping_sub(b'1'));
        let capture = self
            .captures
            .get(index)
            .copied()
            .ok_or(PatternError::InvalidCaptureIndex(digit - b'0'))?;

        let len = match capture.len {
            CaptureLen::Closed(len) => len,
            CaptureLen::Position => 0,
            CaptureLen::Open => return Err(PatternError::InvalidCaptureIndex(digit - b'0')),
        };

        let captured = &self.src[capture.start..capture.start + len];
        Ok(self
            .src
            .get(s..s + len)
            .filter(|candidate| *candidate == captured)
            .map(|_| s + len))
    }
}

fn match_class(c: u8, class: u8) -> bool {
    let result = match class.to_ascii_lowercase() {
        b'a' => c.is_ascii_alphabetic(),
        b'c' => c.is_ascii_control(),
        b'd' => c.is_ascii_digit(),
        b'g' => c.is_ascii_graphic(),
        b'l' => c.is_ascii_lowercase(),
        b'p' => c.is_ascii_punctuation(),
        // C isspace also accepts vertical tab.
        b's' => c.is_ascii_whitespace() || c == 0x0b,
        b'u' => c.is_ascii_uppercase(),
        b'w' => c.is_ascii_alphanumeric(),
        b'x' => c.is_ascii_hexdigit(),
        b'z' => c == 0,
        _ => return class == c,
    };

    if class.is_ascii_uppercase() {
        !result
    } else {
        result
    }
}
