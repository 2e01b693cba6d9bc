//! Log sanitization for clinical values and identifiers.
//!
//! Applied to every formatted log line through [`SanitizingMakeWriter`].
//! Redacts:
//! - Clinical field values (`Glucose=148`, `"BMI": 33.6`, `Age 50 out of range`)
//! - Numbers quoted back by JSON decode errors
//! - UUIDs (request or batch identifiers supplied by callers)
//! - Email addresses
//!
//! Input size is capped (see `GLUCOGUARD_SANITIZE_MAX_BYTES`) so a huge
//! line cannot stall the logging thread.

use regex::{Regex, RegexSet};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();

/// Maximum bytes sanitized per call; defaults to 16 KiB.
const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

const MAX_BYTES_ENV: &str = "GLUCOGUARD_SANITIZE_MAX_BYTES";

struct Pattern {
    regex: Regex,
    replacement: &'static str,
}

struct Patterns {
    set: RegexSet,
    rules: Vec<Pattern>,
}

const RULES: [(&str, &str); 4] = [
    // `Glucose=148`, `"BMI": 33.6`, and `Glucose 301.5 out of range`
    (
        r#"(?i)\b(pregnancies|glucose|blood_?pressure|skin_?thickness|insulin|bmi|diabetes_?pedigree_?function|dpf|age)("?\s*[:=]?\s*)-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?"#,
        "${1}${2}[REDACTED]",
    ),
    // Values quoted back by JSON decode errors, e.g. "floating point `2.5`"
    (r"`-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?`", "`[REDACTED]`"),
    (
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        "[REDACTED-UUID]",
    ),
    (
        r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
        "[REDACTED-EMAIL]",
    ),
];

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }

    let mut end = max_bytes.min(input.len());
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

fn max_sanitize_bytes() -> usize {
    std::env::var(MAX_BYTES_ENV)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn compile() -> Result<Patterns, regex::Error> {
    let set = RegexSet::new(RULES.iter().map(|(p, _)| *p))?;
    let rules = RULES
        .iter()
        .map(|(pattern, replacement)| {
            Ok(Pattern {
                regex: Regex::new(pattern)?,
                replacement: *replacement,
            })
        })
        .collect::<Result<Vec<_>, regex::Error>>()?;
    Ok(Patterns { set, rules })
}

fn patterns() -> Option<&'static Patterns> {
    PATTERNS.get_or_init(|| compile().ok()).as_ref()
}

/// Sanitize a string by replacing clinical values and identifiers.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = match patterns() {
        Some(patterns) => {
            let mut out = prefix.to_string();
            for idx in patterns.set.matches(prefix).into_iter() {
                let rule = &patterns.rules[idx];
                out = rule.regex.replace_all(&out, rule.replacement).into_owned();
            }
            out
        }
        // Failing closed: nothing is written if the patterns are unusable.
        None => String::from("[REDACTED-LINE]\n"),
    };

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// A `tracing_subscriber` writer wrapper that sanitizes formatted log output
/// before it is written to the underlying sink.
#[derive(Debug)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<M> Clone for SanitizingMakeWriter<M>
where
    M: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub struct SanitizingWriter<W> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W> SanitizingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }
}

impl<W> SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.drain(..=pos).collect::<Vec<u8>>();
            let sanitized = sanitize(&String::from_utf8_lossy(&line));
            self.inner.write_all(sanitized.as_bytes())?;
        }
        Ok(())
    }
}

impl<W> std::io::Write for SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A line with no newline must not buffer without bound.
        let hard_cap = max_sanitize_bytes().saturating_mul(2);
        if hard_cap > 0 && self.buffer.len() > hard_cap {
            let sanitized = sanitize(&String::from_utf8_lossy(&self.buffer));
            self.inner.write_all(sanitized.as_bytes())?;
            self.inner.write_all(b"\n[TRUNCATED]\n")?;
            self.buffer.clear();
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;

        if !self.buffer.is_empty() {
            let sanitized = sanitize(&String::from_utf8_lossy(&self.buffer));
            self.inner.write_all(sanitized.as_bytes())?;
            self.buffer.clear();
        }

        self.inner.flush()
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer())
    }
}
