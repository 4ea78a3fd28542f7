//! Expect options: building an ordered set of matchers.
//!
//! Each constructor returns an [`ExpectOpt`], a single configuration step.
//! Applying it to an [`ExpectOpts`] appends exactly one matcher. Constructors
//! called with no arguments build matchers that never match, except [`all`],
//! which with no parts matches everything.
//!
//! ```rust
//! use ferrexpect::matcher::{all, regexp_pattern, string, ExpectOpts};
//!
//! # fn main() -> Result<(), ferrexpect::Error> {
//! let opts = ExpectOpts::from_opts([
//!     string(["Password:"]),
//!     all([string(["Hello"]), regexp_pattern([r"wo[a-z]ld"])]),
//! ])?;
//!
//! assert!(opts.first_match("Hello world").is_some());
//! assert!(opts.first_match("Goodbye").is_none());
//! # Ok(())
//! # }
//! ```

use std::io;
use std::time::Duration;

use regex::bytes::Regex;

use super::patterns::{
    AllMatcher, ErrorCandidate, ErrorMatcher, Matcher, RegexMatcher, StringMatcher, Subject,
};
use crate::error::{BoxError, Result};

/// A configuration step that registers one matcher.
///
/// Invalid configuration (such as a pattern that doesn't compile) is carried
/// along and reported when the option is applied.
#[derive(Debug)]
pub struct ExpectOpt {
    matcher: Result<Matcher>,
}

impl ExpectOpt {
    fn new(matcher: Matcher) -> Self {
        Self {
            matcher: Ok(matcher),
        }
    }

    /// Run `callback` after this option's matcher has been selected.
    ///
    /// Calls chain: callbacks run in the order they were added, and the first
    /// one to fail stops the rest.
    pub fn then<F>(self, callback: F) -> Self
    where
        F: Fn(&[u8]) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            matcher: self.matcher.map(|m| m.with_callback(Box::new(callback))),
        }
    }

    /// Append this option's matcher to `opts`.
    pub fn apply(self, opts: &mut ExpectOpts) -> Result<()> {
        opts.matchers.push(self.matcher?);
        Ok(())
    }

    /// Unwrap the configured matcher.
    pub fn into_matcher(self) -> Result<Matcher> {
        self.matcher
    }
}

/// Match if the buffer contains any of `needles`.
pub fn string<I, S>(needles: I) -> ExpectOpt
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let needles = needles.into_iter().map(|s| s.as_ref().to_vec()).collect();
    ExpectOpt::new(Matcher::String(StringMatcher::new(needles)))
}

/// Match if any of the compiled `patterns` finds a match in the buffer.
pub fn regexp<I>(patterns: I) -> ExpectOpt
where
    I: IntoIterator<Item = Regex>,
{
    ExpectOpt::new(Matcher::Regex(RegexMatcher::new(
        patterns.into_iter().collect(),
    )))
}

/// Like [`regexp`], compiling `patterns` first.
pub fn regexp_pattern<I, S>(patterns: I) -> ExpectOpt
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ExpectOpt {
        matcher: RegexMatcher::compile(patterns).map(Matcher::Regex),
    }
}

/// Match if the read ended with an error one of `candidates` accepts.
///
/// Plain [`io::ErrorKind`]s convert into candidates; use
/// [`ErrorCandidate::is`] to single out a specific error type among errors
/// of the same kind.
pub fn error<I, C>(candidates: I) -> ExpectOpt
where
    I: IntoIterator<Item = C>,
    C: Into<ErrorCandidate>,
{
    ExpectOpt::new(Matcher::Error(ErrorMatcher::new(
        candidates.into_iter().map(Into::into).collect(),
    )))
}

/// Match end of stream.
pub fn eof() -> ExpectOpt {
    error([io::ErrorKind::UnexpectedEof])
}

/// Match only if every option's matcher matches.
pub fn all<I>(opts: I) -> ExpectOpt
where
    I: IntoIterator<Item = ExpectOpt>,
{
    ExpectOpt {
        matcher: opts
            .into_iter()
            .map(ExpectOpt::into_matcher)
            .collect::<Result<Vec<_>>>()
            .map(|matchers| Matcher::All(AllMatcher::new(matchers))),
    }
}

/// Ordered matchers for one expect call.
///
/// Registration order is the only tie-break: [`first_match`](Self::first_match)
/// returns the earliest matcher that accepts the subject.
#[derive(Debug, Default)]
pub struct ExpectOpts {
    matchers: Vec<Matcher>,
    timeout: Option<Duration>,
}

impl ExpectOpts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every option in order.
    pub fn from_opts<I>(opts: I) -> Result<Self>
    where
        I: IntoIterator<Item = ExpectOpt>,
    {
        let mut expect_opts = Self::new();
        for opt in opts {
            opt.apply(&mut expect_opts)?;
        }
        Ok(expect_opts)
    }

    /// Apply one option.
    pub fn push(&mut self, opt: ExpectOpt) -> Result<&mut Self> {
        opt.apply(self)?;
        Ok(self)
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, opt: ExpectOpt) -> Result<Self> {
        opt.apply(&mut self)?;
        Ok(self)
    }

    /// Limit how long each read may wait when these options drive an expect call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Return the first matcher that accepts `subject`, or `None`.
    pub fn first_match<'a>(&self, subject: impl Into<Subject<'a>>) -> Option<&Matcher> {
        self.position(subject).map(|i| &self.matchers[i])
    }

    /// Index of the first matcher that accepts `subject`.
    pub fn position<'a>(&self, subject: impl Into<Subject<'a>>) -> Option<usize> {
        let subject = subject.into();
        self.matchers.iter().position(|m| m.is_match(subject))
    }
}
