//! Matcher variants and the subjects they are evaluated against.

use std::fmt;
use std::io;
use std::sync::Arc;

use memchr::memmem;
use regex::bytes::Regex;

use crate::error::{BoxError, Error, Result};

/// A side effect run after its matcher has been selected.
pub type Callback = Box<dyn Fn(&[u8]) -> std::result::Result<(), BoxError> + Send + Sync>;

/// What a matcher is evaluated against.
///
/// While a read loop is collecting output the subject is the buffer read so
/// far. When a read ends in an error (including end of stream, reported as
/// [`io::ErrorKind::UnexpectedEof`]) the subject is that error.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    /// Snapshot of the accumulated output.
    Buffer(&'a [u8]),

    /// The error that ended the last read.
    Error(&'a io::Error),
}

impl<'a> From<&'a [u8]> for Subject<'a> {
    fn from(buf: &'a [u8]) -> Self {
        Subject::Buffer(buf)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Subject<'a> {
    fn from(buf: &'a [u8; N]) -> Self {
        Subject::Buffer(buf)
    }
}

impl<'a> From<&'a Vec<u8>> for Subject<'a> {
    fn from(buf: &'a Vec<u8>) -> Self {
        Subject::Buffer(buf)
    }
}

impl<'a> From<&'a str> for Subject<'a> {
    fn from(s: &'a str) -> Self {
        Subject::Buffer(s.as_bytes())
    }
}

impl<'a> From<&'a io::Error> for Subject<'a> {
    fn from(err: &'a io::Error) -> Self {
        Subject::Error(err)
    }
}

/// A condition on a [`Subject`].
///
/// Matchers are stateless; evaluating one never runs callbacks.
#[derive(Debug)]
pub enum Matcher {
    /// Substring search.
    String(StringMatcher),

    /// Regular expression search.
    Regex(RegexMatcher),

    /// Error kind comparison.
    Error(ErrorMatcher),

    /// Conjunction of matchers.
    All(AllMatcher),

    /// A matcher decorated with callbacks.
    Callback(CallbackMatcher),
}

impl Matcher {
    /// Check whether the subject satisfies this matcher.
    pub fn is_match(&self, subject: Subject<'_>) -> bool {
        match self {
            Matcher::String(m) => m.is_match(subject),
            Matcher::Regex(m) => m.is_match(subject),
            Matcher::Error(m) => m.is_match(subject),
            Matcher::All(m) => m.is_match(subject),
            Matcher::Callback(m) => m.is_match(subject),
        }
    }

    /// Returns the callback decorator if this matcher carries one.
    pub fn as_callback(&self) -> Option<&CallbackMatcher> {
        match self {
            Matcher::Callback(m) => Some(m),
            _ => None,
        }
    }

    /// Append a callback, wrapping this matcher in a [`CallbackMatcher`] if
    /// it isn't one already.
    pub(crate) fn with_callback(self, callback: Callback) -> Matcher {
        match self {
            Matcher::Callback(mut m) => {
                m.callbacks.push(callback);
                Matcher::Callback(m)
            }
            other => Matcher::Callback(CallbackMatcher {
                matcher: Box::new(other),
                callbacks: vec![callback],
            }),
        }
    }
}

/// Matches a buffer containing any of its needles.
#[derive(Debug, Clone, Default)]
pub struct StringMatcher {
    needles: Vec<Vec<u8>>,
}

impl StringMatcher {
    pub fn new(needles: Vec<Vec<u8>>) -> Self {
        Self { needles }
    }

    pub fn needles(&self) -> &[Vec<u8>] {
        &self.needles
    }

    fn is_match(&self, subject: Subject<'_>) -> bool {
        let Subject::Buffer(buf) = subject else {
            return false;
        };
        self.needles
            .iter()
            .any(|needle| memmem::find(buf, needle).is_some())
    }
}

/// Matches a buffer in which any of its regexes finds a match.
#[derive(Debug, Clone, Default)]
pub struct RegexMatcher {
    patterns: Vec<Regex>,
}

impl RegexMatcher {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// Compile pattern strings into a matcher.
    pub fn compile<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn is_match(&self, subject: Subject<'_>) -> bool {
        let Subject::Buffer(buf) = subject else {
            return false;
        };
        self.patterns.iter().any(|re| re.is_match(buf))
    }
}

/// One accepted error for an [`ErrorMatcher`].
///
/// `io::Error` has no identity to compare, so a candidate names the error
/// either by kind, by the type of the error wrapped inside it, or by an
/// arbitrary test.
#[derive(Clone)]
pub enum ErrorCandidate {
    /// Any error of this kind.
    Kind(io::ErrorKind),

    /// An error wrapping a value of a specific type, such as a sentinel
    /// passed to [`PipeWriter::close_with_error`](crate::stream::PipeWriter::close_with_error).
    Is {
        type_name: &'static str,
        check: fn(&io::Error) -> bool,
    },

    /// Any error the predicate accepts.
    Predicate(Arc<dyn Fn(&io::Error) -> bool + Send + Sync>),
}

impl ErrorCandidate {
    /// Accept errors whose inner error is an `E`.
    pub fn is<E>() -> Self
    where
        E: std::error::Error + 'static,
    {
        ErrorCandidate::Is {
            type_name: std::any::type_name::<E>(),
            check: |err| err.get_ref().is_some_and(|inner| inner.is::<E>()),
        }
    }

    /// Accept errors for which `f` returns true.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&io::Error) -> bool + Send + Sync + 'static,
    {
        ErrorCandidate::Predicate(Arc::new(f))
    }

    pub fn accepts(&self, err: &io::Error) -> bool {
        match self {
            ErrorCandidate::Kind(kind) => err.kind() == *kind,
            ErrorCandidate::Is { check, .. } => check(err),
            ErrorCandidate::Predicate(f) => f(err),
        }
    }
}

impl From<io::ErrorKind> for ErrorCandidate {
    fn from(kind: io::ErrorKind) -> Self {
        ErrorCandidate::Kind(kind)
    }
}

impl fmt::Debug for ErrorCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCandidate::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            ErrorCandidate::Is { type_name, .. } => f.debug_tuple("Is").field(type_name).finish(),
            ErrorCandidate::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Matches an error accepted by any of its candidates.
#[derive(Debug, Clone, Default)]
pub struct ErrorMatcher {
    candidates: Vec<ErrorCandidate>,
}

impl ErrorMatcher {
    pub fn new(candidates: Vec<ErrorCandidate>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[ErrorCandidate] {
        &self.candidates
    }

    fn is_match(&self, subject: Subject<'_>) -> bool {
        let Subject::Error(err) = subject else {
            return false;
        };
        self.candidates.iter().any(|c| c.accepts(err))
    }
}

/// Matches when every inner matcher matches the same subject.
///
/// Each inner matcher is checked independently, so the order in which their
/// conditions appear in the buffer doesn't matter. An empty conjunction
/// matches everything.
#[derive(Debug, Default)]
pub struct AllMatcher {
    matchers: Vec<Matcher>,
}

impl AllMatcher {
    pub fn new(matchers: Vec<Matcher>) -> Self {
        Self { matchers }
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    fn is_match(&self, subject: Subject<'_>) -> bool {
        self.matchers.iter().all(|m| m.is_match(subject))
    }
}

/// A matcher plus an ordered chain of callbacks to run once it is selected.
pub struct CallbackMatcher {
    matcher: Box<Matcher>,
    callbacks: Vec<Callback>,
}

impl CallbackMatcher {
    /// The decorated matcher.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Run the callbacks in registration order.
    ///
    /// Stops at the first callback that fails and returns its error as
    /// [`Error::Callback`].
    pub fn callback(&self, buf: &[u8]) -> Result<()> {
        for callback in &self.callbacks {
            callback(buf).map_err(Error::Callback)?;
        }
        Ok(())
    }

    fn is_match(&self, subject: Subject<'_>) -> bool {
        self.matcher.is_match(subject)
    }
}

impl fmt::Debug for CallbackMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackMatcher")
            .field("matcher", &self.matcher)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_matcher_ignores_errors() {
        let m = StringMatcher::new(vec![b"EOF".to_vec()]);
        let err = io::Error::from(io::ErrorKind::UnexpectedEof);
        assert!(!m.is_match(Subject::Error(&err)));
        assert!(m.is_match(Subject::Buffer(b"got EOF")));
    }

    #[test]
    fn test_error_matcher_ignores_buffers() {
        let m = ErrorMatcher::new(vec![io::ErrorKind::UnexpectedEof.into()]);
        assert!(!m.is_match(Subject::Buffer(b"UnexpectedEof")));
    }

    #[test]
    fn test_error_candidate_tells_sentinel_from_other_errors() {
        #[derive(Debug)]
        struct Hangup;

        impl fmt::Display for Hangup {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("hangup")
            }
        }

        impl std::error::Error for Hangup {}

        let sentinel = io::Error::other(Hangup);
        let unrelated = io::Error::other("some other failure");

        let by_kind = ErrorMatcher::new(vec![io::ErrorKind::Other.into()]);
        assert!(by_kind.is_match(Subject::Error(&sentinel)));
        assert!(by_kind.is_match(Subject::Error(&unrelated)));

        let by_type = ErrorMatcher::new(vec![ErrorCandidate::is::<Hangup>()]);
        assert!(by_type.is_match(Subject::Error(&sentinel)));
        assert!(!by_type.is_match(Subject::Error(&unrelated)));

        let by_message =
            ErrorMatcher::new(vec![ErrorCandidate::predicate(|e| e.to_string() == "hangup")]);
        assert!(by_message.is_match(Subject::Error(&sentinel)));
        assert!(!by_message.is_match(Subject::Error(&unrelated)));
    }

    #[test]
    fn test_regex_compile_rejects_invalid_pattern() {
        let err = RegexMatcher::compile(["wo[rld"]).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern(_)));
    }

    #[test]
    fn test_with_callback_appends_to_existing_chain() {
        let ok: Callback = Box::new(|_| Ok(()));
        let fail: Callback = Box::new(|_| Err("second".into()));
        let m = Matcher::String(StringMatcher::new(vec![b"a".to_vec()]))
            .with_callback(ok)
            .with_callback(fail);

        let cb = m.as_callback().unwrap();
        assert!(matches!(cb.matcher(), Matcher::String(_)));
        assert_eq!(cb.callbacks.len(), 2);
        assert!(matches!(cb.callback(b""), Err(Error::Callback(_))));
    }

    #[test]
    fn test_all_matcher_mixes_variants() {
        let m = AllMatcher::new(vec![
            Matcher::String(StringMatcher::new(vec![b"Hello".to_vec()])),
            Matcher::Regex(RegexMatcher::compile([r"wo[a-z]{1}ld"]).unwrap()),
        ]);
        assert!(m.is_match(Subject::Buffer(b"Hello woxld")));
        assert!(!m.is_match(Subject::Buffer(b"Hello wo4ld")));
    }
}
