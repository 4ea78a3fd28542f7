//! Matcher engine for deciding when to stop reading.
//!
//! A read loop registers its expectations as [`ExpectOpts`] and, after every
//! read, asks [`ExpectOpts::first_match`] whether the output so far (or the
//! error that ended the read) satisfies one of them.

mod opts;
mod patterns;

pub use opts::{all, eof, error, regexp, regexp_pattern, string, ExpectOpt, ExpectOpts};
pub use patterns::{
    AllMatcher, Callback, CallbackMatcher, ErrorCandidate, ErrorMatcher, Matcher, RegexMatcher,
    StringMatcher, Subject,
};
