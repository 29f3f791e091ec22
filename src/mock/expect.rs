//! Call count expectations.

use std::fmt;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Allocate,
    Deallocate,
    IsEqual,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Allocate => "allocate",
            Operation::Deallocate => "deallocate",
            Operation::IsEqual => "is_equal",
        })
    }
}

/// How many times an operation may be called.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Times {
    Never,
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
    /// Inclusive on both ends
    Between(usize, usize),
    Any,
}

impl Times {
    pub fn contains(self, n: usize) -> bool {
        match self {
            Times::Never => n == 0,
            Times::Exactly(m) => n == m,
            Times::AtLeast(m) => n >= m,
            Times::AtMost(m) => n <= m,
            Times::Between(lo, hi) => (lo..=hi).contains(&n),
            Times::Any => true,
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        "time"
    } else {
        "times"
    }
}

impl fmt::Display for Times {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Times::Never => write!(f, "exactly 0 times"),
            Times::Exactly(n) => write!(f, "exactly {n} {}", plural(n)),
            Times::AtLeast(n) => write!(f, "at least {n} {}", plural(n)),
            Times::AtMost(n) => write!(f, "at most {n} {}", plural(n)),
            Times::Between(lo, hi) => write!(f, "between {lo} and {hi} times"),
            Times::Any => write!(f, "any number of times"),
        }
    }
}

/// An expected call count. Only calls made after the expectation was set
/// count towards it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Expectation {
    pub(crate) times: Times,
    pub(crate) baseline: usize,
}

impl Expectation {
    pub(crate) fn check(self, operation: Operation, total: usize) -> Result<(), UnmetExpectation> {
        let actual = total.saturating_sub(self.baseline);
        if self.times.contains(actual) {
            Ok(())
        } else {
            Err(UnmetExpectation {
                operation,
                expected: self.times,
                actual,
            })
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Expectations {
    pub(crate) allocate: Option<Expectation>,
    pub(crate) deallocate: Option<Expectation>,
    pub(crate) is_equal: Option<Expectation>,
}

impl Expectations {
    pub(crate) fn slot(&mut self, operation: Operation) -> &mut Option<Expectation> {
        match operation {
            Operation::Allocate => &mut self.allocate,
            Operation::Deallocate => &mut self.deallocate,
            Operation::IsEqual => &mut self.is_equal,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.allocate.is_none() && self.deallocate.is_none() && self.is_equal.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{operation}: expected to be called {expected}, called {actual} {}", times_noun(.actual))]
pub struct UnmetExpectation {
    pub operation: Operation,
    pub expected: Times,
    pub actual: usize,
}

fn times_noun(n: &usize) -> &'static str {
    plural(*n)
}

fn summarize(unmet: &[UnmetExpectation]) -> String {
    unmet
        .iter()
        .map(|u| format!("  {u}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unmet expectations on mock memory resource:\n{}\nrecorded calls: {log}", summarize(.unmet))]
pub struct ExpectationError {
    pub unmet: Vec<UnmetExpectation>,
    /// The mock's [`CallLog`](super::CallLog) as JSON
    pub log: String,
}
