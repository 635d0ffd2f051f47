//! Ordered check runner.
//!
//! A [`Battery`] is a list of named predicates folded over one input. Every
//! check runs, even after a failure, so the full report is always available;
//! the surfaced reason is the first failure in list order. A check that
//! returns an error (or panics) counts as a failure of that check only.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::checks::Verdict;

type CheckFn<C> = Box<dyn Fn(&C) -> anyhow::Result<Verdict> + Send + Sync>;

pub struct Check<C> {
    pub name: &'static str,
    run: CheckFn<C>,
}

impl<C> Check<C> {
    pub fn new<F>(name: &'static str, run: F) -> Self
    where
        F: Fn(&C) -> anyhow::Result<Verdict> + Send + Sync + 'static,
    {
        Self {
            name,
            run: Box::new(run),
        }
    }

    fn evaluate(&self, input: &C) -> CheckOutcome {
        let verdict = match panic::catch_unwind(AssertUnwindSafe(|| (self.run)(input))) {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(err)) => {
                warn!("{} raised: {err:#}", self.name);
                Verdict::fail(format!("{} failed: {err:#}", self.name))
            }
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                warn!("{} panicked: {reason}", self.name);
                Verdict::fail(format!("{} failed: {reason}", self.name))
            }
        };
        CheckOutcome {
            name: self.name.to_string(),
            passed: verdict.passed,
            message: verdict.message,
        }
    }
}

/// Message carried by a caught panic.
pub(crate) fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

/// Result of one check within a battery run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatteryReport {
    pub outcomes: Vec<CheckOutcome>,
    first_failure: Option<usize>,
}

impl BatteryReport {
    fn record(mut self, outcome: CheckOutcome) -> Self {
        if !outcome.passed && self.first_failure.is_none() {
            self.first_failure = Some(self.outcomes.len());
        }
        self.outcomes.push(outcome);
        self
    }

    pub fn all_passed(&self) -> bool {
        self.first_failure.is_none()
    }

    pub fn first_failure(&self) -> Option<&CheckOutcome> {
        self.first_failure.map(|i| &self.outcomes[i])
    }
}

pub struct Battery<C> {
    checks: Vec<Check<C>>,
}

impl<C> Default for Battery<C> {
    fn default() -> Self {
        Self { checks: Vec::new() }
    }
}

impl<C> Battery<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, check: Check<C>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.checks.iter().map(|c| c.name)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn run(&self, input: &C) -> BatteryReport {
        self.checks
            .iter()
            .fold(BatteryReport::default(), |report, check| {
                report.record(check.evaluate(input))
            })
    }
}
