// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Retry policy applied to activity invocations.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::task::TaskFailure;

/// Predicate deciding whether a failed attempt may be retried.
pub type RetryClassifier = Arc<dyn Fn(&TaskFailure) -> bool + Send + Sync>;

/// Exponential backoff retry policy for a single activity call.
///
/// Fields are stored verbatim; normalisation happens when the next delay is
/// computed:
/// - `max_attempts` of 0 behaves as 1
/// - `backoff_coefficient` below 1.0 behaves as 1.0
/// - a zero `max_interval` leaves delays uncapped
/// - a zero `timeout` never expires
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Multiplier applied to the delay after every failed retry.
    pub backoff_coefficient: f64,
    /// Upper bound for a single delay.
    pub max_interval: Duration,
    /// Overall budget measured from the start of the first attempt.
    pub timeout: Duration,
    /// Optional filter; failures it rejects are not retried.
    pub classify: Option<RetryClassifier>,
}

impl RetryPolicy {
    /// Create a policy with the given attempts and initial interval, doubling
    /// delays without cap or timeout.
    pub fn new(max_attempts: u32, initial_interval: Duration) -> Self {
        Self {
            max_attempts,
            initial_interval,
            backoff_coefficient: 2.0,
            max_interval: Duration::ZERO,
            timeout: Duration::ZERO,
            classify: None,
        }
    }

    /// Set the backoff coefficient.
    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient;
        self
    }

    /// Set the delay cap.
    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    /// Set the overall retry budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Only retry failures accepted by `classify`.
    pub fn with_classifier<F>(mut self, classify: F) -> Self
    where
        F: Fn(&TaskFailure) -> bool + Send + Sync + 'static,
    {
        self.classify = Some(Arc::new(classify));
        self
    }

    /// Attempt count after normalisation.
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before retry number `retry` (1-indexed), ignoring the timeout.
    ///
    /// `initial_interval * coefficient^(retry - 1)`, capped by `max_interval`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let coefficient = if self.backoff_coefficient.is_finite() && self.backoff_coefficient >= 1.0
        {
            self.backoff_coefficient
        } else {
            1.0
        };
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * coefficient.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);

        if self.max_interval.is_zero() {
            delay
        } else {
            delay.min(self.max_interval)
        }
    }

    /// Decide whether another attempt should follow a failure.
    ///
    /// `attempt` is the 1-indexed attempt that just failed and `elapsed` the
    /// time since the first attempt started. Returns the delay to wait before
    /// the next attempt, or `None` when the failure is final.
    pub fn next_delay(
        &self,
        attempt: u32,
        elapsed: Duration,
        failure: &TaskFailure,
    ) -> Option<Duration> {
        if attempt >= self.effective_max_attempts() {
            return None;
        }
        if let Some(classify) = &self.classify
            && !classify(failure)
        {
            return None;
        }

        let delay = self.delay_for_retry(attempt);
        if !self.timeout.is_zero() && elapsed.saturating_add(delay) > self.timeout {
            return None;
        }
        Some(delay)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_interval", &self.initial_interval)
            .field("backoff_coefficient", &self.backoff_coefficient)
            .field("max_interval", &self.max_interval)
            .field("timeout", &self.timeout)
            .field("classify", &self.classify.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
