// src/session/warnings.rs

use chrono::{DateTime, Duration, Utc};

use crate::{models::exam_record::WarningRecord, session::signals::Violation};

/// Drops reports arriving within `cooldown` of the last accepted one.
///
/// One window is shared by every source: a single keystroke often fires
/// several browser events and must not count more than once.
#[derive(Debug, Clone)]
pub struct Debouncer {
    cooldown: Duration,
    last_accepted: Option<DateTime<Utc>>,
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: None,
        }
    }

    /// Returns `true` and restarts the window if `now` is outside it.
    pub fn admit(&mut self, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_accepted {
            if now - last < self.cooldown {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }
}

/// Fires exactly once when the warning count reaches the threshold.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    threshold: u32,
    fired: bool,
}

impl EscalationPolicy {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            fired: false,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn assess(&mut self, count: u32) -> bool {
        if self.fired || count < self.threshold {
            return false;
        }
        self.fired = true;
        true
    }
}

/// Result of funnelling one violation through the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// Inside the cooldown window, nothing recorded.
    Suppressed,
    Logged {
        record: WarningRecord,
        /// The threshold was reached by this record.
        escalate: bool,
    },
}

/// Debouncer, append-only log and escalation policy behind one entry point.
#[derive(Debug, Clone)]
pub struct WarningAggregator {
    debouncer: Debouncer,
    policy: EscalationPolicy,
    log: Vec<WarningRecord>,
}

impl WarningAggregator {
    pub fn new(cooldown: Duration, threshold: u32) -> Self {
        Self {
            debouncer: Debouncer::new(cooldown),
            policy: EscalationPolicy::new(threshold),
            log: Vec::new(),
        }
    }

    pub fn report(&mut self, violation: &Violation, now: DateTime<Utc>) -> ReportOutcome {
        if !self.debouncer.admit(now) {
            tracing::debug!("Suppressed {} inside cooldown", violation.code);
            return ReportOutcome::Suppressed;
        }

        let record = WarningRecord {
            count: self.log.len() as u32 + 1,
            msg: violation.reason.clone(),
            code: Some(violation.code.to_string()),
            at: now,
        };
        self.log.push(record.clone());
        tracing::info!("Warning #{} logged: {} ({})", record.count, record.msg, violation.code);

        let escalate = self.policy.assess(record.count);
        ReportOutcome::Logged { record, escalate }
    }

    pub fn count(&self) -> u32 {
        self.log.len() as u32
    }

    pub fn threshold(&self) -> u32 {
        self.policy.threshold()
    }

    pub fn log(&self) -> &[WarningRecord] {
        &self.log
    }
}
