//! Replay and deterministic debugging utilities.
//!
//! [`DecisionJournal`] records every authorization decision it observes.
//! Because evaluation is a pure function of the call, the context, and the
//! token set, re-running a journal against a changed token store shows
//! exactly which past calls a policy change would affect.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use guard_policy::{AuthorizationKernel, Decision, DecisionObserver, TokenSource};
use guard_primitives::{CallerContext, PrincipalId, ProposedCall};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One recorded decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the journal, starting at zero.
    pub sequence: u64,
    /// Principal the call was made for.
    pub principal: PrincipalId,
    /// The call as proposed.
    pub call: ProposedCall,
    /// Caller context supplied with the call.
    #[serde(default)]
    pub context: CallerContext,
    /// Decision returned.
    pub decision: Decision,
}

/// An entry whose decision differs when re-evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayDivergence {
    /// The entry as recorded.
    pub entry: AuditEntry,
    /// The decision produced by the replay.
    pub replayed: Decision,
}

#[derive(Debug, Default)]
struct Journal {
    next_sequence: u64,
    entries: VecDeque<AuditEntry>,
}

/// In-memory journal of authorization decisions.
///
/// Bounded journals drop their oldest entries first.
#[derive(Debug, Default)]
pub struct DecisionJournal {
    inner: Mutex<Journal>,
    capacity: Option<usize>,
}

impl DecisionJournal {
    /// Creates an unbounded journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a journal retaining at most `capacity` entries.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        Self {
            inner: Mutex::default(),
            capacity: Some(capacity),
        }
    }

    /// Returns the retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Returns the retained denials, oldest first.
    #[must_use]
    pub fn denials(&self) -> Vec<AuditEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|entry| !entry.decision.is_allowed())
            .cloned()
            .collect()
    }

    /// Returns the number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true when nothing has been retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Serializes the retained entries as JSON lines.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry fails to serialize.
    pub fn to_json_lines(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for entry in &self.lock().entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Parses entries written by [`DecisionJournal::to_json_lines`]. Blank
    /// lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error for the first malformed line.
    pub fn parse_json_lines(lines: &str) -> serde_json::Result<Vec<AuditEntry>> {
        lines
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<AuditEntry>)
            .collect()
    }

    /// Re-evaluates `entries` with `kernel` against the tokens in `source`
    /// and returns those whose decision changed.
    #[must_use]
    pub fn replay(
        entries: &[AuditEntry],
        kernel: &AuthorizationKernel,
        source: &dyn TokenSource,
    ) -> Vec<ReplayDivergence> {
        entries
            .iter()
            .filter_map(|entry| {
                let replayed = kernel.enforce_for(source, &entry.principal, &entry.call, &entry.context);
                (replayed != entry.decision).then(|| ReplayDivergence {
                    entry: entry.clone(),
                    replayed,
                })
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DecisionObserver for DecisionJournal {
    fn on_decision(
        &self,
        principal: &PrincipalId,
        call: &ProposedCall,
        context: &CallerContext,
        decision: &Decision,
    ) {
        let mut journal = self.lock();
        let sequence = journal.next_sequence;
        journal.next_sequence += 1;
        journal.entries.push_back(AuditEntry {
            sequence,
            principal: principal.clone(),
            call: call.clone(),
            context: context.clone(),
            decision: decision.clone(),
        });
        if let Some(capacity) = self.capacity {
            while journal.entries.len() > capacity {
                journal.entries.pop_front();
            }
        }
        debug!(sequence, tool = call.tool(), "decision journaled");
    }
}
