//! Stage sequencer: one active conflict category at a time, detection
//! restarted from the top after every commit.

use serde::Serialize;
use tracing::{info, warn};

use remitflow_providers::DirectoryUpdate;

use crate::commit::{PreparedResolution, prepare};
use crate::conflict::{Conflict, ConflictCategory, Detection, GroupKey};
use crate::decision::{Decision, StageResolution};
use crate::detect::detect_next_conflict;
use crate::error::{IncompleteReason, ResolutionError};
use crate::record::RecordSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "conflict", rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    AwaitingResolution(Conflict),
    Ready,
}

#[derive(Debug, Clone, Default)]
pub struct StageSequencer {
    stage: Stage,
}

impl StageSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn active_conflict(&self) -> Option<&Conflict> {
        match &self.stage {
            Stage::AwaitingResolution(conflict) => Some(conflict),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.stage, Stage::Ready)
    }

    /// Run a full detection pass and move to the resulting stage.
    pub fn advance(&mut self, records: &RecordSet) -> &Stage {
        let next = match detect_next_conflict(records) {
            Detection::Conflict(conflict) => Stage::AwaitingResolution(conflict),
            Detection::Ready => Stage::Ready,
        };
        match (&self.stage, &next) {
            (Stage::AwaitingResolution(prev), Stage::AwaitingResolution(now))
                if prev.category == now.category => {}
            (_, Stage::AwaitingResolution(now)) => {
                info!(category = %now.category, groups = now.groups.len(), "awaiting resolution");
            }
            (Stage::Ready, Stage::Ready) => {}
            (_, Stage::Ready) => info!(records = records.len(), "record set ready"),
            (_, Stage::Idle) => {}
        }
        self.stage = next;
        &self.stage
    }

    /// Commit one group's decision, then restart detection.
    pub fn resolve_group(
        &mut self,
        records: &mut RecordSet,
        category: ConflictCategory,
        key: &GroupKey,
        decision: &Decision,
    ) -> Result<Option<DirectoryUpdate>, ResolutionError> {
        let conflict = self.expect_category(records, category)?;
        let prepared = prepare(records, conflict, key, decision).inspect_err(|err| {
            warn!(%category, group = %key, error = %err, "resolution rejected");
        })?;

        let mut updates = self.commit(records, vec![prepared]);
        Ok(updates.pop())
    }

    /// Commit decisions for every group of the active stage at once.
    ///
    /// All decisions are checked before any is applied; a single missing or
    /// malformed decision rejects the whole stage.
    pub fn resolve_stage(
        &mut self,
        records: &mut RecordSet,
        resolution: &StageResolution,
    ) -> Result<Vec<DirectoryUpdate>, ResolutionError> {
        let conflict = self.expect_category(records, resolution.category)?;

        let mut prepared = Vec::with_capacity(conflict.groups.len());
        let result = (|| -> Result<(), ResolutionError> {
            for (i, gd) in resolution.decisions.iter().enumerate() {
                if resolution.decisions[..i].iter().any(|prev| prev.group == gd.group) {
                    return Err(ResolutionError::DuplicateDecision(gd.group.clone()));
                }
                if conflict.group(&gd.group).is_none() {
                    return Err(ResolutionError::UnknownGroup(gd.group.clone()));
                }
            }
            for group in &conflict.groups {
                let decision = resolution
                    .decisions
                    .iter()
                    .find(|gd| gd.group == group.key)
                    .ok_or_else(|| {
                        ResolutionError::incomplete(&group.key, IncompleteReason::NoDecision)
                    })?;
                prepared.push(prepare(records, conflict, &group.key, &decision.decision)?);
            }
            Ok(())
        })();
        if let Err(err) = result {
            warn!(category = %resolution.category, error = %err, "stage resolution rejected");
            return Err(err);
        }

        Ok(self.commit(records, prepared))
    }

    fn expect_category(
        &mut self,
        records: &RecordSet,
        category: ConflictCategory,
    ) -> Result<&Conflict, ResolutionError> {
        if matches!(self.stage, Stage::Idle) {
            self.advance(records);
        }
        let conflict = self
            .active_conflict()
            .ok_or(ResolutionError::NothingToResolve)?;
        if conflict.category != category {
            return Err(ResolutionError::CategoryMismatch {
                expected: conflict.category,
                got: category,
            });
        }
        Ok(conflict)
    }

    fn commit(
        &mut self,
        records: &mut RecordSet,
        prepared: Vec<PreparedResolution>,
    ) -> Vec<DirectoryUpdate> {
        let mut next = records.clone();
        let updates: Vec<_> = prepared
            .into_iter()
            .filter_map(|p| {
                info!(group = %p.key(), records = p.record_ids().len(), "resolution committed");
                p.apply(&mut next)
            })
            .collect();
        *records = next;
        self.advance(records);
        updates
    }
}
