//! Applies an action policy to every redundant member of every group.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bytesize::ByteSize;
use rayon::prelude::*;
use serde::Serialize;

use super::delete::{delete_file, DeleteMode, FileSnapshot};
use super::relocate::{move_file, DestinationAllocator};
use super::ActionError;
use crate::duplicates::DuplicateGroup;
use crate::error_sink::{ErrorCategory, ErrorSink};
use crate::scanner::{identity, FileRecord};

/// What to do with redundant members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionPolicy {
    /// Delete them.
    Delete(DeleteMode),
    /// Move them into `destination`.
    Move {
        /// Destination directory, created if missing
        destination: PathBuf,
    },
}

impl fmt::Display for ActionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete(mode) => write!(f, "delete ({})", mode),
            Self::Move { destination } => write!(f, "move to {}", destination.display()),
        }
    }
}

/// Per-member outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutcome {
    /// The action was applied.
    Success,
    /// The action failed; the file was left where it was.
    Failed,
}

/// Result of acting on one redundant member.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    /// The redundant member's original path
    pub path: PathBuf,
    /// Success or failure
    pub outcome: ActionOutcome,
    /// Human-readable detail (what was done, or why it failed)
    pub detail: String,
    /// Where the file went, for successful moves
    pub destination: Option<PathBuf>,
    /// Bytes removed from the original location
    pub bytes: u64,
}

impl ActionResult {
    fn success(path: PathBuf, detail: String, destination: Option<PathBuf>, bytes: u64) -> Self {
        Self {
            path,
            outcome: ActionOutcome::Success,
            detail,
            destination,
            bytes,
        }
    }

    fn failed(path: PathBuf, error: &ActionError) -> Self {
        Self {
            path,
            outcome: ActionOutcome::Failed,
            detail: error.to_string(),
            destination: None,
            bytes: 0,
        }
    }

    /// Whether the action succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == ActionOutcome::Success
    }
}

/// All results of one action pass, in group then member order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionReport {
    /// One entry per attempted redundant member
    pub results: Vec<ActionResult>,
}

impl ActionReport {
    /// Number of successful actions.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of failed actions.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    /// Bytes removed from their original locations.
    #[must_use]
    pub fn bytes_reclaimed(&self) -> u64 {
        self.results.iter().map(|r| r.bytes).sum()
    }

    /// Whether every action succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(ActionResult::is_success)
    }

    /// Human-readable summary of the pass.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!(
                "Processed {} file(s), reclaimed {}",
                self.success_count(),
                ByteSize::b(self.bytes_reclaimed())
            )
        } else {
            format!(
                "Processed {} file(s), {} failed, reclaimed {}",
                self.success_count(),
                self.failure_count(),
                ByteSize::b(self.bytes_reclaimed())
            )
        }
    }
}

/// Deletes or moves redundant members.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    policy: ActionPolicy,
    error_sink: ErrorSink,
    verify_unchanged: bool,
    allocator: Option<Arc<DestinationAllocator>>,
}

impl ActionExecutor {
    /// Executor for `policy` that checks files are unchanged before acting.
    #[must_use]
    pub fn new(policy: ActionPolicy) -> Self {
        Self {
            policy,
            error_sink: ErrorSink::new(),
            verify_unchanged: true,
            allocator: None,
        }
    }

    /// Check the move destination now instead of in [`execute`], creating
    /// it if missing. A no-op for delete policies.
    ///
    /// # Errors
    ///
    /// [`ActionError::DestinationUnusable`].
    ///
    /// [`execute`]: ActionExecutor::execute
    pub fn prepare(mut self) -> Result<Self, ActionError> {
        if let (ActionPolicy::Move { destination }, None) = (&self.policy, &self.allocator) {
            self.allocator = Some(Arc::new(DestinationAllocator::prepare(destination)?));
        }
        Ok(self)
    }

    /// Record failures to `sink`.
    #[must_use]
    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.error_sink = sink;
        self
    }

    /// Enable/disable the size/mtime check before each action.
    #[must_use]
    pub fn with_verify_unchanged(mut self, verify: bool) -> Self {
        self.verify_unchanged = verify;
        self
    }

    /// The configured policy.
    #[must_use]
    pub fn policy(&self) -> &ActionPolicy {
        &self.policy
    }

    /// Apply the policy to every redundant member of every group.
    ///
    /// Members are processed in parallel and independently; one failure
    /// never stops the rest. Canonical members are never touched, and
    /// neither is a member that resolves to the same file as its canonical.
    ///
    /// # Errors
    ///
    /// Only [`ActionError::DestinationUnusable`], before any file is
    /// touched, when the executor was not [`prepare`]d. Per-file failures
    /// are reported in the [`ActionReport`] and the error sink.
    ///
    /// [`prepare`]: ActionExecutor::prepare
    pub fn execute(&self, groups: &[DuplicateGroup]) -> Result<ActionReport, ActionError> {
        let allocator = match (&self.policy, &self.allocator) {
            (ActionPolicy::Move { .. }, Some(allocator)) => Some(Arc::clone(allocator)),
            (ActionPolicy::Move { destination }, None) => {
                Some(Arc::new(DestinationAllocator::prepare(destination)?))
            }
            (ActionPolicy::Delete(_), _) => None,
        };

        let targets: Vec<(&FileRecord, &FileRecord)> = groups
            .iter()
            .flat_map(|g| g.redundant().iter().map(move |member| (g.canonical(), member)))
            .collect();
        log::info!("Applying {} to {} redundant file(s)", self.policy, targets.len());

        let results: Vec<ActionResult> = targets
            .par_iter()
            .map(|(canonical, record)| self.act_on(canonical, record, allocator.as_deref()))
            .collect();

        let report = ActionReport { results };
        log::info!("{}", report.summary());
        Ok(report)
    }

    fn act_on(
        &self,
        canonical: &FileRecord,
        record: &FileRecord,
        allocator: Option<&DestinationAllocator>,
    ) -> ActionResult {
        match self.try_act_on(canonical, record, allocator) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("{}", e);
                self.error_sink.record(
                    ErrorCategory::Action,
                    record.path.display().to_string(),
                    e.to_string(),
                );
                ActionResult::failed(record.path.clone(), &e)
            }
        }
    }

    fn try_act_on(
        &self,
        canonical: &FileRecord,
        record: &FileRecord,
        allocator: Option<&DestinationAllocator>,
    ) -> Result<ActionResult, ActionError> {
        // Unresolvable paths fall through to the checks below.
        if identity::same_file(&record.path, &canonical.path).unwrap_or(false) {
            return Err(ActionError::SameFile {
                path: record.path.clone(),
                canonical: canonical.path.clone(),
            });
        }
        if self.verify_unchanged {
            FileSnapshot::from_record(record).verify()?;
        }

        match (&self.policy, allocator) {
            (ActionPolicy::Move { .. }, Some(allocator)) => {
                let file_name = record
                    .path
                    .file_name()
                    .ok_or_else(|| ActionError::NotFound(record.path.clone()))?;
                let destination = allocator.reserve(file_name);
                move_file(&record.path, &destination)?;
                Ok(ActionResult::success(
                    record.path.clone(),
                    format!("moved to {}", destination.display()),
                    Some(destination),
                    record.size_bytes,
                ))
            }
            (ActionPolicy::Delete(mode), _) => {
                let bytes = delete_file(&record.path, *mode)?;
                let detail = match mode {
                    DeleteMode::Permanent => "deleted".to_string(),
                    DeleteMode::Trash => "moved to trash".to_string(),
                };
                Ok(ActionResult::success(record.path.clone(), detail, None, bytes))
            }
            (ActionPolicy::Move { destination }, None) => Err(ActionError::DestinationUnusable {
                path: destination.clone(),
                message: "destination not prepared".to_string(),
            }),
        }
    }
}
