//! Per-record reconciliation against the target store.

use serde_json::Value as JsonValue;

use crate::backup::RecordError;
use crate::store::EntityRepository;

/// What happened to one inbound record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Updated,
    Skipped,
}

/// Decide and apply the fate of one inbound snapshot.
///
/// Matching uses the kind's natural key, never raw identifiers, so the
/// decision is meaningful even when the document came from a different
/// database instance:
///
/// - no match → create
/// - match, `replace_existing` false → skip
/// - match, `replace_existing` true → update in place
///
/// Any [`RecordError`] belongs to this record alone; the caller counts it
/// and moves on.
pub async fn reconcile_record(
    repo: &dyn EntityRepository,
    record: &JsonValue,
    replace_existing: bool,
) -> Result<ReconcileAction, RecordError> {
    match repo.find_existing(record).await? {
        None => {
            repo.create(record).await?;
            Ok(ReconcileAction::Created)
        }
        Some(_) if !replace_existing => Ok(ReconcileAction::Skipped),
        Some(id) => {
            repo.update(id, record).await?;
            Ok(ReconcileAction::Updated)
        }
    }
}
