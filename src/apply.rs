//! Applying a diff to the remote selection
//!
//! Codes go out in PATCH batches of at most `batch_size`, each batch
//! carrying the token the previous one returned. The first failing batch
//! stops the run. When the diff would take several batches but the
//! resulting selection fits in one, the selection is replaced in a single
//! PUT instead.

use filter_types::{OptionSet, VersionToken};

use crate::clients::FilterApi;
use crate::error::{FilterError, Result};
use crate::reconcile::Diff;

/// One PATCH call's worth of codes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchBatch {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl PatchBatch {
    fn codes(&self) -> impl Iterator<Item = &String> {
        self.add.iter().chain(self.remove.iter())
    }
}

/// Split a diff into batches, additions first
pub fn plan_batches(diff: &Diff, batch_size: usize) -> Vec<PatchBatch> {
    enum Op<'a> {
        Add(&'a str),
        Remove(&'a str),
    }

    let ops: Vec<Op<'_>> = diff
        .to_add
        .iter()
        .map(Op::Add)
        .chain(diff.to_remove.iter().map(Op::Remove))
        .collect();

    ops.chunks(batch_size.max(1))
        .map(|chunk| {
            let mut batch = PatchBatch::default();
            for op in chunk {
                match op {
                    Op::Add(code) => batch.add.push(code.to_string()),
                    Op::Remove(code) => batch.remove.push(code.to_string()),
                }
            }
            batch
        })
        .collect()
}

/// Bring the remote selection from `current` to `current + diff`.
pub async fn apply<F>(
    api: &F,
    filter_id: &str,
    dimension: &str,
    current: &OptionSet,
    diff: &Diff,
    token: VersionToken,
    batch_size: usize,
) -> Result<VersionToken>
where
    F: FilterApi + ?Sized,
{
    let batch_size = batch_size.max(1);
    let target = diff.apply_to(current);
    let changes = diff.to_add.len() + diff.to_remove.len();

    if changes > batch_size && target.len() <= batch_size {
        tracing::debug!(
            filter_id,
            dimension,
            changes,
            selected = target.len(),
            "replacing selection in one call"
        );
        return api
            .set_dimension_options(filter_id, dimension, &target.into_vec(), &token)
            .await;
    }

    apply_diff(api, filter_id, dimension, diff, token, batch_size).await
}

/// Apply `diff` starting from `token` and return the final token.
///
/// An empty diff makes no call. If the first batch fails its error is
/// returned as is; a later failure becomes [`FilterError::PartialApply`]
/// listing what went through and what did not.
pub async fn apply_diff<F>(
    api: &F,
    filter_id: &str,
    dimension: &str,
    diff: &Diff,
    token: VersionToken,
    batch_size: usize,
) -> Result<VersionToken>
where
    F: FilterApi + ?Sized,
{
    let batches = plan_batches(diff, batch_size);
    let mut token = token;

    for (index, batch) in batches.iter().enumerate() {
        let result = api
            .patch_dimension_options(filter_id, dimension, &batch.add, &batch.remove, &token)
            .await;

        match result {
            Ok(next) => token = next,
            Err(err) if index == 0 => return Err(err),
            Err(err) => {
                let applied: Vec<String> =
                    batches[..index].iter().flat_map(|b| b.codes().cloned()).collect();
                let failed: Vec<String> =
                    batches[index..].iter().flat_map(|b| b.codes().cloned()).collect();
                tracing::error!(
                    filter_id,
                    dimension,
                    applied = applied.len(),
                    failed = failed.len(),
                    error = %err,
                    "selection only partly applied"
                );
                return Err(FilterError::PartialApply {
                    dimension: dimension.to_string(),
                    applied,
                    failed,
                    status: err.upstream_status().unwrap_or(502),
                });
            }
        }
    }

    Ok(token)
}
