//! Option reconciliation
//!
//! Pure diff between the options currently selected on a filter job and
//! the options a submission asks for. Input order and duplicates never
//! matter: everything is an [`OptionSet`] before comparison.

use filter_types::OptionSet;
use serde::Serialize;

/// Coarse intent that overrides the explicit option list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BulkAction {
    AddAll,
    RemoveAll,
    #[default]
    None,
}

/// Codes to add and codes to remove. The two sets are always disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diff {
    pub to_add: OptionSet,
    pub to_remove: OptionSet,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Selection that results once the diff has been applied to `current`
    pub fn apply_to(&self, current: &OptionSet) -> OptionSet {
        current.union(&self.to_add).difference(&self.to_remove)
    }
}

/// Diff `current` against `requested`.
///
/// `universe` is every code the catalog knows for the dimension and is only
/// consulted for [`BulkAction::AddAll`].
pub fn reconcile(
    current: &OptionSet,
    requested: &OptionSet,
    action: BulkAction,
    universe: &OptionSet,
) -> Diff {
    match action {
        BulkAction::AddAll => Diff {
            to_add: universe.difference(current),
            to_remove: OptionSet::new(),
        },
        BulkAction::RemoveAll => Diff {
            to_add: OptionSet::new(),
            to_remove: current.clone(),
        },
        BulkAction::None => Diff {
            to_add: requested.difference(current),
            to_remove: current.difference(requested),
        },
    }
}

/// Like [`reconcile`], but only codes inside `scope` may be added or removed.
///
/// Used when the page showed a subset of the dimension (search results, one
/// level of a hierarchy): an unticked box outside the subset was never shown,
/// so its absence from the submission says nothing.
pub fn reconcile_within(
    current: &OptionSet,
    requested: &OptionSet,
    action: BulkAction,
    universe: &OptionSet,
    scope: &OptionSet,
) -> Diff {
    reconcile(
        &current.intersection(scope),
        &requested.intersection(scope),
        action,
        &universe.intersection(scope),
    )
}
