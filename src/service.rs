//! Dimension selection service
//!
//! Ties the pieces together for one request: read the job, read the current
//! selection and the catalog, check both reads saw the same revision,
//! reconcile, and apply. The current selection is read in a spawned task
//! while the catalog is read inline; the task handle must be joined before
//! anything is applied, and dropping it cancels the read.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use filter_types::{DatasetRef, DimensionOption, HierarchyNode, OptionSet, VersionToken};

use crate::apply;
use crate::batch::{BatchFetcher, BatchResult, CatalogOptions, SelectedOptions};
use crate::clients::{DatasetApi, FilterApi, HierarchyApi};
use crate::codec;
use crate::config::BatchConfig;
use crate::consistency::TokenWitness;
use crate::error::{FilterError, RangeError, Result};
use crate::hierarchy::{self, Topology};
use crate::range::RangeSelection;
use crate::reconcile::{reconcile, reconcile_within, BulkAction, Diff};
use crate::submission::{Directive, Submission};

/// What a dimension page needs to render
#[derive(Debug, Clone, Serialize)]
pub struct SelectionView {
    pub filter_id: String,
    pub dimension: String,
    pub dataset: DatasetRef,
    pub token: VersionToken,
    /// Nothing selected on this dimension yet
    pub first_view: bool,
    pub selected: Vec<DimensionOption>,
    pub available: Vec<DimensionOption>,
}

/// Result of a submission
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub token: VersionToken,
    pub added: OptionSet,
    pub removed: OptionSet,
    pub redirect: Option<String>,
    pub save_and_return: bool,
}

/// The current-selection read running alongside the catalog read.
///
/// Must be joined; dropping it aborts the read.
pub struct PendingSelection {
    handle: JoinHandle<Result<BatchResult>>,
}

impl PendingSelection {
    pub fn spawn<F>(api: Arc<F>, fetcher: BatchFetcher, filter_id: &str, dimension: &str) -> Self
    where
        F: FilterApi + ?Sized + 'static,
    {
        let filter_id = filter_id.to_string();
        let dimension = dimension.to_string();
        let handle = tokio::spawn(async move {
            let source = SelectedOptions {
                api: api.as_ref(),
                filter_id: &filter_id,
                dimension: &dimension,
            };
            fetcher.fetch_all(&source, None).await
        });
        Self { handle }
    }

    pub async fn join(mut self) -> Result<BatchResult> {
        (&mut self.handle)
            .await
            .map_err(|e| FilterError::TaskJoin(e.to_string()))?
    }
}

impl Drop for PendingSelection {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// How a submission turns into the requested set
#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    Explicit(OptionSet),
    Bulk(BulkAction),
    Range(RangeSelection),
    Latest,
}

impl Plan {
    /// Validation happens here, before any remote call
    fn from_submission(dimension: &str, submission: &Submission) -> Result<Self> {
        if submission.bulk != BulkAction::None {
            return Ok(Plan::Bulk(submission.bulk));
        }
        match submission.directive {
            Some(Directive::All) => Ok(Plan::Bulk(BulkAction::AddAll)),
            Some(Directive::Range) | Some(Directive::Single) => {
                Ok(Plan::Range(submission.range_selection(dimension)?))
            }
            Some(Directive::Latest) => Ok(Plan::Latest),
            Some(Directive::List) | None => Ok(Plan::Explicit(submission.options.clone())),
        }
    }

    fn needs_catalog(&self) -> bool {
        !matches!(
            self,
            Plan::Explicit(_) | Plan::Bulk(BulkAction::RemoveAll) | Plan::Bulk(BulkAction::None)
        )
    }
}

/// Case-insensitive match of `query` against option labels and codes
pub fn search_options(options: &[DimensionOption], query: &str) -> Vec<DimensionOption> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    options
        .iter()
        .filter(|o| {
            o.label.to_lowercase().contains(&needle) || o.code.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Entry point for every selection operation on a filter job
pub struct DimensionSelector<F: ?Sized, D: ?Sized, H: ?Sized> {
    filter: Arc<F>,
    dataset: Arc<D>,
    hierarchy: Arc<H>,
    fetcher: BatchFetcher,
    batch_size: usize,
    topology: Topology,
}

impl<F: ?Sized, D: ?Sized, H: ?Sized> Clone for DimensionSelector<F, D, H> {
    fn clone(&self) -> Self {
        Self {
            filter: Arc::clone(&self.filter),
            dataset: Arc::clone(&self.dataset),
            hierarchy: Arc::clone(&self.hierarchy),
            fetcher: self.fetcher,
            batch_size: self.batch_size,
            topology: self.topology.clone(),
        }
    }
}

impl<F, D, H> DimensionSelector<F, D, H>
where
    F: FilterApi + ?Sized + 'static,
    D: DatasetApi + ?Sized,
    H: HierarchyApi + ?Sized,
{
    pub fn new(filter: Arc<F>, dataset: Arc<D>, hierarchy: Arc<H>, batch: BatchConfig) -> Self {
        Self {
            filter,
            dataset,
            hierarchy,
            fetcher: BatchFetcher::new(batch),
            batch_size: batch.page_size,
            topology: Topology::uk_geography(),
        }
    }

    /// Flatten hierarchies with `topology` instead of the UK geography table
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    async fn catalog(&self, dataset: &DatasetRef, dimension: &str) -> Result<BatchResult> {
        let source = CatalogOptions {
            api: self.dataset.as_ref(),
            dataset,
            dimension,
        };
        self.fetcher.fetch_all(&source, None).await
    }

    async fn selected(&self, filter_id: &str, dimension: &str) -> Result<BatchResult> {
        let source = SelectedOptions {
            api: self.filter.as_ref(),
            filter_id,
            dimension,
        };
        self.fetcher.fetch_all(&source, None).await
    }

    /// Job token, checked against the token the selection read saw
    fn guard(
        filter_id: &str,
        dimension: &str,
        job_token: &VersionToken,
        selection: &BatchResult,
    ) -> Result<()> {
        let resource = format!("/filters/{filter_id}/dimensions/{dimension}");
        let mut witness = TokenWitness::starting_at(resource, job_token.clone());
        witness.observe(selection.token.as_ref())
    }

    pub async fn load_selection(&self, filter_id: &str, dimension: &str) -> Result<SelectionView> {
        let (job, token) = self.filter.get_job_state(filter_id).await?;
        let (selection, catalog) = tokio::try_join!(
            self.selected(filter_id, dimension),
            self.catalog(&job.dataset, dimension)
        )?;
        Self::guard(filter_id, dimension, &token, &selection)?;

        let labelled: HashMap<&str, &DimensionOption> = catalog
            .options
            .iter()
            .map(|o| (o.code.as_str(), o))
            .collect();
        let selected = selection
            .options
            .iter()
            .map(|o| labelled.get(o.code.as_str()).map_or_else(|| o.clone(), |c| (*c).clone()))
            .collect();

        Ok(SelectionView {
            filter_id: filter_id.to_string(),
            dimension: dimension.to_string(),
            dataset: job.dataset,
            token,
            first_view: selection.codes.is_empty(),
            selected,
            available: catalog.options,
        })
    }

    /// Reconcile a dimension page submission against the job.
    pub async fn submit(
        &self,
        filter_id: &str,
        dimension: &str,
        submission: Submission,
    ) -> Result<Outcome> {
        let plan = Plan::from_submission(dimension, &submission)?;
        let (job, job_token) = self.filter.get_job_state(filter_id).await?;

        let pending =
            PendingSelection::spawn(Arc::clone(&self.filter), self.fetcher, filter_id, dimension);
        let catalog = if plan.needs_catalog() {
            self.catalog(&job.dataset, dimension).await?
        } else {
            BatchResult::default()
        };

        let (requested, action) = match plan {
            Plan::Explicit(codes) => (codes, BulkAction::None),
            Plan::Bulk(action) => (OptionSet::new(), action),
            Plan::Range(range) => {
                let codes = range.expand(&catalog.options)?;
                (codes.into_iter().collect(), BulkAction::None)
            }
            Plan::Latest => {
                let latest = codec::latest(catalog.codes.iter()).ok_or(RangeError::EmptyCatalog)?;
                (std::iter::once(latest).collect(), BulkAction::None)
            }
        };

        let selection = pending.join().await?;
        Self::guard(filter_id, dimension, &job_token, &selection)?;

        let diff = reconcile(&selection.codes, &requested, action, &catalog.codes);
        self.finish(filter_id, dimension, &selection.codes, diff, job_token, submission)
            .await
    }

    /// Reconcile a search results page: only codes matching the query can
    /// be added or removed.
    pub async fn submit_search(
        &self,
        filter_id: &str,
        dimension: &str,
        submission: Submission,
    ) -> Result<Outcome> {
        let query = submission
            .query
            .clone()
            .ok_or_else(|| FilterError::InvalidSubmission("search without a query".into()))?;
        let (job, job_token) = self.filter.get_job_state(filter_id).await?;

        let pending =
            PendingSelection::spawn(Arc::clone(&self.filter), self.fetcher, filter_id, dimension);
        let catalog = self.catalog(&job.dataset, dimension).await?;
        let results = search_options(&catalog.options, &query);
        let scope: OptionSet = results.iter().map(|o| o.code.as_str()).collect();

        let selection = pending.join().await?;
        Self::guard(filter_id, dimension, &job_token, &selection)?;

        let diff = reconcile_within(
            &selection.codes,
            &submission.options,
            submission.bulk,
            &catalog.codes,
            &scope,
        );
        tracing::debug!(
            filter_id,
            dimension,
            query = %query,
            results = scope.len(),
            "search scope"
        );
        self.finish(filter_id, dimension, &selection.codes, diff, job_token, submission)
            .await
    }

    async fn finish(
        &self,
        filter_id: &str,
        dimension: &str,
        current: &OptionSet,
        diff: Diff,
        token: VersionToken,
        submission: Submission,
    ) -> Result<Outcome> {
        let token = apply::apply(
            self.filter.as_ref(),
            filter_id,
            dimension,
            current,
            &diff,
            token,
            self.batch_size,
        )
        .await?;

        tracing::info!(
            filter_id,
            dimension,
            added = diff.to_add.len(),
            removed = diff.to_remove.len(),
            "selection updated"
        );

        Ok(Outcome {
            token,
            added: diff.to_add,
            removed: diff.to_remove,
            redirect: submission.redirect,
            save_and_return: submission.save_and_return,
        })
    }

    /// Flatten the job's hierarchy for `dimension` with the configured topology
    pub async fn flatten_geography(
        &self,
        instance_id: &str,
        dimension: &str,
    ) -> Result<HierarchyNode> {
        hierarchy::flatten(self.hierarchy.as_ref(), instance_id, dimension, &self.topology).await
    }

    /// Flatten using the hierarchy instance recorded on the job
    pub async fn flatten_for_job(&self, filter_id: &str, dimension: &str) -> Result<HierarchyNode> {
        let (job, _) = self.filter.get_job_state(filter_id).await?;
        let instance_id = job.instance_id.ok_or_else(|| {
            FilterError::InvalidSubmission(format!("filter {filter_id} has no instance"))
        })?;
        self.flatten_geography(&instance_id, dimension).await
    }

    /// Dimensions the job's dataset version offers
    pub async fn dimensions(&self, filter_id: &str) -> Result<Vec<String>> {
        let (job, _) = self.filter.get_job_state(filter_id).await?;
        self.dataset.get_version_dimensions(&job.dataset).await
    }

    /// Put `dimension` on the job. Already present is not an error.
    pub async fn add_dimension(&self, filter_id: &str, dimension: &str) -> Result<VersionToken> {
        let (job, token) = self.filter.get_job_state(filter_id).await?;
        if job.has_dimension(dimension) {
            return Ok(token);
        }
        let offered = self.dataset.get_version_dimensions(&job.dataset).await?;
        if !offered.iter().any(|d| d == dimension) {
            return Err(FilterError::InvalidSubmission(format!(
                "dataset {} has no dimension '{dimension}'",
                job.dataset
            )));
        }
        let token = self.filter.add_dimension(filter_id, dimension, &token).await?;
        tracing::info!(filter_id, dimension, "dimension added");
        Ok(token)
    }

    /// Take `dimension` off the job. Already absent is not an error.
    pub async fn remove_dimension(&self, filter_id: &str, dimension: &str) -> Result<VersionToken> {
        let (job, token) = self.filter.get_job_state(filter_id).await?;
        if !job.has_dimension(dimension) {
            return Ok(token);
        }
        let token = self
            .filter
            .remove_dimension(filter_id, dimension, &token)
            .await?;
        tracing::info!(filter_id, dimension, "dimension removed");
        Ok(token)
    }
}
