//! Batched retrieval of option collections
//!
//! Collections are read in pages of at most `page_size` items with at most
//! `max_concurrent_pages` requests in flight. The first failing page aborts
//! the rest; a partial collection is never returned.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;

use filter_types::{DatasetRef, DimensionOption, OptionSet, OptionsPage, VersionToken};

use crate::clients::{DatasetApi, FilterApi, PageParams};
use crate::config::BatchConfig;
use crate::consistency::TokenWitness;
use crate::error::Result;

/// A paged collection that can be read one window at a time
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Used in logs and conflict errors
    fn resource(&self) -> String;

    async fn fetch_page(&self, page: PageParams) -> Result<OptionsPage>;
}

/// Options currently selected for a dimension on a filter job
pub struct SelectedOptions<'a, F: ?Sized> {
    pub api: &'a F,
    pub filter_id: &'a str,
    pub dimension: &'a str,
}

#[async_trait]
impl<'a, F: FilterApi + ?Sized> PageSource for SelectedOptions<'a, F> {
    fn resource(&self) -> String {
        format!("/filters/{}/dimensions/{}/options", self.filter_id, self.dimension)
    }

    async fn fetch_page(&self, page: PageParams) -> Result<OptionsPage> {
        self.api
            .get_dimension_options(self.filter_id, self.dimension, page)
            .await
    }
}

/// Every option the catalog knows for a dimension
pub struct CatalogOptions<'a, D: ?Sized> {
    pub api: &'a D,
    pub dataset: &'a DatasetRef,
    pub dimension: &'a str,
}

#[async_trait]
impl<'a, D: DatasetApi + ?Sized> PageSource for CatalogOptions<'a, D> {
    fn resource(&self) -> String {
        format!("/datasets/{}/dimensions/{}/options", self.dataset, self.dimension)
    }

    async fn fetch_page(&self, page: PageParams) -> Result<OptionsPage> {
        self.api.get_options(self.dataset, self.dimension, page).await
    }
}

/// Aggregated collection plus the single token every page agreed on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// In collection order, one entry per code
    pub options: Vec<DimensionOption>,
    pub codes: OptionSet,
    pub token: Option<VersionToken>,
}

#[derive(Debug, Clone, Copy)]
pub struct BatchFetcher {
    config: BatchConfig,
}

impl BatchFetcher {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Read the whole collection.
    ///
    /// With `expected_total` unknown, the first page is read alone to learn
    /// the total and the remainder is fanned out. A known total of zero
    /// returns immediately without calling the source.
    pub async fn fetch_all<S>(&self, source: &S, expected_total: Option<usize>) -> Result<BatchResult>
    where
        S: PageSource + ?Sized,
    {
        if expected_total == Some(0) {
            return Ok(BatchResult::default());
        }

        let page_size = self.config.page_size.max(1);
        let max_in_flight = self.config.max_concurrent_pages.max(1);
        let resource = source.resource();
        let mut witness = TokenWitness::new(resource.clone());
        let mut pages: Vec<OptionsPage> = Vec::new();

        let (total, next_offset) = match expected_total {
            Some(total) => (total, 0),
            None => {
                let first = source.fetch_page(PageParams::new(0, page_size)).await?;
                witness.observe(first.token.as_ref())?;
                let total = first.total_count;
                pages.push(first);
                (total, page_size)
            }
        };

        let offsets: Vec<usize> = (next_offset..total).step_by(page_size).collect();
        tracing::debug!(
            resource = %resource,
            total,
            remaining_pages = offsets.len(),
            max_in_flight,
            "fetching options in batches"
        );

        let mut in_flight = stream::iter(offsets)
            .map(|offset| source.fetch_page(PageParams::new(offset, page_size)))
            .buffer_unordered(max_in_flight);

        // Returning early drops the stream, which cancels the pages still in flight
        while let Some(page) = in_flight.try_next().await? {
            witness.observe(page.token.as_ref())?;
            pages.push(page);
        }

        pages.sort_by_key(|p| p.offset);
        let mut seen = HashSet::new();
        let options: Vec<DimensionOption> = pages
            .into_iter()
            .flat_map(|p| p.items)
            .filter(|o| seen.insert(o.code.clone()))
            .collect();
        let codes = options.iter().map(|o| o.code.as_str()).collect();

        Ok(BatchResult {
            options,
            codes,
            token: witness.into_token(),
        })
    }
}
