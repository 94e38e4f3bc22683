//! Remote service contracts
//!
//! The only boundary between the controller and the filtering, dataset
//! catalog and hierarchy services.
//!
//! Each trait has one HTTP implementation in [`http`]. Tests supply
//! in-memory implementations.

pub mod http;

use async_trait::async_trait;
use filter_types::{DatasetRef, FilterJob, HierarchyNode, OptionsPage, VersionToken};

use crate::error::Result;

pub use http::{HttpDatasetClient, HttpFilterClient, HttpHierarchyClient};

/// Offset/limit window of a paged collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub offset: usize,
    pub limit: usize,
}

impl PageParams {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

/// Filtering service: owns filter jobs and their selected options
#[async_trait]
pub trait FilterApi: Send + Sync {
    async fn get_job_state(&self, filter_id: &str) -> Result<(FilterJob, VersionToken)>;

    /// One page of the options currently selected for a dimension
    async fn get_dimension_options(
        &self,
        filter_id: &str,
        dimension: &str,
        page: PageParams,
    ) -> Result<OptionsPage>;

    /// Replace the dimension's options wholesale
    async fn set_dimension_options(
        &self,
        filter_id: &str,
        dimension: &str,
        codes: &[String],
        expected: &VersionToken,
    ) -> Result<VersionToken>;

    /// Add and remove options in one call
    async fn patch_dimension_options(
        &self,
        filter_id: &str,
        dimension: &str,
        to_add: &[String],
        to_remove: &[String],
        expected: &VersionToken,
    ) -> Result<VersionToken>;

    async fn add_dimension(
        &self,
        filter_id: &str,
        dimension: &str,
        expected: &VersionToken,
    ) -> Result<VersionToken>;

    async fn remove_dimension(
        &self,
        filter_id: &str,
        dimension: &str,
        expected: &VersionToken,
    ) -> Result<VersionToken>;
}

/// Dataset catalog: the full universe of options per dimension
#[async_trait]
pub trait DatasetApi: Send + Sync {
    async fn get_options(
        &self,
        dataset: &DatasetRef,
        dimension: &str,
        page: PageParams,
    ) -> Result<OptionsPage>;

    async fn get_version_dimensions(&self, dataset: &DatasetRef) -> Result<Vec<String>>;
}

/// Hierarchy service: parent/child navigation over hierarchical dimensions
#[async_trait]
pub trait HierarchyApi: Send + Sync {
    async fn get_root(&self, instance_id: &str, dimension: &str) -> Result<HierarchyNode>;

    async fn get_child(
        &self,
        instance_id: &str,
        dimension: &str,
        node_id: &str,
    ) -> Result<HierarchyNode>;
}
