//! In-memory stand-ins for the filtering, dataset and hierarchy services.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use filter_controller::clients::{DatasetApi, FilterApi, HierarchyApi, PageParams};
use filter_controller::service::DimensionSelector;
use filter_controller::{BatchConfig, FilterError, Result};
use filter_types::{
    DatasetRef, DimensionOption, FilterJob, HierarchyNode, OptionsPage, VersionToken,
};

// ── Filtering service ──────────────────────────────────────────

#[derive(Debug)]
pub struct FilterState {
    pub job: FilterJob,
    pub revision: u64,
    /// dimension -> selected codes, in insertion order
    pub selected: BTreeMap<String, Vec<String>>,
    /// Bump the revision on the next options read, as another user would
    pub concurrent_edit: bool,
    pub fail_patch_call: Option<usize>,
    pub patch_calls: usize,
    pub replace_calls: usize,
}

pub struct FakeFilter {
    pub state: Mutex<FilterState>,
}

impl FakeFilter {
    pub fn new(filter_id: &str, dimensions: &[&str]) -> Self {
        Self {
            state: Mutex::new(FilterState {
                job: FilterJob {
                    filter_id: filter_id.to_string(),
                    version_token: None,
                    dataset: DatasetRef::new("cpih01", "time-series", "1"),
                    instance_id: Some("inst-1".to_string()),
                    dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
                },
                revision: 1,
                selected: BTreeMap::new(),
                concurrent_edit: false,
                fail_patch_call: None,
                patch_calls: 0,
                replace_calls: 0,
            }),
        }
    }

    pub fn select(&self, dimension: &str, codes: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.selected.insert(
            dimension.to_string(),
            codes.iter().map(|c| c.to_string()).collect(),
        );
    }

    pub fn selected(&self, dimension: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut codes = state.selected.get(dimension).cloned().unwrap_or_default();
        codes.sort();
        codes
    }

    pub fn mutations(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.patch_calls + state.replace_calls
    }

    pub fn token(&self) -> VersionToken {
        token_for(self.state.lock().unwrap().revision)
    }
}

fn token_for(revision: u64) -> VersionToken {
    VersionToken::new(format!("\"rev-{revision}\""))
}

fn check_expected(state: &FilterState, resource: &str, expected: &VersionToken) -> Result<()> {
    if *expected != token_for(state.revision) {
        return Err(FilterError::StaleVersion {
            resource: resource.to_string(),
            expected: expected.clone(),
        });
    }
    Ok(())
}

fn page_of(codes: &[DimensionOption], page: PageParams, token: Option<VersionToken>) -> OptionsPage {
    let start = page.offset.min(codes.len());
    let end = (page.offset + page.limit).min(codes.len());
    OptionsPage {
        items: codes[start..end].to_vec(),
        offset: page.offset,
        limit: page.limit,
        total_count: codes.len(),
        token,
    }
}

#[async_trait]
impl FilterApi for FakeFilter {
    async fn get_job_state(&self, filter_id: &str) -> Result<(FilterJob, VersionToken)> {
        let state = self.state.lock().unwrap();
        if state.job.filter_id != filter_id {
            return Err(FilterError::upstream(404, format!("/filters/{filter_id}")));
        }
        let token = token_for(state.revision);
        let mut job = state.job.clone();
        job.version_token = Some(token.clone());
        Ok((job, token))
    }

    async fn get_dimension_options(
        &self,
        filter_id: &str,
        dimension: &str,
        page: PageParams,
    ) -> Result<OptionsPage> {
        let mut state = self.state.lock().unwrap();
        if state.job.filter_id != filter_id {
            return Err(FilterError::upstream(404, format!("/filters/{filter_id}")));
        }
        if state.concurrent_edit {
            state.concurrent_edit = false;
            state.revision += 1;
        }
        let codes: Vec<DimensionOption> = state
            .selected
            .get(dimension)
            .map(|codes| codes.iter().map(DimensionOption::code_only).collect())
            .unwrap_or_default();
        Ok(page_of(&codes, page, Some(token_for(state.revision))))
    }

    async fn set_dimension_options(
        &self,
        _filter_id: &str,
        dimension: &str,
        codes: &[String],
        expected: &VersionToken,
    ) -> Result<VersionToken> {
        let mut state = self.state.lock().unwrap();
        check_expected(&state, dimension, expected)?;
        state.replace_calls += 1;
        state.selected.insert(dimension.to_string(), codes.to_vec());
        state.revision += 1;
        Ok(token_for(state.revision))
    }

    async fn patch_dimension_options(
        &self,
        _filter_id: &str,
        dimension: &str,
        to_add: &[String],
        to_remove: &[String],
        expected: &VersionToken,
    ) -> Result<VersionToken> {
        let mut state = self.state.lock().unwrap();
        check_expected(&state, dimension, expected)?;
        let call = state.patch_calls;
        state.patch_calls += 1;
        if state.fail_patch_call == Some(call) {
            return Err(FilterError::upstream(500, format!("/dimensions/{dimension}")));
        }

        let selected = state.selected.entry(dimension.to_string()).or_default();
        selected.retain(|c| !to_remove.contains(c));
        for code in to_add {
            if !selected.contains(code) {
                selected.push(code.clone());
            }
        }
        state.revision += 1;
        Ok(token_for(state.revision))
    }

    async fn add_dimension(
        &self,
        _filter_id: &str,
        dimension: &str,
        expected: &VersionToken,
    ) -> Result<VersionToken> {
        let mut state = self.state.lock().unwrap();
        check_expected(&state, dimension, expected)?;
        state.job.dimensions.push(dimension.to_string());
        state.revision += 1;
        Ok(token_for(state.revision))
    }

    async fn remove_dimension(
        &self,
        _filter_id: &str,
        dimension: &str,
        expected: &VersionToken,
    ) -> Result<VersionToken> {
        let mut state = self.state.lock().unwrap();
        check_expected(&state, dimension, expected)?;
        state.job.dimensions.retain(|d| d != dimension);
        state.selected.remove(dimension);
        state.revision += 1;
        Ok(token_for(state.revision))
    }
}

// ── Dataset catalog ────────────────────────────────────────────

#[derive(Default)]
pub struct FakeDataset {
    pub catalog: HashMap<String, Vec<DimensionOption>>,
}

impl FakeDataset {
    pub fn with(mut self, dimension: &str, options: &[(&str, &str)]) -> Self {
        self.catalog.insert(
            dimension.to_string(),
            options
                .iter()
                .map(|(code, label)| DimensionOption::new(*code, *label))
                .collect(),
        );
        self
    }

    pub fn with_codes(self, dimension: &str, codes: &[&str]) -> Self {
        let pairs: Vec<(&str, &str)> = codes.iter().map(|c| (*c, *c)).collect();
        self.with(dimension, &pairs)
    }
}

#[async_trait]
impl DatasetApi for FakeDataset {
    async fn get_options(
        &self,
        _dataset: &DatasetRef,
        dimension: &str,
        page: PageParams,
    ) -> Result<OptionsPage> {
        let options = self
            .catalog
            .get(dimension)
            .ok_or_else(|| FilterError::upstream(404, format!("/dimensions/{dimension}")))?;
        Ok(page_of(options, page, None))
    }

    async fn get_version_dimensions(&self, _dataset: &DatasetRef) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.catalog.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

// ── Hierarchy service ──────────────────────────────────────────

#[derive(Default)]
pub struct FakeHierarchy {
    pub nodes: HashMap<String, HierarchyNode>,
    pub root: String,
}

impl FakeHierarchy {
    /// UK geography, three levels deep, plus one node outside the topology
    pub fn uk() -> Self {
        let mut fake = Self {
            root: "K02000001".to_string(),
            ..Default::default()
        };
        fake.add(
            "K02000001",
            "United Kingdom",
            &[
                ("K03000001", "Great Britain"),
                ("N92000002", "Northern Ireland"),
                ("X00000001", "Elsewhere"),
            ],
        );
        fake.add(
            "K03000001",
            "Great Britain",
            &[("K04000001", "England and Wales"), ("S92000003", "Scotland")],
        );
        fake.add(
            "K04000001",
            "England and Wales",
            &[("E92000001", "England"), ("W92000004", "Wales")],
        );
        fake
    }

    fn add(&mut self, id: &str, label: &str, children: &[(&str, &str)]) {
        self.nodes.insert(
            id.to_string(),
            HierarchyNode {
                id: id.to_string(),
                label: label.to_string(),
                has_children: !children.is_empty(),
                children: children
                    .iter()
                    .map(|(cid, clabel)| HierarchyNode {
                        has_children: true,
                        ..HierarchyNode::leaf(*cid, *clabel)
                    })
                    .collect(),
            },
        );
    }
}

#[async_trait]
impl HierarchyApi for FakeHierarchy {
    async fn get_root(&self, instance_id: &str, dimension: &str) -> Result<HierarchyNode> {
        self.get_child(instance_id, dimension, &self.root).await
    }

    async fn get_child(
        &self,
        _instance_id: &str,
        _dimension: &str,
        node_id: &str,
    ) -> Result<HierarchyNode> {
        self.nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| FilterError::upstream(404, format!("/hierarchies/{node_id}")))
    }
}

// ── Wiring ─────────────────────────────────────────────────────

pub type Selector = DimensionSelector<dyn FilterApi, dyn DatasetApi, dyn HierarchyApi>;

pub fn batch(page_size: usize) -> BatchConfig {
    BatchConfig {
        page_size,
        max_concurrent_pages: 2,
    }
}

pub fn selector(filter: &Arc<FakeFilter>, dataset: FakeDataset, page_size: usize) -> Selector {
    let filter: Arc<dyn FilterApi> = filter.clone();
    let dataset: Arc<dyn DatasetApi> = Arc::new(dataset);
    let hierarchy: Arc<dyn HierarchyApi> = Arc::new(FakeHierarchy::uk());
    DimensionSelector::new(filter, dataset, hierarchy, batch(page_size))
}
