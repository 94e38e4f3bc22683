//! Dimension selection routes
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/filters/:filter_id/dimensions` | GET | Dimensions the dataset offers |
//! | `/filters/:filter_id/dimensions/:name` | GET | Current selection and catalog |
//! | `/filters/:filter_id/dimensions/:name` | POST | Add the dimension to the job |
//! | `/filters/:filter_id/dimensions/:name` | DELETE | Remove the dimension from the job |
//! | `/filters/:filter_id/dimensions/:name/update` | POST | Apply a dimension page form |
//! | `/filters/:filter_id/dimensions/:name/search/update` | POST | Apply a search results form |
//! | `/filters/:filter_id/hierarchies/:name/flat` | GET | Flattened hierarchy |

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    routing::{get, post},
    Form, Json, Router,
};
use filter_types::{HierarchyNode, VersionToken};
use serde::{Deserialize, Serialize};

use super::error::AppError;
use crate::clients::{DatasetApi, FilterApi, HierarchyApi};
use crate::service::{DimensionSelector, Outcome, SelectionView};
use crate::submission::Submission;

/// Selector over boxed clients, as wired by the server binary
pub type DynSelector = DimensionSelector<dyn FilterApi, dyn DatasetApi, dyn HierarchyApi>;

#[derive(Clone)]
pub struct SelectionState {
    pub selector: Arc<DynSelector>,
}

impl SelectionState {
    pub fn new(selector: DynSelector) -> Self {
        Self {
            selector: Arc::new(selector),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FlatQuery {
    pub instance: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: VersionToken,
}

pub fn create_selection_router(selector: DynSelector) -> Router {
    Router::new()
        .route("/filters/:filter_id/dimensions", get(list_dimensions))
        .route(
            "/filters/:filter_id/dimensions/:name",
            get(get_selection).post(add_dimension).delete(remove_dimension),
        )
        .route(
            "/filters/:filter_id/dimensions/:name/update",
            post(update_selection),
        )
        .route(
            "/filters/:filter_id/dimensions/:name/search/update",
            post(update_search),
        )
        .route(
            "/filters/:filter_id/hierarchies/:name/flat",
            get(flat_hierarchy),
        )
        .with_state(SelectionState::new(selector))
}

/// Where the browser goes after a successful post.
///
/// A `redirect:` target wins if it is a local path; otherwise
/// save-and-return goes to the overview and anything else back to the page.
fn next_page(filter_id: &str, dimension: &str, outcome: &Outcome) -> String {
    if let Some(target) = &outcome.redirect {
        if target.starts_with('/') && !target.starts_with("//") {
            return target.clone();
        }
        tracing::warn!(target = %target, "ignoring non-local redirect target");
    }
    if outcome.save_and_return {
        format!("/filters/{filter_id}/dimensions")
    } else {
        format!("/filters/{filter_id}/dimensions/{dimension}")
    }
}

/// GET /filters/:filter_id/dimensions
async fn list_dimensions(
    State(state): State<SelectionState>,
    Path(filter_id): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.selector.dimensions(&filter_id).await?))
}

/// GET /filters/:filter_id/dimensions/:name
async fn get_selection(
    State(state): State<SelectionState>,
    Path((filter_id, name)): Path<(String, String)>,
) -> Result<Json<SelectionView>, AppError> {
    Ok(Json(state.selector.load_selection(&filter_id, &name).await?))
}

/// POST /filters/:filter_id/dimensions/:name
async fn add_dimension(
    State(state): State<SelectionState>,
    Path((filter_id, name)): Path<(String, String)>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = state.selector.add_dimension(&filter_id, &name).await?;
    Ok(Json(TokenResponse { token }))
}

/// DELETE /filters/:filter_id/dimensions/:name
async fn remove_dimension(
    State(state): State<SelectionState>,
    Path((filter_id, name)): Path<(String, String)>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = state.selector.remove_dimension(&filter_id, &name).await?;
    Ok(Json(TokenResponse { token }))
}

/// POST /filters/:filter_id/dimensions/:name/update
async fn update_selection(
    State(state): State<SelectionState>,
    Path((filter_id, name)): Path<(String, String)>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Redirect, AppError> {
    let fail = |e| AppError::on_dimension(e, &filter_id, &name);
    let submission = Submission::from_pairs(&name, fields).map_err(fail)?;
    let outcome = state
        .selector
        .submit(&filter_id, &name, submission)
        .await
        .map_err(fail)?;
    Ok(Redirect::to(&next_page(&filter_id, &name, &outcome)))
}

/// POST /filters/:filter_id/dimensions/:name/search/update
async fn update_search(
    State(state): State<SelectionState>,
    Path((filter_id, name)): Path<(String, String)>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Redirect, AppError> {
    let fail = |e| AppError::on_dimension(e, &filter_id, &name);
    let submission = Submission::from_pairs(&name, fields).map_err(fail)?;
    let outcome = state
        .selector
        .submit_search(&filter_id, &name, submission)
        .await
        .map_err(fail)?;
    Ok(Redirect::to(&next_page(&filter_id, &name, &outcome)))
}

/// GET /filters/:filter_id/hierarchies/:name/flat
async fn flat_hierarchy(
    State(state): State<SelectionState>,
    Path((filter_id, name)): Path<(String, String)>,
    Query(query): Query<FlatQuery>,
) -> Result<Json<HierarchyNode>, AppError> {
    let node = match query.instance {
        Some(instance) => state.selector.flatten_geography(&instance, &name).await?,
        None => state.selector.flatten_for_job(&filter_id, &name).await?,
    };
    Ok(Json(node))
}
