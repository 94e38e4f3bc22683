//! Filter Controller - dimension selection for dataset filter jobs
//!
//! Turns a raw form submission (ticked checkboxes, a range pair, an
//! add-all/remove-all flag, or a search-result subset) into the minimal set
//! of additions and removals against a versioned remote option collection.
//!
//! ## Flow
//! Submission -> Plan -> (job read, selection read || catalog read)
//! -> token guard -> range expansion -> reconcile -> batched apply
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use filter_controller::reconcile::{reconcile, BulkAction};
//! use filter_types::OptionSet;
//!
//! let current: OptionSet = ["opt3"].into_iter().collect();
//! let requested: OptionSet = ["opt1", "opt2"].into_iter().collect();
//! let diff = reconcile(&current, &requested, BulkAction::None, &OptionSet::new());
//! assert_eq!(diff.to_remove.len(), 1);
//! ```

// Core error handling
pub mod error;

// Environment configuration
pub mod config;

// Pure selection logic
pub mod codec;
pub mod range;
pub mod reconcile;
pub mod submission;

// Remote services and the reads/writes against them
pub mod apply;
pub mod batch;
pub mod clients;
pub mod consistency;
pub mod hierarchy;

// Orchestration
pub mod service;

// HTTP front (form posts, JSON views)
#[cfg(feature = "server")]
pub mod api;

pub use config::{BatchConfig, Config};
pub use error::{FilterError, RangeError, Result};
pub use reconcile::{BulkAction, Diff};
pub use service::{DimensionSelector, Outcome, SelectionView};
pub use submission::{Directive, Submission};
