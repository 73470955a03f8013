//! View state and the controller that owns it.
//!
//! Pure and synchronous: `submit` decides what happens to a query, the
//! caller performs the external call, and `complete` applies its outcome.
//! Each accepted submit gets a cycle number so late completions can be
//! told apart from the in-flight one.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::catalog::{Catalog, Product};
use crate::recommend::RecommendationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Error,
}

/// Snapshot rendered by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub query: String,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub results: Vec<Product>,
}

impl ViewState {
    pub fn phase(&self) -> Phase {
        if self.is_loading {
            Phase::Loading
        } else if self.error_message.is_some() {
            Phase::Error
        } else {
            Phase::Idle
        }
    }

    /// True when the "no match" indicator should be shown.
    pub fn shows_no_match(&self) -> bool {
        self.results.is_empty() && !self.is_loading
    }
}

/// A recommendation request the caller must run and report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub cycle: u64,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Empty query: full catalog restored, nothing to call.
    Restored,
    /// A request is already in flight; the submit was dropped.
    Rejected,
    /// Caller must run this request and pass the outcome to `complete`.
    Dispatch(PendingRequest),
}

pub struct Controller {
    catalog: Arc<Catalog>,
    state: ViewState,
    in_flight: Option<u64>,
    next_cycle: u64,
}

impl Controller {
    /// Starts `Idle` with the full catalog.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let state = ViewState {
            query: String::new(),
            is_loading: false,
            error_message: None,
            results: catalog.products().to_vec(),
        };
        Self {
            catalog,
            state,
            in_flight: None,
            next_cycle: 1,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Replaces the query text without submitting it.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.state.query = query.into();
    }

    /// Submits the current query.
    pub fn submit(&mut self) -> Submission {
        if let Some(cycle) = self.in_flight {
            debug!("Submit ignored, cycle {cycle} still loading");
            return Submission::Rejected;
        }

        if self.state.query.is_empty() {
            self.state.error_message = None;
            self.state.results = self.catalog.products().to_vec();
            return Submission::Restored;
        }

        let cycle = self.next_cycle;
        self.next_cycle += 1;
        self.in_flight = Some(cycle);
        self.state.is_loading = true;
        self.state.error_message = None;

        info!("Cycle {cycle}: requesting recommendations for {:?}", self.state.query);
        Submission::Dispatch(PendingRequest {
            cycle,
            query: self.state.query.clone(),
        })
    }

    /// Sets the query and submits it. While loading, the query is left
    /// untouched as well.
    pub fn submit_query(&mut self, query: impl Into<String>) -> Submission {
        if self.is_busy() {
            debug!("Submit ignored, a request is still loading");
            return Submission::Rejected;
        }
        self.set_query(query);
        self.submit()
    }

    /// Applies the outcome of `cycle`. Returns false if `cycle` is not the
    /// request in flight (the outcome is dropped).
    pub fn complete(
        &mut self,
        cycle: u64,
        outcome: Result<BTreeSet<i64>, RecommendationError>,
    ) -> bool {
        if self.in_flight != Some(cycle) {
            debug!("Dropping outcome of stale cycle {cycle}");
            return false;
        }
        self.in_flight = None;
        self.state.is_loading = false;

        match outcome {
            Ok(ids) => {
                self.state.results = self.catalog.filter_by_ids(&ids);
                self.state.error_message = None;
                info!(
                    "Cycle {cycle}: {} of {} recommended ids matched the catalog",
                    self.state.results.len(),
                    ids.len()
                );
            }
            Err(e) => {
                error!("Cycle {cycle}: error fetching recommendations ({:?}): {e}", e.kind());
                if let RecommendationError::ParseFailure { raw, .. } = &e {
                    debug!("Unparseable model reply: {raw}");
                }
                self.state.results.clear();
                self.state.error_message = Some(e.user_message().to_string());
            }
        }
        true
    }
}
