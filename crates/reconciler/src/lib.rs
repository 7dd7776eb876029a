//! Signal Reconciler
//!
//! Merges the vision and API classifier outputs for one snapshot into a single
//! per-stock view, then derives summary statistics and faceted option counts.
//! Every function here is pure: same inputs, same bytes out.

pub mod aggregate;
pub mod evaluation;
pub mod facets;
pub mod reconcile;
pub mod report;


pub use aggregate::{aggregate, SignalStats};
pub use evaluation::{evaluate, evaluate_reconciled, Evaluation};
pub use facets::{facet_counts, filter_and_sort, Facet, FacetCounts};
pub use reconcile::{classify, fingerprint, reconcile, Reconciliation};
pub use report::render_markdown;
