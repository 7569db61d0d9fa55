//! Round computation algorithms.
//!
//! - `graph_builder`: snapshot scan into the sponsor forest
//! - `rank`: dense ranking by holding
//! - `spread`: post-order network-effect metric
//! - `distribution`: exact pool split with remainder collection

pub mod distribution;
pub mod graph_builder;
pub mod math;
pub mod rank;
pub mod spread;

pub use distribution::{derive_total_coins, distribute, Distribution, DistributionParams};
pub use graph_builder::{build_account_graph, AccountGraph};
pub use rank::assign_ranks;
pub use spread::{compute_spreads, SpreadParams};
