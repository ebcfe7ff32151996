//! Store access for the TUI.
//!
//! A single background `std::thread` owns the [`marginal_core::project::Project`]
//! and performs every read, reconcile, and mutation. The render loop only sends
//! [`types::StoreRequest`]s and receives finished snapshots, so lock waits and
//! syntax highlighting never stall a frame.
pub mod highlight;
pub mod types;
pub mod worker;
