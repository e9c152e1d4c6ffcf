//! # drivesense-core
//!
//! Core library for drivesense - a fleet dashboard for a driver-safety
//! product.
//!
//! This library provides:
//! - Domain types for drivers, events and users
//! - REST clients for the users, drivers and events services
//! - A polling reconciler that keeps a local collection in step with a
//!   remote one, with an optimistic local overlay for mutations
//! - The roster and event timeline built on it, plus live telemetry gauges
//! - Session ownership, configuration and logging
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Services:** the remote users, drivers and events APIs (authoritative)
//! - **Reconcilers:** in-memory collections refreshed by polling, with
//!   local mutations applied once the matching remote call succeeds
//! - **Views:** sorted, filtered snapshots handed to the front end
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn run() -> drivesense_core::Result<()> {
//! use drivesense_core::api::Services;
//! use drivesense_core::roster::{RosterSync, RosterView, SortOrder};
//! use drivesense_core::{Config, SessionStore};
//!
//! let config = Config::load()?;
//! let session = SessionStore::open_default().require()?;
//! let services = Services::new(&config.services)?;
//!
//! let roster = RosterSync::connect(services.drivers.clone(), &session);
//! roster.load().await;
//! let _polling = roster.spawn_polling(config.sync.roster_interval());
//!
//! for driver in roster.view(&RosterView::new(SortOrder::Severity)) {
//!     println!("{} {}", driver.name, driver.status);
//! }
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use session::{Session, SessionStore};
pub use sync::{PollHandle, Reconciler, SyncState};
pub use types::*;

// Public modules
pub mod account;
pub mod api;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod roster;
pub mod session;
pub mod sync;
pub mod telemetry;
pub mod timeline;
pub mod types;
