//! REST clients for the users, drivers and events services
//!
//! The three services are independent deployments; each client wraps a
//! [`ServiceClient`] pointed at its own base URL. Updates follow the
//! single-field patch convention (see [`FieldPatch`](crate::types::FieldPatch)).
//!
//! ## Usage
//!
//! ```rust,no_run
//! # async fn run() -> drivesense_core::Result<()> {
//! use drivesense_core::api::Services;
//! use drivesense_core::Config;
//!
//! let config = Config::load()?;
//! let services = Services::new(&config.services)?;
//! let roster = services.drivers.roster("user-123").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod drivers;
mod events;
mod users;

pub use client::ServiceClient;
pub use drivers::DriversClient;
pub use events::EventsClient;
pub use users::UsersClient;

use crate::config::ServicesConfig;
use crate::error::Result;

/// All three service clients, sharing one connection pool
#[derive(Debug, Clone)]
pub struct Services {
    pub users: UsersClient,
    pub drivers: DriversClient,
    pub events: EventsClient,
}

impl Services {
    pub fn new(config: &ServicesConfig) -> Result<Self> {
        let users = ServiceClient::new(&config.users_url, config)?;
        let drivers = ServiceClient::with_http_client(users.http().clone(), &config.drivers_url);
        let events = ServiceClient::with_http_client(users.http().clone(), &config.events_url);

        Ok(Self {
            users: UsersClient::new(users),
            drivers: DriversClient::new(drivers),
            events: EventsClient::new(events),
        })
    }
}
