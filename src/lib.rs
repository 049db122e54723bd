//! Hydrawise Hybrid: Budget-Aware Access to Two Irrigation Backends
//!
//! The cloud service behind Hydrawise controllers offers a structured API
//! that returns complete objects but allows only a handful of calls per half
//! hour, and a legacy REST endpoint that is cheap to poll but only reports
//! live zone status. This crate fronts both with a single client that
//! spends the primary budget first, patches cached snapshots from the legacy
//! endpoint once that runs out, and serves the cache when both are spent.
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use hydrawise_hybrid::{
//!     Controller, HybridClient, HybridSettings, PrimaryBackend, RestClient, Result, Sensor,
//!     User, Zone,
//! };
//!
//! // Stand-in for a structured API client
//! struct StructuredApi;
//!
//! #[async_trait]
//! impl PrimaryBackend for StructuredApi {
//!     async fn get_user(&self, _fetch_zones: bool) -> Result<User> { todo!() }
//!     async fn get_controllers(&self, _zones: bool, _sensors: bool) -> Result<Vec<Controller>> {
//!         todo!()
//!     }
//!     async fn get_controller(&self, _id: u64) -> Result<Controller> { todo!() }
//!     async fn get_zones(&self, _controller: &Controller) -> Result<Vec<Zone>> { todo!() }
//!     async fn get_zone(&self, _id: u64) -> Result<Zone> { todo!() }
//!     async fn get_sensors(&self, _controller: &Controller) -> Result<Vec<Sensor>> { todo!() }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     // Initialize settings
//!     let settings = HybridSettings::new()?;
//!
//!     // Legacy transport authenticated with an API key
//!     let rest = RestClient::from_settings(&settings.rest)?;
//!
//!     let client = HybridClient::from_settings(StructuredApi, rest, &settings);
//!
//!     // First call always reaches the structured API
//!     let user = client.get_user(true).await?;
//!     println!("{} controllers", user.controllers.len());
//!
//!     // Later calls fall back to the legacy endpoint, then to the cache
//!     let controllers = client.get_controllers(true, true).await?;
//!     for controller in &controllers {
//!         println!("{}: {} zones", controller.name, controller.zones.len());
//!     }
//!
//!     // Refresh live status of every controller, four at a time
//!     let refreshed = client.update_all_with_limit(Some(4)).await?;
//!     println!("refreshed {refreshed} controllers");
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod hybrid;
pub mod rest;
pub mod schema;
pub mod selector;
pub mod throttle;

pub use backend::{PrimaryBackend, SecondaryBackend};
pub use cache::{PatchSummary, ResponseCache};
pub use config::{HybridSettings, RestSettings, ThrottleConfig};
pub use error::{BackendError, Result};
pub use hybrid::{HybridClient, HybridClientBuilder, ThrottleSource};
pub use rest::RestClient;
pub use schema::{
    Controller, Relay, RelayStatus, RelayTime, ScheduledRuns, Sensor, SensorModel, SensorStatus,
    SensorType, StatusSchedule, User, Zone, ZoneNumber, ZoneStatus,
};
pub use selector::{select, Decision, SecondaryRoute};
pub use throttle::Throttler;
