//! Seams to the two upstream services.
//!
//! The hybrid client only needs these traits; the structured API client
//! and the legacy transport live behind them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::schema::{Controller, Sensor, User, Zone};

/// The structured, rate-limited API returning fully populated objects.
#[async_trait]
pub trait PrimaryBackend: Send + Sync {
    async fn get_user(&self, fetch_zones: bool) -> Result<User>;
    async fn get_controllers(
        &self,
        fetch_zones: bool,
        fetch_sensors: bool,
    ) -> Result<Vec<Controller>>;
    async fn get_controller(&self, controller_id: u64) -> Result<Controller>;
    async fn get_zones(&self, controller: &Controller) -> Result<Vec<Zone>>;
    async fn get_zone(&self, zone_id: u64) -> Result<Zone>;
    async fn get_sensors(&self, controller: &Controller) -> Result<Vec<Sensor>>;
}

/// The legacy endpoint: one authenticated GET per controller.
#[async_trait]
pub trait SecondaryBackend: Send + Sync {
    async fn get(&self, path: &str, controller_id: u64) -> Result<Value>;
}

#[async_trait]
impl<T: PrimaryBackend + ?Sized> PrimaryBackend for Arc<T> {
    async fn get_user(&self, fetch_zones: bool) -> Result<User> {
        (**self).get_user(fetch_zones).await
    }

    async fn get_controllers(
        &self,
        fetch_zones: bool,
        fetch_sensors: bool,
    ) -> Result<Vec<Controller>> {
        (**self).get_controllers(fetch_zones, fetch_sensors).await
    }

    async fn get_controller(&self, controller_id: u64) -> Result<Controller> {
        (**self).get_controller(controller_id).await
    }

    async fn get_zones(&self, controller: &Controller) -> Result<Vec<Zone>> {
        (**self).get_zones(controller).await
    }

    async fn get_zone(&self, zone_id: u64) -> Result<Zone> {
        (**self).get_zone(zone_id).await
    }

    async fn get_sensors(&self, controller: &Controller) -> Result<Vec<Sensor>> {
        (**self).get_sensors(controller).await
    }
}

#[async_trait]
impl<T: SecondaryBackend + ?Sized> SecondaryBackend for Arc<T> {
    async fn get(&self, path: &str, controller_id: u64) -> Result<Value> {
        (**self).get(path, controller_id).await
    }
}
