//! Last-known snapshots of everything fetched from the primary backend,
//! patched in place by legacy status responses.
//!
//! Controllers are the unit of storage: the cached user only remembers
//! which controllers belong to it, so a patch applied to a controller is
//! visible through every view that contains it.
//!
//! # Merge rules
//!
//! A legacy relay is matched to a cached zone by `relay_id == zone.id`,
//! falling back to `relay == zone.number.value`. For a matched zone:
//!
//! - `status.suspended_until` becomes [`DateTime::<Utc>::MAX_UTC`] for the
//!   suspension sentinel, `now + time` otherwise
//! - `status.current_run_end` becomes `now + run` when `run` is positive,
//!   and is cleared otherwise
//! - `name` is only filled in when the cached zone has none
//! - everything else (number label, scheduled runs) is left alone
//!
//! A relay with no matching zone is appended to its controller as a
//! status-only zone. A relay whose `time` cannot be read is skipped.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::schema::{Controller, Relay, RelayStatus, Sensor, User, Zone};

#[derive(Debug, Default)]
pub struct ResponseCache {
    /// User fields only; its controllers live in `controllers`.
    user: Option<User>,
    user_controllers: Vec<u64>,
    controllers: HashMap<u64, Controller>,
    /// Controller ids in first-seen order.
    order: Vec<u64>,
    sensors: HashMap<u64, Vec<Sensor>>,
    /// Zones fetched by id that belong to no cached controller.
    zones: HashMap<u64, Zone>,
}

/// What a legacy patch did to one controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchSummary {
    pub updated: usize,
    pub appended: usize,
    pub skipped: usize,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<User> {
        let header = self.user.as_ref()?;
        let mut user = header.clone();
        user.controllers = self
            .user_controllers
            .iter()
            .filter_map(|id| self.controllers.get(id).cloned())
            .collect();
        Some(user)
    }

    pub fn controller(&self, controller_id: u64) -> Option<&Controller> {
        self.controllers.get(&controller_id)
    }

    pub fn controllers(&self) -> Vec<Controller> {
        self.order
            .iter()
            .filter_map(|id| self.controllers.get(id).cloned())
            .collect()
    }

    pub fn controller_ids(&self) -> Vec<u64> {
        self.order.clone()
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    pub fn zones(&self, controller_id: u64) -> Option<Vec<Zone>> {
        self.controllers
            .get(&controller_id)
            .map(|controller| controller.zones.clone())
    }

    pub fn zone(&self, zone_id: u64) -> Option<Zone> {
        self.controllers
            .values()
            .flat_map(|controller| controller.zones.iter())
            .find(|zone| zone.id == zone_id)
            .or_else(|| self.zones.get(&zone_id))
            .cloned()
    }

    pub fn sensors(&self, controller_id: u64) -> Option<Vec<Sensor>> {
        self.sensors.get(&controller_id).cloned()
    }

    /// Replaces the user and every controller it carries.
    pub fn store_user(&mut self, mut user: User) -> User {
        let controllers = std::mem::take(&mut user.controllers);
        self.user_controllers = controllers.iter().map(|c| c.id).collect();
        for controller in controllers {
            self.put_controller(controller);
        }
        self.user = Some(user);
        self.user().expect("user snapshot was just stored")
    }

    /// Replaces each listed controller; controllers missing from the list
    /// stay cached. Returns every cached controller.
    pub fn store_controllers(&mut self, controllers: Vec<Controller>) -> Vec<Controller> {
        for controller in controllers {
            self.put_controller(controller);
        }
        self.controllers()
    }

    pub fn store_controller(&mut self, controller: Controller) -> Controller {
        let stored = controller.clone();
        self.put_controller(controller);
        stored
    }

    /// Replaces the zone list of `controller`, caching the controller
    /// itself if this is the first time it is seen.
    pub fn store_zones(&mut self, controller: &Controller, zones: Vec<Zone>) -> Vec<Zone> {
        match self.controllers.get_mut(&controller.id) {
            Some(cached) => cached.zones = zones.clone(),
            None => {
                let mut fresh = controller.clone();
                fresh.zones = zones.clone();
                self.put_controller(fresh);
            }
        }
        zones
    }

    pub fn store_zone(&mut self, zone: Zone) -> Zone {
        let owner = self
            .controllers
            .values_mut()
            .flat_map(|controller| controller.zones.iter_mut())
            .find(|cached| cached.id == zone.id);
        match owner {
            Some(cached) => *cached = zone.clone(),
            None => {
                self.zones.insert(zone.id, zone.clone());
            }
        }
        zone
    }

    pub fn store_sensors(&mut self, controller: &Controller, sensors: Vec<Sensor>) -> Vec<Sensor> {
        if let Some(cached) = self.controllers.get_mut(&controller.id) {
            cached.sensors = sensors.clone();
        }
        self.sensors.insert(controller.id, sensors.clone());
        sensors
    }

    /// Applies one legacy status response to a cached controller. Returns
    /// `None`, touching nothing, when the controller is not cached.
    pub fn patch_from_secondary(
        &mut self,
        controller_id: u64,
        relays: &[Relay],
        now: DateTime<Utc>,
    ) -> Option<PatchSummary> {
        let controller = self.controllers.get_mut(&controller_id)?;
        let mut summary = PatchSummary::default();

        for relay in relays {
            let Some(status) = relay.status() else {
                warn!(
                    controller_id,
                    relay_id = relay.relay_id,
                    time = %relay.time,
                    "unreadable relay time, keeping cached zone"
                );
                summary.skipped += 1;
                continue;
            };

            match matching_zone(&mut controller.zones, relay) {
                Some(zone) => {
                    merge_relay(zone, relay, &status, now);
                    summary.updated += 1;
                }
                None => {
                    controller.zones.push(Zone::from_relay(relay, &status, now));
                    summary.appended += 1;
                }
            }
        }

        Some(summary)
    }

    fn put_controller(&mut self, controller: Controller) {
        if !self.controllers.contains_key(&controller.id) {
            self.order.push(controller.id);
        }
        self.controllers.insert(controller.id, controller);
        debug_assert_eq!(self.order.len(), self.controllers.len());
    }
}

fn matching_zone<'a>(zones: &'a mut [Zone], relay: &Relay) -> Option<&'a mut Zone> {
    let index = zones
        .iter()
        .position(|zone| zone.id == relay.relay_id)
        .or_else(|| zones.iter().position(|zone| zone.number.value == relay.relay))?;
    zones.get_mut(index)
}

fn merge_relay(zone: &mut Zone, relay: &Relay, status: &RelayStatus, now: DateTime<Utc>) {
    zone.status.suspended_until = Some(status.suspended_until(now));
    zone.status.current_run_end = status.current_run_end(now);
    if zone.name.is_empty() && !relay.name.is_empty() {
        zone.name = relay.name.clone();
    }
}
