//! The hybrid client: primary fetches while the budget lasts, legacy
//! status patches after that, cached snapshots when both are spent.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::backend::{PrimaryBackend, SecondaryBackend};
use crate::cache::ResponseCache;
use crate::config::{HybridSettings, ThrottleConfig};
use crate::error::Result;
use crate::schema::{Controller, Sensor, StatusSchedule, User, Zone};
use crate::selector::{select, Decision, SecondaryRoute};
use crate::throttle::Throttler;

/// Either a ready throttle or the budget to build one from.
#[derive(Debug, Clone)]
pub enum ThrottleSource {
    Throttler(Throttler),
    Config(ThrottleConfig),
}

impl ThrottleSource {
    fn build(self) -> Throttler {
        match self {
            ThrottleSource::Throttler(throttler) => throttler,
            ThrottleSource::Config(config) => Throttler::from_config(&config),
        }
    }
}

impl From<Throttler> for ThrottleSource {
    fn from(throttler: Throttler) -> Self {
        ThrottleSource::Throttler(throttler)
    }
}

impl From<ThrottleConfig> for ThrottleSource {
    fn from(config: ThrottleConfig) -> Self {
        ThrottleSource::Config(config)
    }
}

pub struct HybridClientBuilder {
    primary: Box<dyn PrimaryBackend>,
    secondary: Box<dyn SecondaryBackend>,
    primary_throttle: ThrottleSource,
    secondary_throttle: ThrottleSource,
    concurrency_limit: Option<usize>,
}

impl HybridClientBuilder {
    pub fn primary_throttle(mut self, throttle: impl Into<ThrottleSource>) -> Self {
        self.primary_throttle = throttle.into();
        self
    }

    pub fn secondary_throttle(mut self, throttle: impl Into<ThrottleSource>) -> Self {
        self.secondary_throttle = throttle.into();
        self
    }

    /// Caps simultaneous legacy requests during [`HybridClient::update_all`].
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit);
        self
    }

    pub fn build(self) -> HybridClient {
        HybridClient {
            primary: self.primary,
            secondary: self.secondary,
            state: Mutex::new(State {
                primary: self.primary_throttle.build(),
                secondary: self.secondary_throttle.build(),
                cache: ResponseCache::new(),
            }),
            fetch_lock: Mutex::new(()),
            concurrency_limit: self.concurrency_limit,
        }
    }
}

/// Everything tasks share. Held only for bookkeeping, never across a
/// backend call.
pub(crate) struct State {
    pub(crate) primary: Throttler,
    pub(crate) secondary: Throttler,
    pub(crate) cache: ResponseCache,
}

impl State {
    /// Keeps room for a full batch refresh plus one ad hoc legacy call.
    fn tune_secondary(&mut self) {
        let controllers = u32::try_from(self.cache.controller_count()).unwrap_or(u32::MAX);
        let needed = controllers.saturating_add(1);
        if self.secondary.raise_capacity(needed) {
            info!(
                controllers,
                tokens_per_epoch = needed,
                "raised legacy budget for newly discovered controllers"
            );
        }
    }
}

pub struct HybridClient {
    primary: Box<dyn PrimaryBackend>,
    secondary: Box<dyn SecondaryBackend>,
    pub(crate) state: Mutex<State>,
    /// Held for the whole of every public fetch, backend call included, so
    /// selection, spending and storing never interleave between callers.
    /// A slow fetch of one resource delays fetches of every other resource.
    fetch_lock: Mutex<()>,
    concurrency_limit: Option<usize>,
}

impl HybridClient {
    pub fn builder(
        primary: impl PrimaryBackend + 'static,
        secondary: impl SecondaryBackend + 'static,
    ) -> HybridClientBuilder {
        HybridClientBuilder {
            primary: Box::new(primary),
            secondary: Box::new(secondary),
            primary_throttle: ThrottleConfig::primary_default().into(),
            secondary_throttle: ThrottleConfig::secondary_default().into(),
            concurrency_limit: None,
        }
    }

    pub fn from_settings(
        primary: impl PrimaryBackend + 'static,
        secondary: impl SecondaryBackend + 'static,
        settings: &HybridSettings,
    ) -> Self {
        let mut builder = Self::builder(primary, secondary)
            .primary_throttle(settings.primary_throttle)
            .secondary_throttle(settings.secondary_throttle);
        if let Some(limit) = settings.concurrency_limit {
            builder = builder.concurrency_limit(limit);
        }
        builder.build()
    }

    /// Snapshot of the primary throttle.
    pub async fn primary_throttle(&self) -> Throttler {
        self.state.lock().await.primary.clone()
    }

    /// Snapshot of the legacy throttle.
    pub async fn secondary_throttle(&self) -> Throttler {
        self.state.lock().await.secondary.clone()
    }

    pub async fn get_user(&self, fetch_zones: bool) -> Result<User> {
        let _fetch = self.fetch_lock.lock().await;
        let decision = self
            .decide(
                "user",
                |cache| cache.user().is_some(),
                |cache| zone_status_route(cache, fetch_zones),
            )
            .await;

        match decision {
            Decision::UsePrimary { .. } => {
                let user = self.primary.get_user(fetch_zones).await?;
                let mut state = self.state.lock().await;
                let user = state.cache.store_user(user);
                state.tune_secondary();
                Ok(user)
            }
            Decision::UseSecondary => {
                self.update_all().await?;
                Ok(self.cached("user", |cache| cache.user()).await)
            }
            Decision::UseCache => Ok(self.cached("user", |cache| cache.user()).await),
        }
    }

    pub async fn get_controllers(
        &self,
        fetch_zones: bool,
        fetch_sensors: bool,
    ) -> Result<Vec<Controller>> {
        let _fetch = self.fetch_lock.lock().await;
        let decision = self
            .decide(
                "controllers",
                |cache| cache.controller_count() > 0,
                |cache| zone_status_route(cache, fetch_zones),
            )
            .await;

        match decision {
            Decision::UsePrimary { .. } => {
                let controllers = self
                    .primary
                    .get_controllers(fetch_zones, fetch_sensors)
                    .await?;
                let mut state = self.state.lock().await;
                if fetch_sensors {
                    for controller in &controllers {
                        state.cache.store_sensors(controller, controller.sensors.clone());
                    }
                }
                let controllers = state.cache.store_controllers(controllers);
                state.tune_secondary();
                return Ok(controllers);
            }
            Decision::UseSecondary => {
                self.update_all().await?;
            }
            Decision::UseCache => {}
        }
        Ok(self.state.lock().await.cache.controllers())
    }

    pub async fn get_controller(&self, controller_id: u64) -> Result<Controller> {
        let _fetch = self.fetch_lock.lock().await;
        let decision = self
            .decide(
                "controller",
                |cache| cache.controller(controller_id).is_some(),
                no_fallback,
            )
            .await;

        if let Decision::UsePrimary { .. } = decision {
            let controller = self.primary.get_controller(controller_id).await?;
            let mut state = self.state.lock().await;
            let controller = state.cache.store_controller(controller);
            state.tune_secondary();
            return Ok(controller);
        }
        Ok(self
            .cached("controller", |cache| cache.controller(controller_id).cloned())
            .await)
    }

    pub async fn get_zones(&self, controller: &Controller) -> Result<Vec<Zone>> {
        let _fetch = self.fetch_lock.lock().await;
        let controller_id = controller.id;
        let decision = self
            .decide(
                "zones",
                |cache| cache.controller(controller_id).is_some(),
                |_| SecondaryRoute::Controllers(1),
            )
            .await;

        match decision {
            Decision::UsePrimary { .. } => {
                let zones = self.primary.get_zones(controller).await?;
                let mut state = self.state.lock().await;
                let zones = state.cache.store_zones(controller, zones);
                state.tune_secondary();
                return Ok(zones);
            }
            Decision::UseSecondary => {
                self.refresh_controller(controller_id).await?;
            }
            Decision::UseCache => {}
        }
        Ok(self.cached("zone list", |cache| cache.zones(controller_id)).await)
    }

    pub async fn get_zone(&self, zone_id: u64) -> Result<Zone> {
        let _fetch = self.fetch_lock.lock().await;
        let decision = self
            .decide("zone", |cache| cache.zone(zone_id).is_some(), no_fallback)
            .await;

        if let Decision::UsePrimary { .. } = decision {
            let zone = self.primary.get_zone(zone_id).await?;
            return Ok(self.state.lock().await.cache.store_zone(zone));
        }
        Ok(self.cached("zone", |cache| cache.zone(zone_id)).await)
    }

    pub async fn get_sensors(&self, controller: &Controller) -> Result<Vec<Sensor>> {
        let _fetch = self.fetch_lock.lock().await;
        let controller_id = controller.id;
        let decision = self
            .decide(
                "sensors",
                |cache| cache.sensors(controller_id).is_some(),
                no_fallback,
            )
            .await;

        if let Decision::UsePrimary { .. } = decision {
            let sensors = self.primary.get_sensors(controller).await?;
            return Ok(self.state.lock().await.cache.store_sensors(controller, sensors));
        }
        Ok(self.cached("sensor list", |cache| cache.sensors(controller_id)).await)
    }

    /// Refreshes every cached controller from the legacy backend with the
    /// configured concurrency limit. See [`HybridClient::update_all_with_limit`].
    pub async fn update_all(&self) -> Result<usize> {
        self.update_all_with_limit(self.concurrency_limit).await
    }

    /// Refreshes every cached controller from the legacy backend, at most
    /// `concurrency_limit` requests at a time (`None` for all at once).
    ///
    /// Controllers the legacy budget cannot cover are skipped. The primary
    /// backend is never called. Returns how many controllers were patched;
    /// if any request failed, the remaining ones still finish and the first
    /// error is returned.
    pub async fn update_all_with_limit(&self, concurrency_limit: Option<usize>) -> Result<usize> {
        let controller_ids = self.state.lock().await.cache.controller_ids();
        if controller_ids.is_empty() {
            return Ok(0);
        }
        let limit = concurrency_limit.unwrap_or(controller_ids.len()).max(1);

        let results: Vec<Result<bool>> = stream::iter(controller_ids)
            .map(|controller_id| self.refresh_controller(controller_id))
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut refreshed = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(true) => refreshed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "legacy status refresh failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(refreshed),
        }
    }

    /// One budgeted legacy call for one controller. `Ok(false)` when the
    /// budget is spent.
    async fn refresh_controller(&self, controller_id: u64) -> Result<bool> {
        {
            let mut state = self.state.lock().await;
            if !state.secondary.check(1) {
                trace!(controller_id, "legacy budget spent, skipping controller");
                return Ok(false);
            }
            state.secondary.mark(1);
        }

        let issued_at = Instant::now();
        let payload = self.secondary.get(StatusSchedule::PATH, controller_id).await?;
        let schedule = StatusSchedule::from_value(payload)?;

        let mut state = self.state.lock().await;
        if let Some(advisory) = schedule.next_poll {
            if state.secondary.defer_epoch(issued_at, advisory) {
                debug!(
                    controller_id,
                    next_poll_secs = advisory.as_secs(),
                    "legacy backend asked for a longer poll interval"
                );
            }
        }
        let summary = state
            .cache
            .patch_from_secondary(controller_id, &schedule.relays, Utc::now());
        debug!(controller_id, ?summary, "applied legacy status");
        Ok(true)
    }

    /// Runs the selector and marks the primary budget when it is used.
    async fn decide(
        &self,
        resource: &'static str,
        cached: impl FnOnce(&ResponseCache) -> bool,
        route: impl FnOnce(&ResponseCache) -> SecondaryRoute,
    ) -> Decision {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let is_cached = cached(&state.cache);
        let route = route(&state.cache);
        let decision = select(is_cached, &mut state.primary, &mut state.secondary, route);
        if let Decision::UsePrimary { forced } = decision {
            if forced {
                debug!(resource, "nothing cached yet, fetching from primary regardless of budget");
            }
            state.primary.mark(1);
        }
        debug!(resource, ?decision, "backend selected");
        decision
    }

    /// Reads a snapshot the selector has already established exists.
    async fn cached<T>(&self, what: &str, read: impl FnOnce(&ResponseCache) -> Option<T>) -> T {
        let state = self.state.lock().await;
        read(&state.cache).unwrap_or_else(|| panic!("{what} snapshot missing from cache"))
    }
}

/// Legacy responses only carry zone status, so a fetch without zones has
/// nothing to patch.
fn zone_status_route(cache: &ResponseCache, fetch_zones: bool) -> SecondaryRoute {
    if !fetch_zones {
        return SecondaryRoute::Unavailable;
    }
    let count = u32::try_from(cache.controller_count()).unwrap_or(u32::MAX);
    SecondaryRoute::Controllers(count)
}

fn no_fallback(_: &ResponseCache) -> SecondaryRoute {
    SecondaryRoute::Unavailable
}
