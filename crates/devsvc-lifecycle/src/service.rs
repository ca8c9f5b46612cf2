use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use devsvc_client::{ping_with_retry, watch_config, DataClient, LoggingClient, MetadataClient, RegistryClient};
use devsvc_domain::{
    AdminState, Addressable, CookedEvent, Device, DeviceCallbackEvent, DeviceDescriptor, DeviceId,
    DeviceProfile, DeviceServiceRecord, EffectiveConfig, NvList, OperState, RawReading,
};
use devsvc_driver::Driver;
use devsvc_runtime::{Job, RuntimeError, Scheduler, WorkerPool};
use devsvc_store::{DeviceMap, WatchList};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::LifecycleError;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::profiles::load_profiles_from_dir;
use crate::state::ServiceState;

/// Closures the caller wires to the real HTTP surface (`devsvc-api`) so
/// bring-up can invoke the "register handler H for path P" contract at
/// the exact points §4.10 demands, without the lifecycle engine owning
/// any HTTP machinery of its own. `http_start` brings the listener up
/// (every route is registered statically; readiness is gated by
/// [`Service::is_callback_ready`]/[`Service::is_fully_ready`]),
/// `install_callback_handler` flips the callback gate,
/// `install_remaining_handlers` flips the full-traffic gate.
pub struct BringupHooks {
    pub http_start: Box<dyn FnOnce() + Send>,
    pub install_callback_handler: Box<dyn FnOnce() + Send>,
    pub install_remaining_handlers: Box<dyn FnOnce() + Send>,
}

impl Default for BringupHooks {
    fn default() -> Self {
        Self {
            http_start: Box::new(|| {}),
            install_callback_handler: Box::new(|| {}),
            install_remaining_handlers: Box::new(|| {}),
        }
    }
}

/// Builds a [`Service`]. Mirrors the constructor preconditions in §7:
/// missing name or version is rejected before any I/O happens.
pub struct ServiceBuilder {
    name: String,
    version: String,
    profile: String,
    config: EffectiveConfig,
    configured_devices: Vec<DeviceDescriptor>,
    driver: Arc<dyn Driver>,
    metadata: Arc<dyn MetadataClient>,
    data: Arc<dyn DataClient>,
    logging: Option<Arc<dyn LoggingClient>>,
    registry: Option<Arc<dyn RegistryClient>>,
    worker_count: usize,
}

impl ServiceBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        config: EffectiveConfig,
        configured_devices: Vec<DeviceDescriptor>,
        driver: Arc<dyn Driver>,
        metadata: Arc<dyn MetadataClient>,
        data: Arc<dyn DataClient>,
    ) -> Result<Self, LifecycleError> {
        let name = name.into();
        let version = version.into();
        if name.is_empty() {
            return Err(LifecycleError::NoDeviceName);
        }
        if version.is_empty() {
            return Err(LifecycleError::NoDeviceVersion);
        }
        Ok(Self {
            name,
            version,
            profile: "default".to_string(),
            config,
            configured_devices,
            driver,
            metadata,
            data,
            logging: None,
            registry: None,
            worker_count: 8,
        })
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn logging(mut self, logging: Arc<dyn LoggingClient>) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn RegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn worker_count(mut self, n: usize) -> Self {
        self.worker_count = n;
        self
    }

    pub fn build(self) -> Arc<Service> {
        Arc::new(Service {
            name: self.name,
            version: self.version,
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            profile: self.profile,
            config: RwLock::new(self.config),
            configured_devices: self.configured_devices,
            driver: self.driver,
            metadata: self.metadata,
            data: self.data,
            logging: self.logging,
            registry: self.registry,
            http: reqwest::Client::new(),
            device_map: DeviceMap::new(),
            watch_list: WatchList::new(),
            profiles: RwLock::new(HashMap::new()),
            worker_pool: Mutex::new(Some(WorkerPool::start(self.worker_count))),
            scheduler: Mutex::new(Scheduler::new()),
            metrics: Metrics::new(),
            state: RwLock::new(ServiceState::New),
            admin_state: RwLock::new(AdminState::Unlocked),
            oper_state: RwLock::new(OperState::Enabled),
            started_at: RwLock::new(None),
            stop_config: Arc::new(AtomicBool::new(false)),
            discovery_mutex: Mutex::new(()),
            callback_ready: AtomicBool::new(false),
            fully_ready: AtomicBool::new(false),
        })
    }
}

/// The root entity: the service's lifecycle state machine, its shared
/// in-memory caches (device map, watch list, profiles), and the
/// concurrency primitives (worker pool, scheduler) it drives.
pub struct Service {
    name: String,
    version: String,
    sdk_version: String,
    profile: String,
    config: RwLock<EffectiveConfig>,
    configured_devices: Vec<DeviceDescriptor>,
    driver: Arc<dyn Driver>,
    metadata: Arc<dyn MetadataClient>,
    data: Arc<dyn DataClient>,
    logging: Option<Arc<dyn LoggingClient>>,
    registry: Option<Arc<dyn RegistryClient>>,
    http: reqwest::Client,
    device_map: DeviceMap,
    watch_list: WatchList,
    profiles: RwLock<HashMap<String, DeviceProfile>>,
    worker_pool: Mutex<Option<WorkerPool>>,
    scheduler: Mutex<Scheduler>,
    metrics: Metrics,
    state: RwLock<ServiceState>,
    admin_state: RwLock<AdminState>,
    oper_state: RwLock<OperState>,
    started_at: RwLock<Option<DateTime<Utc>>>,
    stop_config: Arc<AtomicBool>,
    discovery_mutex: Mutex<()>,
    callback_ready: AtomicBool,
    fully_ready: AtomicBool,
}

impl Service {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn sdk_version(&self) -> &str {
        &self.sdk_version
    }

    pub fn device_map(&self) -> &DeviceMap {
        &self.device_map
    }

    pub fn watch_list(&self) -> &WatchList {
        &self.watch_list
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Mutex serializing discovery requests so only one runs at a time.
    /// The discovery handler's body is driver-defined and out of scope
    /// here; the lifecycle engine only owns the serialization lock.
    pub fn discovery_mutex(&self) -> &Mutex<()> {
        &self.discovery_mutex
    }

    /// True once the callback handler has been installed during
    /// bring-up. Before this, no HTTP traffic of any kind should be
    /// accepted by the caller's HTTP surface.
    pub fn is_callback_ready(&self) -> bool {
        self.callback_ready.load(Ordering::SeqCst)
    }

    /// True once driver init has succeeded and the remaining handlers
    /// have been installed: the point at which non-callback traffic may
    /// be accepted (§3 invariant).
    pub fn is_fully_ready(&self) -> bool {
        self.fully_ready.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> ServiceState {
        *self.state.read().await
    }

    pub async fn config_snapshot(&self) -> EffectiveConfig {
        self.config.read().await.clone()
    }

    pub async fn uptime_secs(&self) -> Option<i64> {
        self.started_at.read().await.map(|t| (Utc::now() - t).num_seconds())
    }

    pub async fn worker_queue_depth(&self) -> usize {
        self.worker_pool.lock().await.as_ref().map(|p| p.queued_count()).unwrap_or(0)
    }

    pub async fn worker_active_count(&self) -> usize {
        self.worker_pool.lock().await.as_ref().map(|p| p.active_count()).unwrap_or(0)
    }

    async fn set_state(&self, s: ServiceState) {
        *self.state.write().await = s;
    }

    async fn fail(&self, err: LifecycleError) -> Result<(), LifecycleError> {
        error!(error = %err, "bring-up failed");
        self.remote_log("error", &format!("bring-up failed: {err}"));
        self.set_state(ServiceState::Failed).await;
        Err(err)
    }

    /// Best-effort forward of a log line to the remote logging client, if
    /// one is configured. Fire-and-forget: delivery runs on its own task
    /// and a failure is only ever `warn!`-logged locally, never returned
    /// to the caller — remote logging must never slow down or fail bring-up
    /// or shutdown.
    fn remote_log(&self, level: &str, message: &str) {
        let Some(logging) = self.logging.clone() else { return };
        let level = level.to_string();
        let message = message.to_string();
        tokio::spawn(async move {
            if let Err(e) = logging.log(&level, &message).await {
                warn!(error = %e, "remote log delivery failed");
            }
        });
    }

    /// Run bring-up end to end, per §4.10's strict ordering: data ping →
    /// metadata ping → DS reconcile → profiles → devices → HTTP start →
    /// callback handler → configured devices → driver init → watchers →
    /// scheduler start → remaining handlers → registry register.
    pub async fn bring_up(self: &Arc<Self>, hooks: BringupHooks) -> Result<(), LifecycleError> {
        self.set_state(ServiceState::Bringup).await;
        let config = self.config_snapshot().await;
        let connect_timeout = Duration::from_secs(config.service.connect_timeout_secs.max(1));

        if !config.endpoints.data.is_set() {
            return self.fail(LifecycleError::BadConfig("data endpoint host/port".into())).await;
        }
        if let Err(e) = ping_with_retry(
            &self.http,
            &config.endpoints.data.base_url(),
            config.service.connect_retries,
            connect_timeout,
        )
        .await
        {
            return self.fail(LifecycleError::RemoteServerDown(format!("data service: {e}"))).await;
        }

        if !config.endpoints.metadata.is_set() {
            return self.fail(LifecycleError::BadConfig("metadata endpoint host/port".into())).await;
        }
        if let Err(e) = ping_with_retry(
            &self.http,
            &config.endpoints.metadata.base_url(),
            config.service.connect_retries,
            connect_timeout,
        )
        .await
        {
            return self.fail(LifecycleError::RemoteServerDown(format!("metadata service: {e}"))).await;
        }

        if let Err(e) = self.reconcile_device_service(&config).await {
            return self.fail(e).await;
        }

        self.set_state(ServiceState::Loading).await;

        match load_profiles_from_dir(&config.device.profiles_dir) {
            Ok(profiles) => *self.profiles.write().await = profiles,
            Err(e) => return self.fail(e).await,
        }

        match self.metadata.get_devices(&self.name).await {
            Ok(devices) => self.device_map.populate_from_list(devices),
            Err(e) => return self.fail(LifecycleError::Client(e)).await,
        }

        (hooks.http_start)();
        (hooks.install_callback_handler)();
        self.callback_ready.store(true, Ordering::SeqCst);
        debug!("callback handler installed, metadata create-callbacks are now deliverable");

        self.process_configured_devices().await;

        let (tx, rx) = mpsc::unbounded_channel::<RawReading>();
        if !self.driver.init(&config.driverconf, tx).await {
            return self.fail(LifecycleError::DriverUnstart).await;
        }
        self.spawn_reading_consumer(rx);
        self.register_autoevents().await;

        match self.metadata.get_watchers(&self.name).await {
            Ok(watchers) => self.watch_list.populate_from_list(watchers),
            Err(e) => warn!(error = %e, "watcher fetch failed, continuing without watchers"),
        }

        self.scheduler.lock().await.start();

        (hooks.install_remaining_handlers)();
        self.fully_ready.store(true, Ordering::SeqCst);
        debug!("driver init succeeded, remaining handlers installed");

        if let Some(registry) = self.registry.clone() {
            if let Err(e) = registry
                .register_service(
                    &self.name,
                    &resolved_host(&config),
                    config.service.port,
                    config.service.health_check_interval_secs,
                )
                .await
            {
                return self.fail(LifecycleError::Client(e)).await;
            }
            self.start_config_watch(registry).await;
        }

        *self.started_at.write().await = Some(Utc::now());
        self.set_state(ServiceState::Serving).await;
        let msg = if config.service.startup_message.is_empty() {
            "device service started"
        } else {
            config.service.startup_message.as_str()
        };
        info!(service = %self.name, version = %self.version, "{msg}");
        self.remote_log("info", msg);
        Ok(())
    }

    async fn reconcile_device_service(&self, config: &EffectiveConfig) -> Result<(), LifecycleError> {
        let host = resolved_host(config);
        let port = config.service.port;

        match self.metadata.get_deviceservice(&self.name).await.map_err(LifecycleError::Client)? {
            Some(existing) if existing.addressable.differs_in_host_or_port(&host, port) => {
                let mut addr = existing.addressable.clone();
                addr.address = host.clone();
                addr.port = port;
                self.metadata.update_addressable(&addr).await.map_err(LifecycleError::Client)?;
                info!(host, port, "reconciled addressable: host/port had drifted");
            }
            Some(_) => {
                debug!("device service already registered, addressable unchanged");
            }
            None => {
                let addr = Addressable::callback(&self.name, &host, port, Utc::now());
                self.metadata.create_addressable(&addr).await.map_err(LifecycleError::Client)?;
                let now = Utc::now().timestamp_millis();
                let ds = DeviceServiceRecord {
                    id: String::new(),
                    name: self.name.clone(),
                    labels: config.service.labels.clone(),
                    admin_state: AdminState::Unlocked,
                    oper_state: OperState::Enabled,
                    addressable: addr,
                    created: now,
                    modified: now,
                };
                self.metadata.create_deviceservice(&ds).await.map_err(LifecycleError::Client)?;
                info!(name = %self.name, "registered new device service with metadata");
            }
        }
        Ok(())
    }

    /// Resolve each statically configured `DeviceList` entry against the
    /// local profile cache and add it to the device map, skipping
    /// entries metadata already reported (by name) and entries whose
    /// profile is unknown locally — the invariant that every mapped
    /// device has a resolved profile must hold even for these.
    async fn process_configured_devices(&self) {
        let profiles = self.profiles.read().await;
        for descriptor in &self.configured_devices {
            if self.device_map.find_by_name(&descriptor.name).is_some() {
                continue;
            }
            let Some(profile) = profiles.get(&descriptor.profile_name) else {
                warn!(
                    device = %descriptor.name,
                    profile = %descriptor.profile_name,
                    "configured device references an unknown profile, skipping"
                );
                continue;
            };
            let device = Device {
                id: DeviceId::new(uuid::Uuid::new_v4().to_string()),
                name: descriptor.name.clone(),
                admin_state: AdminState::Unlocked,
                oper_state: OperState::Enabled,
                protocols: descriptor.protocols.clone(),
                profile: Some(profile.clone()),
                autoevents: Vec::new(),
                labels: descriptor.labels.clone(),
            };
            self.device_map.insert(device);
            debug!(device = %descriptor.name, "configured device added to device map");
        }
    }

    /// Register a scheduler task per `AutoEvent` on every device currently
    /// in the device map. Each task calls the driver's on-demand `read`
    /// for that device/resource and posts whatever comes back; devices
    /// with no autoevents (the common case for statically configured
    /// ones) contribute nothing. Must run before the scheduler starts.
    async fn register_autoevents(self: &Arc<Self>) {
        let mut scheduler = self.scheduler.lock().await;
        for device in self.device_map.iterate_snapshot() {
            for auto in &device.autoevents {
                let Some(interval) = parse_autoevent_frequency(&auto.frequency) else {
                    warn!(
                        device = %device.name,
                        frequency = %auto.frequency,
                        "autoevent has an unparseable frequency, skipping"
                    );
                    continue;
                };
                let this = self.clone();
                let device_name = device.name.clone();
                let resource_name = auto.resource.clone();
                debug!(device = %device_name, resource = %resource_name, ?interval, "autoevent registered");
                scheduler.register(interval, move || {
                    let this = this.clone();
                    let device_name = device_name.clone();
                    let resource_name = resource_name.clone();
                    async move {
                        if let Some(value) = this.driver.read(&device_name, &resource_name).await {
                            this.post_readings(&device_name, &resource_name, value).await;
                        }
                    }
                });
            }
        }
    }

    fn spawn_reading_consumer(self: &Arc<Self>, mut rx: mpsc::UnboundedReceiver<RawReading>) {
        let this = self.clone();
        tokio::spawn(async move {
            while let Some(reading) = rx.recv().await {
                this.post_readings(&reading.device_name, &reading.resource_name, reading.value).await;
            }
        });
    }

    async fn start_config_watch(self: &Arc<Self>, registry: Arc<dyn RegistryClient>) {
        let this = self.clone();
        let poll_interval = Duration::from_secs(self.config.read().await.service.health_check_interval_secs.max(1));
        let guard = self.worker_pool.lock().await;
        let Some(pool) = guard.as_ref() else {
            warn!("worker pool already shut down, cannot start config watch");
            return;
        };
        watch_config(
            registry,
            pool,
            self.name.clone(),
            self.profile.clone(),
            poll_interval,
            self.stop_config.clone(),
            NvList::new(),
            move |nv| {
                let this = this.clone();
                tokio::spawn(async move { this.apply_config_update(nv).await });
            },
        );
    }

    /// Replace the mutable fields of the effective configuration in
    /// place from a freshly-fetched registry config snapshot.
    pub async fn apply_config_update(&self, nv: NvList) {
        let mut config = self.config.write().await;
        if let Some(level) = nv.get("logging.level") {
            config.logging.level = level.to_string();
        }
        if let Some(use_remote) = nv.get("logging.use_remote") {
            config.logging.use_remote = use_remote == "true";
        }
        if let Some(dt) = nv.get("device.data_transform") {
            config.device.data_transform = dt == "true";
        }
        info!("effective configuration updated from registry watch");
    }

    /// Look up the device, resolve the command by resource name, and if
    /// found, submit a posting work item to the worker pool. Enqueues at
    /// most one work item per call; if the device or resource is
    /// missing, logs and returns without enqueuing anything.
    pub async fn post_readings(self: &Arc<Self>, device_name: &str, resource_name: &str, value: serde_json::Value) {
        let Some(device) = self.device_map.find_by_name(device_name) else {
            warn!(device = device_name, "post_readings: unknown device, dropping reading");
            self.metrics.record_dropped();
            return;
        };
        let profile = device.profile.clone();
        drop(device); // release the handle immediately after copying the profile pointer

        let Some(profile) = profile else {
            warn!(device = device_name, "post_readings: device has no resolved profile, dropping reading");
            self.metrics.record_dropped();
            return;
        };
        let Some(command) = profile.find_command(resource_name) else {
            warn!(device = device_name, resource = resource_name, "post_readings: unknown resource, dropping reading");
            self.metrics.record_dropped();
            return;
        };
        if !command.get {
            warn!(device = device_name, resource = resource_name, "post_readings: resource is not readable, dropping reading");
            self.metrics.record_dropped();
            return;
        }

        let config = self.config_snapshot().await;
        let payload = if config.device.data_transform { transform_reading(&value) } else { value };
        let event = CookedEvent {
            device_name: device_name.to_string(),
            resource_name: resource_name.to_string(),
            origin: Utc::now().timestamp_millis(),
            payload,
        };

        let this = self.clone();
        let endpoint = config.endpoints.data;
        let job: Job = Box::new(move || {
            Box::pin(async move {
                match this.data.add_event(&endpoint, &event).await {
                    Ok(()) => this.metrics.record_posted(),
                    Err(e) => {
                        warn!(error = %e, "failed to post event to data service");
                        this.metrics.record_dropped();
                    }
                }
            })
        });

        if let Err(e) = self.submit_job(job).await {
            warn!(error = %e, "failed to submit event post to worker pool, dropping reading");
            self.metrics.record_dropped();
        }
    }

    async fn submit_job(&self, job: Job) -> Result<(), RuntimeError> {
        match &*self.worker_pool.lock().await {
            Some(pool) => pool.submit(job),
            None => Err(RuntimeError::ShutDown),
        }
    }

    /// Apply an add/update/delete notification from metadata directly to
    /// the device map.
    pub async fn handle_callback(&self, event: DeviceCallbackEvent) -> Result<(), LifecycleError> {
        match event {
            DeviceCallbackEvent::Add(device) => {
                debug!(device = %device.name, "callback: device added");
                self.device_map.insert(device);
            }
            DeviceCallbackEvent::Update(device) => {
                debug!(device = %device.name, "callback: device updated");
                self.device_map.insert(device);
            }
            DeviceCallbackEvent::Delete { id } => {
                debug!(device_id = %id, "callback: device deleted");
                self.device_map.remove_by_id(&id);
            }
        }
        Ok(())
    }

    /// Orderly shutdown, per §4.10: stop config-watch, stop scheduler,
    /// (the caller destroys the HTTP server around this call), stop the
    /// driver, clear the device map, deregister (log only on failure),
    /// then drain the worker pool. Shutdown never fails; errors are
    /// logged and swallowed.
    pub async fn shutdown(self: &Arc<Self>, force: bool) {
        self.stop_config.store(true, Ordering::SeqCst);
        self.set_state(ServiceState::Stopping).await;

        self.scheduler.lock().await.stop().await;

        self.callback_ready.store(false, Ordering::SeqCst);
        self.fully_ready.store(false, Ordering::SeqCst);

        self.driver.stop(force).await;

        self.device_map.clear();
        self.watch_list.clear();

        if let Some(registry) = &self.registry {
            if let Err(e) = registry.deregister_service(&self.name).await {
                warn!(error = %e, "failed to deregister from registry during shutdown, continuing");
            }
        }

        if let Some(pool) = self.worker_pool.lock().await.take() {
            pool.drain_and_stop().await;
        }

        self.set_state(ServiceState::Stopped).await;
        info!("Stopped device service");
        self.remote_log("info", "Stopped device service");
    }
}

fn resolved_host(config: &EffectiveConfig) -> String {
    if !config.service.host.is_empty() {
        return config.service.host.clone();
    }
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

fn transform_reading(raw: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "transformed": true, "value": raw })
}

/// Parse an `AutoEvent.frequency` string ("500ms", "10s", "2m", "1h", or a
/// bare integer taken as seconds) into a `Duration`. Order matters: "ms"
/// must be checked before "s" or "10ms" would parse as "10m" + stray "s".
fn parse_autoevent_frequency(freq: &str) -> Option<Duration> {
    let freq = freq.trim();
    if let Some(ms) = freq.strip_suffix("ms") {
        return ms.trim().parse::<u64>().ok().map(Duration::from_millis);
    }
    if let Some(secs) = freq.strip_suffix('s') {
        return secs.trim().parse::<u64>().ok().map(Duration::from_secs);
    }
    if let Some(mins) = freq.strip_suffix('m') {
        return mins.trim().parse::<u64>().ok().map(|v| Duration::from_secs(v * 60));
    }
    if let Some(hours) = freq.strip_suffix('h') {
        return hours.trim().parse::<u64>().ok().map(|v| Duration::from_secs(v * 3600));
    }
    freq.parse::<u64>().ok().map(Duration::from_secs)
}
