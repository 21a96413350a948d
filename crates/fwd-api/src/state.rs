//! # Application State
//!
//! Shared state for the Axum application. The in-memory stores are the read
//! path; when a database is configured every write is committed to Postgres
//! first and applied to the stores afterwards (see [`crate::reconcile`]).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::{Mutex, RwLock};
use rand::RngCore;
use sqlx::PgPool;
use tokio::sync::OwnedMutexGuard;

use fwd_core::{AuditTrail, InvoiceId, PaymentId, SessionSigner, ShipmentId, TaskId};
use fwd_ledger::{ChangeSet, Invoice, Payment, Shipment};
use fwd_state::ComplianceTask;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// The lock is `parking_lot` and is never held across an `.await`.
#[derive(Debug)]
pub struct Store<K, T> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K: Copy + Eq + Hash, T: Clone> Store<K, T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: K, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &K) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// List the records matching `pred`.
    pub fn list_where(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data
            .read()
            .values()
            .filter(|v| pred(v))
            .cloned()
            .collect()
    }

    /// Remove a record by ID.
    pub fn remove(&self, id: &K) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &K) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Copy + Eq + Hash, T: Clone> Default for Store<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Per-Shipment Locks -------------------------------------------------------

/// One async mutex per shipment.
///
/// Every cascade (payment/invoice write → invoice resolver → shipment
/// rollup) holds its shipment's lock from snapshot to store update, so two
/// writes against the same shipment never interleave. Writes against
/// different shipments run in parallel. An entry lives only while some
/// task holds or waits on it; the last [`ShipmentGuard`] to drop removes it.
#[derive(Debug, Clone, Default)]
pub struct ShipmentLocks {
    locks: Arc<Mutex<LockMap>>,
}

type LockMap = HashMap<ShipmentId, Arc<tokio::sync::Mutex<()>>>;

impl ShipmentLocks {
    /// Wait for exclusive access to `id`.
    pub async fn lock(&self, id: ShipmentId) -> ShipmentGuard {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(id).or_default())
        };
        ShipmentGuard {
            id,
            guard: Some(lock.lock_owned().await),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Shipments with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// `true` when no shipment lock is held or awaited.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one shipment, released on drop.
#[derive(Debug)]
pub struct ShipmentGuard {
    id: ShipmentId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<Mutex<LockMap>>,
}

impl Drop for ShipmentGuard {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let mutex = Arc::clone(OwnedMutexGuard::mutex(&guard));
        drop(guard);

        // New lockers clone the entry under the map lock, so the count
        // cannot grow while it is held. Map + `mutex` = 2 means no waiters.
        let mut locks = self.locks.lock();
        if let Some(entry) = locks.get(&self.id) {
            if Arc::ptr_eq(entry, &mutex) && Arc::strong_count(&mutex) == 2 {
                locks.remove(&self.id);
            }
        }
    }
}

// -- Configuration ------------------------------------------------------------

/// Application configuration, read once at startup.
///
/// Custom `Debug` redacts the session secret and the database URL.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Postgres connection string. `None` runs in-memory only.
    pub database_url: Option<String>,
    /// Secret the session signing key is derived from.
    pub session_secret: String,
    /// Lifetime of issued session tokens.
    pub session_ttl_secs: i64,
    /// Serve `/metrics`.
    pub metrics_enabled: bool,
    /// `json` for JSON log lines, anything else for human-readable output.
    pub log_format: String,
}

/// Default session lifetime: 12 hours.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 12 * 60 * 60;

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("session_secret", &"[REDACTED]")
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            session_secret: ephemeral_secret(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            metrics_enabled: true,
            log_format: "text".to_string(),
        }
    }
}

impl AppConfig {
    /// Build the configuration from the process environment.
    ///
    /// `PORT`, `DATABASE_URL`, `SESSION_SECRET`, `SESSION_TTL_SECS`,
    /// `METRICS_ENABLED` and `LOG_FORMAT`. Unparseable values fall back to
    /// their defaults with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = parse_or("PORT", lookup("PORT"), defaults.port);
        let session_ttl_secs = parse_or(
            "SESSION_TTL_SECS",
            lookup("SESSION_TTL_SECS"),
            defaults.session_ttl_secs,
        );
        let metrics_enabled = parse_or(
            "METRICS_ENABLED",
            lookup("METRICS_ENABLED"),
            defaults.metrics_enabled,
        );
        let session_secret = match lookup("SESSION_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!(
                    "SESSION_SECRET not set: using an ephemeral secret. \
                     Issued session tokens will not survive a restart."
                );
                defaults.session_secret
            }
        };

        Self {
            port,
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            session_secret,
            session_ttl_secs,
            metrics_enabled,
            log_format: lookup("LOG_FORMAT").unwrap_or(defaults.log_format),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparseable configuration value");
            default
        }),
    }
}

fn ephemeral_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// -- AppState -----------------------------------------------------------------

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub shipments: Store<ShipmentId, Shipment>,
    pub invoices: Store<InvoiceId, Invoice>,
    pub payments: Store<PaymentId, Payment>,
    pub compliance_tasks: Store<TaskId, ComplianceTask>,

    /// The append-only audit trail.
    ///
    /// A `tokio` mutex because it is held across the database write that
    /// persists a batch, which keeps the chain order identical in memory
    /// and in Postgres.
    pub audit: Arc<tokio::sync::Mutex<AuditTrail>>,

    pub shipment_locks: ShipmentLocks,

    /// When `Some`, every write is committed to Postgres before it becomes
    /// visible in the stores.
    pub db_pool: Option<PgPool>,

    /// Verifies bearer session tokens.
    pub signer: Arc<SessionSigner>,

    /// Renders `/metrics`. Installed by the binary.
    pub metrics: Option<PrometheusHandle>,

    pub config: AppConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("shipments", &self.shipments.len())
            .field("invoices", &self.invoices.len())
            .field("payments", &self.payments.len())
            .field("compliance_tasks", &self.compliance_tasks.len())
            .field("db_pool", &self.db_pool.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl AppState {
    /// In-memory state with the default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// State for the given configuration and optional database pool.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        let signer = SessionSigner::from_secret(&config.session_secret);
        Self {
            shipments: Store::new(),
            invoices: Store::new(),
            payments: Store::new(),
            compliance_tasks: Store::new(),
            audit: Arc::new(tokio::sync::Mutex::new(AuditTrail::new())),
            shipment_locks: ShipmentLocks::default(),
            db_pool,
            signer: Arc::new(signer),
            metrics: None,
            config,
        }
    }

    /// Attach the Prometheus handle that backs `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Make a committed change set visible to readers.
    pub fn apply_changes(&self, changes: &ChangeSet) {
        if let Some(shipment) = &changes.shipment {
            self.shipments.insert(shipment.id, shipment.clone());
        }
        for (id, invoice) in &changes.invoice_upserts {
            self.invoices.insert(*id, invoice.clone());
        }
        for id in &changes.invoice_deletes {
            self.invoices.remove(id);
        }
        for (id, payment) in &changes.payment_upserts {
            self.payments.insert(*id, payment.clone());
        }
        for id in &changes.payment_deletes {
            self.payments.remove(id);
        }
    }

    /// Hydrate the in-memory stores and the audit trail from the database.
    ///
    /// Called once on startup when a database pool is available.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let shipments = crate::db::shipments::load_all(pool)
            .await
            .map_err(|e| format!("failed to load shipments: {e}"))?;
        let shipment_count = shipments.len();
        for record in shipments {
            self.shipments.insert(record.id, record);
        }

        let invoices = crate::db::invoices::load_all(pool)
            .await
            .map_err(|e| format!("failed to load invoices: {e}"))?;
        let invoice_count = invoices.len();
        for record in invoices {
            self.invoices.insert(record.id, record);
        }

        let payments = crate::db::payments::load_all(pool)
            .await
            .map_err(|e| format!("failed to load payments: {e}"))?;
        let payment_count = payments.len();
        for record in payments {
            self.payments.insert(record.id, record);
        }

        let tasks = crate::db::compliance_tasks::load_all(pool)
            .await
            .map_err(|e| format!("failed to load compliance tasks: {e}"))?;
        let task_count = tasks.len();
        for record in tasks {
            self.compliance_tasks.insert(record.id, record);
        }

        let entries = crate::db::audit::load_all(pool)
            .await
            .map_err(|e| format!("failed to load audit events: {e}"))?;
        let trail = AuditTrail::from_entries(entries);
        let integrity = trail.verify_chain();
        if !integrity.chain_valid {
            tracing::error!(
                broken_links = integrity.broken_links,
                first_broken = ?integrity.first_broken,
                "audit chain integrity check failed on startup"
            );
        }
        let audit_count = trail.len();
        *self.audit.lock().await = trail;

        tracing::info!(
            shipments = shipment_count,
            invoices = invoice_count,
            payments = payment_count,
            compliance_tasks = task_count,
            audit_events = audit_count,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwd_core::Timestamp;
    use fwd_ledger::NewShipment;

    fn shipment(reference: &str) -> Shipment {
        Shipment::create(
            NewShipment {
                reference: reference.to_string(),
                customer_name: None,
            },
            Timestamp::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_store_insert_get_remove() {
        let store: Store<ShipmentId, Shipment> = Store::new();
        let s = shipment("SHP-1");
        assert!(store.insert(s.id, s.clone()).is_none());
        assert_eq!(store.get(&s.id).unwrap().reference, "SHP-1");
        assert!(store.contains(&s.id));
        assert_eq!(store.len(), 1);
        assert!(store.remove(&s.id).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_list_where() {
        let store: Store<ShipmentId, Shipment> = Store::new();
        for r in ["A-1", "A-2", "B-1"] {
            let s = shipment(r);
            store.insert(s.id, s);
        }
        assert_eq!(store.list_where(|s| s.reference.starts_with("A-")).len(), 2);
        assert_eq!(store.list().len(), 3);
    }

    #[test]
    fn test_store_clones_share_data() {
        let store: Store<ShipmentId, Shipment> = Store::new();
        let other = store.clone();
        let s = shipment("SHP-9");
        store.insert(s.id, s.clone());
        assert!(other.contains(&s.id));
    }

    #[test]
    fn test_config_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("PORT", "9090"),
            ("SESSION_SECRET", "s3cret"),
            ("SESSION_TTL_SECS", "60"),
            ("METRICS_ENABLED", "false"),
            ("LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.port, 9090);
        assert_eq!(config.session_secret, "s3cret");
        assert_eq!(config.session_ttl_secs, 60);
        assert!(!config.metrics_enabled);
        assert_eq!(config.log_format, "json");
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_config_bad_values_fall_back() {
        let config = AppConfig::from_lookup(|k| match k {
            "PORT" => Some("not-a-port".to_string()),
            _ => None,
        });
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_ttl_secs, DEFAULT_SESSION_TTL_SECS);
        assert_eq!(config.session_secret.len(), 64);
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let config = AppConfig {
            database_url: Some("postgres://user:pw@db/fwd".to_string()),
            session_secret: "hunter2".to_string(),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("pw@db"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_shipment_lock_is_exclusive_per_shipment() {
        let locks = ShipmentLocks::default();
        let a = ShipmentId::new();
        let b = ShipmentId::new();
        let guard = locks.lock(a).await;
        // A different shipment is not blocked.
        let _other = locks.lock(b).await;
        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = locks2.lock(a).await;
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_shipment_lock_entries_are_pruned_on_release() {
        let locks = ShipmentLocks::default();
        let a = ShipmentId::new();
        {
            let _guard = locks.lock(a).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());

        for _ in 0..100 {
            let _guard = locks.lock(ShipmentId::new()).await;
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_shipment_lock_entry_survives_while_awaited() {
        let locks = ShipmentLocks::default();
        let a = ShipmentId::new();
        let guard = locks.lock(a).await;
        let locks2 = locks.clone();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let waiter = tokio::spawn(async move {
            let _g = locks2.lock(a).await;
            rx.await.ok();
        });
        tokio::task::yield_now().await;

        // The waiter's clone keeps the entry alive through the handoff.
        drop(guard);
        assert_eq!(locks.len(), 1);
        tx.send(()).ok();
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
