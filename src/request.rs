//!
//! This module defines RequestTable, which keeps callbacks of in-flight requests until their replies arrive or they
//! expire.
//!
use crate::callback::Callback;
use crate::config::RequestConfig;
use crate::error::ClientError;
use crate::message::Message;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{self, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

struct Pending {
    callback: Callback,
    registered_at: Instant,

    // `None` if the timeout is too large to be represented; such a request never expires.
    deadline: Option<Instant>,
}

impl Pending {
    fn new(callback: Callback, timeout: Duration) -> Self {
        let registered_at = Instant::now();
        Self {
            callback,
            registered_at,
            deadline: registered_at.checked_add(timeout),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.map_or(false, |deadline| deadline <= now)
    }
}

/// RequestTable maps the opaque of each outstanding request to its callback.
///
/// Whoever removes an entry first, a reply, an expiry scan or `fail_all`, invokes its callback. Callbacks are always
/// invoked after the table lock is released.
#[derive(Default)]
pub struct RequestTable {
    config: RequestConfig,
    pending: Mutex<HashMap<i32, Pending>>,
}

impl RequestTable {
    // Generate next opaque, aka, request identifier.
    fn next_opaque() -> i32 {
        static SEQUENCE: atomic::AtomicI32 = atomic::AtomicI32::new(0);
        SEQUENCE.fetch_add(1, Ordering::Relaxed)
    }

    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Raise ClientError::InvalidConfig if `config` does not validate.
    pub fn with_config(config: RequestConfig) -> Result<Self, ClientError> {
        config.validate()?;
        Ok(Self {
            config,
            pending: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<i32, Pending>>, ClientError> {
        self.pending.lock().map_err(|e| {
            warn!("Lock is poisoned. Cause: {}", e);
            ClientError::Unknown
        })
    }

    /// Track a new request under the configured request timeout and return the opaque its reply will carry.
    pub fn register(&self, callback: Callback) -> Result<i32, ClientError> {
        self.register_with_timeout(callback, self.config.request_timeout())
    }

    /// Track a new request. A timeout too large to compute a deadline for means the request never expires.
    pub fn register_with_timeout(
        &self,
        callback: Callback,
        timeout: Duration,
    ) -> Result<i32, ClientError> {
        let opaque = self.insert(Pending::new(callback, timeout), RequestTable::next_opaque)?;
        debug!("Registered request {} with timeout {:?}", opaque, timeout);
        Ok(opaque)
    }

    // Opaques still in flight are skipped, so a wrapped sequence never displaces a pending callback.
    fn insert<F>(&self, pending: Pending, mut next_opaque: F) -> Result<i32, ClientError>
    where
        F: FnMut() -> i32,
    {
        let mut guard = self.lock()?;
        loop {
            let opaque = next_opaque();
            match guard.entry(opaque) {
                Entry::Occupied(_) => {
                    warn!("Opaque {} is still in flight, skipping", opaque);
                }
                Entry::Vacant(entry) => {
                    entry.insert(pending);
                    return Ok(opaque);
                }
            }
        }
    }

    /// Deliver the outcome of request `opaque`.
    ///
    /// Returns `false` if the request is unknown, e.g. it has already expired.
    pub fn complete(
        &self,
        opaque: i32,
        result: Result<Message, ClientError>,
    ) -> Result<bool, ClientError> {
        let pending = self.lock()?.remove(&opaque);
        match pending {
            Some(pending) => {
                pending.callback.invoke(result);
                Ok(true)
            }
            None => {
                debug!("Dropping outcome of unknown request {}", opaque);
                Ok(false)
            }
        }
    }

    /// Fail every request whose deadline is not after `now` with `ClientError::RequestTimeout`.
    pub fn scan_expired(&self, now: Instant) -> Result<usize, ClientError> {
        let expired: Vec<(i32, Pending)> = {
            let mut guard = self.lock()?;
            let opaques: Vec<i32> = guard
                .iter()
                .filter(|(_, pending)| pending.is_expired(now))
                .map(|(opaque, _)| *opaque)
                .collect();
            let expired: Vec<(i32, Pending)> = opaques
                .into_iter()
                .flat_map(|opaque| guard.remove(&opaque).map(|pending| (opaque, pending)))
                .collect();
            expired
        };

        let count = expired.len();
        expired.into_iter().for_each(|(opaque, pending)| {
            let elapsed_ms = now.duration_since(pending.registered_at).as_millis();
            warn!("Request {} timed out after {}ms", opaque, elapsed_ms);
            pending
                .callback
                .invoke_on_exception(&ClientError::RequestTimeout { opaque, elapsed_ms });
        });
        Ok(count)
    }

    /// Fail all outstanding requests, e.g. once the underlying connection is gone.
    pub fn fail_all<F>(&self, cause: F) -> Result<usize, ClientError>
    where
        F: Fn(i32) -> ClientError,
    {
        let drained: Vec<(i32, Pending)> = self.lock()?.drain().collect();
        let count = drained.len();
        drained.into_iter().for_each(|(opaque, pending)| {
            pending.callback.invoke_on_exception(&cause(opaque));
        });
        Ok(count)
    }

    pub fn len(&self) -> Result<usize, ClientError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ClientError> {
        Ok(self.len()? == 0)
    }
}

/// Spawn a task that scans `table` for expired requests at its configured scan interval.
///
/// The task only keeps a weak reference and stops once the table is dropped.
pub fn spawn_expiry(table: &Arc<RequestTable>) -> JoinHandle<()> {
    let period = table.config().scan_interval();
    let weak = Arc::downgrade(table);
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        loop {
            interval.tick().await;
            let Some(table) = weak.upgrade() else {
                debug!("Request table is gone, stopping expiry scan");
                break;
            };
            match table.scan_expired(Instant::now()) {
                Ok(0) => {}
                Ok(n) => debug!("Expired {} requests", n),
                Err(e) => warn!("Failed to scan expired requests. Cause: {}", e),
            }
        }
    })
}
