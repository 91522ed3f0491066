//! Session cache
//!
//! One cached handle per host for the lifetime of the listener. The cache
//! is shared by every connection task; get-or-create runs at most once per
//! host at a time, while different hosts proceed independently.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

use rdv_core::error::{PaneWarning, RoutingError};
use rdv_core::traits::Multiplexer;
use rdv_core::types::{PaneTarget, SessionName, SessionOrigin, WindowId};

/// Caches session handles by host
pub struct SessionManager {
    /// Sessions indexed by name; an empty cell means creation is pending or failed
    sessions: DashMap<SessionName, Arc<OnceCell<Arc<SessionHandle>>>>,
}

/// Handle to a multiplexer session
pub struct SessionHandle {
    /// Session name (sanitized hostname)
    pub name: SessionName,
    /// Whether this process created the session
    pub origin: SessionOrigin,
    /// Windows created through this handle
    window_count: Mutex<u32>,
}

impl SessionManager {
    /// Create an empty session cache
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Return the cached session for `name`, creating or adopting it first
    ///
    /// A session that already exists in the multiplexer but not in the cache
    /// (left over from an earlier listener) is adopted by name instead of
    /// being created again. Only a failed existence check is an error; a
    /// failed create is pushed onto `warnings`.
    pub async fn get_or_create(
        &self,
        name: &SessionName,
        mux: &dyn Multiplexer,
        warnings: &mut Vec<PaneWarning>,
    ) -> Result<Arc<SessionHandle>, RoutingError> {
        let cell = Arc::clone(&self.sessions.entry(name.clone()).or_default());

        let handle = cell
            .get_or_try_init(move || async move {
                let exists = mux.has_session(name).await.map_err(|source| {
                    RoutingError::SessionCheck {
                        session: name.clone(),
                        source,
                    }
                })?;

                let origin = if exists {
                    tracing::debug!(host = %name, "creating new cached session");
                    SessionOrigin::Adopted
                } else {
                    tracing::info!(host = %name, "new host connected, creating session");
                    if let Err(source) = mux.new_session(name).await {
                        let warning = PaneWarning::SessionCreate {
                            session: name.clone(),
                            source,
                        };
                        tracing::warn!(host = %name, "{}", warning);
                        warnings.push(warning);
                    }
                    SessionOrigin::Created
                };

                Ok::<_, RoutingError>(Arc::new(SessionHandle::new(name.clone(), origin)))
            })
            .await?;

        Ok(Arc::clone(handle))
    }

    /// Get a cached session by name
    pub fn get(&self, name: &SessionName) -> Option<Arc<SessionHandle>> {
        self.sessions
            .get(name)
            .and_then(|cell| cell.get().map(Arc::clone))
    }

    /// Number of cached sessions
    pub fn len(&self) -> usize {
        self.sessions.iter().filter(|cell| cell.initialized()).count()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    /// Create a handle with no windows yet
    pub fn new(name: SessionName, origin: SessionOrigin) -> Self {
        Self {
            name,
            origin,
            window_count: Mutex::new(0),
        }
    }

    /// Create the next window for `user`
    ///
    /// The counter is held across the multiplexer call, so sequence numbers
    /// are strictly increasing per session. It advances even when the
    /// multiplexer reports an error; no pane is returned then, since any
    /// other target could resolve to a window owned by an earlier callback.
    pub async fn open_window(
        &self,
        user: &str,
        mux: &dyn Multiplexer,
    ) -> (WindowId, Result<PaneTarget, PaneWarning>) {
        let mut count = self.window_count.lock().await;
        let id = WindowId::new(user, *count + 1);
        let result = mux.new_window(&self.name, &id).await;
        *count += 1;

        match result {
            Ok(window) => (id, Ok(window.pane)),
            Err(source) => {
                let warning = PaneWarning::WindowCreate {
                    window: id.clone(),
                    source,
                };
                tracing::warn!(session = %self.name, window = %id, "{}", warning);
                (id, Err(warning))
            }
        }
    }

    /// Windows created so far
    pub async fn window_count(&self) -> u32 {
        *self.window_count.lock().await
    }
}
