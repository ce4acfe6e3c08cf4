use crate::services::{InterviewServices, SessionHandle};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Clients used to build new sessions
    pub services: InterviewServices,

    /// Live interview sessions (session_id → handle)
    pub sessions: Arc<RwLock<HashMap<String, Arc<SessionHandle>>>>,

    /// Ids whose session is being created or opened
    starting: Arc<Mutex<HashSet<String>>>,
}

/// Claim on a session id while its handle is being built. Released on drop.
pub struct Reservation {
    session_id: String,
    starting: Arc<Mutex<HashSet<String>>>,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if let Ok(mut starting) = self.starting.lock() {
            starting.remove(&self.session_id);
        }
    }
}

impl AppState {
    pub fn new(services: InterviewServices) -> Self {
        Self {
            services,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            starting: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    /// Claim `session_id` unless it is live or already being started
    pub async fn reserve(&self, session_id: &str) -> Option<Reservation> {
        let sessions = self.sessions.write().await;
        if sessions.contains_key(session_id) {
            return None;
        }

        let mut starting = self.starting.lock().ok()?;
        if !starting.insert(session_id.to_string()) {
            return None;
        }

        Some(Reservation {
            session_id: session_id.to_string(),
            starting: Arc::clone(&self.starting),
        })
    }

    /// Make a reserved session live
    pub async fn publish(&self, reservation: Reservation, handle: Arc<SessionHandle>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(reservation.session_id.clone(), handle);
        drop(reservation);
    }

    /// Forget sessions that ended at least `grace` ago. Returns how many were dropped.
    pub async fn evict_finished(&self, grace: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|session_id, handle| {
            let controller = &handle.controller;
            if !controller.phase().is_terminal() {
                return true;
            }
            let expired = match controller.result() {
                Some(result) => (Utc::now() - result.finalized_at)
                    .to_std()
                    .map(|age| age >= grace)
                    .unwrap_or(false),
                // Ended without a stored result.
                None => true,
            };
            if expired {
                controller.shutdown();
                debug!("Evicting finished session {}", session_id);
            }
            !expired
        });

        before - sessions.len()
    }

    /// Periodically evict finished sessions
    pub fn spawn_reaper(&self, grace: Duration, every: Duration) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = state.evict_finished(grace).await;
                if evicted > 0 {
                    info!("Evicted {} finished sessions", evicted);
                }
            }
        })
    }

    /// Cancel outbound work and release devices for every live session
    pub async fn shutdown_all(&self) {
        let handles: Vec<Arc<SessionHandle>> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, handle)| handle).collect()
        };

        for handle in handles {
            handle.controller.shutdown();
        }
    }
}
