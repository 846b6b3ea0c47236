//! Per-browser, per-product ephemeral wizard state.
//!
//! Keyed by `(browser session id, product id)` so two wizards for different
//! products in the same browser never share an entry. Two tabs racing the
//! same product key is last-write-wins; accepted behavior, no lock exists.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Partial wizard input accumulated across steps 1 and 2, consumed at step 3.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardState {
    pub params: BTreeMap<String, String>,
    pub file_path: String,
    pub layout_id: String,
}

struct Entry {
    state: WizardState,
    touched: Instant,
}

pub struct SessionStore {
    entries: Mutex<HashMap<(String, i64), Entry>>,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_ttl,
        }
    }

    pub async fn get(&self, session_id: &str, product_id: i64) -> Option<WizardState> {
        let mut entries = self.entries.lock().await;
        Self::prune(&mut entries, self.idle_ttl);
        entries
            .get(&(session_id.to_string(), product_id))
            .map(|e| e.state.clone())
    }

    pub async fn set(&self, session_id: &str, product_id: i64, state: WizardState) {
        let mut entries = self.entries.lock().await;
        Self::prune(&mut entries, self.idle_ttl);
        entries.insert(
            (session_id.to_string(), product_id),
            Entry {
                state,
                touched: Instant::now(),
            },
        );
    }

    pub async fn pop(&self, session_id: &str, product_id: i64) -> Option<WizardState> {
        let mut entries = self.entries.lock().await;
        Self::prune(&mut entries, self.idle_ttl);
        entries
            .remove(&(session_id.to_string(), product_id))
            .map(|e| e.state)
    }

    fn prune(entries: &mut HashMap<(String, i64), Entry>, idle_ttl: Duration) {
        let now = Instant::now();
        entries.retain(|_, e| now.duration_since(e.touched) <= idle_ttl);
    }
}
