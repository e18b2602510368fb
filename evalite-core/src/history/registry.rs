//! Registry of runs currently in flight
//!
//! Advisory only: the orchestrator registers a run when it starts and the
//! returned guard clears it when the run finishes, fails or is dropped.
//! Overlapping runs of one evaluation are tracked separately, keyed by their
//! creation timestamp.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Running = HashMap<String, Vec<DateTime<Utc>>>;

/// Evaluation names with runs in progress, and when each of those runs started
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    running: Arc<Mutex<Running>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Running> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a run as started; it stays registered until the guard drops
    pub fn start(&self, eval_name: impl Into<String>, created_at: DateTime<Utc>) -> RunGuard {
        let eval_name = eval_name.into();
        self.lock()
            .entry(eval_name.clone())
            .or_default()
            .push(created_at);

        RunGuard {
            registry: self.clone(),
            eval_name,
            created_at,
        }
    }

    /// Whether any run of this evaluation is in flight
    pub fn is_running(&self, eval_name: &str) -> bool {
        self.lock().get(eval_name).is_some_and(|runs| !runs.is_empty())
    }

    /// Whether the run of this evaluation created at `created_at` is in flight
    pub fn is_running_at(&self, eval_name: &str, created_at: DateTime<Utc>) -> bool {
        self.lock()
            .get(eval_name)
            .is_some_and(|runs| runs.contains(&created_at))
    }

    /// Creation timestamp of the oldest in-flight run, if any
    pub fn running_since(&self, eval_name: &str) -> Option<DateTime<Utc>> {
        self.lock()
            .get(eval_name)
            .and_then(|runs| runs.iter().min().copied())
    }

    /// Every in-flight run
    pub fn running(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut running: Vec<_> = self
            .lock()
            .iter()
            .flat_map(|(name, runs)| runs.iter().map(|created_at| (name.clone(), *created_at)))
            .collect();
        running.sort();
        running
    }

    fn finish(&self, eval_name: &str, created_at: DateTime<Utc>) {
        let mut running = self.lock();
        let Some(runs) = running.get_mut(eval_name) else {
            return;
        };
        if let Some(position) = runs.iter().position(|started| *started == created_at) {
            runs.swap_remove(position);
        }
        if runs.is_empty() {
            running.remove(eval_name);
        }
    }
}

/// Clears the run from its registry on drop
#[derive(Debug)]
pub struct RunGuard {
    registry: RunRegistry,
    eval_name: String,
    created_at: DateTime<Utc>,
}

impl RunGuard {
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.finish(&self.eval_name, self.created_at);
    }
}
