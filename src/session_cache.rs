//! In-memory session cache with a single inference lock
//!
//! The cache lazily constructs one session per model name and keeps it for the
//! process lifetime. A single mutex guards the critical section
//! "acquire-or-create session, then run inference", so session construction
//! and inference never race on shared model state: two concurrent removal
//! requests serialize here rather than inside the runtime.
//!
//! The cache is an explicitly constructed, explicitly owned component. Callers
//! that need shared access wrap it in an `Arc`; there is no process-wide
//! global, which keeps tests isolated and allows independent instances.

use crate::error::{NukkiError, Result};
use crate::inference::{InferenceSession, SessionFactory};
use crate::models::{ModelName, PreprocessingConfig};
use log::{debug, info};
use ndarray::Array4;
use std::collections::HashMap;
use std::sync::Mutex;

/// Cache of lazily constructed inference sessions, keyed by model name
pub struct SessionCache {
    factory: Box<dyn SessionFactory>,
    sessions: Mutex<HashMap<ModelName, Box<dyn InferenceSession>>>,
}

impl SessionCache {
    /// Create an empty cache that constructs sessions through `factory`
    #[must_use]
    pub fn new(factory: Box<dyn SessionFactory>) -> Self {
        Self {
            factory,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Run inference through the cached session for `model`, constructing it
    /// on first use
    ///
    /// The whole get-or-create-then-infer sequence holds the cache lock, so at
    /// most one inference runs at a time regardless of caller count.
    ///
    /// # Errors
    /// - `NukkiError::ModelLoad` if session construction fails; the cache
    ///   stays empty for that model and a later call retries construction
    /// - `NukkiError::Inference` if the model run itself fails
    pub fn run(&self, model: ModelName, input: &Array4<f32>) -> Result<Array4<f32>> {
        let mut sessions = self.lock_sessions()?;
        let session = Self::acquire_or_create(&mut sessions, &*self.factory, model)?;
        session.infer(input)
    }

    /// Preprocessing parameters for `model`, constructing its session on
    /// first use
    ///
    /// # Errors
    /// `NukkiError::ModelLoad` if session construction fails
    pub fn preprocessing_config(&self, model: ModelName) -> Result<PreprocessingConfig> {
        let mut sessions = self.lock_sessions()?;
        let session = Self::acquire_or_create(&mut sessions, &*self.factory, model)?;
        Ok(session.preprocessing_config())
    }

    /// Models with a live cached session
    ///
    /// # Errors
    /// Lock poisoning by a panicked inference call
    pub fn loaded_models(&self) -> Result<Vec<ModelName>> {
        let sessions = self.lock_sessions()?;
        Ok(sessions.keys().copied().collect())
    }

    fn lock_sessions(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ModelName, Box<dyn InferenceSession>>>> {
        self.sessions
            .lock()
            .map_err(|_| NukkiError::processing("session cache lock poisoned"))
    }

    /// Get the cached session for `model`, constructing and inserting it if
    /// absent. A construction failure leaves the map untouched.
    fn acquire_or_create<'a>(
        sessions: &'a mut HashMap<ModelName, Box<dyn InferenceSession>>,
        factory: &dyn SessionFactory,
        model: ModelName,
    ) -> Result<&'a mut Box<dyn InferenceSession>> {
        if !sessions.contains_key(&model) {
            info!("Constructing inference session for model '{model}'");
            let session = factory.create_session(model)?;
            sessions.insert(model, session);
        } else {
            debug!("Reusing cached session for model '{model}'");
        }
        sessions
            .get_mut(&model)
            .ok_or_else(|| NukkiError::processing("session vanished after insertion"))
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let loaded = self
            .sessions
            .lock()
            .map(|s| s.keys().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        f.debug_struct("SessionCache")
            .field("loaded_models", &loaded)
            .finish_non_exhaustive()
    }
}
