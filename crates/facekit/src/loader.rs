//! Process-wide, load-once model state.
//!
//! The first `prepare` loads the networks and the annotation font from the
//! weights directory; every later call reuses them. Concurrent first callers
//! serialize on an init lock, so the weights are read from disk once. A
//! failed load caches nothing.

use crate::annotate::Annotator;
use crate::config::{self, PrepareOptions, FONT_FILE};
use crate::engine::FaceApi;
use crate::error::FaceKitError;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

/// A value initialized at most once, by a fallible initializer.
pub(crate) struct InitOnce<T> {
    cell: OnceLock<T>,
    init_lock: Mutex<()>,
}

impl<T> InitOnce<T> {
    pub(crate) const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    pub(crate) fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Return the value, running `init` only if no earlier call succeeded.
    pub(crate) fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let value = init()?;
        Ok(self.cell.get_or_init(|| value))
    }
}

/// Models and annotator shared by every call after `prepare`.
pub struct Prepared {
    options: PrepareOptions,
    api: Mutex<FaceApi>,
    annotator: Annotator,
}

impl Prepared {
    /// Load models and font from an explicit weights directory.
    pub fn load(weights_dir: &Path, options: PrepareOptions) -> Result<Self, FaceKitError> {
        let api = FaceApi::load(weights_dir, options)?;
        let annotator = Annotator::from_font_file(&weights_dir.join(FONT_FILE))?;
        Ok(Self {
            options,
            api: Mutex::new(api),
            annotator,
        })
    }

    /// Exclusive access to the models; ONNX sessions need `&mut` to run.
    pub fn api(&self) -> MutexGuard<'_, FaceApi> {
        self.api.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn annotator(&self) -> &Annotator {
        &self.annotator
    }
}

static PREPARED: InitOnce<Prepared> = InitOnce::new();

/// Load the models once per process from the fixed weights directory.
///
/// Later calls are no-ops; options passed after the first successful call
/// are ignored.
pub fn prepare(options: PrepareOptions) -> Result<&'static Prepared, FaceKitError> {
    options.validate()?;
    if let Some(prepared) = PREPARED.get() {
        if prepared.options != options {
            tracing::debug!(
                requested = ?options,
                active = ?prepared.options,
                "models already prepared; keeping the first configuration"
            );
        }
        return Ok(prepared);
    }

    PREPARED.get_or_try_init(|| {
        let dir = config::default_weights_dir()?;
        tracing::info!(dir = %dir.display(), "preparing face models");
        Prepared::load(&dir, options)
    })
}

/// Prepared state with default options, loading it if needed.
pub(crate) fn prepared() -> Result<&'static Prepared, FaceKitError> {
    match PREPARED.get() {
        Some(prepared) => Ok(prepared),
        None => prepare(PrepareOptions::default()),
    }
}
