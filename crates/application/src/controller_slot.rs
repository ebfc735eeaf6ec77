use std::sync::OnceLock;

use tracing::info;

use rbac0_core::{AppError, AppResult};

use crate::{ConnectionSource, Rbac0Service};

/// Process-wide slot holding the single installed backend.
///
/// A backend is installed once; later installs are rejected and the first
/// one stays in place.
pub struct Rbac0Slot<S: ConnectionSource> {
    service: OnceLock<Rbac0Service<S>>,
}

impl<S: ConnectionSource> Rbac0Slot<S> {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            service: OnceLock::new(),
        }
    }

    /// Installs the backend.
    pub fn install(&self, service: Rbac0Service<S>) -> AppResult<()> {
        let backend = service.backend_name();
        self.service.set(service).map_err(|rejected| {
            let installed = self
                .service
                .get()
                .map_or("unknown", Rbac0Service::backend_name);
            AppError::AlreadyInitialized(format!(
                "cannot install backend '{}': backend '{installed}' is already installed",
                rejected.backend_name()
            ))
        })?;

        info!(backend, "rbac0 backend installed");
        Ok(())
    }

    /// Returns the installed backend.
    pub fn service(&self) -> AppResult<&Rbac0Service<S>> {
        self.service.get().ok_or_else(|| {
            AppError::NotInitialized("no rbac0 backend has been installed".to_owned())
        })
    }

    /// Returns whether a backend has been installed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.service.get().is_some()
    }
}

impl<S: ConnectionSource> Default for Rbac0Slot<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
