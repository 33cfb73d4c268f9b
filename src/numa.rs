//! The process-wide NUMA handle.
//!
//! A [`Numa`] owns one provider and its configuration and hands out borrowed
//! [`Topology`] and [`Placement`] views over it. The native handle is created
//! explicitly with [`Numa::open`] or [`NumaOptions::open`] and passed to
//! whatever needs it; there is no global instance.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::placement::Placement;
use crate::provider::{NativeProvider, Provider, DEFAULT_LIBRARY};
use crate::topology::{Topology, ISOLATED_CPUS_PATH};

/// Configuration options for opening a NUMA handle.
#[derive(Debug, Clone)]
pub struct NumaOptions {
    /// Shared object the native provider loads.
    pub library: String,

    /// File listing isolated CPUs.
    pub isolated_cpus_path: PathBuf,

    /// Whether opening fails when the library reports no NUMA support.
    pub require_available: bool,
}

impl Default for NumaOptions {
    fn default() -> NumaOptions {
        NumaOptions {
            library: DEFAULT_LIBRARY.to_string(),
            isolated_cpus_path: PathBuf::from(ISOLATED_CPUS_PATH),
            require_available: false,
        }
    }
}

impl NumaOptions {
    /// Create a new set of options with the defaults.
    #[inline]
    pub fn new() -> NumaOptions {
        NumaOptions::default()
    }

    /// Set the shared object the native provider loads.
    #[inline]
    pub fn library(mut self, library: impl Into<String>) -> NumaOptions {
        self.library = library.into();
        self
    }

    /// Set the file isolated CPUs are read from.
    #[inline]
    pub fn isolated_cpus_path(mut self, path: impl Into<PathBuf>) -> NumaOptions {
        self.isolated_cpus_path = path.into();
        self
    }

    /// Fail to open when the library loads but reports NUMA as unavailable.
    #[inline]
    pub fn require_available(mut self, require: bool) -> NumaOptions {
        self.require_available = require;
        self
    }

    /// Load the native provider.
    pub fn open(&self) -> Result<Numa<NativeProvider>> {
        let provider = NativeProvider::load(&self.library)?;
        if !provider.available() {
            if self.require_available {
                return Err(Error::Unavailable(format!("{} reports no NUMA support", self.library)));
            }
            log::warn!("{} loaded but NUMA is not available on this system", self.library);
        }
        Ok(self.with_provider(provider))
    }

    /// Wrap an existing provider.
    pub fn with_provider<P: Provider>(&self, provider: P) -> Numa<P> {
        Numa {
            provider,
            isolated_cpus_path: self.isolated_cpus_path.clone(),
        }
    }
}

/// An initialized NUMA provider plus configuration.
#[derive(Debug)]
pub struct Numa<P: Provider> {
    provider: P,
    isolated_cpus_path: PathBuf,
}

impl Numa<NativeProvider> {
    /// Load the native provider with default options.
    pub fn open() -> Result<Numa<NativeProvider>> {
        NumaOptions::new().open()
    }
}

impl<P: Provider> Numa<P> {
    /// Wrap `provider` with default options.
    pub fn with_provider(provider: P) -> Numa<P> {
        NumaOptions::new().with_provider(provider)
    }

    /// The provider.
    #[inline]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// File isolated CPUs are read from.
    #[inline]
    pub fn isolated_cpus_path(&self) -> &Path {
        &self.isolated_cpus_path
    }

    /// Read-only topology queries.
    #[inline]
    pub fn topology(&self) -> Topology<'_, P> {
        Topology::with_isolated_path(&self.provider, &self.isolated_cpus_path)
    }

    /// Placement control.
    #[inline]
    pub fn placement(&self) -> Placement<'_, P> {
        Placement::new(self.topology())
    }

    /// Shorthand for `self.topology().available()`.
    #[inline]
    pub fn available(&self) -> bool {
        self.provider.available()
    }

    /// Give back the provider.
    pub fn into_provider(self) -> P {
        self.provider
    }
}
