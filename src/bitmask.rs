//! Scoped ownership of provider bitmasks.
//!
//! Provider masks have manual lifetime. A [`Bitmask`] owns exactly one and
//! hands it back to the provider when dropped, so the mask is released once
//! on every path out of the function that created it, including early
//! returns through `?`.

use std::fmt;
use std::mem::ManuallyDrop;

use crate::error::{Error, Result};
use crate::provider::Provider;

/// A provider bitmask released on drop.
pub struct Bitmask<'a, P: Provider> {
    provider: &'a P,
    raw: ManuallyDrop<P::Mask>,
}

impl<'a, P: Provider> Bitmask<'a, P> {
    /// Parse a node list with the provider's own parser.
    ///
    /// Fails with [`Error::InvalidNodeSpec`] if the provider rejects `spec`.
    pub fn parse_nodes(provider: &'a P, spec: &str) -> Result<Bitmask<'a, P>> {
        match provider.parse_nodestring(spec) {
            Some(raw) => Ok(Bitmask::from_raw(provider, raw)),
            None => Err(Error::InvalidNodeSpec(spec.to_string())),
        }
    }

    /// Parse a CPU list with the provider's own parser.
    ///
    /// Fails with [`Error::InvalidCpuSpec`] if the provider rejects `spec`.
    pub fn parse_cpus(provider: &'a P, spec: &str) -> Result<Bitmask<'a, P>> {
        match provider.parse_cpustring(spec) {
            Some(raw) => Ok(Bitmask::from_raw(provider, raw)),
            None => Err(Error::InvalidCpuSpec(spec.to_string())),
        }
    }

    /// Allocate an empty CPU mask.
    pub fn allocate_cpus(provider: &'a P) -> Result<Bitmask<'a, P>> {
        let raw = provider.allocate_cpumask()?;
        Ok(Bitmask::from_raw(provider, raw))
    }

    /// Take ownership of a mask obtained from `provider`.
    pub fn from_raw(provider: &'a P, raw: P::Mask) -> Bitmask<'a, P> {
        log::trace!("bitmask acquired");
        Bitmask { provider, raw: ManuallyDrop::new(raw) }
    }

    /// Whether `bit` is set.
    #[inline]
    pub fn is_set(&self, bit: usize) -> bool {
        self.provider.bitmask_isbitset(&self.raw, bit)
    }

    /// Set `bit`.
    #[inline]
    pub fn set(&mut self, bit: usize) {
        self.provider.bitmask_setbit(&mut self.raw, bit);
    }

    /// Set bits among `0..limit`, ascending.
    pub fn ones(&self, limit: usize) -> Vec<usize> {
        (0..limit).filter(|bit| self.is_set(*bit)).collect()
    }

    /// The provider handle.
    #[inline]
    pub fn as_raw(&self) -> &P::Mask {
        &self.raw
    }

    /// The provider handle, mutably.
    #[inline]
    pub fn as_raw_mut(&mut self) -> &mut P::Mask {
        &mut self.raw
    }
}

impl<P: Provider> Drop for Bitmask<'_, P> {
    fn drop(&mut self) {
        // SAFETY: `raw` is never touched again after this point.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        self.provider.bitmask_free(raw);
        log::trace!("bitmask released");
    }
}

impl<P: Provider> fmt::Debug for Bitmask<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmask").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    #[test]
    fn each_guard_releases_once() {
        let provider = MockProvider::new(2, 4);
        {
            let _nodes = Bitmask::parse_nodes(&provider, "0-1").unwrap();
            let _cpus = Bitmask::allocate_cpus(&provider).unwrap();
            assert_eq!(provider.outstanding(), 2);
        }
        assert_eq!(provider.allocations(), 2);
        assert_eq!(provider.releases(), 2);
    }

    #[test]
    fn release_on_early_return() {
        fn fails_after_allocating(provider: &MockProvider) -> Result<()> {
            let _cpus = Bitmask::allocate_cpus(provider)?;
            Bitmask::parse_cpus(provider, "99")?;
            Ok(())
        }

        let provider = MockProvider::new(1, 4);
        assert!(matches!(fails_after_allocating(&provider), Err(Error::InvalidCpuSpec(_))));
        assert_eq!(provider.allocations(), 1);
        assert_eq!(provider.outstanding(), 0);
    }

    #[test]
    fn set_bits_are_visible() {
        let provider = MockProvider::new(1, 8);
        let mut cpus = Bitmask::allocate_cpus(&provider).unwrap();
        assert!(cpus.ones(8).is_empty());

        cpus.set(6);
        cpus.set(1);
        assert!(cpus.is_set(1));
        assert!(!cpus.is_set(2));
        assert_eq!(cpus.ones(8), vec![1, 6]);
        assert_eq!(cpus.ones(4), vec![1]);
        // bits past the mask width read as clear
        assert!(!cpus.is_set(64));
    }
}
