use crate::error::{ChainMapError, Result};

/// Configuration for resize behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeConfig {
    /// Grow once `len >= floor(buckets * load_factor_threshold)` (default: 0.75)
    pub load_factor_threshold: f64,

    /// Grow once an insertion produces a chain this long (default: 8)
    pub max_chain_depth: usize,

    /// New bucket count is `buckets * growth_factor + 1` (default: 2)
    pub growth_factor: usize,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            load_factor_threshold: 0.75,
            max_chain_depth: 8,
            growth_factor: 2,
        }
    }
}

impl ResizeConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.load_factor_threshold.is_finite() || self.load_factor_threshold <= 0.0 {
            return Err(ChainMapError::InvalidArgument(
                "load_factor_threshold must be a positive finite number",
            ));
        }
        if self.max_chain_depth == 0 {
            return Err(ChainMapError::InvalidArgument("max_chain_depth must be non-zero"));
        }
        if self.growth_factor == 0 {
            return Err(ChainMapError::InvalidArgument("growth_factor must be non-zero"));
        }
        Ok(())
    }

    /// Number of entries at which a table of `buckets` slots grows.
    pub(crate) fn entry_limit(&self, buckets: usize) -> usize {
        (buckets as f64 * self.load_factor_threshold) as usize
    }

    pub(crate) fn limits_exceeded(&self, buckets: usize, len: usize, depth: usize) -> bool {
        len >= self.entry_limit(buckets) || depth >= self.max_chain_depth
    }

    /// Next bucket count, `None` if it would overflow.
    pub(crate) fn next_size(&self, buckets: usize) -> Option<usize> {
        buckets.checked_mul(self.growth_factor)?.checked_add(1)
    }
}
