//! Configuration for signature inspection.

/// Signature inspection configuration.
#[derive(Debug, Clone)]
pub struct InspectConfig {
    /// Analyse signatures on the rayon pool instead of one after another.
    pub parallel: bool,

    /// Verify embedded timestamp tokens (signature and imprint).
    pub verify_timestamps: bool,

    /// Upper bound on the number of signature fields inspected in one document.
    pub max_signatures: usize,

    /// Accept MD5 and SHA-1 digests. When disabled they are reported as
    /// unsupported algorithms.
    pub allow_weak_digests: bool,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl InspectConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            parallel: true,
            verify_timestamps: true,
            max_signatures: 256,
            allow_weak_digests: true,
        }
    }

    /// Enable or disable parallel analysis.
    pub fn with_parallel(mut self, enable: bool) -> Self {
        self.parallel = enable;
        self
    }

    /// Enable or disable timestamp verification.
    pub fn with_timestamp_verification(mut self, enable: bool) -> Self {
        self.verify_timestamps = enable;
        self
    }

    /// Set the maximum number of signatures inspected.
    pub fn with_max_signatures(mut self, max: usize) -> Self {
        self.max_signatures = max;
        self
    }

    /// Accept or reject MD5/SHA-1 digests.
    pub fn with_weak_digests(mut self, allow: bool) -> Self {
        self.allow_weak_digests = allow;
        self
    }
}
