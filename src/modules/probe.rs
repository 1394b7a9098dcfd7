//! Supported-kernel probe.
//!
//! Kernels built with support metadata tag every module they stand behind.
//! Looking at one module that is present and supported everywhere tells us
//! whether the target kernel is such a build. If it is not, unsupported
//! modules have to be allowed or nothing would resolve.

use super::query::ModuleQuery;

/// Module present and supported on every target platform.
pub const DEFAULT_SENTINEL: &str = "loop";

#[derive(Debug, Clone)]
pub struct KernelSupportProbe {
    sentinel: String,
}

impl Default for KernelSupportProbe {
    fn default() -> Self {
        Self::new(DEFAULT_SENTINEL)
    }
}

impl KernelSupportProbe {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// A failed query counts as supported: no answer must not block loading.
    pub fn is_supported(&self, query: &dyn ModuleQuery, kernel_version: &str) -> bool {
        query
            .is_supported(kernel_version, &self.sentinel)
            .unwrap_or(true)
    }
}
