//! Error types for hearth.
//!
//! None of these escape the frame loop: the GPU manager collapses
//! [`ComputeError`] into a `bool` (initialization) or `None` (per step),
//! logging the cause. [`ConfigError`] only surfaces when loading tunables.

use thiserror::Error;

/// Errors raised by a compute backend while initializing or running the kernel.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// No compatible GPU adapter was found.
    #[error("no compatible GPU adapter found")]
    AdapterUnavailable,

    /// The adapter refused to create a device.
    #[cfg(feature = "gpu")]
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// Shader module or pipeline creation was rejected by the device.
    #[error("compute pipeline rejected: {0}")]
    Validation(String),

    /// A dispatch or submission failed on the device.
    #[error("kernel execution failed: {0}")]
    Execution(String),

    /// Reading results back from the device failed.
    #[error("failed to map GPU buffer: {0}")]
    BufferMapping(String),

    /// The kernel returned a result whose shape does not match the population.
    #[error("malformed kernel output: expected {expected} slots, got {actual}")]
    MalformedOutput {
        /// Slot count the manager was initialized with.
        expected: usize,
        /// Slot count actually returned.
        actual: usize,
    },

    /// `step` was called before a successful `initialize`.
    #[error("compute backend not initialized")]
    NotInitialized,
}

/// Errors that can occur while loading or validating a [`FireConfig`](crate::config::FireConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write the config file.
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid config JSON.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is outside the range the simulation can run with.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_output_message() {
        let err = ComputeError::MalformedOutput {
            expected: 100,
            actual: 42,
        };
        assert_eq!(
            err.to_string(),
            "malformed kernel output: expected 100 slots, got 42"
        );
    }

    #[test]
    fn test_invalid_config_message() {
        let err = ConfigError::invalid("emission.rate_per_sec", "must be positive");
        assert!(err.to_string().contains("emission.rate_per_sec"));
        assert!(err.to_string().contains("must be positive"));
    }
}
