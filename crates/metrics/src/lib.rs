//! Metrics collection and export for wagpt.
//!
//! Library crates record through the `metrics` facade macros re-exported
//! here. When the `prometheus` feature is enabled the binary installs a
//! Prometheus recorder and the gateway renders it at `/metrics`; otherwise
//! every recording is a no-op.
//!
//! ```rust,ignore
//! use wagpt_metrics::{counter, labels, llm};
//!
//! counter!(llm::COMPLETIONS_TOTAL, labels::PROVIDER => "openai").increment(1);
//! ```

mod definitions;
mod error;
mod recorder;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
