//! Sampling scheduler (C6) and sample-size optimizer (C10).

pub mod optimizer;
pub mod scheduler;

pub use optimizer::{
    adaptive_sampling, adjust_sample_size, confidence, estimate_network_load,
    min_samples_for_security, OptimizerConfig,
};
pub use scheduler::{
    select_targets, SamplingMode, SamplingRound, SamplingScheduler, SchedulerConfig,
    SchedulerError, SchedulerStats,
};
