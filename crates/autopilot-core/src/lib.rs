//! Core library for assembling, validating and submitting automation plans.
//!
//! A plan is two ordered sections of tasks (`pre` and `post`). Each task is
//! an api call, a shell script run over SSH, or a SQL script. The
//! [`plan::PlanStore`] edits a plan under a subscription capacity limit,
//! [`validate`] checks its fields, and [`run::RunOrchestrator`] submits it
//! to an [`backend::ExecutionBackend`].

pub mod backend;
pub mod plan;
pub mod run;
pub mod task;
pub mod upload;
pub mod validate;
