//! Status projection for AppWrapper jobs: lifecycle status from envelope
//! phase and conditions, chief replica selection, age/duration and GPU
//! accounting over the member pods.

#![forbid(unsafe_code)]

pub mod chief;
pub mod gpu;
pub mod job;
pub mod projection;

pub use chief::{is_appwrapper_pod, select_chief};
pub use job::{AppWrapperJob, JobSummary};
pub use projection::project_status;
