pub mod canonical;
pub mod cleanup;
pub mod job_handler;
pub mod queue;
pub mod worker;
