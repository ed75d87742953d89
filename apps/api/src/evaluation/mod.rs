pub mod aggregation;
pub mod analysis;
pub mod evaluator;
pub mod handlers;
pub mod penalty;
pub mod policy;
pub mod prompts;
