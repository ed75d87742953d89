pub mod assignment;
pub mod competency;
pub mod configuration;
pub mod conversation;
pub mod records;
