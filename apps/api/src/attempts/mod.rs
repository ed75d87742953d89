pub mod handlers;
pub mod lifecycle;
pub mod selection;
pub mod store;
