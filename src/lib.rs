pub mod pipeline;
pub mod scheduler;
pub mod settings;
pub mod store;
