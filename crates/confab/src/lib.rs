pub mod agent;
pub mod cache;
pub mod checkpoint;
pub mod errors;
pub mod events;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod registry;
pub mod remote;
pub mod toolset;
pub mod transcript;
