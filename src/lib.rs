pub mod collection_engine;
pub mod config;
pub mod context;
pub mod derived;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pagination;
pub mod projects;
pub mod registry;
pub mod scheduler;
pub mod scrapers;
pub mod sink;
pub mod tfe;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
}
