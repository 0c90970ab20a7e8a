pub mod backend;
pub mod projector;
pub mod registry;
pub mod schema;

pub use backend::PrometheusRegistry;
