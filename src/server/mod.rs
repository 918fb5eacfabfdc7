pub mod builder;
pub mod handler;
pub mod listener;

pub use builder::ExpositionServer;
pub use handler::MetricsHandler;
pub use listener::bind_tcp;
