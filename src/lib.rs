#[macro_use]
extern crate tracing;

mod app;
pub mod args;
pub mod device;
pub mod discovery;
pub mod dispatch;
pub mod envelope;
mod logging;
pub mod metrics;
pub mod report;
pub mod shell;
#[cfg(test)]
mod test_server;

pub use app::{
    App,
    DiscoveryJob,
    MetricsJob,
};
pub use args::{
    Args,
    Mode,
};
pub use logging::{
    init_errors,
    init_logging,
};
