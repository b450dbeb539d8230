pub mod alerting;
pub mod checks;
pub mod clock;
pub mod db;
pub mod metrics;
pub mod monitoring;
pub mod notifications;
pub mod ratelimit;
pub mod retention;
pub mod scheduler;
pub mod server;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;
