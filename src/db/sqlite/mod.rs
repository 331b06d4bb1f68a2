mod metrics;

pub use metrics::SqliteMetricRepo;
