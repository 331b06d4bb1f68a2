mod metrics;

pub use metrics::PostgresMetricRepo;
