mod loader;
mod metrics;

use std::sync::Arc;

pub use loader::parse_delimiter;
pub use metrics::{MetricQuery, MetricQueryResult, MetricService, MetricServiceError};

use crate::db::DbPool;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub metrics: MetricService,
}

impl Services {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self {
            metrics: MetricService::new(db),
        }
    }
}
