//! Test harness for database repository testing
//!
//! - SQLite: in-memory databases with the real migrations
//! - PostgreSQL: one shared testcontainers instance, one schema per test
//! - [`seed_metrics`]: the nine-row fixture most metric tests start from

use chrono::NaiveDate;
#[cfg(feature = "database-sqlite")]
use sqlx::SqlitePool;

use crate::models::{CreateMetric, Os};

/// Create an in-memory SQLite pool for testing
#[cfg(feature = "database-sqlite")]
pub async fn create_sqlite_pool() -> SqlitePool {
    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

/// Run SQLite migrations on the pool
#[cfg(feature = "database-sqlite")]
pub async fn run_sqlite_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations_sqlx/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}

#[allow(clippy::too_many_arguments)]
fn metric(
    day: u32,
    channel: &str,
    country: &str,
    os: Os,
    impressions: i64,
    clicks: i32,
    installs: i32,
    spend: f64,
    revenue: f64,
) -> CreateMetric {
    CreateMetric {
        date: NaiveDate::from_ymd_opt(2017, 5, day).expect("valid fixture date"),
        channel: channel.to_string(),
        country: country.to_string(),
        os,
        impressions,
        clicks,
        installs,
        spend,
        revenue,
    }
}

/// Nine records across three channels and four countries.
///
/// | channel          | country | installs | spend | clicks |
/// |------------------|---------|----------|-------|--------|
/// | adcolony         | US      | 1, 2     | 5, 5  | 9, 8   |
/// | adcolony         | CA      | 4        | 4     | 7      |
/// | apple_search_ads | GB      | 4, 5, 6  | 3,4,6 | 6,4,5  |
/// | chartboost       | FR      | 7        | 4     | 3      |
/// | chartboost       | GB      | 8        | 8     | 2      |
/// | chartboost       | US      | 9        | 8     | 1      |
///
/// All rows are dated 2017-05-17 except the adcolony CA row (2017-05-18).
pub fn seed_metrics() -> Vec<CreateMetric> {
    vec![
        metric(17, "adcolony", "US", Os::Android, 1, 9, 1, 5.0, 6.0),
        metric(17, "adcolony", "US", Os::Ios, 2, 8, 2, 5.0, 8.0),
        metric(18, "adcolony", "CA", Os::Ios, 3, 7, 4, 4.0, 11.0),
        metric(17, "apple_search_ads", "GB", Os::Android, 4, 6, 4, 3.0, 12.0),
        metric(17, "apple_search_ads", "GB", Os::Ios, 5, 4, 5, 4.0, 14.0),
        metric(17, "apple_search_ads", "GB", Os::Android, 6, 5, 6, 6.0, 16.0),
        metric(17, "chartboost", "FR", Os::Ios, 7, 3, 7, 4.0, 18.0),
        metric(17, "chartboost", "GB", Os::Android, 8, 2, 8, 8.0, 20.0),
        metric(17, "chartboost", "US", Os::Ios, 9, 1, 9, 8.0, 22.0),
    ]
}

/// PostgreSQL test harness using testcontainers
#[cfg(all(test, feature = "database-postgres"))]
pub mod postgres {
    use std::sync::OnceLock;

    use sqlx::PgPool;
    use testcontainers_modules::{
        postgres::Postgres,
        testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner},
    };
    use tokio::sync::OnceCell;

    struct SharedContainer {
        #[allow(dead_code)] // keeps the container alive
        container: ContainerAsync<Postgres>,
        connection_string: String,
    }

    static SHARED_CONTAINER: OnceLock<OnceCell<SharedContainer>> = OnceLock::new();

    async fn get_shared_container() -> &'static SharedContainer {
        let cell = SHARED_CONTAINER.get_or_init(OnceCell::new);
        cell.get_or_init(|| async {
            let container = Postgres::default()
                .with_tag("16-alpine")
                .start()
                .await
                .expect("Failed to start PostgreSQL container");

            let host = container.get_host().await.expect("Failed to get host");
            let port = container
                .get_host_port_ipv4(5432)
                .await
                .expect("Failed to get port");

            SharedContainer {
                container,
                connection_string: format!(
                    "postgres://postgres:postgres@{}:{}/postgres",
                    host, port
                ),
            }
        })
        .await
    }

    /// Pool bound to a fresh schema in the shared container.
    pub async fn create_isolated_postgres_pool() -> PgPool {
        let shared = get_shared_container().await;

        let admin_pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&shared.connection_string)
            .await
            .expect("Failed to connect to PostgreSQL");

        let schema_name = format!("metrics_test_{}", uuid::Uuid::new_v4().simple());
        sqlx::query(&format!("CREATE SCHEMA \"{}\"", schema_name))
            .execute(&admin_pool)
            .await
            .expect("Failed to create test schema");

        let isolated_url = format!(
            "{}?options=-c search_path={}",
            shared.connection_string, schema_name
        );

        sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(&isolated_url)
            .await
            .expect("Failed to connect to isolated schema")
    }

    pub async fn run_postgres_migrations(pool: &PgPool) {
        sqlx::migrate!("./migrations_sqlx/postgres")
            .run(pool)
            .await
            .expect("Failed to run PostgreSQL migrations");
    }
}
