//! Shared tests for MetricRepo implementations

use chrono::NaiveDate;

use super::harness::seed_metrics;
use crate::{
    aggregation::{Field, aggregate},
    db::repos::{MetricFilter, MetricRepo, OrderBy, OrderKey, Page},
    models::{CreateMetric, Os, ResultRow, Scalar},
};

async fn seed(repo: &dyn MetricRepo) {
    let inserted = repo
        .insert_batch(seed_metrics())
        .await
        .expect("Failed to seed metrics");
    assert_eq!(inserted, 9);
}

fn all() -> Page {
    Page {
        limit: 100,
        offset: 0,
    }
}

fn text<'a>(row: &'a ResultRow, column: &str) -> &'a str {
    row.get(column)
        .and_then(Scalar::as_text)
        .unwrap_or_else(|| panic!("missing text column {column}"))
}

fn float(row: &ResultRow, column: &str) -> f64 {
    row.get(column)
        .and_then(Scalar::as_f64)
        .unwrap_or_else(|| panic!("missing numeric column {column}"))
}

fn int(row: &ResultRow, column: &str) -> i64 {
    row.get(column)
        .and_then(Scalar::as_i64)
        .unwrap_or_else(|| panic!("missing integer column {column}"))
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ============================================================================
// Shared Test Functions
// ============================================================================

pub async fn test_insert_batch_empty(repo: &dyn MetricRepo) {
    let inserted = repo.insert_batch(Vec::new()).await.expect("insert failed");
    assert_eq!(inserted, 0);
    assert_eq!(repo.count(&MetricFilter::default()).await.unwrap(), 0);
}

pub async fn test_insert_batch_large(repo: &dyn MetricRepo) {
    let template = seed_metrics().remove(0);
    let batch: Vec<CreateMetric> = (0..250).map(|_| template.clone()).collect();
    let inserted = repo.insert_batch(batch).await.expect("insert failed");
    assert_eq!(inserted, 250);
    assert_eq!(repo.count(&MetricFilter::default()).await.unwrap(), 250);
}

pub async fn test_list_raw_rows_ordered_by_date(repo: &dyn MetricRepo) {
    seed(repo).await;

    let ordering = [OrderBy::asc(OrderKey::Field(Field::Date))];
    let result = repo
        .list(&MetricFilter::default(), &ordering, all())
        .await
        .expect("list failed");

    assert_eq!(result.total, 9);
    assert_eq!(result.items.len(), 9);

    let first = &result.items[0];
    assert_eq!(first.channel, "adcolony");
    assert_eq!(first.os, Os::Android);
    assert_eq!(first.cpi, Some(5.0));

    // The only 2017-05-18 row sorts last
    let last = &result.items[8];
    assert_eq!(last.date, NaiveDate::from_ymd_opt(2017, 5, 18).unwrap());
    assert_eq!(last.country, "CA");
    assert_eq!(last.cpi, Some(1.0));

    for row in &result.items {
        let expected = row.spend / f64::from(row.installs);
        assert!(approx_eq(row.cpi.unwrap(), expected));
    }
}

pub async fn test_list_zero_installs_has_null_cpi(repo: &dyn MetricRepo) {
    let mut metric = seed_metrics().remove(0);
    metric.installs = 0;
    repo.insert_batch(vec![metric]).await.unwrap();

    let result = repo
        .list(&MetricFilter::default(), &[], all())
        .await
        .unwrap();
    assert_eq!(result.items[0].cpi, None);
}

pub async fn test_list_pagination_and_descending(repo: &dyn MetricRepo) {
    seed(repo).await;

    let ordering = [OrderBy::desc(OrderKey::Field(Field::Clicks))];
    let page = Page {
        limit: 4,
        offset: 2,
    };
    let result = repo
        .list(&MetricFilter::default(), &ordering, page)
        .await
        .unwrap();

    assert_eq!(result.total, 9);
    let clicks: Vec<i32> = result.items.iter().map(|r| r.clicks).collect();
    assert_eq!(clicks, vec![7, 6, 5, 4]);
}

pub async fn test_list_filters(repo: &dyn MetricRepo) {
    seed(repo).await;

    let filter = MetricFilter {
        date_after: NaiveDate::from_ymd_opt(2017, 5, 17),
        date_before: NaiveDate::from_ymd_opt(2017, 5, 17),
        channel_in: vec!["adcolony".into(), "chartboost".into()],
        os: Some(Os::Ios),
        ..Default::default()
    };
    let result = repo.list(&filter, &[], all()).await.unwrap();
    let channels: Vec<&str> = result.items.iter().map(|r| r.channel.as_str()).collect();
    assert_eq!(channels, vec!["adcolony", "chartboost", "chartboost"]);
    assert_eq!(result.total, 3);
    assert_eq!(repo.count(&filter).await.unwrap(), 3);

    let filter = MetricFilter {
        countries: vec!["GB".into()],
        os_in: vec![Os::Android],
        ..Default::default()
    };
    assert_eq!(repo.count(&filter).await.unwrap(), 3);

    let filter = MetricFilter {
        channel: Some("unknown".into()),
        ..Default::default()
    };
    assert_eq!(repo.count(&filter).await.unwrap(), 0);
}

pub async fn test_grouped_cpi_for_single_channel(repo: &dyn MetricRepo) {
    seed(repo).await;

    let plan = aggregate(&["channel"], &["cpi"]).unwrap();
    let filter = MetricFilter {
        channel: Some("adcolony".into()),
        ..Default::default()
    };
    let result = repo.grouped(&filter, &plan, &[], all()).await.unwrap();

    assert_eq!(result.total, 1);
    let row = &result.items[0];
    assert_eq!(row.columns().collect::<Vec<_>>(), vec!["channel", "cpi"]);
    assert_eq!(text(row, "channel"), "adcolony");
    assert!(approx_eq(float(row, "cpi"), 2.0));
}

pub async fn test_grouped_by_channel_and_country(repo: &dyn MetricRepo) {
    seed(repo).await;

    let plan = aggregate(&["channel", "country"], &["clicks"]).unwrap();
    let result = repo
        .grouped(&MetricFilter::default(), &plan, &[], all())
        .await
        .unwrap();

    assert_eq!(result.total, 6);
    let groups: Vec<(&str, &str, i64)> = result
        .items
        .iter()
        .map(|row| (text(row, "channel"), text(row, "country"), int(row, "clicks")))
        .collect();
    assert_eq!(
        groups,
        vec![
            ("adcolony", "CA", 7),
            ("adcolony", "US", 17),
            ("apple_search_ads", "GB", 15),
            ("chartboost", "FR", 3),
            ("chartboost", "GB", 2),
            ("chartboost", "US", 1),
        ]
    );
}

pub async fn test_grouped_installs_and_cpi(repo: &dyn MetricRepo) {
    seed(repo).await;

    let plan = aggregate(&["channel"], &["installs", "cpi"]).unwrap();
    let result = repo
        .grouped(&MetricFilter::default(), &plan, &[], all())
        .await
        .unwrap();

    assert_eq!(result.items.len(), 3);
    let expected = [
        ("adcolony", 7, 14.0 / 7.0),
        ("apple_search_ads", 15, 13.0 / 15.0),
        ("chartboost", 24, 20.0 / 24.0),
    ];
    for (row, (channel, installs, cpi)) in result.items.iter().zip(expected) {
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["channel", "installs", "cpi"]);
        assert_eq!(text(row, "channel"), channel);
        assert_eq!(int(row, "installs"), installs);
        assert!(approx_eq(float(row, "cpi"), cpi), "{channel}");
    }
}

pub async fn test_grouped_ordering_by_aggregate(repo: &dyn MetricRepo) {
    seed(repo).await;

    let plan = aggregate(&["country"], &["spend", "revenue"]).unwrap();
    let ordering = [OrderBy::desc(OrderKey::Field(Field::Spend))];
    let result = repo
        .grouped(&MetricFilter::default(), &plan, &ordering, all())
        .await
        .unwrap();

    let countries: Vec<&str> = result.items.iter().map(|r| text(r, "country")).collect();
    // GB 21, US 18, FR 4, CA 4 (tie broken by country)
    assert_eq!(countries, vec!["GB", "US", "CA", "FR"]);
    assert!(approx_eq(float(&result.items[0], "revenue"), 62.0));
}

pub async fn test_grouped_by_date_pagination(repo: &dyn MetricRepo) {
    seed(repo).await;

    let plan = aggregate(&["date", "os"], &["impressions"]).unwrap();
    let page = Page {
        limit: 2,
        offset: 2,
    };
    let result = repo
        .grouped(&MetricFilter::default(), &plan, &[], page)
        .await
        .unwrap();

    // Groups: (05-17, android) (05-17, ios) (05-18, ios)
    assert_eq!(result.total, 3);
    assert_eq!(result.items.len(), 1);
    let row = &result.items[0];
    assert_eq!(
        row.get("date"),
        Some(&Scalar::Date(NaiveDate::from_ymd_opt(2017, 5, 18).unwrap()))
    );
    assert_eq!(text(row, "os"), "ios");
    assert_eq!(int(row, "impressions"), 3);
}

pub async fn test_grouped_without_keys_is_grand_total(repo: &dyn MetricRepo) {
    seed(repo).await;

    let empty: [&str; 0] = [];
    let plan = aggregate(&empty, &["installs", "spend", "cpi"]).unwrap();
    let result = repo
        .grouped(&MetricFilter::default(), &plan, &[], all())
        .await
        .unwrap();

    assert_eq!(result.total, 1);
    let row = &result.items[0];
    assert_eq!(int(row, "installs"), 46);
    assert!(approx_eq(float(row, "spend"), 47.0));
    assert!(approx_eq(float(row, "cpi"), 47.0 / 46.0));
}

pub async fn test_grouped_empty_result(repo: &dyn MetricRepo) {
    seed(repo).await;

    let plan = aggregate(&["channel"], &["clicks"]).unwrap();
    let filter = MetricFilter {
        countries: vec!["DE".into()],
        ..Default::default()
    };
    let result = repo.grouped(&filter, &plan, &[], all()).await.unwrap();
    assert_eq!(result.total, 0);
    assert!(result.items.is_empty());
}

pub async fn test_grouped_zero_installs_has_null_cpi(repo: &dyn MetricRepo) {
    let mut metric = seed_metrics().remove(0);
    metric.installs = 0;
    repo.insert_batch(vec![metric]).await.unwrap();

    let plan = aggregate(&["channel"], &["cpi"]).unwrap();
    let result = repo
        .grouped(&MetricFilter::default(), &plan, &[], all())
        .await
        .unwrap();
    assert_eq!(result.items[0].get("cpi"), Some(&Scalar::Null));
}

pub async fn test_grouped_is_deterministic(repo: &dyn MetricRepo) {
    seed(repo).await;

    let plan = aggregate(&["channel", "country"], &["clicks", "cpi"]).unwrap();
    let filter = MetricFilter::default();
    let first = repo.grouped(&filter, &plan, &[], all()).await.unwrap();
    let second = repo.grouped(&filter, &plan, &[], all()).await.unwrap();

    assert_eq!(first.total, 6);
    assert_eq!(first.total, second.total);
    assert_eq!(first.items, second.items);
}

// ============================================================================
// SQLite Tests
// ============================================================================

#[cfg(feature = "database-sqlite")]
mod sqlite_tests {
    use crate::db::{
        sqlite::SqliteMetricRepo,
        tests::harness::{create_sqlite_pool, run_sqlite_migrations},
    };

    async fn create_repo() -> SqliteMetricRepo {
        let pool = create_sqlite_pool().await;
        run_sqlite_migrations(&pool).await;
        SqliteMetricRepo::new(pool)
    }

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let repo = create_repo().await;
                super::$name(&repo).await;
            }
        };
    }

    sqlite_test!(test_insert_batch_empty);
    sqlite_test!(test_insert_batch_large);
    sqlite_test!(test_list_raw_rows_ordered_by_date);
    sqlite_test!(test_list_zero_installs_has_null_cpi);
    sqlite_test!(test_list_pagination_and_descending);
    sqlite_test!(test_list_filters);
    sqlite_test!(test_grouped_cpi_for_single_channel);
    sqlite_test!(test_grouped_by_channel_and_country);
    sqlite_test!(test_grouped_installs_and_cpi);
    sqlite_test!(test_grouped_ordering_by_aggregate);
    sqlite_test!(test_grouped_by_date_pagination);
    sqlite_test!(test_grouped_without_keys_is_grand_total);
    sqlite_test!(test_grouped_empty_result);
    sqlite_test!(test_grouped_zero_installs_has_null_cpi);
    sqlite_test!(test_grouped_is_deterministic);
}

// ============================================================================
// PostgreSQL Tests
// ============================================================================

#[cfg(feature = "database-postgres")]
mod postgres_tests {
    use crate::db::{
        postgres::PostgresMetricRepo,
        tests::harness::postgres::{create_isolated_postgres_pool, run_postgres_migrations},
    };

    macro_rules! postgres_test {
        ($name:ident) => {
            #[tokio::test]
            #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
            async fn $name() {
                let pool = create_isolated_postgres_pool().await;
                run_postgres_migrations(&pool).await;
                let repo = PostgresMetricRepo::new(pool, None);
                super::$name(&repo).await;
            }
        };
    }

    postgres_test!(test_insert_batch_empty);
    postgres_test!(test_insert_batch_large);
    postgres_test!(test_list_raw_rows_ordered_by_date);
    postgres_test!(test_list_zero_installs_has_null_cpi);
    postgres_test!(test_list_pagination_and_descending);
    postgres_test!(test_list_filters);
    postgres_test!(test_grouped_cpi_for_single_channel);
    postgres_test!(test_grouped_by_channel_and_country);
    postgres_test!(test_grouped_installs_and_cpi);
    postgres_test!(test_grouped_ordering_by_aggregate);
    postgres_test!(test_grouped_by_date_pagination);
    postgres_test!(test_grouped_without_keys_is_grand_total);
    postgres_test!(test_grouped_empty_result);
    postgres_test!(test_grouped_zero_installs_has_null_cpi);
    postgres_test!(test_grouped_is_deterministic);
}
