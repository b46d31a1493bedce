//! VIN record database operations

use chrono::{DateTime, Datelike, Duration, NaiveDate, SecondsFormat, SubsecRound, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::vin::{is_valid_vin, normalize_vin};

/// Stored VIN record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VinRecord {
    pub id: i64,
    pub code: String,
    /// When the VIN was captured
    pub recorded_at: DateTime<Utc>,
    /// When the row was inserted
    pub created_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub source_address: Option<String>,
}

/// Raw `vins` row
#[derive(Debug, sqlx::FromRow)]
struct VinRow {
    id: i64,
    code: String,
    date_created: String,
    user_agent: Option<String>,
    ip_address: Option<String>,
    created_at: String,
}

impl TryFrom<VinRow> for VinRecord {
    type Error = AppError;

    fn try_from(row: VinRow) -> Result<Self> {
        Ok(VinRecord {
            id: row.id,
            recorded_at: parse_timestamp(&row.date_created)?,
            created_at: parse_timestamp(&row.created_at)?,
            code: row.code,
            user_agent: row.user_agent,
            source_address: row.ip_address,
        })
    }
}

/// New VIN submission
#[derive(Debug, Clone, Default)]
pub struct NewVin {
    pub code: String,
    /// Defaults to the submission time
    pub recorded_at: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
    pub source_address: Option<String>,
}

impl NewVin {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn recorded_at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(recorded_at);
        self
    }
}

/// Search filters, all optional and combined with AND
#[derive(Debug, Clone, Default)]
pub struct VinSearch {
    /// Case-insensitive substring of the code
    pub query: Option<String>,
    /// Inclusive lower bound on the recorded date
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the recorded date
    pub date_to: Option<NaiveDate>,
}

/// Record counts by creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VinStats {
    pub total: i64,
    pub today: i64,
    pub this_week: i64,
    pub this_month: i64,
}

/// Years that fit the fixed-width timestamp format
const STORABLE_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

const SELECT_COLUMNS: &str =
    "SELECT id, code, date_created, user_agent, ip_address, created_at FROM vins";

/// VIN repository
pub struct VinRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> VinRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a VIN record by id
    pub async fn get(&self, id: i64) -> Result<Option<VinRecord>> {
        let row = sqlx::query_as::<_, VinRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(VinRecord::try_from).transpose()
    }

    /// Store a new VIN.
    ///
    /// Fails with `Validation` for malformed codes and `Conflict` when the
    /// normalized code already exists.
    pub async fn create(&self, new: &NewVin) -> Result<VinRecord> {
        self.insert(new, Utc::now()).await
    }

    pub(crate) async fn insert(&self, new: &NewVin, created_at: DateTime<Utc>) -> Result<VinRecord> {
        let code = normalize_vin(&new.code);
        if code.is_empty() {
            return Err(AppError::Validation("VIN code is required".to_string()));
        }
        if !is_valid_vin(&code) {
            return Err(AppError::Validation(format!(
                "Invalid VIN code '{}': expected 17 characters (A-Z, 0-9, excluding I, O, Q)",
                code
            )));
        }

        // Whole seconds, so the spreadsheet date format round-trips.
        let recorded_at = new.recorded_at.unwrap_or(created_at).trunc_subsecs(0);
        if !STORABLE_YEARS.contains(&recorded_at.year()) {
            return Err(AppError::Validation(format!(
                "Recorded date {} is outside years {}-{}",
                recorded_at.to_rfc3339(),
                STORABLE_YEARS.start(),
                STORABLE_YEARS.end()
            )));
        }

        let row = sqlx::query_as::<_, VinRow>(
            r#"
            INSERT INTO vins (code, date_created, user_agent, ip_address, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, code, date_created, user_agent, ip_address, created_at
            "#,
        )
        .bind(&code)
        .bind(format_timestamp(recorded_at))
        .bind(&new.user_agent)
        .bind(&new.source_address)
        .bind(format_timestamp(created_at))
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_insert_error(e, &code))?;

        VinRecord::try_from(row)
    }

    /// Delete a VIN record, returning what was deleted
    pub async fn delete(&self, id: i64) -> Result<VinRecord> {
        let row = sqlx::query_as::<_, VinRow>(
            r#"
            DELETE FROM vins
            WHERE id = ?
            RETURNING id, code, date_created, user_agent, ip_address, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("VIN with id {} not found", id)))?;

        VinRecord::try_from(row)
    }

    /// List all VIN records, newest first
    pub async fn list(&self) -> Result<Vec<VinRecord>> {
        let rows = sqlx::query_as::<_, VinRow>(&format!(
            "{} ORDER BY created_at DESC, id DESC",
            SELECT_COLUMNS
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(VinRecord::try_from).collect()
    }

    /// Filter VIN records, newest first
    pub async fn search(&self, filters: &VinSearch) -> Result<Vec<VinRecord>> {
        let pattern = filters
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(&q.to_uppercase())));
        let date_from = filters.date_from.map(|d| d.format("%Y-%m-%d").to_string());
        let date_to = filters.date_to.map(|d| d.format("%Y-%m-%d").to_string());

        let rows = sqlx::query_as::<_, VinRow>(&format!(
            r#"
            {}
            WHERE (? IS NULL OR code LIKE ? ESCAPE '\')
              AND (? IS NULL OR substr(date_created, 1, 10) >= ?)
              AND (? IS NULL OR substr(date_created, 1, 10) <= ?)
            ORDER BY created_at DESC, id DESC
            "#,
            SELECT_COLUMNS
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(&date_from)
        .bind(&date_from)
        .bind(&date_to)
        .bind(&date_to)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(VinRecord::try_from).collect()
    }

    /// Count records created today, in the last 7 days and this month
    pub async fn stats(&self) -> Result<VinStats> {
        self.stats_at(Utc::now()).await
    }

    /// Same as [`stats`](Self::stats), evaluated against `now`
    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<VinStats> {
        let today = now.format("%Y-%m-%d").to_string();
        let month = now.format("%Y-%m").to_string();
        let week_start = format_timestamp(now - Duration::days(7));

        let (total, today, this_week, this_month): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN substr(created_at, 1, 10) = ? THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN created_at >= ? THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN substr(created_at, 1, 7) = ? THEN 1 ELSE 0 END), 0)
            FROM vins
            "#,
        )
        .bind(&today)
        .bind(&week_start)
        .bind(&month)
        .fetch_one(self.pool)
        .await?;

        Ok(VinStats {
            total,
            today,
            this_week,
            this_month,
        })
    }

    /// Count all VIN records
    pub async fn count(&self) -> Result<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vins")
            .fetch_one(self.pool)
            .await?;

        Ok(result.0)
    }
}

fn map_insert_error(err: sqlx::Error, code: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(format!("VIN {} already exists", code))
        }
        _ => AppError::Database(err),
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Storage format for timestamps
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("Corrupt timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::db::create_memory_pool;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_create_normalizes_code() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        let created = repo.create(&NewVin::new(" 1hgcm82633a123456 ")).await.unwrap();
        assert_eq!(created.code, "1HGCM82633A123456");

        let fetched = repo.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_defaults_recorded_at_to_now() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        let before = Utc::now().trunc_subsecs(0);
        let created = repo.create(&NewVin::new("1HGCM82633A123456")).await.unwrap();

        assert!(created.recorded_at >= before);
        assert!(created.recorded_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_create_keeps_metadata_and_truncates_recorded_at() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        let recorded = at(2024, 1, 15, 10) + Duration::milliseconds(750);
        let new = NewVin {
            code: "1HGCM82633A123456".into(),
            recorded_at: Some(recorded),
            user_agent: Some("Mozilla/5.0".into()),
            source_address: Some("10.0.0.7".into()),
        };

        let created = repo.create(&new).await.unwrap();
        assert_eq!(created.recorded_at, at(2024, 1, 15, 10));
        assert_eq!(created.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(created.source_address.as_deref(), Some("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_codes() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        for code in ["", "SHORT", "1HGCM82633A12345O", "1HGCM82633A1234567"] {
            let result = repo.create(&NewVin::new(code)).await;
            assert!(matches!(result, Err(AppError::Validation(_))), "{code}");
        }
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_unstorable_years() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        let far_future = Utc.with_ymd_and_hms(12345, 1, 1, 0, 0, 0).unwrap();
        let before_year_one = Utc.with_ymd_and_hms(0, 12, 31, 0, 0, 0).unwrap();

        for recorded in [far_future, before_year_one] {
            let result = repo
                .create(&NewVin::new("1HGCM82633A123456").recorded_at(recorded))
                .await;
            assert!(matches!(result, Err(AppError::Validation(_))), "{recorded}");
        }

        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(repo.list().await.unwrap().is_empty());

        let last_day = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        let created = repo
            .create(&NewVin::new("1HGCM82633A123456").recorded_at(last_day))
            .await
            .unwrap();
        assert_eq!(created.recorded_at, last_day);
    }

    #[tokio::test]
    async fn test_duplicate_is_conflict() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        repo.create(&NewVin::new("1HGCM82633A123456")).await.unwrap();
        let result = repo.create(&NewVin::new("1hgcm82633a123456")).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        let created = repo.create(&NewVin::new("1HGCM82633A123456")).await.unwrap();
        let deleted = repo.delete(created.id).await.unwrap();
        assert_eq!(deleted, created);

        assert!(repo.list().await.unwrap().is_empty());
        assert!(matches!(
            repo.delete(created.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ids_are_not_reused() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        let first = repo.create(&NewVin::new("1HGCM82633A123456")).await.unwrap();
        repo.delete(first.id).await.unwrap();
        let second = repo.create(&NewVin::new("1HGCM82633A123456")).await.unwrap();

        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        repo.insert(&NewVin::new("AAAAAAAAAAAAAAAA1"), at(2024, 1, 2, 0))
            .await
            .unwrap();
        repo.insert(&NewVin::new("AAAAAAAAAAAAAAAA2"), at(2024, 3, 1, 0))
            .await
            .unwrap();
        repo.insert(&NewVin::new("AAAAAAAAAAAAAAAA3"), at(2024, 2, 1, 0))
            .await
            .unwrap();

        let codes: Vec<_> = repo.list().await.unwrap().into_iter().map(|r| r.code).collect();
        assert_eq!(
            codes,
            vec!["AAAAAAAAAAAAAAAA2", "AAAAAAAAAAAAAAAA3", "AAAAAAAAAAAAAAAA1"]
        );
    }

    #[tokio::test]
    async fn test_search_by_query() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        repo.create(&NewVin::new("1HGCM82633A123456")).await.unwrap();
        repo.create(&NewVin::new("21HGCM8263A123456")).await.unwrap();
        repo.create(&NewVin::new("WVWZZZ1JZXW000001")).await.unwrap();

        let results = repo
            .search(&VinSearch {
                query: Some("1hg".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.code.contains("1HG")));
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        repo.create(&NewVin::new("1HGCM82633A123456")).await.unwrap();

        for query in ["%", "_"] {
            let results = repo
                .search(&VinSearch {
                    query: Some(query.into()),
                    ..Default::default()
                })
                .await
                .unwrap();
            assert!(results.is_empty(), "{query}");
        }
    }

    #[tokio::test]
    async fn test_search_by_recorded_date_inclusive() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        repo.create(&NewVin::new("AAAAAAAAAAAAAAAA1").recorded_at(at(2024, 1, 9, 23)))
            .await
            .unwrap();
        repo.create(&NewVin::new("AAAAAAAAAAAAAAAA2").recorded_at(at(2024, 1, 10, 0)))
            .await
            .unwrap();
        repo.create(&NewVin::new("AAAAAAAAAAAAAAAA3").recorded_at(at(2024, 1, 20, 23)))
            .await
            .unwrap();
        repo.create(&NewVin::new("BBBBBBBBBBBBBBBB4").recorded_at(at(2024, 1, 21, 0)))
            .await
            .unwrap();

        let filters = VinSearch {
            query: None,
            date_from: NaiveDate::from_ymd_opt(2024, 1, 10),
            date_to: NaiveDate::from_ymd_opt(2024, 1, 20),
        };
        let mut codes: Vec<_> = repo
            .search(&filters)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.code)
            .collect();
        codes.sort();
        assert_eq!(codes, vec!["AAAAAAAAAAAAAAAA2", "AAAAAAAAAAAAAAAA3"]);

        let combined = VinSearch {
            query: Some("bbb".into()),
            date_from: NaiveDate::from_ymd_opt(2024, 1, 10),
            date_to: None,
        };
        let results = repo.search(&combined).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].code, "BBBBBBBBBBBBBBBB4");
    }

    #[tokio::test]
    async fn test_search_without_filters_lists_everything() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        repo.create(&NewVin::new("1HGCM82633A123456")).await.unwrap();
        repo.create(&NewVin::new("WVWZZZ1JZXW000001")).await.unwrap();

        let results = repo
            .search(&VinSearch {
                query: Some("  ".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_stats_buckets() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);
        let now = at(2024, 3, 15, 12);

        // today
        repo.insert(&NewVin::new("AAAAAAAAAAAAAAAA1"), at(2024, 3, 15, 1))
            .await
            .unwrap();
        // 3 days ago, same month
        repo.insert(&NewVin::new("AAAAAAAAAAAAAAAA2"), at(2024, 3, 12, 12))
            .await
            .unwrap();
        // 10 days ago, same month
        repo.insert(&NewVin::new("AAAAAAAAAAAAAAAA3"), at(2024, 3, 5, 12))
            .await
            .unwrap();
        // previous month
        repo.insert(&NewVin::new("AAAAAAAAAAAAAAAA4"), at(2024, 2, 28, 12))
            .await
            .unwrap();
        // same month last year
        repo.insert(&NewVin::new("AAAAAAAAAAAAAAAA5"), at(2023, 3, 15, 12))
            .await
            .unwrap();

        let stats = repo.stats_at(now).await.unwrap();
        assert_eq!(
            stats,
            VinStats {
                total: 5,
                today: 1,
                this_week: 2,
                this_month: 3,
            }
        );
    }

    #[tokio::test]
    async fn test_week_spans_month_boundary() {
        let pool = create_memory_pool().await.unwrap();
        let repo = VinRepository::new(&pool);

        repo.insert(&NewVin::new("AAAAAAAAAAAAAAAA1"), at(2024, 2, 28, 12))
            .await
            .unwrap();

        let stats = repo.stats_at(at(2024, 3, 2, 12)).await.unwrap();
        assert_eq!(stats.this_week, 1);
        assert_eq!(stats.this_month, 0);
        assert_eq!(stats.today, 0);
    }

    #[tokio::test]
    async fn test_stats_empty() {
        let pool = create_memory_pool().await.unwrap();
        let stats = VinRepository::new(&pool).stats().await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.this_month, 0);
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        assert_eq!(format_timestamp(at(2024, 1, 5, 7)), "2024-01-05T07:00:00.000Z");
        let parsed = parse_timestamp("2024-01-05T07:00:00.000Z").unwrap();
        assert_eq!(parsed, at(2024, 1, 5, 7));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("A%B_C\\"), "A\\%B\\_C\\\\");
    }
}
