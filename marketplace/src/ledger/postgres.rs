//! `PostgreSQL` ledger.
//!
//! Tables are created by the migrations under `marketplace/migrations`. Booking writes are
//! conditional on the stored version (`UPDATE ... WHERE id = $1 AND version = $n`) and the
//! version is bumped by the database in the same statement. Aggregates are computed
//! server-side with `COUNT`, `SUM` and `GROUP BY`.

use super::{
    booking_key, BookingFilter, LedgerAggregates, LedgerStore, MonthlyCount, MonthlyRevenue,
    TourFilter, UserFilter,
};
use crate::config::DatabaseConfig;
use crate::settlement::Settlement;
use crate::types::{
    Booking, BookingId, BookingStatus, Money, PaymentReference, PaymentStatus, Tour, TourId, User,
    UserFlags, UserId,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use tourbook_core::{BoxFuture, StoreError, Version};
use uuid::Uuid;

const BOOKING_COLUMNS: &str = "id, tourist_id, guide_id, tour_id, tour_date, number_of_people, \
     total_amount, status, payment_status, special_requests, payment_reference, refund_amount, \
     commission_amount, payout_amount, cancelled_by, created_at, paid_at, confirmed_at, \
     completed_at, cancelled_at, version";

const USER_COLUMNS: &str =
    "id, name, email, role, daily_rate, rating, reviews_count, is_verified, is_active, created_at";

/// Ledger backed by `PostgreSQL` through a shared connection pool.
#[derive(Clone, Debug)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Connect using the pool settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the pool cannot be established.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Failed to connect: {e}")))?;

        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the ledger tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Migration failed: {e}")))
    }

    /// Insert a user, replacing the mutable profile fields if the id exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the statement fails.
    pub async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users
                 (id, name, email, role, daily_rate, rating, reviews_count, is_verified, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (id) DO UPDATE SET
                 name = EXCLUDED.name,
                 email = EXCLUDED.email,
                 daily_rate = EXCLUDED.daily_rate,
                 rating = EXCLUDED.rating,
                 reviews_count = EXCLUDED.reviews_count,
                 is_verified = EXCLUDED.is_verified,
                 is_active = EXCLUDED.is_active",
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.daily_rate.map(to_db_money).transpose()?)
        .bind(user.rating)
        .bind(to_db_count(user.reviews_count)?)
        .bind(user.is_verified)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::DatabaseError(format!("Failed to insert user: {e}")))?;
        Ok(())
    }

    /// Insert a tour, replacing the listing fields if the id exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the statement fails.
    pub async fn insert_tour(&self, tour: &Tour) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tours
                 (id, guide_id, title, tour_fee, duration_hours, max_group_size, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
                 title = EXCLUDED.title,
                 tour_fee = EXCLUDED.tour_fee,
                 duration_hours = EXCLUDED.duration_hours,
                 max_group_size = EXCLUDED.max_group_size,
                 is_active = EXCLUDED.is_active",
        )
        .bind(tour.id.as_uuid())
        .bind(tour.guide_id.as_uuid())
        .bind(&tour.title)
        .bind(to_db_money(tour.tour_fee)?)
        .bind(to_db_count(tour.duration_hours)?)
        .bind(to_db_count(tour.max_group_size)?)
        .bind(tour.is_active)
        .bind(tour.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::DatabaseError(format!("Failed to insert tour: {e}")))?;
        Ok(())
    }

    async fn stored_version(&self, id: BookingId) -> Result<Option<Version>, StoreError> {
        let version: Option<i64> = sqlx::query_scalar("SELECT version FROM bookings WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Failed to read version: {e}")))?;
        version.map(to_version).transpose()
    }

    async fn scalar(&self, mut builder: QueryBuilder<'_, Postgres>, what: &str) -> Result<u64, StoreError> {
        let value: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Failed to {what}: {e}")))?;
        from_db_u64(value, what)
    }
}

// ============================================================================
// Row mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    daily_rate: Option<i64>,
    rating: Option<f32>,
    reviews_count: i32,
    is_verified: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::from_uuid(row.id),
            name: row.name,
            email: row.email,
            role: parse_column(&row.role)?,
            daily_rate: row.daily_rate.map(|v| from_db_money(v, "daily_rate")).transpose()?,
            rating: row.rating,
            reviews_count: from_db_count(row.reviews_count, "reviews_count")?,
            is_verified: row.is_verified,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TourRow {
    id: Uuid,
    guide_id: Uuid,
    title: String,
    tour_fee: i64,
    duration_hours: i32,
    max_group_size: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<TourRow> for Tour {
    type Error = StoreError;

    fn try_from(row: TourRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TourId::from_uuid(row.id),
            guide_id: UserId::from_uuid(row.guide_id),
            title: row.title,
            tour_fee: from_db_money(row.tour_fee, "tour_fee")?,
            duration_hours: from_db_count(row.duration_hours, "duration_hours")?,
            max_group_size: from_db_count(row.max_group_size, "max_group_size")?,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    tourist_id: Uuid,
    guide_id: Uuid,
    tour_id: Uuid,
    tour_date: DateTime<Utc>,
    number_of_people: i32,
    total_amount: i64,
    status: String,
    payment_status: String,
    special_requests: Option<String>,
    payment_reference: Option<String>,
    refund_amount: Option<i64>,
    commission_amount: Option<i64>,
    payout_amount: Option<i64>,
    cancelled_by: Option<String>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    confirmed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    version: i64,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let settlement = match (row.refund_amount, row.commission_amount, row.payout_amount) {
            (Some(refund), Some(commission), Some(payout)) => Some(Settlement {
                refund_amount: from_db_money(refund, "refund_amount")?,
                commission_amount: from_db_money(commission, "commission_amount")?,
                payout_amount: from_db_money(payout, "payout_amount")?,
            }),
            (None, None, None) => None,
            _ => {
                return Err(StoreError::SerializationError(format!(
                    "booking {} has a partial settlement",
                    row.id
                )));
            },
        };

        Ok(Self {
            id: BookingId::from_uuid(row.id),
            tourist_id: UserId::from_uuid(row.tourist_id),
            guide_id: UserId::from_uuid(row.guide_id),
            tour_id: TourId::from_uuid(row.tour_id),
            date: row.tour_date,
            number_of_people: from_db_count(row.number_of_people, "number_of_people")?,
            total_amount: from_db_money(row.total_amount, "total_amount")?,
            status: parse_column(&row.status)?,
            payment_status: parse_column(&row.payment_status)?,
            special_requests: row.special_requests,
            payment_reference: row.payment_reference.map(PaymentReference::new),
            settlement,
            cancelled_by: row.cancelled_by.as_deref().map(parse_column).transpose()?,
            created_at: row.created_at,
            paid_at: row.paid_at,
            confirmed_at: row.confirmed_at,
            completed_at: row.completed_at,
            cancelled_at: row.cancelled_at,
            version: to_version(row.version)?,
        })
    }
}

fn parse_column<T>(value: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr<Err = crate::types::ParseEnumError>,
{
    value
        .parse()
        .map_err(|e: crate::types::ParseEnumError| StoreError::SerializationError(e.to_string()))
}

fn to_db_money(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.cents())
        .map_err(|_| StoreError::SerializationError(format!("amount {money} exceeds BIGINT")))
}

fn from_db_money(value: i64, column: &str) -> Result<Money, StoreError> {
    from_db_u64(value, column).map(Money::from_cents)
}

fn from_db_u64(value: i64, column: &str) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::SerializationError(format!("negative {column}: {value}")))
}

fn to_db_count(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value)
        .map_err(|_| StoreError::SerializationError(format!("{value} exceeds INTEGER")))
}

fn from_db_count(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value)
        .map_err(|_| StoreError::SerializationError(format!("negative {column}: {value}")))
}

fn to_version(value: i64) -> Result<Version, StoreError> {
    from_db_u64(value, "version").map(Version::new)
}

fn to_db_version(version: Version) -> Result<i64, StoreError> {
    i64::try_from(version.value())
        .map_err(|_| StoreError::SerializationError(format!("version {version} exceeds BIGINT")))
}

fn push_booking_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &BookingFilter) {
    builder.push(" WHERE TRUE");
    if !filter.statuses.is_empty() {
        let statuses: Vec<&'static str> = filter.statuses.iter().map(|s| s.as_str()).collect();
        builder.push(" AND status = ANY(").push_bind(statuses).push(")");
    }
    if let Some(payment_status) = filter.payment_status {
        builder.push(" AND payment_status = ").push_bind(payment_status.as_str());
    }
    if let Some(window) = filter.created {
        builder
            .push(" AND created_at >= ")
            .push_bind(window.start)
            .push(" AND created_at < ")
            .push_bind(window.end);
    }
}

// ============================================================================
// Store
// ============================================================================

impl LedgerStore for PostgresLedger {
    fn get_user(&self, id: UserId) -> BoxFuture<'_, Result<Option<User>, StoreError>> {
        Box::pin(async move {
            let row: Option<UserRow> =
                sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| StoreError::DatabaseError(format!("Failed to query user: {e}")))?;
            row.map(User::try_from).transpose()
        })
    }

    fn get_tour(&self, id: TourId) -> BoxFuture<'_, Result<Option<Tour>, StoreError>> {
        Box::pin(async move {
            let row: Option<TourRow> = sqlx::query_as(
                "SELECT id, guide_id, title, tour_fee, duration_hours, max_group_size, is_active, created_at
                 FROM tours WHERE id = $1",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Failed to query tour: {e}")))?;
            row.map(Tour::try_from).transpose()
        })
    }

    fn get_booking(&self, id: BookingId) -> BoxFuture<'_, Result<Option<Booking>, StoreError>> {
        Box::pin(async move {
            let row: Option<BookingRow> =
                sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| StoreError::DatabaseError(format!("Failed to query booking: {e}")))?;
            row.map(Booking::try_from).transpose()
        })
    }

    fn create_booking(&self, booking: Booking) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let settlement = booking.settlement;
            sqlx::query(
                "INSERT INTO bookings
                     (id, tourist_id, guide_id, tour_id, tour_date, number_of_people, total_amount,
                      status, payment_status, special_requests, payment_reference, refund_amount,
                      commission_amount, payout_amount, cancelled_by, created_at, paid_at,
                      confirmed_at, completed_at, cancelled_at, version)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                         $17, $18, $19, $20, $21)",
            )
            .bind(booking.id.as_uuid())
            .bind(booking.tourist_id.as_uuid())
            .bind(booking.guide_id.as_uuid())
            .bind(booking.tour_id.as_uuid())
            .bind(booking.date)
            .bind(to_db_count(booking.number_of_people)?)
            .bind(to_db_money(booking.total_amount)?)
            .bind(booking.status.as_str())
            .bind(booking.payment_status.as_str())
            .bind(booking.special_requests.as_deref())
            .bind(booking.payment_reference.as_ref().map(PaymentReference::as_str))
            .bind(settlement.map(|s| to_db_money(s.refund_amount)).transpose()?)
            .bind(settlement.map(|s| to_db_money(s.commission_amount)).transpose()?)
            .bind(settlement.map(|s| to_db_money(s.payout_amount)).transpose()?)
            .bind(booking.cancelled_by.map(|by| by.as_str()))
            .bind(booking.created_at)
            .bind(booking.paid_at)
            .bind(booking.confirmed_at)
            .bind(booking.completed_at)
            .bind(booking.cancelled_at)
            .bind(to_db_version(booking.version)?)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    StoreError::Duplicate(booking_key(booking.id))
                },
                other => StoreError::DatabaseError(format!("Failed to insert booking: {other}")),
            })?;
            Ok(())
        })
    }

    fn update_booking(
        &self,
        mut booking: Booking,
        expected: Version,
    ) -> BoxFuture<'_, Result<Booking, StoreError>> {
        Box::pin(async move {
            let settlement = booking.settlement;
            let new_version: Option<i64> = sqlx::query_scalar(
                "UPDATE bookings SET
                     status = $3,
                     payment_status = $4,
                     payment_reference = $5,
                     refund_amount = $6,
                     commission_amount = $7,
                     payout_amount = $8,
                     cancelled_by = $9,
                     paid_at = $10,
                     confirmed_at = $11,
                     completed_at = $12,
                     cancelled_at = $13,
                     version = version + 1
                 WHERE id = $1 AND version = $2
                 RETURNING version",
            )
            .bind(booking.id.as_uuid())
            .bind(to_db_version(expected)?)
            .bind(booking.status.as_str())
            .bind(booking.payment_status.as_str())
            .bind(booking.payment_reference.as_ref().map(PaymentReference::as_str))
            .bind(settlement.map(|s| to_db_money(s.refund_amount)).transpose()?)
            .bind(settlement.map(|s| to_db_money(s.commission_amount)).transpose()?)
            .bind(settlement.map(|s| to_db_money(s.payout_amount)).transpose()?)
            .bind(booking.cancelled_by.map(|by| by.as_str()))
            .bind(booking.paid_at)
            .bind(booking.confirmed_at)
            .bind(booking.completed_at)
            .bind(booking.cancelled_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(
                    format!(
                        "payment_reference:{}",
                        booking.payment_reference.as_ref().map_or("", PaymentReference::as_str)
                    ),
                ),
                other => StoreError::DatabaseError(format!("Failed to update booking: {other}")),
            })?;

            if let Some(version) = new_version {
                booking.version = to_version(version)?;
                return Ok(booking);
            }

            // Nothing matched: either the row is gone or another writer moved it on.
            match self.stored_version(booking.id).await? {
                Some(actual) => Err(StoreError::ConcurrencyConflict {
                    record: booking_key(booking.id),
                    expected,
                    actual,
                }),
                None => Err(StoreError::RecordNotFound(booking_key(booking.id))),
            }
        })
    }

    fn due_for_completion(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Booking>, StoreError>> {
        Box::pin(async move {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows: Vec<BookingRow> = sqlx::query_as(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE status = $1 AND tour_date <= $2
                 ORDER BY tour_date ASC
                 LIMIT $3"
            ))
            .bind(BookingStatus::Confirmed.as_str())
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Failed to query due bookings: {e}")))?;
            rows.into_iter().map(Booking::try_from).collect()
        })
    }

    fn update_user_flags(
        &self,
        id: UserId,
        flags: UserFlags,
    ) -> BoxFuture<'_, Result<User, StoreError>> {
        Box::pin(async move {
            let row: Option<UserRow> = sqlx::query_as(&format!(
                "UPDATE users SET
                     is_active = COALESCE($2, is_active),
                     is_verified = COALESCE($3, is_verified)
                 WHERE id = $1
                 RETURNING {USER_COLUMNS}"
            ))
            .bind(id.as_uuid())
            .bind(flags.is_active)
            .bind(flags.is_verified)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Failed to update user: {e}")))?;

            row.map(User::try_from)
                .transpose()?
                .ok_or_else(|| StoreError::RecordNotFound(format!("user:{id}")))
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map(|_| ())
                .map_err(|e| StoreError::DatabaseError(format!("Ping failed: {e}")))
        })
    }
}

// ============================================================================
// Aggregates
// ============================================================================

impl LedgerAggregates for PostgresLedger {
    fn count_users(&self, filter: UserFilter) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move {
            let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE TRUE");
            if let Some(role) = filter.role {
                builder.push(" AND role = ").push_bind(role.as_str());
            }
            if let Some(window) = filter.created {
                builder
                    .push(" AND created_at >= ")
                    .push_bind(window.start)
                    .push(" AND created_at < ")
                    .push_bind(window.end);
            }
            self.scalar(builder, "count users").await
        })
    }

    fn count_tours(&self, filter: TourFilter) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move {
            let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM tours WHERE TRUE");
            if let Some(active) = filter.active {
                builder.push(" AND is_active = ").push_bind(active);
            }
            self.scalar(builder, "count tours").await
        })
    }

    fn count_bookings(&self, filter: BookingFilter) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move {
            let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM bookings");
            push_booking_filter(&mut builder, &filter);
            self.scalar(builder, "count bookings").await
        })
    }

    fn sum_booking_amounts(&self, filter: BookingFilter) -> BoxFuture<'_, Result<Money, StoreError>> {
        Box::pin(async move {
            let mut builder =
                QueryBuilder::new("SELECT COALESCE(SUM(total_amount), 0)::BIGINT FROM bookings");
            push_booking_filter(&mut builder, &filter);
            self.scalar(builder, "sum booking amounts").await.map(Money::from_cents)
        })
    }

    fn users_by_month(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<MonthlyCount>, StoreError>> {
        Box::pin(async move {
            let rows: Vec<(i32, i32, i64)> = sqlx::query_as(
                "SELECT EXTRACT(YEAR FROM created_at AT TIME ZONE 'UTC')::INT AS year,
                        EXTRACT(MONTH FROM created_at AT TIME ZONE 'UTC')::INT AS month,
                        COUNT(*) AS count
                 FROM users
                 WHERE created_at >= $1
                 GROUP BY 1, 2
                 ORDER BY 1 DESC, 2 DESC",
            )
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Failed to query user growth: {e}")))?;

            rows.into_iter()
                .map(|(year, month, count)| {
                    Ok(MonthlyCount {
                        year,
                        month: from_db_count(month, "month")?,
                        count: from_db_u64(count, "count")?,
                    })
                })
                .collect()
        })
    }

    fn revenue_by_month(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<MonthlyRevenue>, StoreError>> {
        Box::pin(async move {
            let rows: Vec<(i32, i32, i64, i64)> = sqlx::query_as(
                "SELECT EXTRACT(YEAR FROM created_at AT TIME ZONE 'UTC')::INT AS year,
                        EXTRACT(MONTH FROM created_at AT TIME ZONE 'UTC')::INT AS month,
                        COALESCE(SUM(total_amount), 0)::BIGINT AS revenue,
                        COUNT(*) AS bookings
                 FROM bookings
                 WHERE status = $1 AND payment_status = $2 AND created_at >= $3
                 GROUP BY 1, 2
                 ORDER BY 1 DESC, 2 DESC",
            )
            .bind(BookingStatus::Completed.as_str())
            .bind(PaymentStatus::Paid.as_str())
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Failed to query revenue: {e}")))?;

            rows.into_iter()
                .map(|(year, month, revenue, bookings)| {
                    Ok(MonthlyRevenue {
                        year,
                        month: from_db_count(month, "month")?,
                        revenue: from_db_money(revenue, "revenue")?,
                        bookings: from_db_u64(bookings, "bookings")?,
                    })
                })
                .collect()
        })
    }
}
