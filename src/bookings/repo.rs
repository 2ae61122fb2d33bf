use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::bookings::repo_types::{Booking, BookingFilter, BookingRow, BookingStatus, NewBooking};
use crate::pagination::PageRequest;

/// Storage port for bookings. Every returned `Booking` carries its item's
/// name and owner.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Booking>>;
    /// Persists a new booking in `WAITING`.
    async fn insert(&self, booking: NewBooking) -> anyhow::Result<Booking>;
    /// Moves `id` from `from` to `to` only if it is still in `from`.
    /// `None` means nothing matched.
    async fn update_status(
        &self,
        id: i64,
        from: BookingStatus,
        to: BookingStatus,
    ) -> anyhow::Result<Option<Booking>>;
    /// Lowest-id `WAITING` booking on any item owned by `owner_id`.
    async fn first_waiting_for_owner(&self, owner_id: i64) -> anyhow::Result<Option<Booking>>;
    async fn list_by_booker(
        &self,
        booker_id: i64,
        filter: BookingFilter,
        page: PageRequest,
    ) -> anyhow::Result<Vec<Booking>>;
    async fn list_by_owner(
        &self,
        owner_id: i64,
        filter: BookingFilter,
        page: PageRequest,
    ) -> anyhow::Result<Vec<Booking>>;
    /// Approved booking on `item_id` with the greatest `start` before `now`.
    async fn last_approved_before(
        &self,
        item_id: i64,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Booking>>;
    /// Approved booking on `item_id` with the smallest `start` after `now`.
    async fn next_approved_after(
        &self,
        item_id: i64,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Booking>>;
    async fn approved_for_items(&self, item_ids: &[i64]) -> anyhow::Result<Vec<Booking>>;
    /// Whether `booker_id` holds any booking on `item_id` ending before `now`,
    /// whatever its status.
    async fn has_finished(
        &self,
        booker_id: i64,
        item_id: i64,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool>;
}

const SELECT_BOOKING: &str = r#"
    SELECT b.id, b.start_at, b.end_at, b.status, b.item_id,
           i.name AS item_name, i.owner_id, b.booker_id
      FROM bookings b
      JOIN items i ON i.id = b.item_id
"#;

#[derive(Clone)]
pub struct PgBookingStore {
    db: PgPool,
}

impl PgBookingStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_page(
        &self,
        column: &str,
        user_id: i64,
        filter: BookingFilter,
        page: PageRequest,
    ) -> anyhow::Result<Vec<Booking>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_BOOKING);
        qb.push(" WHERE ").push(column).push(" = ").push_bind(user_id);
        push_filter(&mut qb, filter);
        let dir = page.direction.as_sql();
        qb.push(format!(" ORDER BY b.start_at {dir}, b.id {dir}"));
        qb.push(" LIMIT ").push_bind(page.limit);
        qb.push(" OFFSET ").push_bind(page.offset);

        let rows = qb
            .build_query_as::<BookingRow>()
            .fetch_all(&self.db)
            .await
            .context("list bookings")?;
        into_bookings(rows)
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: BookingFilter) {
    match filter {
        BookingFilter::All => {}
        BookingFilter::Current(now) => {
            qb.push(" AND b.start_at <= ").push_bind(now);
            qb.push(" AND b.end_at >= ").push_bind(now);
        }
        BookingFilter::Past(now) => {
            qb.push(" AND b.end_at < ").push_bind(now);
        }
        BookingFilter::Future(now) => {
            qb.push(" AND b.start_at > ").push_bind(now);
        }
        BookingFilter::Status(status) => {
            qb.push(" AND b.status = ").push_bind(status.as_str());
        }
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> anyhow::Result<Vec<Booking>> {
    rows.into_iter()
        .map(|r| Booking::try_from(r).map_err(anyhow::Error::from))
        .collect()
}

fn into_booking(row: Option<BookingRow>) -> anyhow::Result<Option<Booking>> {
    row.map(Booking::try_from)
        .transpose()
        .map_err(anyhow::Error::from)
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("{SELECT_BOOKING} WHERE b.id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find booking by id")?;
        into_booking(row)
    }

    async fn insert(&self, booking: NewBooking) -> anyhow::Result<Booking> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            WITH inserted AS (
                INSERT INTO bookings (start_at, end_at, item_id, booker_id, status)
                VALUES ($1, $2, $3, $4, 'WAITING')
                RETURNING id, start_at, end_at, status, item_id, booker_id
            )
            SELECT b.id, b.start_at, b.end_at, b.status, b.item_id,
                   i.name AS item_name, i.owner_id, b.booker_id
              FROM inserted b
              JOIN items i ON i.id = b.item_id
            "#,
        )
        .bind(booking.start)
        .bind(booking.end)
        .bind(booking.item_id)
        .bind(booking.booker_id)
        .fetch_one(&self.db)
        .await
        .context("insert booking")?;
        Ok(Booking::try_from(row)?)
    }

    async fn update_status(
        &self,
        id: i64,
        from: BookingStatus,
        to: BookingStatus,
    ) -> anyhow::Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            WITH updated AS (
                UPDATE bookings
                   SET status = $3
                 WHERE id = $1 AND status = $2
                RETURNING id, start_at, end_at, status, item_id, booker_id
            )
            SELECT b.id, b.start_at, b.end_at, b.status, b.item_id,
                   i.name AS item_name, i.owner_id, b.booker_id
              FROM updated b
              JOIN items i ON i.id = b.item_id
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.db)
        .await
        .context("update booking status")?;
        into_booking(row)
    }

    async fn first_waiting_for_owner(&self, owner_id: i64) -> anyhow::Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "{SELECT_BOOKING} WHERE i.owner_id = $1 AND b.status = 'WAITING' ORDER BY b.id ASC LIMIT 1"
        ))
        .bind(owner_id)
        .fetch_optional(&self.db)
        .await
        .context("first waiting booking for owner")?;
        into_booking(row)
    }

    async fn list_by_booker(
        &self,
        booker_id: i64,
        filter: BookingFilter,
        page: PageRequest,
    ) -> anyhow::Result<Vec<Booking>> {
        self.fetch_page("b.booker_id", booker_id, filter, page).await
    }

    async fn list_by_owner(
        &self,
        owner_id: i64,
        filter: BookingFilter,
        page: PageRequest,
    ) -> anyhow::Result<Vec<Booking>> {
        self.fetch_page("i.owner_id", owner_id, filter, page).await
    }

    async fn last_approved_before(
        &self,
        item_id: i64,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "{SELECT_BOOKING} WHERE b.item_id = $1 AND b.status = 'APPROVED' AND b.start_at < $2 \
             ORDER BY b.start_at DESC, b.id ASC LIMIT 1"
        ))
        .bind(item_id)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("last approved booking")?;
        into_booking(row)
    }

    async fn next_approved_after(
        &self,
        item_id: i64,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "{SELECT_BOOKING} WHERE b.item_id = $1 AND b.status = 'APPROVED' AND b.start_at > $2 \
             ORDER BY b.start_at ASC, b.id ASC LIMIT 1"
        ))
        .bind(item_id)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("next approved booking")?;
        into_booking(row)
    }

    async fn approved_for_items(&self, item_ids: &[i64]) -> anyhow::Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{SELECT_BOOKING} WHERE b.item_id = ANY($1) AND b.status = 'APPROVED' ORDER BY b.id ASC"
        ))
        .bind(item_ids)
        .fetch_all(&self.db)
        .await
        .context("approved bookings for items")?;
        into_bookings(rows)
    }

    async fn has_finished(
        &self,
        booker_id: i64,
        item_id: i64,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                  FROM bookings
                 WHERE booker_id = $1 AND item_id = $2 AND end_at < $3
            )
            "#,
        )
        .bind(booker_id)
        .bind(item_id)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .context("finished booking lookup")?;
        Ok(found)
    }
}
