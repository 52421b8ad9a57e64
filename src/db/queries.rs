use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Booking, BookingStatus, Category, Customer, OptionsPayload, Resource, ResourceClaim,
    ResourceType, Service, TimeOfDay, TimeRange, VisitMode, WorkingDay,
};

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fixed-width UTC text, so SQL string comparison orders like time.
pub fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = chrono::NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .with_context(|| format!("invalid stored timestamp: {s}"))?;
    Ok(naive.and_utc())
}

fn parse_opt_ts(s: Option<String>) -> anyhow::Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

fn fmt_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

// ── Organizations ──

pub fn save_org(conn: &Connection, id: &str, name: &str, timezone: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO orgs (id, name, timezone) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, timezone = excluded.timezone",
        params![id, name, timezone],
    )?;
    Ok(())
}

pub fn get_org_timezone(conn: &Connection, id: &str) -> anyhow::Result<Option<String>> {
    let tz = conn
        .query_row("SELECT timezone FROM orgs WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(tz)
}

// ── Working hours ──

pub struct WorkingHoursLayer<'a> {
    pub weekday: u32,
    pub day: &'a WorkingDay,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

pub fn insert_working_hours(
    conn: &Connection,
    org_id: &str,
    layer: &WorkingHoursLayer<'_>,
) -> anyhow::Result<()> {
    let breaks = serde_json::to_string(&layer.day.breaks)?;
    conn.execute(
        "INSERT INTO working_hours (org_id, weekday, open_time, close_time, breaks, effective_from, effective_to)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            org_id,
            layer.weekday,
            layer.day.open.map(|t| t.to_string()),
            layer.day.close.map(|t| t.to_string()),
            breaks,
            fmt_date(&layer.effective_from),
            layer.effective_to.as_ref().map(fmt_date),
        ],
    )?;
    Ok(())
}

/// Latest layer in effect on `date` for the weekday; bounded layers win ties
/// against open-ended ones.
pub fn find_working_hours(
    conn: &Connection,
    org_id: &str,
    weekday: u32,
    date: &NaiveDate,
) -> anyhow::Result<Option<WorkingDay>> {
    let date = fmt_date(date);
    let row = conn
        .query_row(
            "SELECT open_time, close_time, breaks FROM working_hours
             WHERE org_id = ?1 AND weekday = ?2 AND effective_from <= ?3
               AND (effective_to IS NULL OR effective_to >= ?3)
             ORDER BY effective_from DESC, effective_to IS NULL ASC, id DESC
             LIMIT 1",
            params![org_id, weekday, date],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((open, close, breaks)) = row else {
        return Ok(None);
    };

    let open = open.as_deref().map(TimeOfDay::parse).transpose()?;
    let close = close.as_deref().map(TimeOfDay::parse).transpose()?;
    let breaks = serde_json::from_str(&breaks).context("invalid stored breaks")?;
    Ok(Some(WorkingDay { open, close, breaks }))
}

// ── Services ──

pub fn save_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, org_id, name, category, price_cents, buffer_before_min, buffer_after_min, default_minutes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           category = excluded.category,
           price_cents = excluded.price_cents,
           buffer_before_min = excluded.buffer_before_min,
           buffer_after_min = excluded.buffer_after_min,
           default_minutes = excluded.default_minutes",
        params![
            service.id,
            service.org_id,
            service.name,
            service.category.as_str(),
            service.price_cents,
            service.buffer_before_min,
            service.buffer_after_min,
            service.default_minutes,
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let row = conn
        .query_row(
            "SELECT id, org_id, name, category, price_cents, buffer_before_min, buffer_after_min, default_minutes
             FROM services WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    Service {
                        id: row.get(0)?,
                        org_id: row.get(1)?,
                        name: row.get(2)?,
                        category: Category::Car,
                        price_cents: row.get(4)?,
                        buffer_before_min: row.get(5)?,
                        buffer_after_min: row.get(6)?,
                        default_minutes: row.get(7)?,
                    },
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((mut service, category)) => {
            service.category = Category::parse(&category)
                .with_context(|| format!("unknown stored category: {category}"))?;
            Ok(Some(service))
        }
        None => Ok(None),
    }
}

// ── Resources ──

pub fn save_resource(conn: &Connection, resource: &Resource) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO resources (id, org_id, name, resource_type, capacity, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           resource_type = excluded.resource_type,
           capacity = excluded.capacity,
           active = excluded.active",
        params![
            resource.id,
            resource.org_id,
            resource.name,
            resource.resource_type.as_str(),
            resource.capacity,
            resource.active as i32,
        ],
    )?;
    Ok(())
}

pub fn get_resource(conn: &Connection, id: &str) -> anyhow::Result<Option<Resource>> {
    let resource = conn
        .query_row(
            "SELECT id, org_id, name, resource_type, capacity, active FROM resources WHERE id = ?1",
            params![id],
            |row| Ok(parse_resource_row(row)),
        )
        .optional()?;
    resource.transpose()
}

pub fn list_active_resources(
    conn: &Connection,
    org_id: &str,
    resource_type: ResourceType,
) -> anyhow::Result<Vec<Resource>> {
    let mut stmt = conn.prepare(
        "SELECT id, org_id, name, resource_type, capacity, active FROM resources
         WHERE org_id = ?1 AND resource_type = ?2 AND active = 1
         ORDER BY name ASC, id ASC",
    )?;

    let rows = stmt.query_map(params![org_id, resource_type.as_str()], |row| {
        Ok(parse_resource_row(row))
    })?;

    let mut resources = vec![];
    for row in rows {
        resources.push(row??);
    }
    Ok(resources)
}

fn parse_resource_row(row: &rusqlite::Row) -> anyhow::Result<Resource> {
    let kind: String = row.get(3)?;
    Ok(Resource {
        id: row.get(0)?,
        org_id: row.get(1)?,
        name: row.get(2)?,
        resource_type: ResourceType::parse(&kind)
            .with_context(|| format!("unknown stored resource type: {kind}"))?,
        capacity: row.get(4)?,
        active: row.get::<_, i32>(5)? != 0,
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, org_id, service_id, customer_name, customer_phone, customer_email, \
     start_time, end_time, duration_min, status, visit_mode, options, cancel_reason, \
     created_at, updated_at, cancelled_at, started_at, finished_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let options = booking
        .options
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO bookings (id, org_id, service_id, customer_name, customer_phone, customer_email,
                               start_time, end_time, duration_min, status, visit_mode, options,
                               created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            booking.id,
            booking.org_id,
            booking.service_id,
            booking.customer.name,
            booking.customer.phone,
            booking.customer.email,
            fmt_ts(&booking.start),
            fmt_ts(&booking.end),
            booking.duration_min,
            booking.status.as_str(),
            booking.visit_mode.as_str(),
            options,
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;

    insert_claims(conn, &booking.id, &booking.claims)
}

fn insert_claims(conn: &Connection, booking_id: &str, claims: &[ResourceClaim]) -> anyhow::Result<()> {
    for claim in claims {
        conn.execute(
            "INSERT INTO booking_claims (booking_id, resource_id, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                booking_id,
                claim.resource_id,
                fmt_ts(&claim.range.start),
                fmt_ts(&claim.range.end),
            ],
        )?;
    }
    Ok(())
}

/// Rewrites the editable fields of a pending booking and swaps its claims.
/// Returns false, leaving everything untouched, when the booking is no
/// longer pending.
pub fn update_pending_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let options = booking
        .options
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let count = conn.execute(
        "UPDATE bookings SET
           service_id = ?1, customer_name = ?2, customer_phone = ?3, customer_email = ?4,
           start_time = ?5, end_time = ?6, duration_min = ?7, visit_mode = ?8, options = ?9,
           status = 'pending', updated_at = ?10
         WHERE id = ?11 AND status IN ('pending', 'confirmed')",
        params![
            booking.service_id,
            booking.customer.name,
            booking.customer.phone,
            booking.customer.email,
            fmt_ts(&booking.start),
            fmt_ts(&booking.end),
            booking.duration_min,
            booking.visit_mode.as_str(),
            options,
            fmt_ts(&booking.updated_at),
            booking.id,
        ],
    )?;
    if count == 0 {
        return Ok(false);
    }

    conn.execute(
        "DELETE FROM booking_claims WHERE booking_id = ?1",
        params![booking.id],
    )?;
    insert_claims(conn, &booking.id, &booking.claims)?;
    Ok(true)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
    let booking = conn
        .query_row(&sql, params![id], |row| Ok(parse_booking_row(row)))
        .optional()?
        .transpose()?;

    match booking {
        Some(mut booking) => {
            booking.claims = get_claims_for_booking(conn, &booking.id)?;
            Ok(Some(booking))
        }
        None => Ok(None),
    }
}

/// Bookings of an organization starting before `end` and ending after `start`.
pub fn get_bookings_in_range(
    conn: &Connection,
    org_id: &str,
    range: &TimeRange<DateTime<Utc>>,
    blocking_only: bool,
) -> anyhow::Result<Vec<Booking>> {
    let status_filter = if blocking_only {
        " AND status IN ('pending', 'confirmed', 'in_service')"
    } else {
        ""
    };
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE org_id = ?1 AND start_time < ?3 AND end_time > ?2{status_filter}
         ORDER BY start_time ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![org_id, fmt_ts(&range.start), fmt_ts(&range.end)],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    for booking in &mut bookings {
        booking.claims = get_claims_for_booking(conn, &booking.id)?;
    }
    Ok(bookings)
}

pub struct StatusChange<'a> {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub at: DateTime<Utc>,
    pub cancel_reason: Option<&'a str>,
}

/// Compare-and-set on the stored status. Returns false when the booking is no
/// longer in `change.from`.
pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    change: &StatusChange<'_>,
) -> anyhow::Result<bool> {
    let at = fmt_ts(&change.at);
    let started_at = (change.to == BookingStatus::InService).then(|| at.clone());
    let finished_at = (change.to == BookingStatus::Done).then(|| at.clone());
    let cancelled_at = (change.to == BookingStatus::Cancelled).then(|| at.clone());

    let count = conn.execute(
        "UPDATE bookings SET
           status = ?1,
           updated_at = ?2,
           started_at = COALESCE(?3, started_at),
           finished_at = COALESCE(?4, finished_at),
           cancelled_at = COALESCE(?5, cancelled_at),
           cancel_reason = COALESCE(?6, cancel_reason)
         WHERE id = ?7 AND (status = ?8 OR (?8 = 'pending' AND status = 'confirmed'))",
        params![
            change.to.as_str(),
            at,
            started_at,
            finished_at,
            cancelled_at,
            change.cancel_reason,
            id,
            change.from.as_str(),
        ],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let start: String = row.get(6)?;
    let end: String = row.get(7)?;
    let status: String = row.get(9)?;
    let visit_mode: String = row.get(10)?;
    let options: Option<String> = row.get(11)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    let options: Option<OptionsPayload> = options
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .context("invalid stored options payload")?;

    Ok(Booking {
        id: row.get(0)?,
        org_id: row.get(1)?,
        service_id: row.get(2)?,
        customer: Customer {
            name: row.get(3)?,
            phone: row.get(4)?,
            email: row.get(5)?,
        },
        start: parse_ts(&start)?,
        end: parse_ts(&end)?,
        duration_min: row.get(8)?,
        status: BookingStatus::parse(&status)
            .with_context(|| format!("unknown stored status: {status}"))?,
        visit_mode: VisitMode::parse(&visit_mode),
        options,
        claims: vec![],
        cancel_reason: row.get(12)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
        cancelled_at: parse_opt_ts(row.get(15)?)?,
        started_at: parse_opt_ts(row.get(16)?)?,
        finished_at: parse_opt_ts(row.get(17)?)?,
    })
}

// ── Claims ──

pub fn get_claims_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<ResourceClaim>> {
    let mut stmt = conn.prepare(
        "SELECT resource_id, start_time, end_time FROM booking_claims
         WHERE booking_id = ?1 ORDER BY resource_id ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut claims = vec![];
    for row in rows {
        let (resource_id, start, end) = row?;
        claims.push(ResourceClaim {
            resource_id,
            range: TimeRange {
                start: parse_ts(&start)?,
                end: parse_ts(&end)?,
            },
        });
    }
    Ok(claims)
}

/// Claims held on a resource by blocking bookings that overlap `range`,
/// leaving out the claims of `except_booking`.
pub fn get_active_claims(
    conn: &Connection,
    resource_id: &str,
    range: &TimeRange<DateTime<Utc>>,
    except_booking: Option<&str>,
) -> anyhow::Result<Vec<TimeRange<DateTime<Utc>>>> {
    let mut stmt = conn.prepare(
        "SELECT c.start_time, c.end_time FROM booking_claims c
         JOIN bookings b ON b.id = c.booking_id
         WHERE c.resource_id = ?1
           AND b.status IN ('pending', 'confirmed', 'in_service')
           AND c.start_time < ?3 AND c.end_time > ?2
           AND (?4 IS NULL OR b.id <> ?4)
         ORDER BY c.start_time ASC",
    )?;
    let rows = stmt.query_map(
        params![resource_id, fmt_ts(&range.start), fmt_ts(&range.end), except_booking],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )?;

    let mut claims = vec![];
    for row in rows {
        let (start, end) = row?;
        claims.push(TimeRange {
            start: parse_ts(&start)?,
            end: parse_ts(&end)?,
        });
    }
    Ok(claims)
}

// ── Duration samples ──

pub fn insert_duration_sample(
    conn: &Connection,
    service_id: &str,
    signature: &str,
    minutes: u32,
    booking_id: Option<&str>,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO duration_samples (service_id, signature, minutes, booking_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![service_id, signature, minutes, booking_id],
    )?;
    Ok(())
}

pub fn get_duration_samples(
    conn: &Connection,
    service_id: &str,
    signature: &str,
    limit: i64,
) -> anyhow::Result<Vec<u32>> {
    let mut stmt = conn.prepare(
        "SELECT minutes FROM duration_samples
         WHERE service_id = ?1 AND signature = ?2
         ORDER BY id DESC LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![service_id, signature, limit], |row| row.get(0))?;

    let mut samples = vec![];
    for row in rows {
        samples.push(row?);
    }
    Ok(samples)
}
