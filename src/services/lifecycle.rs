use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::queries::{self, StatusChange};
use crate::errors::{BookingError, ValidationError};
use crate::models::{Booking, BookingStatus};

/// Moves a booking along its lifecycle. Finishing a job records how long it
/// actually took so later estimates can learn from it.
pub fn transition_booking(
    conn: &Connection,
    id: &str,
    target: BookingStatus,
    now: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    if target == BookingStatus::Cancelled {
        return cancel_booking(conn, id, None, now);
    }

    let tx = conn.unchecked_transaction()?;
    let booking = load(&tx, id)?;
    if !booking.status.can_transition_to(target) {
        return Err(BookingError::InvalidTransition {
            from: booking.status,
            to: target,
        });
    }
    apply(&tx, &booking, target, now, None)?;

    if target == BookingStatus::Done {
        if let Some(started_at) = booking.started_at {
            let minutes = (now - started_at).num_minutes();
            if minutes > 0 {
                let signature = booking
                    .options
                    .as_ref()
                    .map(|o| o.signature())
                    .unwrap_or_default();
                queries::insert_duration_sample(
                    &tx,
                    &booking.service_id,
                    &signature,
                    minutes as u32,
                    Some(&booking.id),
                )?;
            }
        }
    }
    tx.commit()?;

    tracing::info!(booking_id = id, from = %booking.status, to = %target, "booking status changed");
    load(conn, id)
}

/// Soft-deletes a booking. Cancelling twice returns the booking unchanged.
pub fn cancel_booking(
    conn: &Connection,
    id: &str,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    let booking = load(conn, id)?;
    if booking.status == BookingStatus::Cancelled {
        return Ok(booking);
    }
    if !booking.status.can_transition_to(BookingStatus::Cancelled) {
        return Err(BookingError::InvalidTransition {
            from: booking.status,
            to: BookingStatus::Cancelled,
        });
    }

    apply(conn, &booking, BookingStatus::Cancelled, now, reason)?;
    tracing::info!(booking_id = id, reason = reason.unwrap_or(""), "booking cancelled");
    load(conn, id)
}

/// Records a measured duration for a booking's job outside the lifecycle.
pub fn record_actual_duration(
    conn: &Connection,
    id: &str,
    minutes: u32,
) -> Result<(), BookingError> {
    if minutes == 0 {
        return Err(ValidationError::new("minutes", "duration must be positive").into());
    }
    let booking = load(conn, id)?;
    let signature = booking
        .options
        .as_ref()
        .map(|o| o.signature())
        .unwrap_or_default();
    queries::insert_duration_sample(conn, &booking.service_id, &signature, minutes, Some(id))?;
    tracing::info!(booking_id = id, minutes, "duration sample recorded");
    Ok(())
}

fn load(conn: &Connection, id: &str) -> Result<Booking, BookingError> {
    queries::get_booking_by_id(conn, id)?.ok_or_else(|| BookingError::NotFound(format!("booking {id}")))
}

fn apply(
    conn: &Connection,
    booking: &Booking,
    target: BookingStatus,
    now: DateTime<Utc>,
    reason: Option<&str>,
) -> Result<(), BookingError> {
    let change = StatusChange {
        from: booking.status,
        to: target,
        at: now,
        cancel_reason: reason,
    };
    if queries::update_booking_status(conn, &booking.id, &change)? {
        return Ok(());
    }
    // Someone else moved it first.
    let current = load(conn, &booking.id)?;
    Err(BookingError::InvalidTransition {
        from: current.status,
        to: target,
    })
}
