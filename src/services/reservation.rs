use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, DurationRound, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::db::{self, queries};
use crate::errors::{BookingError, ValidationError};
use crate::models::{
    Booking, BookingStatus, Customer, OptionsPayload, Resource, ResourceClaim,
    ResourceRequirement, ResourceType, TimeRange, VisitMode,
};
use crate::services::clock::parse_timezone;
use crate::services::scheduling::{resource_is_free, validate_booking_time};
use crate::services::working_hours::resolve_working_day;

/// Per-resource exclusive locks serializing the claim step. Acquired in sorted
/// id order so two reservations can never wait on each other.
#[derive(Default)]
pub struct ClaimLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ClaimLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every id, or gives up after `timeout`.
    pub async fn acquire(
        &self,
        ids: &[String],
        timeout: StdDuration,
    ) -> Option<Vec<OwnedMutexGuard<()>>> {
        let mut ids: Vec<&String> = ids.iter().collect();
        ids.sort();
        ids.dedup();

        let mutexes: Vec<Arc<tokio::sync::Mutex<()>>> = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            ids.iter()
                .map(|id| Arc::clone(locks.entry((*id).clone()).or_default()))
                .collect()
        };

        tokio::time::timeout(timeout, async move {
            let mut guards = Vec::with_capacity(mutexes.len());
            for m in mutexes {
                guards.push(m.lock_owned().await);
            }
            guards
        })
        .await
        .ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationRequest {
    pub service_id: String,
    pub start: DateTime<Utc>,
    pub duration_min: u32,
    pub customer: Customer,
    #[serde(default)]
    pub visit_mode: VisitMode,
    #[serde(default)]
    pub options: Option<OptionsPayload>,
    /// Overrides the requirements derived from the options.
    #[serde(default)]
    pub requirements: Option<Vec<ResourceRequirement>>,
}

pub struct ClaimSettings<'a> {
    pub locks: &'a ClaimLocks,
    pub timeout: StdDuration,
    pub now: DateTime<Utc>,
}

/// Resource types a job needs when the request does not name them.
pub fn requirements_for(options: Option<&OptionsPayload>) -> Vec<ResourceRequirement> {
    let Some(options) = options else {
        return vec![
            ResourceRequirement::one(ResourceType::Lift),
            ResourceRequirement::one(ResourceType::TireMachine),
        ];
    };
    if options.puncture() {
        return vec![ResourceRequirement::one(ResourceType::Lift)];
    }

    let mut reqs = vec![
        ResourceRequirement::one(ResourceType::Lift),
        ResourceRequirement::one(ResourceType::TireMachine),
    ];
    if options.wants_balancing() {
        reqs.push(ResourceRequirement::one(ResourceType::Balancer));
    }
    if options.wants_alignment() {
        reqs.push(ResourceRequirement::one(ResourceType::AlignmentBay));
    }
    if options.wants_water_fill() {
        reqs.push(ResourceRequirement::one(ResourceType::WaterStation));
    }
    reqs
}

/// Changes to a pending booking. Omitted fields keep their current value;
/// omitted requirements are derived again from the options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RescheduleRequest {
    pub service_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub duration_min: Option<u32>,
    pub customer: Option<Customer>,
    pub visit_mode: Option<VisitMode>,
    pub options: Option<OptionsPayload>,
    pub requirements: Option<Vec<ResourceRequirement>>,
}

struct Plan {
    booking: Booking,
    claim_range: TimeRange<DateTime<Utc>>,
    candidates: Vec<(ResourceRequirement, Vec<Resource>)>,
}

impl Plan {
    fn resource_ids(&self) -> Vec<String> {
        self.candidates
            .iter()
            .flat_map(|(_, resources)| resources.iter().map(|r| r.id.clone()))
            .collect()
    }
}

/// Claims resources for the requested window and creates a pending booking.
/// Losing a race, or waiting too long for the claim locks, is `SlotTaken`.
pub async fn reserve_slot(
    db: &Mutex<Connection>,
    claims: &ClaimSettings<'_>,
    org_id: &str,
    mut req: ReservationRequest,
) -> Result<Booking, BookingError> {
    validate_request(&req)?;
    req.start = booking_start(req.start, claims.now)?;

    let plan = {
        let conn = db::lock(db);
        plan_reservation(&conn, org_id, req, claims.now)?
    };

    let _guards = lock_resources(claims, &plan).await?;
    let mut conn = db::lock(db);
    commit_claims(&mut conn, plan)
}

/// Moves or edits a pending booking. Its old claims are released and the new
/// ones taken in the same transaction, so a failed move leaves the booking
/// exactly as it was.
pub async fn reschedule_booking(
    db: &Mutex<Connection>,
    claims: &ClaimSettings<'_>,
    booking_id: &str,
    changes: RescheduleRequest,
) -> Result<Booking, BookingError> {
    let current = {
        let conn = db::lock(db);
        queries::get_booking_by_id(&conn, booking_id)?
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?
    };
    if current.status != BookingStatus::Pending {
        return Err(BookingError::InvalidTransition {
            from: current.status,
            to: BookingStatus::Pending,
        });
    }

    // An unchanged start may already be in the past for a late customer.
    let start = match changes.start {
        Some(start) => booking_start(start, claims.now)?,
        None => current.start,
    };
    let req = ReservationRequest {
        service_id: changes.service_id.unwrap_or_else(|| current.service_id.clone()),
        start,
        duration_min: changes.duration_min.unwrap_or(current.duration_min),
        customer: changes.customer.unwrap_or_else(|| current.customer.clone()),
        visit_mode: changes.visit_mode.unwrap_or(current.visit_mode),
        options: changes.options.or_else(|| current.options.clone()),
        requirements: changes.requirements,
    };
    validate_request(&req)?;

    let mut plan = {
        let conn = db::lock(db);
        plan_reservation(&conn, &current.org_id, req, claims.now)?
    };
    plan.booking.id = current.id;
    plan.booking.created_at = current.created_at;

    let _guards = lock_resources(claims, &plan).await?;
    let mut conn = db::lock(db);
    commit_move(&mut conn, plan)
}

fn validate_request(req: &ReservationRequest) -> Result<(), ValidationError> {
    if req.duration_min == 0 {
        return Err(ValidationError::new("duration_min", "duration must be positive"));
    }
    if req.customer.name.trim().is_empty() {
        return Err(ValidationError::new("customer.name", "customer name is required"));
    }
    if let Some(options) = &req.options {
        options.validate()?;
    }
    if let Some(reqs) = &req.requirements {
        if let Some(r) = reqs.iter().find(|r| r.count == 0) {
            return Err(ValidationError::new(
                "requirements",
                format!("{} requested zero times", r.resource_type),
            ));
        }
    }
    Ok(())
}

/// Truncates a requested start to the minute, then rejects it if it is
/// already past.
fn booking_start(start: DateTime<Utc>, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
    let start = start
        .duration_trunc(Duration::minutes(1))
        .map_err(|e| ValidationError::new("start", e.to_string()))?;
    if start < now {
        return Err(ValidationError::new("start", "cannot book a time in the past"));
    }
    Ok(start)
}

fn plan_reservation(
    conn: &Connection,
    org_id: &str,
    req: ReservationRequest,
    now: DateTime<Utc>,
) -> Result<Plan, BookingError> {
    let service = queries::get_service(conn, &req.service_id)?
        .ok_or_else(|| BookingError::NotFound(format!("service {}", req.service_id)))?;
    if service.org_id != org_id {
        return Err(ValidationError::new("service_id", "service belongs to another organization").into());
    }
    if let Some(options) = &req.options {
        if options.category() != service.category {
            return Err(ValidationError::new(
                "options",
                format!(
                    "options are for {} but the service is {}",
                    options.category(),
                    service.category
                ),
            )
            .into());
        }
    }

    let tz_name = queries::get_org_timezone(conn, org_id)?
        .ok_or_else(|| BookingError::NotFound(format!("organization {org_id}")))?;
    let tz = parse_timezone(&tz_name)?;

    let start = req.start;
    let end = start + Duration::minutes(i64::from(req.duration_min));
    let range = TimeRange { start, end };

    let date = start.with_timezone(&tz).date_naive();
    let day = resolve_working_day(conn, org_id, date)?;
    validate_booking_time(day.as_ref(), date, tz, &range)?;

    let requirements = req
        .requirements
        .clone()
        .unwrap_or_else(|| requirements_for(req.options.as_ref()));

    let mut candidates = Vec::with_capacity(requirements.len());
    for requirement in requirements {
        let resources = queries::list_active_resources(conn, org_id, requirement.resource_type)?;
        if resources.len() < requirement.count as usize {
            return Err(BookingError::ResourceUnavailable(requirement.resource_type));
        }
        candidates.push((requirement, resources));
    }

    let buffers = service.buffers();
    let claim_range = TimeRange {
        start: start - Duration::minutes(i64::from(buffers.before_min)),
        end: end + Duration::minutes(i64::from(buffers.after_min)),
    };

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        org_id: org_id.to_string(),
        service_id: service.id,
        customer: req.customer,
        start,
        end,
        duration_min: req.duration_min,
        status: BookingStatus::Pending,
        visit_mode: req.visit_mode,
        options: req.options,
        claims: vec![],
        cancel_reason: None,
        created_at: now,
        updated_at: now,
        cancelled_at: None,
        started_at: None,
        finished_at: None,
    };

    Ok(Plan {
        booking,
        claim_range,
        candidates,
    })
}

async fn lock_resources(
    claims: &ClaimSettings<'_>,
    plan: &Plan,
) -> Result<Vec<OwnedMutexGuard<()>>, BookingError> {
    match claims.locks.acquire(&plan.resource_ids(), claims.timeout).await {
        Some(guards) => Ok(guards),
        None => {
            tracing::warn!(start = %plan.booking.start, "timed out waiting for claim locks");
            Err(BookingError::SlotTaken(
                "resources are busy, query the slots again".to_string(),
            ))
        }
    }
}

/// Picks the first free instance for every requirement, never the same
/// resource twice.
fn choose_resources(
    conn: &Connection,
    plan: &Plan,
    except_booking: Option<&str>,
) -> Result<Vec<ResourceClaim>, BookingError> {
    let mut chosen: Vec<String> = Vec::new();
    for (requirement, resources) in &plan.candidates {
        let mut needed = requirement.count as usize;
        for candidate in resources {
            if needed == 0 {
                break;
            }
            if chosen.contains(&candidate.id) {
                continue;
            }
            // The catalog may have changed since planning.
            let Some(current) = queries::get_resource(conn, &candidate.id)? else {
                continue;
            };
            if resource_is_free(conn, &current, &plan.claim_range, except_booking)? {
                chosen.push(current.id);
                needed -= 1;
            }
        }
        if needed > 0 {
            tracing::warn!(
                booking_start = %plan.booking.start,
                resource_type = %requirement.resource_type,
                "no free resource instance"
            );
            return Err(BookingError::SlotTaken(format!(
                "no free {} for the requested time",
                requirement.resource_type
            )));
        }
    }

    Ok(chosen
        .into_iter()
        .map(|resource_id| ResourceClaim {
            resource_id,
            range: plan.claim_range,
        })
        .collect())
}

/// Re-checks every candidate inside one immediate transaction and writes the
/// booking with its claims, or nothing.
fn commit_claims(conn: &mut Connection, plan: Plan) -> Result<Booking, BookingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let claims = choose_resources(&tx, &plan, None)?;
    let mut booking = plan.booking;
    booking.claims = claims;

    queries::insert_booking(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        org_id = %booking.org_id,
        start = %booking.start,
        duration_min = booking.duration_min,
        claims = booking.claims.len(),
        "booking reserved"
    );
    Ok(booking)
}

/// Like `commit_claims`, but the booking's own claims don't count against the
/// new window and are replaced instead of added to.
fn commit_move(conn: &mut Connection, plan: Plan) -> Result<Booking, BookingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let claims = choose_resources(&tx, &plan, Some(plan.booking.id.as_str()))?;
    let mut booking = plan.booking;
    booking.claims = claims;

    if !queries::update_pending_booking(&tx, &booking)? {
        // Started, finished or cancelled while the move was being planned.
        let stored = queries::get_booking_by_id(&tx, &booking.id)?
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking.id)))?;
        return Err(BookingError::InvalidTransition {
            from: stored.status,
            to: BookingStatus::Pending,
        });
    }
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        start = %booking.start,
        duration_min = booking.duration_min,
        claims = booking.claims.len(),
        "booking rescheduled"
    );
    Ok(booking)
}
