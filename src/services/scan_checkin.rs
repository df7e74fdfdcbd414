use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::{
    event::Event,
    scan::{CreateScanData, Scan},
    service::Service,
    veteran::Veteran,
};

#[derive(thiserror::Error, Debug)]
pub enum CheckInError {
    #[error("Error processing Scan")]
    Database(#[from] sqlx::Error),
}

/// A card presented at an event, optionally at a specific service table
#[derive(Debug, Clone)]
pub struct CheckIn {
    pub event_id: Uuid,
    pub card_number: i32,
    pub service_id: Option<Uuid>,
    pub plus_one: bool,
    pub scan_by_id: Uuid,
}

#[derive(Debug, Clone)]
pub enum CheckInResult {
    Recorded(Scan),
    AlreadyRecorded(Scan),
    EventNotFound { event_id: Uuid },
    NotEnrolled { card_number: i32 },
    ServiceNotFound { service_id: Uuid },
    NotCheckedIn { veteran_id: Uuid },
}

impl CheckInResult {
    /// Returns the result type as a string for logging
    pub fn result_type(&self) -> &'static str {
        match self {
            CheckInResult::Recorded(_) => "recorded",
            CheckInResult::AlreadyRecorded(_) => "already_recorded",
            CheckInResult::EventNotFound { .. } => "event_not_found",
            CheckInResult::NotEnrolled { .. } => "not_enrolled",
            CheckInResult::ServiceNotFound { .. } => "service_not_found",
            CheckInResult::NotCheckedIn { .. } => "not_checked_in",
        }
    }
}

/// What to do with a scan given the veteran's earlier scans at the same event.
#[derive(Debug, PartialEq, Eq)]
pub enum ScanDecision<'a> {
    /// A service scan arrived before the general check-in.
    NotCheckedIn,
    AlreadyRecorded(&'a Scan),
    Record,
}

pub fn decide(previous: &[Scan], service_id: Option<Uuid>) -> ScanDecision<'_> {
    let checked_in = previous.iter().any(|scan| scan.service_id.is_none());

    if service_id.is_some() && !checked_in {
        return ScanDecision::NotCheckedIn;
    }

    match previous.iter().find(|scan| scan.service_id == service_id) {
        Some(existing) => ScanDecision::AlreadyRecorded(existing),
        None => ScanDecision::Record,
    }
}

/// Records a check-in scan.
///
/// This function:
/// 1. Loads the event
/// 2. Matches the card number to exactly one enrolled veteran
/// 3. Checks that a requested service exists
/// 4. Requires a general check-in before any service scan
/// 5. Returns the existing scan when this one was already recorded
/// 6. Otherwise stores a new scan stamped with the current time
#[tracing::instrument(skip(conn))]
pub async fn check_in(conn: &mut PgConnection, request: CheckIn) -> Result<CheckInResult, CheckInError> {
    let Some(event) = Event::find_by_id(conn, request.event_id).await? else {
        tracing::warn!(event_id = %request.event_id, "Event not found");
        return Ok(CheckInResult::EventNotFound {
            event_id: request.event_id,
        });
    };

    let mut matches = Veteran::find_by_card_number(conn, request.card_number).await?;
    let veteran = match (matches.pop(), matches.is_empty()) {
        (Some(veteran), true) => veteran,
        (found, _) => {
            tracing::warn!(
                card_number = request.card_number,
                ambiguous = found.is_some(),
                "Card number does not match a single enrolled veteran"
            );
            return Ok(CheckInResult::NotEnrolled {
                card_number: request.card_number,
            });
        }
    };

    if let Some(service_id) = request.service_id {
        if Service::find_by_id(conn, service_id).await?.is_none() {
            tracing::warn!(%service_id, "Service not found");
            return Ok(CheckInResult::ServiceNotFound { service_id });
        }
    }

    let previous = Scan::list_for_veteran_at_event(conn, event.id, veteran.id).await?;

    match decide(&previous, request.service_id) {
        ScanDecision::NotCheckedIn => {
            tracing::info!(veteran_id = %veteran.id, event_id = %event.id, "Service scan before check-in");
            return Ok(CheckInResult::NotCheckedIn {
                veteran_id: veteran.id,
            });
        }
        ScanDecision::AlreadyRecorded(existing) => {
            tracing::debug!(veteran_id = %veteran.id, event_id = %event.id, "Scan already recorded");
            return Ok(CheckInResult::AlreadyRecorded(existing.clone()));
        }
        ScanDecision::Record => {}
    }

    let inserted = Scan::insert_if_absent(
        conn,
        CreateScanData {
            event_id: event.id,
            veteran_id: veteran.id,
            service_id: request.service_id,
            plus_one: request.plus_one,
            scan_by_id: request.scan_by_id,
            scan_date: Utc::now(),
        },
    )
    .await?;

    let result = match inserted {
        Some(scan) => {
            tracing::info!(
                veteran_id = %veteran.id,
                event_id = %event.id,
                service_id = ?scan.service_id,
                "Scan recorded"
            );
            CheckInResult::Recorded(scan)
        }
        None => {
            // Lost a race with an identical scan; hand back the winner's row
            let existing = Scan::find(conn, event.id, veteran.id, request.service_id)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;
            CheckInResult::AlreadyRecorded(existing)
        }
    };

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(service_id: Option<Uuid>) -> Scan {
        Scan {
            event_id: Uuid::new_v4(),
            veteran_id: Uuid::new_v4(),
            service_id,
            plus_one: false,
            scan_by_id: Uuid::new_v4(),
            scan_date: Utc::now(),
        }
    }

    #[test]
    fn test_first_general_scan_is_recorded() {
        assert_eq!(decide(&[], None), ScanDecision::Record);
    }

    #[test]
    fn test_service_scan_requires_check_in() {
        let service = Uuid::new_v4();
        assert_eq!(decide(&[], Some(service)), ScanDecision::NotCheckedIn);

        // A scan at another service does not count as checking in
        let previous = vec![scan(Some(Uuid::new_v4()))];
        assert_eq!(decide(&previous, Some(service)), ScanDecision::NotCheckedIn);
    }

    #[test]
    fn test_service_scan_after_check_in_is_recorded() {
        let previous = vec![scan(None)];
        assert_eq!(decide(&previous, Some(Uuid::new_v4())), ScanDecision::Record);
    }

    #[test]
    fn test_repeat_scans_return_existing() {
        let service = Uuid::new_v4();
        let previous = vec![scan(None), scan(Some(service))];

        assert_eq!(decide(&previous, None), ScanDecision::AlreadyRecorded(&previous[0]));
        assert_eq!(
            decide(&previous, Some(service)),
            ScanDecision::AlreadyRecorded(&previous[1])
        );
    }

    #[test]
    fn test_result_types() {
        let result = CheckInResult::NotEnrolled { card_number: 1234 };
        assert_eq!(result.result_type(), "not_enrolled");
        assert_eq!(CheckInResult::Recorded(scan(None)).result_type(), "recorded");
        let result = CheckInResult::ServiceNotFound { service_id: Uuid::new_v4() };
        assert_eq!(result.result_type(), "service_not_found");
    }

    #[test]
    fn test_error_chain_names_cause_once() {
        let error = anyhow::Error::new(CheckInError::from(sqlx::Error::PoolTimedOut));
        let rendered = format!("{:#}", error);

        assert!(rendered.starts_with("Error processing Scan: "));
        assert_eq!(rendered.matches("pool timed out").count(), 1);
    }
}
