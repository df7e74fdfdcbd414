use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::UnitOfWork;
use crate::models::{
    account::Account,
    event::{CreateEventData, Event},
    event_account::EventAccount,
    event_service::EventService,
    service::Service,
};

#[derive(thiserror::Error, Debug)]
pub enum EventPlanError {
    #[error("The specified Event contains unknown Accounts.")]
    UnknownAccounts(Vec<Uuid>),

    #[error("The specified Event contains unknown Services.")]
    UnknownServices(Vec<Uuid>),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub hosts: Vec<Uuid>,
    pub services: Vec<Uuid>,
    pub created_by: Uuid,
}

/// IDs in `requested` that are missing from `known`, in request order.
pub fn unknown_ids(requested: &[Uuid], known: &[Uuid]) -> Vec<Uuid> {
    requested
        .iter()
        .filter(|id| !known.contains(*id))
        .copied()
        .collect()
}

/// Creates an event and its host/service join rows inside `uow`.
///
/// The requested hosts and services must all exist. Every current account
/// and every current service is then joined to the new event, not only the
/// requested ones. Nothing is visible to other connections until the caller
/// commits `uow`.
#[tracing::instrument(skip(uow, new_event), fields(name = %new_event.name))]
pub async fn create_event(uow: &mut UnitOfWork, new_event: NewEvent) -> Result<Event, EventPlanError> {
    let accounts = Account::list_all(uow.conn()).await?;
    let account_ids: Vec<Uuid> = accounts.iter().map(|a| a.id).collect();
    let missing = unknown_ids(&new_event.hosts, &account_ids);
    if !missing.is_empty() {
        tracing::warn!(?missing, "Event references unknown accounts");
        return Err(EventPlanError::UnknownAccounts(missing));
    }

    let services = Service::list_all(uow.conn()).await?;
    let service_ids: Vec<Uuid> = services.iter().map(|s| s.id).collect();
    let missing = unknown_ids(&new_event.services, &service_ids);
    if !missing.is_empty() {
        tracing::warn!(?missing, "Event references unknown services");
        return Err(EventPlanError::UnknownServices(missing));
    }

    let id = Uuid::new_v4();
    Event::insert(
        uow.conn(),
        id,
        &CreateEventData {
            name: new_event.name,
            start_time: new_event.start_time,
            end_time: new_event.end_time,
            created_by: new_event.created_by,
        },
    )
    .await?;

    for account_id in &account_ids {
        EventAccount::new(id, *account_id).add(uow.conn()).await?;
    }

    for service_id in &service_ids {
        EventService::new(id, *service_id).add(uow.conn()).await?;
    }

    tracing::debug!(
        event_id = %id,
        hosts = account_ids.len(),
        services = service_ids.len(),
        "Event join rows written"
    );

    Event::find_by_id(uow.conn(), id)
        .await?
        .ok_or(EventPlanError::Database(sqlx::Error::RowNotFound))
}

/// Removes an event's join rows and the event itself inside `uow`.
#[tracing::instrument(skip(uow))]
pub async fn delete_event(uow: &mut UnitOfWork, event_id: Uuid) -> Result<bool, sqlx::Error> {
    EventAccount::remove_all_for_event(uow.conn(), event_id).await?;
    EventService::remove_all_for_event(uow.conn(), event_id).await?;

    Event::delete(uow.conn(), event_id).await
}
