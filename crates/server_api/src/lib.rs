//! The event manager: every operation the presentation layer calls, with
//! validation and ownership checks applied before any write.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::{
    datetime::format_event_datetime,
    domain::{EventId, EventTypeId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{EventDetails, EventForm, EventSummary, TypeOption},
};
use storage::{EventListRow, EventPatch, NewEvent, Storage, StoredEvent};
use tracing::info;

pub mod validation;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

/// Raw create/edit submission, exactly as the user typed it. Dates stay
/// text until validation parses them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFormInput {
    pub name: String,
    pub description: String,
    pub start: String,
    pub end: String,
    pub type_id: EventTypeId,
}

pub async fn list_all(ctx: &ApiContext) -> Result<Vec<EventSummary>, ApiError> {
    let events = ctx.storage.list_events().await.map_err(internal)?;
    Ok(events.into_iter().map(summary).collect())
}

pub async fn list_joined(ctx: &ApiContext, user_id: UserId) -> Result<Vec<EventSummary>, ApiError> {
    let events = ctx
        .storage
        .list_events_joined_by(user_id)
        .await
        .map_err(internal)?;
    Ok(events.into_iter().map(summary).collect())
}

/// Joining an event the user already joined is a no-op, not an error.
pub async fn join(ctx: &ApiContext, event_id: EventId, user_id: UserId) -> Result<(), ApiError> {
    require_event(ctx, event_id).await?;
    let inserted = ctx
        .storage
        .add_participant(event_id, user_id)
        .await
        .map_err(internal)?;
    if inserted {
        info!(event_id = event_id.0, user_id = user_id.0, "user joined event");
    }
    Ok(())
}

pub async fn leave(ctx: &ApiContext, event_id: EventId, user_id: UserId) -> Result<(), ApiError> {
    require_event(ctx, event_id).await?;
    let removed = ctx
        .storage
        .remove_participant(event_id, user_id)
        .await
        .map_err(internal)?;
    if !removed {
        return Err(ApiError::new(
            ErrorCode::ParticipationNotFound,
            "user has not joined this event",
        ));
    }
    info!(event_id = event_id.0, user_id = user_id.0, "user left event");
    Ok(())
}

pub async fn create(
    ctx: &ApiContext,
    organiser_id: UserId,
    input: &EventFormInput,
) -> Result<EventId, ApiError> {
    let schedule = validate(ctx, input).await?;
    let event_id = ctx
        .storage
        .insert_event(NewEvent {
            name: &input.name,
            description: &input.description,
            created_on: Utc::now().naive_utc(),
            start_at: schedule.start_at,
            end_at: schedule.end_at,
            organiser_id,
            type_id: input.type_id,
        })
        .await
        .map_err(internal)?;
    info!(
        event_id = event_id.0,
        organiser_id = organiser_id.0,
        "event created"
    );
    Ok(event_id)
}

pub async fn edit(
    ctx: &ApiContext,
    event_id: EventId,
    requester_id: UserId,
    input: &EventFormInput,
) -> Result<(), ApiError> {
    let event = require_event(ctx, event_id).await?;
    if !is_organiser(&event, requester_id) {
        return Err(unauthorized());
    }
    let schedule = validate(ctx, input).await?;
    ctx.storage
        .update_event(
            event_id,
            EventPatch {
                name: &input.name,
                description: &input.description,
                start_at: schedule.start_at,
                end_at: schedule.end_at,
                type_id: input.type_id,
            },
        )
        .await
        .map_err(internal)?;
    info!(event_id = event_id.0, "event edited");
    Ok(())
}

pub async fn get_details(ctx: &ApiContext, event_id: EventId) -> Result<EventDetails, ApiError> {
    let details = ctx
        .storage
        .load_event_details(event_id)
        .await
        .map_err(internal)?
        .ok_or_else(event_not_found)?;
    Ok(EventDetails {
        event_id: details.event_id,
        name: details.name,
        description: details.description,
        created_on: format_event_datetime(details.created_on),
        start: format_event_datetime(details.start_at),
        end: format_event_datetime(details.end_at),
        organiser_name: details.organiser_name,
        type_name: details.type_name,
    })
}

/// Empty form for the create page, pre-populated with the selectable types.
pub async fn blank_form(ctx: &ApiContext) -> Result<EventForm, ApiError> {
    Ok(EventForm {
        name: String::new(),
        description: String::new(),
        start: String::new(),
        end: String::new(),
        type_id: EventTypeId(0),
        available_types: available_types(ctx).await?,
    })
}

/// Pre-filled form for the edit page. Same ownership rule as `edit`.
pub async fn get_editable_form(
    ctx: &ApiContext,
    event_id: EventId,
    requester_id: UserId,
) -> Result<EventForm, ApiError> {
    let event = require_event(ctx, event_id).await?;
    if !is_organiser(&event, requester_id) {
        return Err(unauthorized());
    }
    Ok(EventForm {
        name: event.name,
        description: event.description,
        start: format_event_datetime(event.start_at),
        end: format_event_datetime(event.end_at),
        type_id: event.type_id,
        available_types: available_types(ctx).await?,
    })
}

/// Echo of a rejected submission, with the type lookup re-attached so the
/// form can be rendered again with the entered values preserved.
pub async fn rejected_form(
    ctx: &ApiContext,
    input: &EventFormInput,
) -> Result<EventForm, ApiError> {
    Ok(EventForm {
        name: input.name.clone(),
        description: input.description.clone(),
        start: input.start.clone(),
        end: input.end.clone(),
        type_id: input.type_id,
        available_types: available_types(ctx).await?,
    })
}

pub async fn available_types(ctx: &ApiContext) -> Result<Vec<TypeOption>, ApiError> {
    let types = ctx.storage.list_event_types().await.map_err(internal)?;
    Ok(types
        .into_iter()
        .map(|(type_id, name)| TypeOption { type_id, name })
        .collect())
}

fn is_organiser(event: &StoredEvent, requester_id: UserId) -> bool {
    event.organiser_id == requester_id
}

async fn validate(
    ctx: &ApiContext,
    input: &EventFormInput,
) -> Result<validation::ValidatedSchedule, ApiError> {
    let type_exists = ctx
        .storage
        .event_type_exists(input.type_id)
        .await
        .map_err(internal)?;
    validation::validate_event_form(input, type_exists).map_err(ApiError::validation)
}

async fn require_event(ctx: &ApiContext, event_id: EventId) -> Result<StoredEvent, ApiError> {
    ctx.storage
        .load_event(event_id)
        .await
        .map_err(internal)?
        .ok_or_else(event_not_found)
}

fn summary(row: EventListRow) -> EventSummary {
    EventSummary {
        event_id: row.event_id,
        name: row.name,
        start: format_event_datetime(row.start_at),
        type_name: row.type_name,
        organiser_name: row.organiser_name,
    }
}

fn event_not_found() -> ApiError {
    ApiError::new(ErrorCode::NotFound, "event not found")
}

fn unauthorized() -> ApiError {
    ApiError::new(
        ErrorCode::Unauthorized,
        "only the organiser may modify this event",
    )
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
