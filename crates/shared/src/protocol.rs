use serde::{Deserialize, Serialize};

use crate::domain::{EventId, EventTypeId};

/// Row shape for the event listings. Timestamps are pre-formatted with the
/// fixed date format so consumers never re-derive it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub event_id: EventId,
    pub name: String,
    pub start: String,
    pub type_name: String,
    pub organiser_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetails {
    pub event_id: EventId,
    pub name: String,
    pub description: String,
    pub created_on: String,
    pub start: String,
    pub end: String,
    pub organiser_name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeOption {
    pub type_id: EventTypeId,
    pub name: String,
}

/// Create/edit form as shown to the user: raw field text plus the lookup of
/// selectable types. Re-rendered as-is when validation fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventForm {
    pub name: String,
    pub description: String,
    pub start: String,
    pub end: String,
    pub type_id: EventTypeId,
    pub available_types: Vec<TypeOption>,
}
