use chrono::NaiveDateTime;
use shared::{
    datetime::{parse_event_datetime, DATE_FORMAT},
    domain::{
        EVENT_DESCRIPTION_MAX, EVENT_DESCRIPTION_MIN, EVENT_NAME_MAX, EVENT_NAME_MIN,
    },
    error::FieldError,
};

use crate::EventFormInput;

/// Parsed timestamps of a form that passed validation. End is not required
/// to come after start.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedSchedule {
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
}

/// Checks every field and reports every violation at once. `type_exists`
/// is resolved by the caller so this stays a pure function.
pub fn validate_event_form(
    input: &EventFormInput,
    type_exists: bool,
) -> Result<ValidatedSchedule, Vec<FieldError>> {
    let mut errors = Vec::new();

    check_text(&mut errors, "name", "Name", &input.name, EVENT_NAME_MIN, EVENT_NAME_MAX);
    check_text(
        &mut errors,
        "description",
        "Description",
        &input.description,
        EVENT_DESCRIPTION_MIN,
        EVENT_DESCRIPTION_MAX,
    );

    let start_at = check_date(&mut errors, "start", "Start", &input.start);
    let end_at = check_date(&mut errors, "end", "End", &input.end);

    if !type_exists {
        errors.push(FieldError::new("type_id", "Select a valid event type"));
    }

    match (start_at, end_at) {
        (Some(start_at), Some(end_at)) if errors.is_empty() => {
            Ok(ValidatedSchedule { start_at, end_at })
        }
        _ => Err(errors),
    }
}

fn check_text(
    errors: &mut Vec<FieldError>,
    field: &str,
    label: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    if value.is_empty() {
        errors.push(FieldError::new(field, required_message(label)));
        return;
    }
    let length = value.chars().count();
    if length < min || length > max {
        errors.push(FieldError::new(
            field,
            format!("The field {label} must be between {min} and {max} characters long"),
        ));
    }
}

fn check_date(
    errors: &mut Vec<FieldError>,
    field: &str,
    label: &str,
    value: &str,
) -> Option<NaiveDateTime> {
    if value.is_empty() {
        errors.push(FieldError::new(field, required_message(label)));
        return None;
    }
    match parse_event_datetime(value) {
        Some(parsed) => Some(parsed),
        None => {
            errors.push(FieldError::new(
                field,
                format!("Invalid date! Format must be: {DATE_FORMAT}"),
            ));
            None
        }
    }
}

fn required_message(label: &str) -> String {
    format!("The field {label} is required")
}
