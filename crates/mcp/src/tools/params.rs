//! Tool argument types. Their JSON schemas are published by `tools/list`.

use crate::data::{EventStatus, IdeaStatus};
use schemars::{
    JsonSchema,
    r#gen::SchemaGenerator,
    schema::{InstanceType, Schema, SchemaObject},
};
use serde::Deserialize;

/// Parameters for finding upcoming events.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindUpcomingEventsParams {
    /// Maximum number of events to return.
    #[schemars(range(min = 1, max = 20))]
    pub limit: Option<f64>,
    /// Optional search against title, description, and venue.
    pub query: Option<String>,
}

/// Parameters naming one event.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct EventParams {
    /// Event id.
    pub event_id: String,
}

/// Parameters for cancelling an RSVP.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CancelRsvpParams {
    /// Id of one of the caller's RSVPs.
    pub rsvp_id: String,
}

/// Parameters for listing the caller's RSVPs.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct MyRsvpsParams {
    /// Maximum number of RSVPs to return.
    #[schemars(range(min = 1, max = 20))]
    pub limit: Option<f64>,
}

/// Parameters for submitting an idea.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SubmitIdeaParams {
    #[schemars(length(min = 3, max = 160))]
    pub title: String,
    #[schemars(length(min = 10, max = 2000))]
    pub description: String,
}

/// Parameters for browsing ideas.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct BrowseIdeasParams {
    /// Maximum number of ideas to return.
    #[schemars(range(min = 1, max = 30))]
    pub limit: Option<f64>,
    /// Optional status filter.
    pub status: Option<IdeaStatus>,
}

/// No parameters.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoParams {}

fn vote_value(_: &mut SchemaGenerator) -> Schema {
    SchemaObject {
        instance_type: Some(InstanceType::Integer.into()),
        enum_values: Some(vec![1.into(), (-1).into()]),
        ..Default::default()
    }
    .into()
}

/// Parameters for voting on an idea.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct VoteParams {
    pub idea_id: String,
    /// 1 for upvote, -1 for downvote.
    #[schemars(schema_with = "vote_value")]
    pub value: i64,
}

/// Initial status of a new event.
#[derive(Clone, Copy, Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NewEventStatus {
    #[default]
    Draft,
    Published,
}

impl From<NewEventStatus> for EventStatus {
    fn from(status: NewEventStatus) -> Self {
        match status {
            NewEventStatus::Draft => EventStatus::Draft,
            NewEventStatus::Published => EventStatus::Published,
        }
    }
}

/// Parameters for creating an event.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateEventParams {
    pub title: String,
    pub description: Option<String>,
    /// ISO 8601 datetime.
    pub starts_at: String,
    /// ISO 8601 datetime.
    pub ends_at: Option<String>,
    pub venue: String,
    #[schemars(range(min = 1))]
    pub capacity: i64,
    /// Defaults to draft.
    pub status: Option<NewEventStatus>,
}

/// Parameters for updating an event. Omitted fields are unchanged.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateEventParams {
    pub event_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// ISO 8601 datetime.
    pub starts_at: Option<String>,
    /// ISO 8601 datetime.
    pub ends_at: Option<String>,
    pub venue: Option<String>,
    #[schemars(range(min = 1))]
    pub capacity: Option<i64>,
    pub status: Option<EventStatus>,
}
