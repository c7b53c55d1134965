//! The tool catalog exposed through `tools/list` and `tools/call`.
//!
//! Every tool is a function of the calling [`Principal`] and its arguments.
//! Results are a single text content block holding pretty-printed JSON.

mod ics;
mod params;

use crate::data::{DataStore, EventUpdate, NewEvent, NewIdea, RsvpStatus};
use crate::error::Error;
use crate::resolver::Principal;
use crate::rpc::RpcError;
use crate::state::AppState;
use crate::store::CredentialStore;
use chrono::{DateTime, Utc};
use params::*;
use schemars::{JsonSchema, r#gen::SchemaSettings};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::sync::LazyLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolName {
    FindUpcomingEvents,
    GetEventDetails,
    RsvpToEvent,
    CancelMyRsvp,
    MyUpcomingRsvps,
    SubmitMeetupIdea,
    BrowseMeetupIdeas,
    GetMyProfile,
    VoteOnIdea,
    GetEventAttendees,
    ExportEventToCalendar,
    CheckInToEvent,
    CreateEvent,
    UpdateEvent,
    ViewAttendeeList,
}

impl ToolName {
    pub const ALL: [ToolName; 15] = [
        Self::FindUpcomingEvents,
        Self::GetEventDetails,
        Self::RsvpToEvent,
        Self::CancelMyRsvp,
        Self::MyUpcomingRsvps,
        Self::SubmitMeetupIdea,
        Self::BrowseMeetupIdeas,
        Self::GetMyProfile,
        Self::VoteOnIdea,
        Self::GetEventAttendees,
        Self::ExportEventToCalendar,
        Self::CheckInToEvent,
        Self::CreateEvent,
        Self::UpdateEvent,
        Self::ViewAttendeeList,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FindUpcomingEvents => "find_upcoming_events",
            Self::GetEventDetails => "get_event_details",
            Self::RsvpToEvent => "rsvp_to_event",
            Self::CancelMyRsvp => "cancel_my_rsvp",
            Self::MyUpcomingRsvps => "my_upcoming_rsvps",
            Self::SubmitMeetupIdea => "submit_meetup_idea",
            Self::BrowseMeetupIdeas => "browse_meetup_ideas",
            Self::GetMyProfile => "get_my_profile",
            Self::VoteOnIdea => "vote_on_idea",
            Self::GetEventAttendees => "get_event_attendees",
            Self::ExportEventToCalendar => "export_event_to_calendar",
            Self::CheckInToEvent => "check_in_to_event",
            Self::CreateEvent => "create_event",
            Self::UpdateEvent => "update_event",
            Self::ViewAttendeeList => "view_attendee_list",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::FindUpcomingEvents => "List upcoming published meetup events.",
            Self::GetEventDetails => "Get details and capacity snapshot for one event.",
            Self::RsvpToEvent => "RSVP the current user to an event.",
            Self::CancelMyRsvp => "Cancel one of the current user's RSVPs.",
            Self::MyUpcomingRsvps => "List the current user's active upcoming RSVPs.",
            Self::SubmitMeetupIdea => "Submit a new meetup idea for organizers.",
            Self::BrowseMeetupIdeas => "Browse recently submitted meetup ideas from the community.",
            Self::GetMyProfile => "Get the current user's profile including role and email.",
            Self::VoteOnIdea => "Upvote (+1) or downvote (-1) a meetup idea.",
            Self::GetEventAttendees => {
                "Get a privacy-respecting attendee list for an event (first names and counts)."
            }
            Self::ExportEventToCalendar => "Export an event as an ICS calendar file string.",
            Self::CheckInToEvent => "Check in to an event (day-of attendance confirmation).",
            Self::CreateEvent => "Create a new event (organizer/admin only).",
            Self::UpdateEvent => "Update an existing event (organizer/admin only).",
            Self::ViewAttendeeList => {
                "Get full attendee list with emails for an event (organizer/admin only)."
            }
        }
    }

    /// Tools restricted to organizers and admins.
    pub fn requires_manager(self) -> bool {
        matches!(
            self,
            Self::CreateEvent | Self::UpdateEvent | Self::ViewAttendeeList
        )
    }

    fn input_schema(self) -> Value {
        match self {
            Self::FindUpcomingEvents => schema_for::<FindUpcomingEventsParams>(),
            Self::GetEventDetails
            | Self::RsvpToEvent
            | Self::GetEventAttendees
            | Self::ExportEventToCalendar
            | Self::CheckInToEvent
            | Self::ViewAttendeeList => schema_for::<EventParams>(),
            Self::CancelMyRsvp => schema_for::<CancelRsvpParams>(),
            Self::MyUpcomingRsvps => schema_for::<MyRsvpsParams>(),
            Self::SubmitMeetupIdea => schema_for::<SubmitIdeaParams>(),
            Self::BrowseMeetupIdeas => schema_for::<BrowseIdeasParams>(),
            Self::GetMyProfile => schema_for::<NoParams>(),
            Self::VoteOnIdea => schema_for::<VoteParams>(),
            Self::CreateEvent => schema_for::<CreateEventParams>(),
            Self::UpdateEvent => schema_for::<UpdateEventParams>(),
        }
    }
}

/// A catalog entry as listed by `tools/list`.
#[derive(Clone, Debug, Serialize)]
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Inline draft-07 schema without the root `$schema`/`title` keys.
fn schema_for<T: JsonSchema>() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|s| {
            s.option_add_null_type = false;
            s.inline_subschemas = true;
        })
        .into_generator();
    let schema = generator.into_root_schema_for::<T>();
    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| json!({ "type": "object" }));
    if let Value::Object(map) = &mut value {
        map.remove("$schema");
        map.remove("title");
        map.remove("definitions");
    }
    value
}

static CATALOG: LazyLock<Vec<Tool>> = LazyLock::new(|| {
    ToolName::ALL
        .into_iter()
        .map(|tool| Tool {
            name: tool.as_str(),
            description: tool.description(),
            input_schema: tool.input_schema(),
        })
        .collect()
});

/// The full catalog, built once per process.
pub fn catalog() -> &'static [Tool] {
    &CATALOG
}

fn text_result(value: Value) -> Value {
    let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
    json!({ "content": [{ "type": "text", "text": text }] })
}

fn arguments<P: DeserializeOwned>(arguments: Value) -> Result<P, Error> {
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other,
    };
    serde_json::from_value(arguments)
        .map_err(|err| Error::InvalidRequest(format!("Invalid arguments: {err}")))
}

fn required<'a>(value: &'a str, name: &str) -> Result<&'a str, Error> {
    match value.trim() {
        "" => Err(Error::InvalidRequest(format!("{name} is required"))),
        value => Ok(value),
    }
}

/// Floor, then clamp into `[1, max]`; absent or non-finite uses `default`.
fn clamp_limit(limit: Option<f64>, default: usize, max: usize) -> usize {
    match limit {
        Some(limit) if limit.is_finite() => (limit.floor().max(1.0) as usize).min(max),
        _ => default,
    }
}

fn timestamp(value: &str, name: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidRequest(format!("{name} must be an ISO 8601 datetime")))
}

fn capacity(value: i64) -> Result<u32, Error> {
    u32::try_from(value)
        .ok()
        .filter(|capacity| *capacity >= 1)
        .ok_or_else(|| Error::InvalidRequest("capacity must be >= 1".into()))
}

/// Invoke `tool` for `principal`.
pub async fn call<C, D>(
    state: &AppState<C, D>,
    principal: &Principal,
    tool: ToolName,
    args: Value,
) -> Result<Value, RpcError>
where
    C: CredentialStore,
    D: DataStore,
{
    if tool.requires_manager() && !principal.role(state).await?.can_manage_events() {
        return Err(Error::Forbidden("Organizer or admin role required".into()).into());
    }
    let value = Tools { state, principal }.run(tool, args).await?;
    Ok(text_result(value))
}

struct Tools<'a, C, D> {
    state: &'a AppState<C, D>,
    principal: &'a Principal,
}

impl<C, D> Tools<'_, C, D>
where
    C: CredentialStore,
    D: DataStore,
{
    fn user_id(&self) -> &str {
        &self.principal.user_id
    }

    async fn run(&self, tool: ToolName, args: Value) -> Result<Value, Error> {
        match tool {
            ToolName::FindUpcomingEvents => self.find_upcoming_events(arguments(args)?).await,
            ToolName::GetEventDetails => self.get_event_details(arguments(args)?).await,
            ToolName::RsvpToEvent => self.rsvp_to_event(arguments(args)?).await,
            ToolName::CancelMyRsvp => self.cancel_my_rsvp(arguments(args)?).await,
            ToolName::MyUpcomingRsvps => self.my_upcoming_rsvps(arguments(args)?).await,
            ToolName::SubmitMeetupIdea => self.submit_meetup_idea(arguments(args)?).await,
            ToolName::BrowseMeetupIdeas => self.browse_meetup_ideas(arguments(args)?).await,
            ToolName::GetMyProfile => self.get_my_profile().await,
            ToolName::VoteOnIdea => self.vote_on_idea(arguments(args)?).await,
            ToolName::GetEventAttendees => self.get_event_attendees(arguments(args)?).await,
            ToolName::ExportEventToCalendar => self.export_event(arguments(args)?).await,
            ToolName::CheckInToEvent => self.check_in_to_event(arguments(args)?).await,
            ToolName::CreateEvent => self.create_event(arguments(args)?).await,
            ToolName::UpdateEvent => self.update_event(arguments(args)?).await,
            ToolName::ViewAttendeeList => self.view_attendee_list(arguments(args)?).await,
        }
    }

    async fn find_upcoming_events(&self, params: FindUpcomingEventsParams) -> Result<Value, Error> {
        let limit = clamp_limit(params.limit, 10, 20);
        let query = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty());
        let events = self
            .state
            .bounded(self.state.data.upcoming_events(Utc::now(), query, limit))
            .await?;
        Ok(json!({ "events": events }))
    }

    /// A published event, or not found.
    async fn published_event(&self, event_id: &str) -> Result<crate::data::Event, Error> {
        self.state
            .bounded(self.state.data.event(event_id))
            .await?
            .filter(|event| event.is_published())
            .ok_or_else(|| Error::NotFound("Event not found".into()))
    }

    async fn get_event_details(&self, params: EventParams) -> Result<Value, Error> {
        let event_id = required(&params.event_id, "event_id")?;
        let event = self.published_event(event_id).await?;
        let rsvps = self
            .state
            .bounded(self.state.data.event_rsvps(event_id))
            .await?;
        let count = |status| rsvps.iter().filter(|r| r.status == status).count();
        let capacity = json!({
            "going": count(RsvpStatus::Going),
            "waitlist": count(RsvpStatus::Waitlist),
            "max": event.capacity,
        });
        Ok(json!({ "event": event, "capacity": capacity }))
    }

    async fn rsvp_to_event(&self, params: EventParams) -> Result<Value, Error> {
        let event_id = required(&params.event_id, "event_id")?;
        let rsvp = self
            .state
            .bounded(self.state.data.upsert_rsvp(event_id, self.user_id()))
            .await?;
        Ok(json!({
            "rsvp": {
                "id": rsvp.id,
                "event_id": rsvp.event_id,
                "status": rsvp.status,
                "updated_at": rsvp.updated_at,
            }
        }))
    }

    async fn cancel_my_rsvp(&self, params: CancelRsvpParams) -> Result<Value, Error> {
        let rsvp_id = required(&params.rsvp_id, "rsvp_id")?;
        let rsvp = self.state.bounded(self.state.data.rsvp(rsvp_id)).await?;
        if rsvp.is_none_or(|rsvp| rsvp.user_id != self.user_id()) {
            return Err(Error::NotFound("RSVP not found for current user".into()));
        }
        self.state
            .bounded(self.state.data.set_rsvp_status(rsvp_id, RsvpStatus::Cancelled))
            .await?;
        Ok(json!({ "ok": true, "rsvp_id": rsvp_id, "status": RsvpStatus::Cancelled }))
    }

    async fn my_upcoming_rsvps(&self, params: MyRsvpsParams) -> Result<Value, Error> {
        let limit = clamp_limit(params.limit, 10, 20);
        let now = Utc::now();
        let rows = self
            .state
            .bounded(self.state.data.user_rsvps(self.user_id()))
            .await?;
        let rsvps: Vec<Value> = rows
            .into_iter()
            .filter(|(rsvp, event)| rsvp.status.is_active() && event.starts_at >= now)
            .take(limit)
            .map(|(rsvp, event)| {
                json!({
                    "id": rsvp.id,
                    "status": rsvp.status,
                    "event": {
                        "id": event.id,
                        "title": event.title,
                        "starts_at": event.starts_at,
                        "venue": event.venue,
                        "status": event.status,
                    }
                })
            })
            .collect();
        Ok(json!({ "rsvps": rsvps }))
    }

    async fn submit_meetup_idea(&self, params: SubmitIdeaParams) -> Result<Value, Error> {
        let (title, description) = (params.title.trim(), params.description.trim());
        if title.is_empty() || description.is_empty() {
            return Err(Error::InvalidRequest(
                "title and description are required".into(),
            ));
        }
        let idea = self
            .state
            .bounded(self.state.data.insert_idea(NewIdea {
                user_id: self.user_id().to_string(),
                title: title.chars().take(160).collect(),
                description: description.chars().take(2000).collect(),
            }))
            .await?;
        Ok(json!({
            "idea": {
                "id": idea.id,
                "title": idea.title,
                "status": idea.status,
                "created_at": idea.created_at,
            }
        }))
    }

    async fn browse_meetup_ideas(&self, params: BrowseIdeasParams) -> Result<Value, Error> {
        let limit = clamp_limit(params.limit, 10, 30);
        let ideas = self
            .state
            .bounded(self.state.data.ideas(params.status, limit))
            .await?;
        Ok(json!({ "ideas": ideas }))
    }

    async fn get_my_profile(&self) -> Result<Value, Error> {
        let profile = self
            .state
            .bounded(self.state.data.profile(self.user_id()))
            .await?
            .ok_or_else(|| Error::NotFound("Profile not found".into()))?;
        Ok(json!({ "profile": profile }))
    }

    async fn vote_on_idea(&self, params: VoteParams) -> Result<Value, Error> {
        let idea_id = params.idea_id.trim();
        let value = match params.value {
            1 => 1,
            -1 => -1,
            _ => 0,
        };
        if idea_id.is_empty() || value == 0 {
            return Err(Error::InvalidRequest(
                "idea_id and value (1 or -1) are required".into(),
            ));
        }

        let data = &self.state.data;
        let vote = self
            .state
            .bounded(data.upsert_vote(idea_id, self.user_id(), value))
            .await?;
        let votes = self.state.bounded(data.idea_votes(idea_id)).await?;
        let upvotes = votes.iter().filter(|v| v.value == 1).count() as i64;
        let downvotes = votes.iter().filter(|v| v.value == -1).count() as i64;
        Ok(json!({
            "vote": { "id": vote.id, "value": vote.value },
            "tally": { "upvotes": upvotes, "downvotes": downvotes, "net": upvotes - downvotes },
        }))
    }

    async fn get_event_attendees(&self, params: EventParams) -> Result<Value, Error> {
        let event_id = required(&params.event_id, "event_id")?;
        let rows = self
            .state
            .bounded(self.state.data.attendees(event_id))
            .await?;

        let attendees: Vec<_> = rows
            .into_iter()
            .filter(|row| row.status.is_active())
            .map(|row| {
                // Only the first name is public.
                let first_name = row
                    .name
                    .as_deref()
                    .and_then(|name| name.split_whitespace().next())
                    .unwrap_or("Anonymous")
                    .to_string();
                (first_name, row.status)
            })
            .collect();
        let going = attendees.iter().filter(|(_, s)| *s == RsvpStatus::Going).count();
        let waitlisted = attendees.len() - going;
        let attendees: Vec<Value> = attendees
            .into_iter()
            .map(|(first_name, status)| json!({ "first_name": first_name, "status": status }))
            .collect();
        Ok(json!({
            "attendees": attendees,
            "summary": { "going": going, "waitlisted": waitlisted, "total": going + waitlisted },
        }))
    }

    async fn export_event(&self, params: EventParams) -> Result<Value, Error> {
        let event_id = required(&params.event_id, "event_id")?;
        let event = self.published_event(event_id).await?;
        Ok(json!({
            "ics_content": ics::calendar(&event),
            "filename": ics::filename(&event.title),
        }))
    }

    async fn check_in_to_event(&self, params: EventParams) -> Result<Value, Error> {
        let event_id = required(&params.event_id, "event_id")?;
        let checkin = self
            .state
            .bounded(self.state.data.upsert_checkin(event_id, self.user_id()))
            .await?;
        Ok(json!({
            "checkin": { "id": checkin.id, "checked_in_at": checkin.checked_in_at }
        }))
    }

    async fn create_event(&self, params: CreateEventParams) -> Result<Value, Error> {
        let (title, venue) = (params.title.trim(), params.venue.trim());
        if title.is_empty() || venue.is_empty() || params.starts_at.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "title, starts_at, venue, and capacity >= 1 are required".into(),
            ));
        }
        let new_event = NewEvent {
            title: title.to_string(),
            description: params.description,
            starts_at: timestamp(&params.starts_at, "starts_at")?,
            ends_at: params
                .ends_at
                .as_deref()
                .map(|v| timestamp(v, "ends_at"))
                .transpose()?,
            venue: venue.to_string(),
            capacity: capacity(params.capacity)?,
            status: params.status.unwrap_or_default().into(),
            created_by: self.user_id().to_string(),
        };

        let event = self
            .state
            .bounded(self.state.data.insert_event(new_event))
            .await?;
        tracing::info!(event_id = %event.id, user_id = %self.user_id(), "event created");
        Ok(json!({
            "event": {
                "id": event.id,
                "title": event.title,
                "status": event.status,
                "starts_at": event.starts_at,
            }
        }))
    }

    async fn update_event(&self, params: UpdateEventParams) -> Result<Value, Error> {
        let event_id = required(&params.event_id, "event_id")?;
        let update = EventUpdate {
            title: params.title.map(|t| t.trim().to_string()),
            description: params.description,
            starts_at: params
                .starts_at
                .as_deref()
                .map(|v| timestamp(v, "starts_at"))
                .transpose()?,
            ends_at: params
                .ends_at
                .as_deref()
                .map(|v| timestamp(v, "ends_at"))
                .transpose()?,
            venue: params.venue.map(|v| v.trim().to_string()),
            capacity: params.capacity.map(capacity).transpose()?,
            status: params.status,
        };

        let event = self
            .state
            .bounded(self.state.data.update_event(event_id, update))
            .await?;
        tracing::info!(event_id = %event.id, user_id = %self.user_id(), "event updated");
        Ok(json!({
            "event": { "id": event.id, "title": event.title, "status": event.status }
        }))
    }

    async fn view_attendee_list(&self, params: EventParams) -> Result<Value, Error> {
        let event_id = required(&params.event_id, "event_id")?;
        let rows = self
            .state
            .bounded(self.state.data.attendees(event_id))
            .await?;
        let attendees: Vec<Value> = rows
            .into_iter()
            .map(|row| {
                json!({
                    "name": row.name.unwrap_or_default(),
                    "email": row.email.unwrap_or_default(),
                    "status": row.status,
                    "rsvp_date": row.rsvp_date,
                })
            })
            .collect();
        Ok(json!({ "attendees": attendees }))
    }
}
