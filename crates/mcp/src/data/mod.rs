//! The application data store the tools operate on.
//!
//! Events, RSVPs, ideas, votes, check-ins, profiles and browser sessions live
//! in the community app's relational store. This module only fixes the
//! contract the gateway needs from it; uniqueness over `(event, user)` for
//! RSVPs and check-ins and over `(idea, user)` for votes is the store's
//! responsibility, so repeated calls update the existing row.

mod memory;

pub use memory::MemoryDataStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// A referenced row does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The backend rejected the operation; the message is shown to callers.
    #[error("{0}")]
    Backend(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Organizer,
    Admin,
}

impl Role {
    /// Organizers and admins may manage events.
    pub fn can_manage_events(self) -> bool {
        matches!(self, Self::Organizer | Self::Admin)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Profile {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
}

#[derive(Clone, Debug, Serialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub venue: String,
    pub capacity: u32,
    pub status: EventStatus,
    #[serde(skip_serializing)]
    pub created_by: Option<String>,
}

impl Event {
    pub fn is_published(&self) -> bool {
        self.status == EventStatus::Published
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RsvpStatus {
    Going,
    Waitlist,
    Cancelled,
}

impl RsvpStatus {
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Rsvp {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: RsvpStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IdeaStatus {
    #[default]
    Pending,
    Approved,
    Implemented,
    Rejected,
}

#[derive(Clone, Debug, Serialize)]
pub struct Idea {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub status: IdeaStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct IdeaVote {
    pub id: String,
    pub idea_id: String,
    pub user_id: String,
    pub value: i8,
}

#[derive(Clone, Debug, Serialize)]
pub struct Checkin {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub checked_in_at: DateTime<Utc>,
}

/// An RSVP joined with the attendee's profile.
#[derive(Clone, Debug)]
pub struct Attendee {
    pub status: RsvpStatus,
    pub rsvp_date: DateTime<Utc>,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub venue: String,
    pub capacity: u32,
    pub status: EventStatus,
    pub created_by: String,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Clone, Debug, Default)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub venue: Option<String>,
    pub capacity: Option<u32>,
    pub status: Option<EventStatus>,
}

#[derive(Clone, Debug)]
pub struct NewIdea {
    pub user_id: String,
    pub title: String,
    pub description: String,
}

pub trait DataStore: Clone + Send + Sync + 'static {
    /// The user id owning a browser session.
    fn resolve_session(
        &self,
        session: &str,
    ) -> impl Future<Output = Result<Option<String>, DataError>> + Send;

    fn profile(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<Profile>, DataError>> + Send;

    /// Published events starting at or after `now`, soonest first. `query`
    /// matches title, description or venue case-insensitively.
    fn upcoming_events(
        &self,
        now: DateTime<Utc>,
        query: Option<&str>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Event>, DataError>> + Send;

    fn event(&self, event_id: &str) -> impl Future<Output = Result<Option<Event>, DataError>> + Send;

    fn event_rsvps(
        &self,
        event_id: &str,
    ) -> impl Future<Output = Result<Vec<Rsvp>, DataError>> + Send;

    /// Insert or update the `(event, user)` RSVP with status `going`.
    fn upsert_rsvp(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<Rsvp, DataError>> + Send;

    fn rsvp(&self, rsvp_id: &str) -> impl Future<Output = Result<Option<Rsvp>, DataError>> + Send;

    fn set_rsvp_status(
        &self,
        rsvp_id: &str,
        status: RsvpStatus,
    ) -> impl Future<Output = Result<(), DataError>> + Send;

    /// A user's RSVPs joined with their events, newest RSVP first.
    fn user_rsvps(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<(Rsvp, Event)>, DataError>> + Send;

    fn insert_idea(&self, idea: NewIdea) -> impl Future<Output = Result<Idea, DataError>> + Send;

    /// Newest first, optionally filtered by status.
    fn ideas(
        &self,
        status: Option<IdeaStatus>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Idea>, DataError>> + Send;

    /// Insert or update the `(idea, user)` vote.
    fn upsert_vote(
        &self,
        idea_id: &str,
        user_id: &str,
        value: i8,
    ) -> impl Future<Output = Result<IdeaVote, DataError>> + Send;

    fn idea_votes(
        &self,
        idea_id: &str,
    ) -> impl Future<Output = Result<Vec<IdeaVote>, DataError>> + Send;

    /// RSVPs of an event joined with profiles, oldest first.
    fn attendees(
        &self,
        event_id: &str,
    ) -> impl Future<Output = Result<Vec<Attendee>, DataError>> + Send;

    /// Insert or refresh the `(event, user)` check-in.
    fn upsert_checkin(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<Checkin, DataError>> + Send;

    fn insert_event(&self, event: NewEvent) -> impl Future<Output = Result<Event, DataError>> + Send;

    fn update_event(
        &self,
        event_id: &str,
        update: EventUpdate,
    ) -> impl Future<Output = Result<Event, DataError>> + Send;
}
