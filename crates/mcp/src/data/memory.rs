//! In-process [`DataStore`] used by the binary's demo mode and by tests.

use crate::data::{
    Attendee, Checkin, DataError, DataStore, Event, EventUpdate, Idea, IdeaStatus, IdeaVote,
    NewEvent, NewIdea, Profile, Role, Rsvp, RsvpStatus,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    profiles: HashMap<String, Profile>,
    /// Session cookie value to user id.
    sessions: HashMap<String, String>,
    events: HashMap<String, Event>,
    rsvps: Vec<Rsvp>,
    ideas: Vec<Idea>,
    votes: Vec<IdeaVote>,
    checkins: Vec<Checkin>,
    /// When set, every operation fails with this backend message.
    outage: Option<String>,
}

impl Tables {
    fn available(&self) -> Result<(), DataError> {
        match &self.outage {
            Some(message) => Err(DataError::Backend(message.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryDataStore {
    inner: Arc<RwLock<Tables>>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a profile and return its id.
    pub async fn insert_profile(&self, name: &str, email: &str, role: Role) -> String {
        let profile = Profile {
            id: new_id(),
            email: Some(email.to_string()),
            name: Some(name.to_string()),
            role,
            created_at: Utc::now(),
        };
        let id = profile.id.clone();
        self.inner.write().await.profiles.insert(id.clone(), profile);
        id
    }

    /// Open a browser session for `user_id` and return the cookie value.
    pub async fn create_session(&self, user_id: &str) -> String {
        let session = new_id();
        self.inner
            .write()
            .await
            .sessions
            .insert(session.clone(), user_id.to_string());
        session
    }

    pub async fn set_idea_status(&self, idea_id: &str, status: IdeaStatus) {
        if let Some(idea) = self
            .inner
            .write()
            .await
            .ideas
            .iter_mut()
            .find(|idea| idea.id == idea_id)
        {
            idea.status = status;
        }
    }

    /// Make every following operation fail with `message`, or recover.
    pub async fn set_outage(&self, message: Option<&str>) {
        self.inner.write().await.outage = message.map(str::to_string);
    }
}

impl DataStore for MemoryDataStore {
    async fn resolve_session(&self, session: &str) -> Result<Option<String>, DataError> {
        let tables = self.inner.read().await;
        tables.available()?;
        Ok(tables.sessions.get(session).cloned())
    }

    async fn profile(&self, user_id: &str) -> Result<Option<Profile>, DataError> {
        let tables = self.inner.read().await;
        tables.available()?;
        Ok(tables.profiles.get(user_id).cloned())
    }

    async fn upcoming_events(
        &self,
        now: DateTime<Utc>,
        query: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Event>, DataError> {
        let tables = self.inner.read().await;
        tables.available()?;
        let needle = query.map(str::to_lowercase);
        let matches = |event: &Event| match &needle {
            None => true,
            Some(needle) => {
                event.title.to_lowercase().contains(needle)
                    || event.venue.to_lowercase().contains(needle)
                    || event
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(needle))
            }
        };

        let mut events: Vec<_> = tables
            .events
            .values()
            .filter(|event| event.is_published() && event.starts_at >= now && matches(event))
            .cloned()
            .collect();
        events.sort_by_key(|event| event.starts_at);
        events.truncate(limit);
        Ok(events)
    }

    async fn event(&self, event_id: &str) -> Result<Option<Event>, DataError> {
        let tables = self.inner.read().await;
        tables.available()?;
        Ok(tables.events.get(event_id).cloned())
    }

    async fn event_rsvps(&self, event_id: &str) -> Result<Vec<Rsvp>, DataError> {
        let tables = self.inner.read().await;
        tables.available()?;
        Ok(tables
            .rsvps
            .iter()
            .filter(|rsvp| rsvp.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn upsert_rsvp(&self, event_id: &str, user_id: &str) -> Result<Rsvp, DataError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        if !tables.events.contains_key(event_id) {
            return Err(DataError::NotFound("Event"));
        }

        let now = Utc::now();
        if let Some(rsvp) = tables
            .rsvps
            .iter_mut()
            .find(|rsvp| rsvp.event_id == event_id && rsvp.user_id == user_id)
        {
            rsvp.status = RsvpStatus::Going;
            rsvp.updated_at = now;
            return Ok(rsvp.clone());
        }

        let rsvp = Rsvp {
            id: new_id(),
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            status: RsvpStatus::Going,
            created_at: now,
            updated_at: now,
        };
        tables.rsvps.push(rsvp.clone());
        Ok(rsvp)
    }

    async fn rsvp(&self, rsvp_id: &str) -> Result<Option<Rsvp>, DataError> {
        let tables = self.inner.read().await;
        tables.available()?;
        Ok(tables.rsvps.iter().find(|rsvp| rsvp.id == rsvp_id).cloned())
    }

    async fn set_rsvp_status(&self, rsvp_id: &str, status: RsvpStatus) -> Result<(), DataError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        let rsvp = tables
            .rsvps
            .iter_mut()
            .find(|rsvp| rsvp.id == rsvp_id)
            .ok_or(DataError::NotFound("RSVP"))?;
        rsvp.status = status;
        rsvp.updated_at = Utc::now();
        Ok(())
    }

    async fn user_rsvps(&self, user_id: &str) -> Result<Vec<(Rsvp, Event)>, DataError> {
        let tables = self.inner.read().await;
        tables.available()?;
        let mut rows: Vec<_> = tables
            .rsvps
            .iter()
            .filter(|rsvp| rsvp.user_id == user_id)
            .filter_map(|rsvp| {
                let event = tables.events.get(&rsvp.event_id)?;
                Some((rsvp.clone(), event.clone()))
            })
            .collect();
        rows.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_idea(&self, idea: NewIdea) -> Result<Idea, DataError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        let idea = Idea {
            id: new_id(),
            user_id: idea.user_id,
            title: idea.title,
            description: idea.description,
            status: IdeaStatus::Pending,
            created_at: Utc::now(),
        };
        tables.ideas.push(idea.clone());
        Ok(idea)
    }

    async fn ideas(&self, status: Option<IdeaStatus>, limit: usize) -> Result<Vec<Idea>, DataError> {
        let tables = self.inner.read().await;
        tables.available()?;
        let mut ideas: Vec<_> = tables
            .ideas
            .iter()
            .filter(|idea| status.is_none_or(|status| idea.status == status))
            .cloned()
            .collect();
        ideas.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        ideas.truncate(limit);
        Ok(ideas)
    }

    async fn upsert_vote(&self, idea_id: &str, user_id: &str, value: i8) -> Result<IdeaVote, DataError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        if !tables.ideas.iter().any(|idea| idea.id == idea_id) {
            return Err(DataError::NotFound("Idea"));
        }

        if let Some(vote) = tables
            .votes
            .iter_mut()
            .find(|vote| vote.idea_id == idea_id && vote.user_id == user_id)
        {
            vote.value = value;
            return Ok(vote.clone());
        }

        let vote = IdeaVote {
            id: new_id(),
            idea_id: idea_id.to_string(),
            user_id: user_id.to_string(),
            value,
        };
        tables.votes.push(vote.clone());
        Ok(vote)
    }

    async fn idea_votes(&self, idea_id: &str) -> Result<Vec<IdeaVote>, DataError> {
        let tables = self.inner.read().await;
        tables.available()?;
        Ok(tables
            .votes
            .iter()
            .filter(|vote| vote.idea_id == idea_id)
            .cloned()
            .collect())
    }

    async fn attendees(&self, event_id: &str) -> Result<Vec<Attendee>, DataError> {
        let tables = self.inner.read().await;
        tables.available()?;
        let mut rsvps: Vec<_> = tables
            .rsvps
            .iter()
            .filter(|rsvp| rsvp.event_id == event_id)
            .collect();
        rsvps.sort_by_key(|rsvp| rsvp.created_at);

        Ok(rsvps
            .into_iter()
            .map(|rsvp| {
                let profile = tables.profiles.get(&rsvp.user_id);
                Attendee {
                    status: rsvp.status,
                    rsvp_date: rsvp.created_at,
                    name: profile.and_then(|p| p.name.clone()),
                    email: profile.and_then(|p| p.email.clone()),
                }
            })
            .collect())
    }

    async fn upsert_checkin(&self, event_id: &str, user_id: &str) -> Result<Checkin, DataError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        if !tables.events.contains_key(event_id) {
            return Err(DataError::NotFound("Event"));
        }

        let now = Utc::now();
        if let Some(checkin) = tables
            .checkins
            .iter_mut()
            .find(|c| c.event_id == event_id && c.user_id == user_id)
        {
            checkin.checked_in_at = now;
            return Ok(checkin.clone());
        }

        let checkin = Checkin {
            id: new_id(),
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            checked_in_at: now,
        };
        tables.checkins.push(checkin.clone());
        Ok(checkin)
    }

    async fn insert_event(&self, event: NewEvent) -> Result<Event, DataError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        let event = Event {
            id: new_id(),
            title: event.title,
            description: event.description,
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            venue: event.venue,
            capacity: event.capacity,
            status: event.status,
            created_by: Some(event.created_by),
        };
        tables.events.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    async fn update_event(&self, event_id: &str, update: EventUpdate) -> Result<Event, DataError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        let event = tables
            .events
            .get_mut(event_id)
            .ok_or(DataError::NotFound("Event"))?;

        if let Some(title) = update.title {
            event.title = title;
        }
        if let Some(description) = update.description {
            event.description = Some(description);
        }
        if let Some(starts_at) = update.starts_at {
            event.starts_at = starts_at;
        }
        if let Some(ends_at) = update.ends_at {
            event.ends_at = Some(ends_at);
        }
        if let Some(venue) = update.venue {
            event.venue = venue;
        }
        if let Some(capacity) = update.capacity {
            event.capacity = capacity;
        }
        if let Some(status) = update.status {
            event.status = status;
        }
        Ok(event.clone())
    }
}
