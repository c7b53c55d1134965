//! Binary entry point for the meetup-mcp server.

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Parser;
use meetup_mcp::data::{DataStore, EventStatus, MemoryDataStore, NewEvent, Role};
use meetup_mcp::store::MemoryCredentialStore;
use meetup_mcp::{AppState, Config, router};
use tracing_subscriber::EnvFilter;

/// Populate the in-memory store with an organizer, a session and an event.
async fn seed_demo(data: &MemoryDataStore, config: &Config) -> anyhow::Result<()> {
    let organizer = data
        .insert_profile("Demo Organizer", "organizer@example.com", Role::Organizer)
        .await;
    let session = data.create_session(&organizer).await;
    data.insert_event(NewEvent {
        title: "Rust & Coffee".into(),
        description: Some("Lightning talks and open hacking.".into()),
        starts_at: Utc::now() + Duration::days(7),
        ends_at: Some(Utc::now() + Duration::days(7) + Duration::hours(2)),
        venue: "Community Library, Room 2".into(),
        capacity: 40,
        status: EventStatus::Published,
        created_by: organizer.clone(),
    })
    .await
    .context("seeding demo event")?;

    tracing::info!(
        user_id = %organizer,
        cookie = %format!("{}={session}", config.session_cookie),
        "seeded demo organizer"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let data = MemoryDataStore::new();
    if config.seed_demo {
        seed_demo(&data, &config).await?;
    }

    let bind = config.bind;
    let public_url = config.public_url.clone();
    let state = AppState::new(MemoryCredentialStore::new(), data, config);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!(%bind, %public_url, "meetup-mcp listening");
    axum::serve(listener, router(state))
        .await
        .context("server error")?;
    Ok(())
}
