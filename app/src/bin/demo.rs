//! RSVP Engine Demo
//!
//! Walks one moderated event through its registration lifecycle:
//! - Publishing the event
//! - Requests arriving as pending
//! - The organizer confirming the last slots, cascading rejections
//! - A cancellation freeing a slot
//!
//! # Usage
//!
//! ```bash
//! # Start PostgreSQL
//! docker run -d -p 5432:5432 -e POSTGRES_PASSWORD=postgres -e POSTGRES_DB=rsvp postgres:16
//!
//! # Run demo
//! cargo run --bin demo
//! ```

use rsvp_app::{AppError, Config, RegistrationApp, telemetry};
use rsvp_core::ledger::EventDirectory;
use rsvp_core::lifecycle::EventStateAction;
use rsvp_core::{Decision, Event, EventId, EventState, UserId, Utc};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env();
    telemetry::init_tracing(&config.telemetry);

    println!("\n============================================");
    println!("   RSVP Engine - Live Demo");
    println!("============================================\n");
    println!("Configuration:\n{}\n", config.redacted_json());

    let app = RegistrationApp::connect(&config).await?;
    let service = &app.service;

    let organizer = UserId::new(1);
    let event_id = EventId::new(Utc::now().timestamp_millis());

    println!("1. Creating a moderated event with 2 slots...");
    app.directory
        .save(Event {
            id: event_id,
            initiator_id: organizer,
            participant_limit: 2,
            request_moderation: true,
            state: EventState::Pending,
            published_on: None,
        })
        .await?;

    println!("2. Publishing...");
    let event = service
        .apply_admin_action(event_id, EventStateAction::PublishEvent)
        .await?;
    println!("   state={} published_on={:?}\n", event.state, event.published_on);

    println!("3. Four users ask to join...");
    let mut requests = Vec::new();
    for user in 2..=5 {
        let request = service.submit(UserId::new(user), event_id).await?;
        println!("   request {} from user {}: {}", request.id, user, request.status);
        requests.push(request);
    }

    println!("\n4. Organizer confirms users 4 and 2 (in that order)...");
    let outcome = service
        .resolve(
            organizer,
            event_id,
            vec![requests[2].id, requests[0].id],
            Decision::Confirm,
        )
        .await?;
    for request in &outcome.confirmed {
        println!("   confirmed request {}", request.id);
    }
    for request in &outcome.rejected {
        println!("   rejected request {} (event full)", request.id);
    }

    println!("\n5. A late request is refused...");
    match service.submit(UserId::new(6), event_id).await {
        Ok(request) => println!("   unexpected: admitted as {}", request.status),
        Err(error) => println!("   {error}"),
    }

    println!("\n6. User 2 cancels, freeing a slot...");
    let canceled = service.cancel(UserId::new(2), requests[0].id).await?;
    println!("   request {} is now {}", canceled.id, canceled.status);
    let counts = service.confirmed_counts(vec![event_id]).await?;
    println!(
        "   confirmed now: {}",
        counts.get(&event_id).copied().unwrap_or_default()
    );

    if let Some(rendered) = app.render_metrics() {
        println!("\nMetrics:\n{rendered}");
    }

    println!("\nDemo complete.");
    Ok(())
}
