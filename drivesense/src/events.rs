//! `drivesense events ...` - one driver's timeline and live gauges

use anyhow::Result;
use clap::Subcommand;
use drivesense_core::telemetry::{DriverTelemetry, TelemetryMonitor};
use drivesense_core::timeline::{EventDraft, TimelineSync};
use drivesense_core::{DriverStatus, Session};

use crate::drivers::confirm;
use crate::{notify, render, App};

#[derive(Subcommand)]
pub enum EventsCommand {
    /// List a driver's events once
    List {
        driver_id: String,
        /// Print the records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep the timeline and live gauges on screen until Ctrl-C
    Watch { driver_id: String },

    /// Record an event stamped with the driver's current readings
    Add {
        driver_id: String,
        #[arg(long, default_value = "unstable")]
        status: DriverStatus,
        /// Evidence pointer (video or image URI)
        #[arg(long, default_value = "")]
        video_link: String,
    },

    /// Delete an event
    Delete {
        driver_id: String,
        event_id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

pub async fn run(ctx: &App, command: EventsCommand) -> Result<()> {
    let session = ctx.session()?;

    match command {
        EventsCommand::List { driver_id, json } => {
            let timeline = TimelineSync::connect(ctx.services.events.clone(), &driver_id);
            load(&timeline).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&timeline.events())?);
            } else {
                print_timeline(&timeline);
            }
            Ok(())
        }
        EventsCommand::Watch { driver_id } => watch(ctx, &session, &driver_id).await,
        EventsCommand::Add {
            driver_id,
            status,
            video_link,
        } => {
            let timeline = TimelineSync::connect(ctx.services.events.clone(), &driver_id);
            let monitor = monitor(ctx, &session, &driver_id);
            monitor.refresh().await;

            let draft = EventDraft::new(driver_name(ctx, &session, &driver_id).await, monitor.current())
                .with_status(status)
                .with_video_link(video_link);
            let event = timeline.add(draft).await.map_err(notify)?;
            println!("Added event {} ({} {})", event.event_id, event.date, event.time_stamp);
            Ok(())
        }
        EventsCommand::Delete {
            driver_id,
            event_id,
            yes,
        } => {
            let timeline = TimelineSync::connect(ctx.services.events.clone(), &driver_id);
            load(&timeline).await;
            if !yes && !confirm(&format!("Delete event {}?", event_id))? {
                println!("Cancelled.");
                return Ok(());
            }
            timeline.delete(&event_id).await.map_err(notify)?;
            println!("Deleted event {}", event_id);
            Ok(())
        }
    }
}

fn monitor(ctx: &App, session: &Session, driver_id: &str) -> TelemetryMonitor<DriverTelemetry> {
    TelemetryMonitor::new(DriverTelemetry::new(
        ctx.services.drivers.clone(),
        driver_id,
        session,
    ))
}

/// Display name used in new event ids; falls back to the driver id.
async fn driver_name(ctx: &App, session: &Session, driver_id: &str) -> String {
    match ctx
        .services
        .drivers
        .get_record(driver_id, &session.user_id)
        .await
    {
        Ok(driver) if !driver.name.trim().is_empty() => driver.name,
        Ok(_) => driver_id.to_string(),
        Err(e) => {
            tracing::warn!(driver_id = %driver_id, error = %e, "Could not look up driver name");
            driver_id.to_string()
        }
    }
}

async fn load(timeline: &TimelineSync) {
    let spinner = render::loading_spinner("Loading events...");
    timeline.load().await;
    spinner.finish_and_clear();
}

fn print_timeline(timeline: &TimelineSync) {
    let events = timeline.events();
    if events.is_empty() {
        println!("No events recorded.");
        return;
    }
    for (index, event) in events.iter().enumerate() {
        println!("{}", render::event_row(index + 1, event));
    }
}

async fn watch(ctx: &App, session: &Session, driver_id: &str) -> Result<()> {
    let timeline = TimelineSync::connect(ctx.services.events.clone(), driver_id);
    let monitor = monitor(ctx, session, driver_id);

    load(&timeline).await;
    let sync = &ctx.config.sync;
    let _timeline_polling = timeline.spawn_polling(sync.timeline_interval());
    let _telemetry_polling = monitor.spawn_polling(sync.telemetry_interval());

    let mut redraw = tokio::time::interval(sync.telemetry_interval());
    loop {
        tokio::select! {
            _ = redraw.tick() => {
                render::clear_screen();
                println!("Driver {} - Ctrl-C to stop", driver_id);
                println!("{}", render::gauges_line(monitor.current().as_ref()));
                println!();
                print_timeline(&timeline);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(driver_id = %driver_id, "Timeline watch stopped");
                return Ok(());
            }
        }
    }
}
