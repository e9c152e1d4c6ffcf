//! Plain-text rendering of roster rows, timeline rows and gauges.

use std::time::Duration;

use drivesense_core::format::{display_date, display_time, format_relative_time_opt};
use drivesense_core::telemetry::{Gauge, LiveTelemetry};
use drivesense_core::{DriverRecord, EventRecord};
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner shown while a first load is outstanding.
pub fn loading_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Move the cursor home and clear the screen before a redraw.
pub fn clear_screen() {
    print!("\x1b[2J\x1b[H");
}

pub fn roster_header() -> String {
    format!(
        "{:<9} {:<7} {:<3} {:<24} {:<14} {:<12} {}",
        "STATUS", "CARD", "DRV", "NAME", "PHONE", "ADDED", "ID"
    )
}

pub fn driver_row(driver: &DriverRecord) -> String {
    format!(
        "{:<9} {:<7} {:<3} {:<24} {:<14} {:<12} {}",
        driver.status.as_str(),
        driver.status.color().as_str(),
        if driver.driving { "yes" } else { "no" },
        truncate(&driver.name, 24),
        driver.phone_number.as_deref().unwrap_or("-"),
        format_relative_time_opt(driver.created_at),
        driver.driver_id
    )
}

pub fn driver_detail(driver: &DriverRecord) -> Vec<String> {
    let mut lines = vec![
        format!("Name:      {}", driver.name),
        format!("ID:        {}", driver.driver_id),
        format!("Status:    {} ({})", driver.status, driver.status.color().as_str()),
        format!("Driving:   {}", if driver.driving { "yes" } else { "no" }),
        format!("Phone:     {}", driver.phone_number.as_deref().unwrap_or("-")),
        format!("Picture:   {}", driver.profile_pic_or_default()),
    ];
    if driver.emergency_contacts.is_empty() {
        lines.push("Contacts:  none".to_string());
    } else {
        lines.push("Contacts:".to_string());
        for contact in &driver.emergency_contacts {
            lines.push(format!("  - {} {}", contact.name, contact.phone_number));
        }
    }
    lines
}

/// One timeline row; `number` is the event's 1-based position.
pub fn event_row(number: usize, event: &EventRecord) -> String {
    format!(
        "Event {:<3} {:<18} {:<9} {:<9} HR {:>3} bpm  O2 {:>3}%  {:>3} km/h  {}  {}",
        number,
        display_date(&event.date),
        display_time(&event.time_stamp),
        event.status.as_str(),
        event.heart_rate.round() as i64,
        event.blood_oxygen_level.round() as i64,
        event.vehicle_speed.round() as i64,
        if event.has_clip() { "clip" } else { "    " },
        event.event_id
    )
}

pub fn gauge(g: &Gauge) -> String {
    format!(
        "{}: {} {} [{}]",
        g.metric.label(),
        g.value,
        g.metric.unit(),
        g.level.as_str()
    )
}

pub fn gauges_line(live: Option<&LiveTelemetry>) -> String {
    match live {
        Some(live) => live
            .gauges()
            .iter()
            .map(gauge)
            .collect::<Vec<_>>()
            .join("   "),
        None => "Waiting for telemetry...".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}
