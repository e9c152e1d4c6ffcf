//! `drivesense drivers ...` - the roster

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use drivesense_core::roster::{ContactDraft, DriverDraft, DriverEdit, RosterSync, RosterView, SortOrder};
use drivesense_core::{DriverStatus, SyncState};

use crate::{notify, render, App};

#[derive(Subcommand)]
pub enum DriversCommand {
    /// List the roster once
    List {
        #[command(flatten)]
        view: ViewArgs,
        /// Print the records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep the roster on screen, refreshing until Ctrl-C
    Watch {
        #[command(flatten)]
        view: ViewArgs,
    },

    /// Show one driver
    Show { driver_id: String },

    /// Add a driver
    Add {
        #[arg(long)]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long)]
        product_id: Option<String>,
        #[arg(long)]
        profile_pic: Option<String>,
        /// Emergency contact as "First Last:phone" (repeatable)
        #[arg(long = "contact")]
        contacts: Vec<String>,
    },

    /// Edit a driver's name, phone or emergency contacts
    Edit {
        driver_id: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Replace emergency contacts; "First Last:phone" (repeatable)
        #[arg(long = "contact")]
        contacts: Vec<String>,
        /// Remove all emergency contacts
        #[arg(long, conflicts_with = "contacts")]
        clear_contacts: bool,
    },

    /// Add one emergency contact to a driver
    AddContact {
        driver_id: String,
        /// "First Last:phone"
        #[arg(long)]
        contact: String,
    },

    /// Set a driver's status (idle, lockedin, unstable, severe)
    SetStatus {
        driver_id: String,
        status: DriverStatus,
    },

    /// Remove a driver and all of their events
    Remove {
        driver_id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(clap::Args)]
pub struct ViewArgs {
    /// newest, oldest, severity or alphabetical
    #[arg(long, default_value = "newest")]
    sort: SortOrder,

    /// Case-insensitive name filter
    #[arg(long)]
    search: Option<String>,
}

impl ViewArgs {
    fn view(&self) -> RosterView {
        RosterView {
            sort: self.sort,
            search: self.search.clone(),
        }
    }
}

pub async fn run(ctx: &App, command: DriversCommand) -> Result<()> {
    let session = ctx.session()?;
    let roster = RosterSync::connect(ctx.services.drivers.clone(), &session);

    match command {
        DriversCommand::List { view, json } => {
            load(&roster).await;
            if json {
                let drivers = roster.view(&view.view());
                println!("{}", serde_json::to_string_pretty(&drivers)?);
            } else {
                print_roster(&roster, &view.view());
            }
            Ok(())
        }
        DriversCommand::Watch { view } => watch(ctx, &roster, view.view()).await,
        DriversCommand::Show { driver_id } => {
            load(&roster).await;
            let driver = roster
                .driver(&driver_id)
                .with_context(|| format!("no driver with id {}", driver_id))?;
            for line in render::driver_detail(&driver) {
                println!("{}", line);
            }
            Ok(())
        }
        DriversCommand::Add {
            first_name,
            last_name,
            phone,
            product_id,
            profile_pic,
            contacts,
        } => {
            let draft = DriverDraft {
                first_name,
                last_name,
                phone_number: phone,
                product_id,
                profile_pic,
                emergency_contacts: parse_contacts(&contacts)?,
            };
            let driver = roster.add(draft).await.map_err(notify)?;
            println!("Added {} ({})", driver.name, driver.driver_id);
            Ok(())
        }
        DriversCommand::Edit {
            driver_id,
            first_name,
            last_name,
            phone,
            contacts,
            clear_contacts,
        } => {
            load(&roster).await;
            let current = roster
                .driver(&driver_id)
                .with_context(|| format!("no driver with id {}", driver_id))?;

            let mut edit = DriverEdit::from_record(&current);
            if let Some(first_name) = first_name {
                edit.first_name = first_name;
            }
            if let Some(last_name) = last_name {
                edit.last_name = last_name;
            }
            if let Some(phone) = phone {
                edit.phone_number = phone;
            }
            if clear_contacts {
                edit.emergency_contacts.clear();
            } else if !contacts.is_empty() {
                edit.emergency_contacts = parse_contacts(&contacts)?;
            }

            roster.save_edit(&edit).await.map_err(notify)?;
            println!("Saved {}", driver_id);
            Ok(())
        }
        DriversCommand::AddContact { driver_id, contact } => {
            load(&roster).await;
            if !roster.reconciler().contains(&driver_id) {
                bail!("no driver with id {}", driver_id);
            }
            let contact = parse_contacts(std::slice::from_ref(&contact))?
                .pop()
                .context("missing contact")?;
            let added = roster
                .add_contact(&driver_id, contact)
                .await
                .map_err(notify)?;
            println!("Added {} ({}) to {}", added.name, added.phone_number, driver_id);
            Ok(())
        }
        DriversCommand::SetStatus { driver_id, status } => {
            roster
                .set_status(&driver_id, status)
                .await
                .map_err(notify)?;
            println!("{} is now {}", driver_id, status);
            Ok(())
        }
        DriversCommand::Remove { driver_id, yes } => {
            load(&roster).await;
            let driver = roster
                .driver(&driver_id)
                .with_context(|| format!("no driver with id {}", driver_id))?;

            if !yes && !confirm(&format!("Remove {} and all of their events?", driver.name))? {
                println!("Cancelled.");
                return Ok(());
            }
            roster.remove(&driver_id).await.map_err(notify)?;
            println!("Removed {}", driver.name);
            Ok(())
        }
    }
}

/// First load behind a spinner. A failed load shows an empty roster.
async fn load(roster: &RosterSync) -> SyncState {
    let spinner = render::loading_spinner("Loading drivers...");
    let state = roster.load().await;
    spinner.finish_and_clear();
    state
}

fn print_roster(roster: &RosterSync, view: &RosterView) {
    let drivers = roster.view(view);
    if drivers.is_empty() {
        println!("No drivers yet.");
        return;
    }
    println!("{}", render::roster_header());
    for driver in &drivers {
        println!("{}", render::driver_row(driver));
    }
}

async fn watch(ctx: &App, roster: &RosterSync, view: RosterView) -> Result<()> {
    load(roster).await;
    let period = ctx.config.sync.roster_interval();
    let _polling = roster.spawn_polling(period);

    let mut redraw = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = redraw.tick() => {
                render::clear_screen();
                println!(
                    "Roster ({}, sorted by {}) - Ctrl-C to stop",
                    roster.state().as_str(),
                    view.sort.as_str()
                );
                println!();
                print_roster(roster, &view);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Roster watch stopped");
                return Ok(());
            }
        }
    }
}

/// Parse "First Last:phone" contact arguments.
fn parse_contacts(raw: &[String]) -> Result<Vec<ContactDraft>> {
    raw.iter()
        .map(|entry| {
            let (name, phone) = entry
                .rsplit_once(':')
                .with_context(|| format!("contact {:?} must look like \"Name:phone\"", entry))?;
            let name = name.trim();
            let (first_name, last_name) = name.split_once(' ').unwrap_or((name, ""));
            Ok(ContactDraft {
                first_name: first_name.to_string(),
                last_name: last_name.trim().to_string(),
                phone_number: phone.trim().to_string(),
            })
        })
        .collect()
}

pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    if answer.is_empty() {
        bail!("no answer given; pass --yes to skip the prompt");
    }
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_contacts() {
        let contacts =
            parse_contacts(&["Sam Doe:555-0101".to_string(), "Pat: 555".to_string()]).unwrap();
        assert_eq!(contacts[0].first_name, "Sam");
        assert_eq!(contacts[0].last_name, "Doe");
        assert_eq!(contacts[0].phone_number, "555-0101");
        assert_eq!(contacts[1].last_name, "");
        assert_eq!(contacts[1].phone_number, "555");
    }

    #[test]
    fn test_parse_contacts_rejects_missing_phone() {
        assert!(parse_contacts(&["Sam Doe".to_string()]).is_err());
    }
}
