//! Account commands: signup, login, logout, whoami, password reset

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use drivesense_core::account::{save_profile, ProfileEdit};
use drivesense_core::{generate_id, NewUser};

use crate::{notify, App};

#[derive(Args)]
pub struct SignupArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, default_value = "")]
    pub phone: String,
    #[arg(long)]
    pub password: String,
}

#[derive(Subcommand)]
pub enum AccountCommand {
    /// Show the account's profile
    Show,

    /// Change name, email or phone number
    Edit {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
}

pub async fn run(ctx: &App, command: AccountCommand) -> Result<()> {
    let session = ctx.session()?;

    match command {
        AccountCommand::Show => {
            let user = ctx
                .services
                .users
                .get(&session.user_id)
                .await
                .map_err(notify)?;
            println!("Name:   {}", user.name);
            println!("Email:  {}", user.email);
            let phone = if user.phone_number.is_empty() { "-" } else { user.phone_number.as_str() };
            println!("Phone:  {}", phone);
            println!("ID:     {}", session.user_id);
            Ok(())
        }
        AccountCommand::Edit { name, email, phone } => {
            let edit = ProfileEdit {
                name,
                email,
                phone_number: phone,
            };
            if edit.is_empty() {
                bail!("nothing to change; pass --name, --email or --phone");
            }
            let saved = save_profile(&ctx.services.users, &session.user_id, &edit)
                .await
                .map_err(notify)?;
            if saved.is_empty() {
                println!("No changes.");
            } else {
                println!("Saved {}", saved.join(", "));
            }
            Ok(())
        }
    }
}

pub async fn signup(ctx: &App, args: SignupArgs) -> Result<()> {
    let name = args.name.trim();
    if name.is_empty() || args.email.trim().is_empty() {
        bail!("name and email are required");
    }
    if args.password.len() < 6 {
        bail!("password must be at least 6 characters");
    }

    let user = NewUser {
        user_id: generate_id("user", name),
        name: name.to_string(),
        email: args.email.trim().to_string(),
        phone_number: args.phone.trim().to_string(),
        password: Some(args.password),
    };

    let user_id = ctx.services.users.create(&user).await.map_err(notify)?;
    ctx.sessions
        .sign_in(&user_id)
        .context("failed to save session")?;

    println!("Account created. Signed in as {} ({})", name, user_id);
    Ok(())
}

pub async fn login(ctx: &App, email: &str, password: &str) -> Result<()> {
    let user_id = ctx
        .services
        .users
        .login(email.trim(), password)
        .await
        .map_err(notify)?;
    ctx.sessions
        .sign_in(&user_id)
        .context("failed to save session")?;

    println!("Signed in as {}", user_id);
    Ok(())
}

pub fn logout(ctx: &App) -> Result<()> {
    ctx.sessions.sign_out().context("failed to clear session")?;
    println!("Signed out.");
    Ok(())
}

pub fn whoami(ctx: &App) -> Result<()> {
    match ctx.sessions.load().context("failed to read session")? {
        Some(session) => println!(
            "Signed in as {} (since {})",
            session.user_id,
            session.signed_in_at.format("%Y-%m-%d %H:%M UTC")
        ),
        None => println!("Not signed in."),
    }
    Ok(())
}

pub async fn forgot_password(ctx: &App, email: &str) -> Result<()> {
    ctx.services
        .users
        .request_reset(email.trim())
        .await
        .map_err(notify)?;
    println!("If an account exists for {}, a reset token is on its way.", email.trim());
    Ok(())
}

pub async fn reset_password(ctx: &App, token: &str, password: &str) -> Result<()> {
    if password.len() < 6 {
        bail!("password must be at least 6 characters");
    }
    ctx.services
        .users
        .reset_password(token.trim(), password)
        .await
        .map_err(notify)?;
    println!("Password updated. You can now log in.");
    Ok(())
}
