//! Authentication commands.

use super::{confirm, prompt_line, prompt_secret, reject_invalid, Context};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use chrono::Local;
use hive_session::{Identity, LoginForm, RegistrationForm, SessionStatus};

/// Login with email and password.
pub async fn login(ctx: &Context, email: Option<String>, format: &OutputFormat) -> Result<()> {
    if let Some(identity) = resolved_identity(ctx).await {
        output::print_success(&format!("Already logged in as {}", identity.email), format);
        return Ok(());
    }

    let form = LoginForm {
        email: prompt_line("Email", email)?,
        secret: prompt_secret("Password")?,
    };
    if let Err(errors) = form.validate() {
        return Err(reject_invalid(errors, format));
    }

    if matches!(format, OutputFormat::Text) {
        println!("Logging in...");
    }
    let identity = ctx.manager.login(form.email.trim(), &form.secret).await?;
    report_signed_in(ctx, &identity, "Logged in", format);
    Ok(())
}

/// Create an account, then log in with it.
pub async fn register(
    ctx: &Context,
    name: Option<String>,
    email: Option<String>,
    accept_terms: bool,
    format: &OutputFormat,
) -> Result<()> {
    let name = prompt_line("Name", name)?;
    let email = prompt_line("Email", email)?;
    let secret = prompt_secret("Password")?;
    let confirm_secret = prompt_secret("Confirm password")?;
    let accepted_terms = accept_terms || confirm("Do you accept the terms of use?");

    let form = RegistrationForm {
        name,
        email,
        secret,
        confirm_secret,
        accepted_terms,
    };
    let request = match form.into_request() {
        Ok(request) => request,
        Err(errors) => return Err(reject_invalid(errors, format)),
    };

    if matches!(format, OutputFormat::Text) {
        println!("Creating account...");
    }
    let identity = ctx.manager.register(&request).await?;
    report_signed_in(ctx, &identity, "Account created, logged in", format);
    Ok(())
}

/// Logout and forget the stored credential.
pub fn logout(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let had_credential = ctx.manager.snapshot().has_credential
        || ctx.credentials.has_access_token().unwrap_or(false);
    ctx.manager.logout();

    if had_credential {
        output::print_success("Logged out", format);
    } else {
        output::print_success("Not logged in", format);
    }
    Ok(())
}

/// Show the resolved session.
pub async fn status(ctx: &Context, format: &OutputFormat) -> Result<()> {
    ctx.manager.initialize().await;
    let snapshot = ctx.manager.snapshot();

    match format {
        OutputFormat::Json => output::print_json(&snapshot),
        OutputFormat::Text => {
            output::print_heading("Session");
            output::print_row("Status", snapshot.status.as_str());
            output::print_row("API", &ctx.config.api_url);
            if let Some(identity) = &snapshot.identity {
                output::print_row("User", &format!("{} (#{})", identity.name, identity.id));
                output::print_row("Email", &identity.email);
                if !identity.roles.is_empty() {
                    output::print_row("Roles", &identity.roles.join(", "));
                }
            }
            if let Some(expires_at) = snapshot.expires_at {
                let local = expires_at.with_timezone(&Local);
                output::print_row("Expires", &local.format("%Y-%m-%d %H:%M:%S").to_string());
            }
            if snapshot.status == SessionStatus::Anonymous {
                println!("\nRun 'hive login' to sign in.");
            }
        }
    }
    Ok(())
}

/// Resolve a stored credential and return the identity, if any.
async fn resolved_identity(ctx: &Context) -> Option<Identity> {
    match ctx.manager.initialize().await {
        SessionStatus::Authenticated => ctx.manager.identity(),
        _ => None,
    }
}

fn report_signed_in(ctx: &Context, identity: &Identity, message: &str, format: &OutputFormat) {
    let next = ctx.navigator.take_last();
    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "status": "success",
            "message": message,
            "identity": identity,
            "next": next,
        })),
        OutputFormat::Text => {
            println!("{} as {} ({})", message, identity.name, identity.email);
            if let Some(route) = next {
                println!("Continue at {}", route);
            }
        }
    }
}
