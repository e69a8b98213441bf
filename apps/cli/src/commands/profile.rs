//! Profile and password commands.

use super::{prompt_secret, reject_invalid, Context};
use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use hive_session::forms::{is_valid_email, MIN_NAME_CHARS};
use hive_session::{IdentityPatch, PasswordChangeForm, ValidationErrors};

/// Profile fields given on the command line.
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
}

impl ProfileUpdate {
    fn into_patch(self) -> Result<IdentityPatch, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = self.name.map(|n| n.trim().to_string());
        let email = self.email.map(|e| e.trim().to_string());

        if let Some(name) = &name {
            if name.chars().count() < MIN_NAME_CHARS {
                errors.add(
                    "name",
                    format!("Name must be at least {} characters", MIN_NAME_CHARS),
                );
            }
        }
        if let Some(email) = &email {
            if !is_valid_email(email) {
                errors.add("email", "Invalid email address");
            }
        }
        errors.into_result()?;

        Ok(IdentityPatch {
            name,
            email,
            photo_url: self.photo_url,
            bio: self.bio,
        })
    }
}

/// Send a profile update and show the confirmed identity.
pub async fn profile_update(ctx: &Context, update: ProfileUpdate, format: &OutputFormat) -> Result<()> {
    let patch = match update.into_patch() {
        Ok(patch) => patch,
        Err(errors) => return Err(reject_invalid(errors, format)),
    };
    if patch.is_empty() {
        bail!("Nothing to update. Pass at least one of --name, --email, --bio, --photo-url");
    }

    ctx.manager.initialize().await;
    let identity = ctx.manager.update_profile(&patch).await?;

    match format {
        OutputFormat::Json => output::print_json(&identity),
        OutputFormat::Text => {
            println!("Profile updated");
            output::print_row("Name", &identity.name);
            output::print_row("Email", &identity.email);
            if let Some(bio) = &identity.bio {
                output::print_row("Bio", bio);
            }
            if let Some(photo_url) = &identity.photo_url {
                output::print_row("Photo", photo_url);
            }
        }
    }
    Ok(())
}

/// Change the account password.
pub async fn change_password(ctx: &Context, format: &OutputFormat) -> Result<()> {
    ctx.manager.initialize().await;
    if !ctx.manager.is_authenticated() {
        bail!("Not logged in. Run 'hive login' first");
    }

    let form = PasswordChangeForm {
        current_secret: prompt_secret("Current password")?,
        new_secret: prompt_secret("New password")?,
        confirm_secret: prompt_secret("Confirm new password")?,
    };
    let change = match form.into_request() {
        Ok(change) => change,
        Err(errors) => return Err(reject_invalid(errors, format)),
    };

    ctx.manager.change_password(&change).await?;
    output::print_success("Password changed", format);
    Ok(())
}
