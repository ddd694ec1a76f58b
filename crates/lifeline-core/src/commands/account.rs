use anyhow::anyhow;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, instrument, warn};

use super::{fail_with, prompt_password, run_async};
use crate::auth::{AccountAction, IdentityToolkit, Session, authenticate};
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::format_local;
use crate::notice::Notice;
use crate::render::Renderer;

#[instrument(skip(store, cfg, renderer, args))]
pub(super) fn cmd_authenticate(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    action: AccountAction,
    args: &[String],
) -> anyhow::Result<()> {
    let email = match args {
        [email] => email.trim(),
        [] => return Err(anyhow!("an email address is required")),
        _ => return Err(anyhow!("expected a single email address")),
    };

    let provider = match IdentityToolkit::from_config(cfg) {
        Ok(provider) => provider,
        Err(err) => return fail_with(renderer, err.notice()),
    };

    let password = prompt_password("Password")?;
    if action == AccountAction::SignUp && prompt_password("Confirm password")? != password {
        return fail_with(
            renderer,
            Notice::error("Passwords do not match", "Type the same password twice."),
        );
    }

    match run_async(authenticate(&provider, store, action, email, &password))? {
        Ok(session) => {
            info!(email = %session.email, "authenticated");
            let notice = match action {
                AccountAction::SignIn => {
                    Notice::success("Signed in", format!("Welcome back, {}.", session.email))
                }
                AccountAction::SignUp => Notice::success(
                    "Account created",
                    format!("Signed in as {}.", session.email),
                ),
            };
            renderer.print_notice(&notice)
        }
        Err(err) => {
            warn!(error = %err, "authentication failed");
            fail_with(renderer, err.notice())
        }
    }
}

#[instrument(skip(store, renderer))]
pub(super) fn cmd_logout(store: &DataStore, renderer: &Renderer) -> anyhow::Result<()> {
    let notice = if Session::clear(store)? {
        Notice::success("Signed out", "Your local session was removed.")
    } else {
        Notice::info("Not signed in", "There was no active session.")
    };
    renderer.print_notice(&notice)
}

#[instrument(skip(store, now, tz))]
pub(super) fn cmd_whoami(store: &DataStore, now: DateTime<Utc>, tz: &Tz) -> anyhow::Result<()> {
    let Some(session) = Session::load(store)? else {
        println!("Not signed in.");
        return Ok(());
    };

    println!("email     {}", session.email);
    println!("user id   {}", session.user_id);
    let expires = format_local(session.expires_at, tz, "%Y-%m-%d %H:%M %Z");
    if session.is_expired(now) {
        println!("session   expired {expires}; run `lifeline login` again");
    } else {
        println!("session   valid until {expires}");
    }
    Ok(())
}
