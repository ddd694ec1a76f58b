mod account;
mod events;
mod modifiers;
mod summary;
mod sync;

use std::future::Future;

use anyhow::{Context, anyhow};
use chrono::Utc;
use chrono_tz::Tz;
use tracing::{debug, instrument};

use crate::auth::AccountAction;
use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::filter::EventQuery;
use crate::notice::Notice;
use crate::render::Renderer;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "edit",
        "delete",
        "info",
        "list",
        "timeline",
        "summarize",
        "login",
        "signup",
        "logout",
        "whoami",
        "webdav",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

fn uses_filter(command: &str) -> bool {
    matches!(command, "list" | "timeline" | "summarize")
}

#[instrument(skip(store, cfg, renderer, tz, inv))]
pub fn dispatch(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    tz: Tz,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let command = inv.command.as_str();

    debug!(
        command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        "dispatching command"
    );

    if !uses_filter(command) && !inv.filter_terms.is_empty() {
        return Err(anyhow!(
            "{command} does not take filter terms: {}",
            inv.filter_terms.join(" ")
        ));
    }
    let query = EventQuery::parse(&inv.filter_terms)?;

    match command {
        "add" => events::cmd_add(store, &inv.command_args, now),
        "edit" => events::cmd_edit(store, &inv.command_args),
        "delete" => events::cmd_delete(store, &inv.command_args),
        "info" => events::cmd_info(store, renderer, &inv.command_args),
        "list" => events::cmd_list(store, renderer, &query, now, &tz),
        "timeline" => events::cmd_timeline(store, renderer, &query, now, &tz),
        "summarize" => {
            summary::cmd_summarize(store, cfg, renderer, &query, &inv.command_args, now, &tz)
        }
        "login" => account::cmd_authenticate(
            store,
            cfg,
            renderer,
            AccountAction::SignIn,
            &inv.command_args,
        ),
        "signup" => account::cmd_authenticate(
            store,
            cfg,
            renderer,
            AccountAction::SignUp,
            &inv.command_args,
        ),
        "logout" => account::cmd_logout(store, renderer),
        "whoami" => account::cmd_whoami(store, now, &tz),
        "webdav" => sync::cmd_webdav(store, cfg, renderer, &inv.command_args),
        "_commands" => cmd_commands(),
        "_show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Runs one network call on a fresh single-threaded runtime.
fn run_async<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

/// Shows a failure notice and turns it into the command's error.
fn fail_with(renderer: &Renderer, notice: Notice) -> anyhow::Result<()> {
    renderer.print_notice(&notice)?;
    Err(anyhow!("{}", notice.title))
}

fn prompt_password(label: &str) -> anyhow::Result<String> {
    rpassword::prompt_password(format!("{label}: ")).context("failed to read password")
}

fn cmd_commands() -> anyhow::Result<()> {
    for command in known_command_names() {
        println!("{command}");
    }
    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    let mut entries: Vec<_> = cfg.iter().collect();
    entries.sort();
    for (k, v) in entries {
        println!("{k}={}", mask_secret(k, v));
    }
    Ok(())
}

fn mask_secret(key: &str, value: &str) -> String {
    if key.ends_with("api_key") || key.ends_with("password") {
        "********".to_string()
    } else {
        value.to_string()
    }
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "usage: lifeline [options] [filter] <command> [args]

filter terms:
  type:<note|todo|schedule|all>   only events of this type
  range:<token>                   all, today, thisWeek, last7days, last30days,
                                  thisMonth, thisQuarter, lastMonth
  <words>                         search title and description

commands:
  add <title> [type:T] [desc:TEXT] [image:PATH|URL] [attach:PATH]
  edit <id> [title:TEXT] [type:T] [desc:TEXT] [image:..] [attach:..]
  delete <id>
  info <id>
  list                            card table of matching events
  timeline                        vertical timeline of matching events
  summarize <question>            AI summary of matching events
  login <email> | signup <email> | logout | whoami
  webdav connect <url> <user> | test | save | load | forget
  version | help | _commands | _show

Command names may be abbreviated. An empty modifier value (desc:) clears it."
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("sum", &known), Some("summarize"));
        assert_eq!(expand_command_abbrev("t", &known), Some("timeline"));
        assert_eq!(expand_command_abbrev("lo", &known), None);
        assert_eq!(expand_command_abbrev("logo", &known), Some("logout"));
        assert_eq!(expand_command_abbrev("zzz", &known), None);
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask_secret("ai.api_key", "sk-123"), "********");
        assert_eq!(mask_secret("ai.model", "gpt-4o-mini"), "gpt-4o-mini");
    }

    #[test]
    fn commands_without_filters_reject_filter_terms() {
        assert!(uses_filter("list"));
        assert!(uses_filter("summarize"));
        assert!(!uses_filter("add"));
    }
}
