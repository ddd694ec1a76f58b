use anyhow::anyhow;
use tracing::{info, instrument};

use super::{expand_command_abbrev, fail_with, prompt_password, run_async};
use crate::config::Config;
use crate::datastore::DataStore;
use crate::notice::Notice;
use crate::render::Renderer;
use crate::webdav::{WebDavSettings, WebDavSync};

const SUBCOMMANDS: [&str; 5] = ["connect", "test", "save", "load", "forget"];

#[instrument(skip(store, cfg, renderer, args))]
pub(super) fn cmd_webdav(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let (sub, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("webdav requires one of: {}", SUBCOMMANDS.join(", ")))?;
    let sub = expand_command_abbrev(sub, &SUBCOMMANDS)
        .ok_or_else(|| anyhow!("unknown webdav command: {sub}"))?;
    info!(sub, "command webdav");

    if sub == "forget" {
        let notice = if WebDavSettings::forget(store)? {
            Notice::success("Disconnected", "WebDAV settings were removed.")
        } else {
            Notice::info("Not connected", "No WebDAV settings were stored.")
        };
        return renderer.print_notice(&notice);
    }

    let settings = if sub == "connect" {
        let [url, username] = rest else {
            return Err(anyhow!("usage: webdav connect <url> <username>"));
        };
        let settings = WebDavSettings {
            url: url.trim().to_string(),
            username: username.trim().to_string(),
            password: prompt_password("WebDAV password")?,
        };
        if let Err(err) = settings.validate() {
            return fail_with(renderer, err.notice());
        }
        settings.save(store)?;
        Some(settings)
    } else {
        WebDavSettings::load(store)?
    };

    let sync = WebDavSync::from_config(cfg, settings)?;
    let result = match sub {
        "connect" | "test" => run_async(sync.test_connection())?,
        "save" => {
            let timeline = store.load_timeline()?;
            run_async(sync.save(timeline.events()))?.map(|report| {
                Notice::success(
                    "Saved",
                    format!("Uploaded {} events to the WebDAV server.", report.events),
                )
            })
        }
        "load" => match run_async(sync.load())? {
            Ok(remote) => {
                let mut timeline = store.load_timeline()?;
                let added = timeline.merge(remote);
                if added > 0 {
                    store.save_timeline(&timeline)?;
                }
                Ok(Notice::success(
                    "Loaded",
                    format!("{added} new events from the WebDAV server."),
                ))
            }
            Err(err) => Err(err),
        },
        other => return Err(anyhow!("unknown webdav command: {other}")),
    };

    match result {
        Ok(notice) => renderer.print_notice(&notice),
        Err(err) => fail_with(renderer, err.notice()),
    }
}
