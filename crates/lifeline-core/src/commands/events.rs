use anyhow::anyhow;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument};

use super::modifiers::{build_draft, build_patch};
use crate::datastore::DataStore;
use crate::event::Event;
use crate::filter::EventQuery;
use crate::render::Renderer;

fn id_arg<'a>(command: &str, args: &'a [String]) -> anyhow::Result<(&'a str, &'a [String])> {
    let (id, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("{command} requires an event id"))?;
    Ok((id.as_str(), rest))
}

fn single_id_arg<'a>(command: &str, args: &'a [String]) -> anyhow::Result<&'a str> {
    let (id, rest) = id_arg(command, args)?;
    if !rest.is_empty() {
        return Err(anyhow!("{command} takes exactly one event id"));
    }
    Ok(id)
}

#[instrument(skip(store, args, now))]
pub(super) fn cmd_add(
    store: &DataStore,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    let draft = build_draft(args)?;
    let mut timeline = store.load_timeline()?;
    let id = timeline.add(draft, now);
    store.save_timeline(&timeline)?;

    debug!(count = timeline.len(), "event added");
    println!("Created event {}.", id.get(..8).unwrap_or(&id));
    Ok(())
}

#[instrument(skip(store, args))]
pub(super) fn cmd_edit(store: &DataStore, args: &[String]) -> anyhow::Result<()> {
    info!("command edit");

    let (needle, rest) = id_arg("edit", args)?;
    let patch = build_patch(rest)?;
    let mut timeline = store.load_timeline()?;
    let id = timeline.resolve_id(needle)?.id.clone();

    let edited = timeline
        .edit(&id, patch)
        .ok_or_else(|| anyhow!("no event matches id {needle}"))?;
    let message = format!("Modified event {} ({}).", edited.short_id(), edited.title);
    store.save_timeline(&timeline)?;
    println!("{message}");
    Ok(())
}

#[instrument(skip(store, args))]
pub(super) fn cmd_delete(store: &DataStore, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");

    let needle = single_id_arg("delete", args)?;
    let mut timeline = store.load_timeline()?;
    let id = timeline.resolve_id(needle)?.id.clone();

    let removed = timeline
        .delete(&id)
        .ok_or_else(|| anyhow!("no event matches id {needle}"))?;
    store.save_timeline(&timeline)?;
    println!("Deleted event {} ({}).", removed.short_id(), removed.title);
    Ok(())
}

#[instrument(skip(store, renderer, args))]
pub(super) fn cmd_info(
    store: &DataStore,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let needle = single_id_arg("info", args)?;
    let timeline = store.load_timeline()?;
    let event = timeline.resolve_id(needle)?;
    renderer.print_event_info(event)
}

fn matching<'a>(
    events: &'a [Event],
    query: &EventQuery,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Option<Vec<&'a Event>> {
    let matched = query.apply(events, now, tz);
    if matched.is_empty() {
        println!("No events found ({}).", query.describe());
        None
    } else {
        Some(matched)
    }
}

#[instrument(skip(store, renderer, now, tz))]
pub(super) fn cmd_list(
    store: &DataStore,
    renderer: &Renderer,
    query: &EventQuery,
    now: DateTime<Utc>,
    tz: &Tz,
) -> anyhow::Result<()> {
    let timeline = store.load_timeline()?;
    let Some(events) = matching(timeline.events(), query, now, tz) else {
        return Ok(());
    };

    renderer.print_event_table(&events)?;
    println!();
    println!("{} of {} events.", events.len(), timeline.len());
    Ok(())
}

#[instrument(skip(store, renderer, now, tz))]
pub(super) fn cmd_timeline(
    store: &DataStore,
    renderer: &Renderer,
    query: &EventQuery,
    now: DateTime<Utc>,
    tz: &Tz,
) -> anyhow::Result<()> {
    let timeline = store.load_timeline()?;
    let Some(events) = matching(timeline.events(), query, now, tz) else {
        return Ok(());
    };
    renderer.print_timeline(&events)
}
