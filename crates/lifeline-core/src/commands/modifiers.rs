use anyhow::anyhow;
use tracing::{instrument, warn};

use crate::event::{Attachment, EventDraft, EventPatch, EventType};
use crate::media::{attachment_from_path, image_reference};
use crate::validation::{ValidationErrors, validate_draft, validate_patch};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mod {
    Title(String),
    Type(EventType),
    Description(Option<String>),
    Image(Option<String>),
    Attachment(Option<String>),
}

#[instrument(skip(args))]
fn parse_words_and_mods(args: &[String]) -> anyhow::Result<(Vec<String>, Vec<Mod>)> {
    let mut words = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg)? {
            mods.push(one_mod);
            continue;
        }

        words.push(arg.clone());
    }

    Ok((words, mods))
}

fn parse_one_mod(tok: &str) -> anyhow::Result<Option<Mod>> {
    let Some((key, value)) = tok.split_once(':') else {
        return Ok(None);
    };
    let value = value.trim();
    let optional = || (!value.is_empty()).then(|| value.to_string());

    let one_mod = match key.to_ascii_lowercase().as_str() {
        "title" => Mod::Title(value.to_string()),
        "type" => Mod::Type(value.parse()?),
        "desc" | "description" => Mod::Description(optional()),
        "image" | "img" => Mod::Image(optional()),
        "attach" | "attachment" => Mod::Attachment(optional()),
        _ => return Ok(None),
    };
    Ok(Some(one_mod))
}

fn resolve_image(raw: Option<String>, errors: &mut ValidationErrors) -> Option<String> {
    let raw = raw?;
    image_reference(&raw)
        .map_err(|err| errors.push(err))
        .ok()
}

fn resolve_attachment(raw: Option<String>, errors: &mut ValidationErrors) -> Option<Attachment> {
    let raw = raw?;
    attachment_from_path(std::path::Path::new(&raw))
        .map_err(|err| errors.push(err))
        .ok()
}

/// Builds a validated draft from `add` arguments. Plain words form the
/// title.
pub(super) fn build_draft(args: &[String]) -> anyhow::Result<EventDraft> {
    let (words, mods) = parse_words_and_mods(args)?;
    let mut draft = EventDraft::new(EventType::Note, words.join(" ").trim());
    let mut errors = ValidationErrors::default();

    for one_mod in mods {
        match one_mod {
            Mod::Title(title) => draft.title = title,
            Mod::Type(event_type) => draft.event_type = event_type,
            Mod::Description(description) => draft.description = description,
            Mod::Image(raw) => draft.image_url = resolve_image(raw, &mut errors),
            Mod::Attachment(raw) => draft.attachment = resolve_attachment(raw, &mut errors),
        }
    }

    validate_draft(&draft, &mut errors);
    errors.into_result()?;
    Ok(draft)
}

/// Builds a validated patch from `edit` arguments. Plain words replace the
/// title.
pub(super) fn build_patch(args: &[String]) -> anyhow::Result<EventPatch> {
    let (words, mods) = parse_words_and_mods(args)?;
    let mut patch = EventPatch::default();
    let mut errors = ValidationErrors::default();

    if !words.is_empty() {
        patch.title = Some(words.join(" ").trim().to_string());
    }

    for one_mod in mods {
        match one_mod {
            Mod::Title(title) => {
                if patch.title.is_some() {
                    warn!("title given twice; using title: modifier");
                }
                patch.title = Some(title);
            }
            Mod::Type(event_type) => patch.event_type = Some(event_type),
            Mod::Description(description) => patch.description = Some(description),
            Mod::Image(raw) => {
                let cleared = raw.is_none();
                let resolved = resolve_image(raw, &mut errors);
                if cleared || resolved.is_some() {
                    patch.image_url = Some(resolved);
                }
            }
            Mod::Attachment(raw) => {
                let cleared = raw.is_none();
                let resolved = resolve_attachment(raw, &mut errors);
                if cleared || resolved.is_some() {
                    patch.attachment = Some(resolved);
                }
            }
        }
    }

    validate_patch(&patch, &mut errors);
    errors.into_result()?;
    if patch.is_empty() {
        return Err(anyhow!("edit: nothing to change"));
    }
    Ok(patch)
}
