use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, instrument, warn};

use super::{fail_with, run_async};
use crate::ai_client::ChatCompletionsClient;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::event::Event;
use crate::filter::EventQuery;
use crate::notice::{ConfigurationError, Notice};
use crate::render::Renderer;
use crate::summarize::{
    NOTHING_TO_SUMMARIZE, SummarizeError, SummarizeRequest, SummaryOutcome, summarize,
};

#[instrument(skip(store, cfg, renderer, args, now, tz))]
pub(super) fn cmd_summarize(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    query: &EventQuery,
    args: &[String],
    now: DateTime<Utc>,
    tz: &Tz,
) -> anyhow::Result<()> {
    info!("command summarize");

    let timeline = store.load_timeline()?;
    let events: Vec<Event> = query
        .apply(timeline.events(), now, tz)
        .into_iter()
        .cloned()
        .collect();
    let request = SummarizeRequest {
        query: args.join(" "),
        events,
    };

    let outcome = if request.events.is_empty() {
        SummaryOutcome::NothingToSummarize
    } else {
        if request.query.trim().is_empty() {
            return Err(SummarizeError::EmptyQuery.into());
        }
        let client = match ChatCompletionsClient::from_config(cfg) {
            Ok(client) => client,
            Err(err) => {
                if let Some(config_err) = err.downcast_ref::<ConfigurationError>() {
                    return fail_with(renderer, config_err.to_notice());
                }
                return Err(err);
            }
        };
        run_async(summarize(&client, &request))??
    };

    match &outcome {
        SummaryOutcome::Generated(summary) => println!("{summary}"),
        SummaryOutcome::NothingToSummarize => {
            renderer.print_notice(&Notice::info("Nothing to summarize", NOTHING_TO_SUMMARIZE))?;
        }
        SummaryOutcome::Unavailable(reason) => {
            warn!(?reason, "summary unavailable");
            renderer.print_notice(&Notice::error("Summary unavailable", outcome.text()))?;
        }
    }
    Ok(())
}
