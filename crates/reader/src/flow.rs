//! One request/response step of the reader's lesson state machine.
//!
//! Progress lives entirely in the [`ReaderSession`] the client echoes back;
//! nothing about a reader is held server-side between requests.

use rand::seq::SliceRandom;
use shared::{
    domain::{ExplorationId, Params, UserSummary, END_DEST},
    error::ApiError,
    protocol::{ReaderFeedbackRequest, ReaderInitResponse, TransitionRequest, TransitionResponse},
};
use tracing::{debug, info, warn};

use crate::{
    content::{export_content_to_html, feedback_to_html},
    demos,
    explorations::get_exploration,
    internal,
    params::{get_init_params, update_with_state_params},
    rights::{can_edit, can_view},
    ReaderContext,
};

/// Demo reset and served when too few explorations are public.
pub const FALLBACK_DEMO_ID: &str = "1";

/// Client-carried reader progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderSession {
    pub block_number: u64,
    pub params: Params,
    pub state_history: Vec<String>,
    pub state_name: String,
}

impl ReaderSession {
    pub fn start(state_name: &str, params: Params) -> Self {
        Self {
            block_number: 0,
            params,
            state_history: vec![state_name.to_string()],
            state_name: state_name.to_string(),
        }
    }

    /// Session as reported by a transition request for `state_name`.
    pub fn resume(state_name: &str, request: &TransitionRequest) -> Self {
        Self {
            block_number: request.block_number,
            params: request.params.clone(),
            state_history: request.state_history.clone(),
            state_name: state_name.to_string(),
        }
    }

    pub fn has_visited(&self, state_name: &str) -> bool {
        self.state_history.iter().any(|visited| visited == state_name)
    }

    /// Block number after one more step, if it still fits.
    pub fn next_block_number(&self) -> Option<u64> {
        self.block_number.checked_add(1)
    }

    /// Moves to `dest`. History keeps every visit, repeats included. `None`
    /// when the block number cannot grow any further.
    pub fn advance(self, dest: &str, params: Params) -> Option<Self> {
        let block_number = self.next_block_number()?;
        let mut state_history = self.state_history;
        state_history.push(dest.to_string());
        Some(Self {
            block_number,
            params,
            state_history,
            state_name: dest.to_string(),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.state_name == END_DEST
    }
}

/// Data for the HTML reader page.
#[derive(Debug, Clone)]
pub struct ReaderPage {
    pub exploration_id: ExplorationId,
    pub title: String,
    pub skin: String,
    pub is_public: bool,
    pub can_edit: bool,
}

pub async fn reader_page(
    ctx: &ReaderContext,
    actor: Option<&UserSummary>,
    exploration_id: &ExplorationId,
) -> Result<ReaderPage, ApiError> {
    let stored = get_exploration(ctx, exploration_id).await?;
    if !can_view(ctx, actor, &stored).await? {
        return Err(ApiError::not_found(format!(
            "exploration '{exploration_id}' not found"
        )));
    }
    Ok(ReaderPage {
        exploration_id: exploration_id.clone(),
        can_edit: can_edit(ctx, actor, &stored).await?,
        title: stored.exploration.title,
        skin: stored.exploration.default_skin,
        is_public: stored.is_public,
    })
}

pub async fn init_exploration(
    ctx: &ReaderContext,
    actor: Option<&UserSummary>,
    exploration_id: &ExplorationId,
) -> Result<ReaderInitResponse, ApiError> {
    let stored = get_exploration(ctx, exploration_id).await?;
    if !can_view(ctx, actor, &stored).await? {
        return Err(ApiError::not_found(format!(
            "exploration '{exploration_id}' not found"
        )));
    }
    let exploration = stored.exploration;
    let init_state = exploration.init_state().ok_or_else(|| {
        internal(format!(
            "exploration '{exploration_id}' has no state '{}'",
            exploration.init_state_name
        ))
    })?;

    let reader_params = update_with_state_params(init_state, &get_init_params(&exploration));
    let oppia_html = export_content_to_html(&init_state.content, &reader_params);
    let interactive_html = ctx
        .widgets
        .get_widget_by_id(&init_state.widget.widget_id)
        .and_then(|widget| widget.raw_code(&init_state.widget.customization_args, &reader_params))
        .map_err(internal)?;

    let session = ReaderSession::start(&exploration.init_state_name, reader_params);
    record_state_hit(ctx, exploration_id, &session.state_name, true).await;
    info!(%exploration_id, "reader session started");

    Ok(ReaderInitResponse {
        block_number: session.block_number,
        interactive_html,
        oppia_html,
        params: session.params,
        state_history: session.state_history,
        state_name: session.state_name,
        title: exploration.title,
    })
}

/// Classifies an answer given in `old_state_name` and moves the reader on.
pub async fn transition(
    ctx: &ReaderContext,
    actor: Option<&UserSummary>,
    exploration_id: &ExplorationId,
    old_state_name: &str,
    request: TransitionRequest,
) -> Result<TransitionResponse, ApiError> {
    let stored = get_exploration(ctx, exploration_id).await.map_err(|e| internal(e.message))?;
    if !can_view(ctx, actor, &stored).await? {
        return Err(ApiError::not_found(format!(
            "exploration '{exploration_id}' not found"
        )));
    }
    let exploration = stored.exploration;
    let old_state = exploration
        .state(old_state_name)
        .ok_or_else(|| internal(format!("exploration '{exploration_id}' has no state '{old_state_name}'")))?;

    let answer = request.answer.clone();
    let handler = request.handler.clone();
    let mut session = ReaderSession::resume(old_state_name, &request);
    if session.next_block_number().is_none() {
        return Err(ApiError::validation(format!(
            "block_number {} is out of range",
            session.block_number
        )));
    }
    session.params.insert("answer".into(), answer.clone());
    let old_params = session.params.clone();

    let rule = ctx
        .classifier
        .classify(old_state, &handler, &answer, &old_params)
        .map_err(internal)?;
    let feedback = rule.feedback_string().map(str::to_string);
    let new_state_name = rule.dest.clone();
    let new_state = if rule.is_terminal() {
        None
    } else {
        Some(exploration.state(&new_state_name).ok_or_else(|| {
            internal(format!(
                "rule in '{old_state_name}' points to unknown state '{new_state_name}'"
            ))
        })?)
    };

    let first_visit = !session.has_visited(&new_state_name);
    record_state_hit(ctx, exploration_id, &new_state_name, first_visit).await;

    let sticky = new_state.is_some_and(|state| {
        state.widget.sticky && state.widget.widget_id == old_state.widget.widget_id
    });

    let old_widget = ctx
        .widgets
        .get_widget_by_id(&old_state.widget.widget_id)
        .map_err(internal)?;
    let old_args = &old_state.widget.customization_args;
    match old_widget.stats_log_html(old_args, &old_params, &answer) {
        Ok(answer_html) => {
            if let Err(error) = ctx
                .storage
                .record_answer_submitted(
                    exploration_id,
                    old_state_name,
                    &handler,
                    &rule.to_string(),
                    &answer_html,
                )
                .await
            {
                warn!(%exploration_id, %error, "failed to record submitted answer");
            }
        }
        Err(error) => warn!(%exploration_id, %error, "failed to render answer for stats log"),
    }

    let reader_response = old_widget
        .reader_response_html(old_args, &old_params, &answer)
        .map_err(internal)?;

    let mut oppia_html = feedback
        .as_deref()
        .map(|text| feedback_to_html(text, &old_params))
        .unwrap_or_default();

    let (new_params, interactive_html) = match new_state {
        None => (Params::new(), String::new()),
        Some(new_state) => {
            let new_params = update_with_state_params(new_state, &old_params);
            if old_state_name != new_state_name {
                let state_html = export_content_to_html(&new_state.content, &new_params);
                if !oppia_html.is_empty() && !state_html.is_empty() {
                    oppia_html.push_str("<br>");
                }
                oppia_html.push_str(&state_html);
            }
            let interactive_html = if sticky {
                String::new()
            } else {
                ctx.widgets
                    .get_widget_by_id(&new_state.widget.widget_id)
                    .and_then(|widget| {
                        widget.raw_code(&new_state.widget.customization_args, &new_params)
                    })
                    .map_err(internal)?
            };
            (new_params, interactive_html)
        }
    };

    let session = session
        .advance(&new_state_name, new_params)
        .ok_or_else(|| internal("block number overflowed after validation"))?;
    debug!(
        %exploration_id,
        from = old_state_name,
        to = %session.state_name,
        rule = %rule,
        sticky,
        "reader transition"
    );

    Ok(TransitionResponse {
        interactive_html,
        exploration_id: exploration_id.clone(),
        finished: session.is_finished(),
        state_name: session.state_name,
        oppia_html,
        block_number: session.block_number,
        params: session.params,
        state_history: session.state_history,
        reader_response_html: reader_response.html,
        reader_response_iframe: reader_response.iframe,
    })
}

pub async fn submit_reader_feedback(
    ctx: &ReaderContext,
    exploration_id: &ExplorationId,
    state_name: &str,
    request: ReaderFeedbackRequest,
) -> Result<(), ApiError> {
    ctx.storage
        .record_reader_feedback(
            exploration_id,
            state_name,
            &request.feedback,
            &request.state_history,
        )
        .await
        .map_err(internal)
}

/// Any public exploration but the first (the welcome exploration). With fewer
/// than two public explorations the fallback demo is reset and returned.
pub async fn pick_random_exploration(ctx: &ReaderContext) -> Result<ExplorationId, ApiError> {
    let explorations = ctx
        .storage
        .list_public_explorations()
        .await
        .map_err(internal)?;

    if explorations.len() <= 1 {
        let fallback = ExplorationId::new(FALLBACK_DEMO_ID);
        demos::delete_demo(ctx, &fallback).await?;
        demos::load_demo(ctx, &fallback).await?;
        return Ok(fallback);
    }

    explorations[1..]
        .choose(&mut rand::thread_rng())
        .map(|(id, _)| id.clone())
        .ok_or_else(|| internal("no public exploration to choose from"))
}

async fn record_state_hit(
    ctx: &ReaderContext,
    exploration_id: &ExplorationId,
    state_name: &str,
    first_time: bool,
) {
    if let Err(error) = ctx
        .storage
        .record_state_hit(exploration_id, state_name, first_time)
        .await
    {
        warn!(%exploration_id, state_name, %error, "failed to record state hit");
    }
}

#[cfg(test)]
#[path = "tests/flow_tests.rs"]
mod tests;
