//! Server-rendered HTML pages and redirects.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;
use shared::{
    domain::{ExplorationId, Params},
    error::{ApiError, ErrorCode},
};
use tracing::debug;
use widgets::template::{escape_html, parse_with_params};

use crate::{
    api::{internal, reject, Rejection, Viewer},
    app_state::AppState,
    auth::mint_csrf_token,
};

const READER_TEMPLATE: &str = include_str!("../templates/reader.html");
const EDITOR_TEMPLATE: &str = include_str!("../templates/editor.html");
const PREREQUISITES_TEMPLATE: &str = include_str!("../templates/prerequisites.html");

pub(crate) const PREREQUISITES_PAGE: &str = "/profile/editor_prerequisites";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct IframedQuery {
    #[serde(default)]
    iframed: Option<String>,
}

impl IframedQuery {
    fn is_iframed(&self) -> bool {
        self.iframed.as_deref() == Some("true")
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReturnUrlQuery {
    #[serde(default)]
    return_url: Option<String>,
}

/// Values are inserted verbatim; callers escape anything user-supplied.
fn render(template: &str, vars: &[(&str, String)]) -> Html<String> {
    let params: Params = vars
        .iter()
        .map(|(name, value)| (name.to_string(), Value::String(value.clone())))
        .collect();
    Html(parse_with_params(template, &params))
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Only same-site paths are honored.
fn safe_return_url(raw: Option<&str>) -> &str {
    match raw {
        Some(url) if url.starts_with('/') && !url.starts_with("//") => url,
        _ => "/",
    }
}

pub(crate) async fn learn_page(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(exploration_id): Path<String>,
    Query(query): Query<IframedQuery>,
) -> Result<Html<String>, Rejection> {
    let exploration_id = ExplorationId(exploration_id);
    let page = reader::reader_page(&state.reader, viewer.user(), &exploration_id)
        .await
        .map_err(reject)?;

    let id = escape_html(page.exploration_id.as_str());
    let preview_banner = if page.is_public {
        String::new()
    } else {
        "<p class=\"oppia-preview-banner\">This is a preview of this exploration. \
         It has not been published yet.</p>"
            .to_string()
    };
    let edit_link = if page.can_edit {
        format!("<a href=\"/create/{id}\">Edit this exploration</a>")
    } else {
        String::new()
    };

    Ok(render(
        READER_TEMPLATE,
        &[
            ("title", escape_html(&page.title)),
            ("skin", escape_html(&page.skin)),
            ("iframed", query.is_iframed().to_string()),
            ("exploration_id", id),
            ("preview_banner", preview_banner),
            ("edit_link", edit_link),
        ],
    ))
}

pub(crate) async fn random_exploration(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IframedQuery>,
) -> Result<Response, Rejection> {
    let exploration_id = reader::pick_random_exploration(&state.reader)
        .await
        .map_err(reject)?;
    let mut location = format!("/learn/{exploration_id}");
    if query.is_iframed() {
        location.push_str("?iframed=true");
    }
    debug!(%location, "random exploration redirect");
    Ok(found(location))
}

pub(crate) async fn editor_page(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(exploration_id): Path<String>,
) -> Result<Response, Rejection> {
    let user = viewer.require()?;
    if !user.has_completed_onboarding() {
        let return_url = format!("/create/{exploration_id}");
        let encoded: String = url::form_urlencoded::byte_serialize(return_url.as_bytes()).collect();
        return Ok(found(format!("{PREREQUISITES_PAGE}?return_url={encoded}")));
    }

    let exploration_id = ExplorationId(exploration_id);
    let stored = reader::explorations::get_exploration(&state.reader, &exploration_id)
        .await
        .map_err(reject)?;
    if !reader::rights::can_edit(&state.reader, Some(&user), &stored)
        .await
        .map_err(reject)?
    {
        return Err(reject(ApiError::new(
            ErrorCode::Unauthorized,
            "you do not have the credentials to edit this exploration",
        )));
    }

    Ok(render(
        EDITOR_TEMPLATE,
        &[
            ("title", escape_html(&stored.exploration.title)),
            ("category", escape_html(&stored.exploration.category)),
            ("exploration_id", escape_html(exploration_id.as_str())),
        ],
    )
    .into_response())
}

pub(crate) async fn prerequisites_page(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Query(query): Query<ReturnUrlQuery>,
) -> Result<Html<String>, Rejection> {
    let user = viewer.require()?;
    let csrf_token = mint_csrf_token(&state.auth, user.user_id).map_err(internal)?;
    let agreed_checked = if user.agreed_to_terms { " checked" } else { "" };

    Ok(render(
        PREREQUISITES_TEMPLATE,
        &[
            ("csrf_token", escape_html(&csrf_token)),
            (
                "return_url",
                escape_html(safe_return_url(query.return_url.as_deref())),
            ),
            (
                "username",
                escape_html(user.username.as_deref().unwrap_or_default()),
            ),
            ("agreed_checked", agreed_checked.to_string()),
        ],
    ))
}

#[cfg(test)]
#[path = "tests/pages_tests.rs"]
mod tests;
