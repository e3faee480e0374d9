// Key/value console page: one form, SET and GET buttons

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use tera::Context;

use crate::handlers::ErrorResponse;
use crate::state::AppState;
use crate::templates::TEMPLATES;
use common::errors::StoreError;

pub const DEFAULT_KEY: &str = "demo:key";
pub const DEFAULT_VALUE: &str = "hello redis cloud";

/// Shown in place of a value when GET finds nothing; rendered with the
/// `absent` class so it reads differently from a stored "None"
pub const ABSENT_VALUE: &str = "None";

const TITLE: &str = "Redis Cloud Console";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Set,
    Get,
}

#[derive(Debug, Deserialize)]
pub struct ConsoleForm {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub action: Action,
}

/// Everything the template needs
#[derive(Debug, Default, Serialize)]
struct ConsoleView {
    title: &'static str,
    fatal: Option<String>,
    endpoint: String,
    key: String,
    value: String,
    notice: Option<String>,
    error: Option<String>,
    has_result: bool,
    absent: bool,
    fetched: String,
}

impl ConsoleView {
    fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: TITLE,
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    fn show_fetched(&mut self, value: Option<String>) {
        self.has_result = true;
        self.absent = value.is_none();
        self.fetched = value.unwrap_or_else(|| ABSENT_VALUE.to_string());
    }

    fn render(self) -> Response {
        let status = if self.fatal.is_some() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::OK
        };

        let context = match Context::from_serialize(&self) {
            Ok(context) => context,
            Err(e) => {
                return ErrorResponse::new("template_error", format!("Template error: {}", e))
                    .into_response()
            }
        };

        match TEMPLATES.render("console.html", &context) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => ErrorResponse::new("template_error", format!("Template error: {}", e))
                .into_response(),
        }
    }
}

/// Console page with default inputs
///
/// The shared connection is created on the first visit. When it cannot be
/// created only the error is shown.
#[tracing::instrument(skip(state))]
pub async fn console_page(State(state): State<AppState>) -> Response {
    let mut view = ConsoleView::new(DEFAULT_KEY, DEFAULT_VALUE);

    match state.redis.get().await {
        Ok(handle) => view.endpoint = handle.endpoint().to_string(),
        Err(e) => view.fatal = Some(e.to_string()),
    }

    view.render()
}

/// Handle a SET or GET button press
#[tracing::instrument(skip(state, form), fields(action = ?form.action, key = %form.key))]
pub async fn console_submit(
    State(state): State<AppState>,
    Form(form): Form<ConsoleForm>,
) -> Response {
    let mut view = ConsoleView::new(form.key.clone(), form.value.clone());

    let handle = match state.redis.get().await {
        Ok(handle) => handle,
        Err(e) => {
            view.fatal = Some(e.to_string());
            return view.render();
        }
    };
    view.endpoint = handle.endpoint().to_string();

    match form.action {
        Action::Set => match handle.set(&form.key, &form.value).await {
            Ok(()) => {
                tracing::info!(key = %form.key, "Value saved");
                view.notice = Some("Saved.".to_string());
            }
            Err(e) => apply_error(&mut view, e),
        },
        Action::Get => match handle.get(&form.key).await {
            Ok(value) => {
                tracing::debug!(key = %form.key, found = value.is_some(), "Value read");
                view.show_fetched(value);
            }
            Err(e) => apply_error(&mut view, e),
        },
    }

    view.render()
}

fn apply_error(view: &mut ConsoleView, err: StoreError) {
    if err.is_fatal() {
        view.fatal = Some(err.to_string());
    } else {
        view.error = Some(err.to_string());
    }
}
