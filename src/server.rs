//! HTTP server: render templates per request
//!
//! Every request renders from disk, so edits to templates show up on the next
//! request without a restart.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::Settings;
use crate::{render_with_config, RenderConfig, RenderContext};

/// Prefix the static directory is mounted under
const STATIC_PREFIX: &str = "/static";

/// Errors that can occur while starting the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to scan templates directory: {0}")]
    Scan(#[from] walkdir::Error),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
struct AppState {
    config: Arc<RenderConfig>,
}

/// A template served under its own path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRoute {
    /// URL path, e.g. `/about` or `/docs/`
    pub path: String,
    /// Template path relative to the templates root
    pub template: String,
    /// File name, used as the page title
    pub title: String,
}

/// Find every template whose file name contains `route`
///
/// The URL is `/` plus the file name up to its first dot; names containing
/// `subroute` get a trailing slash. The first template claiming a URL wins.
/// Names that would not make a literal route (route syntax characters, or a
/// path under the static mount) are skipped.
pub fn discover_routes(templates_dir: &Path) -> Result<Vec<PageRoute>, ServerError> {
    let mut routes: BTreeMap<String, PageRoute> = BTreeMap::new();

    for entry in WalkDir::new(templates_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !file_name.contains("route") {
            continue;
        }

        let stem = file_name.split('.').next().unwrap_or_default();
        if stem.is_empty() {
            continue;
        }
        if stem.contains(|c: char| matches!(c, ':' | '*' | '{' | '}')) {
            warn!(file = %file_name, "template name is not a literal route, skipping");
            continue;
        }
        let mut path = format!("/{stem}");
        if file_name.contains("subroute") {
            path.push('/');
        }
        if path == STATIC_PREFIX || path.starts_with(&format!("{STATIC_PREFIX}/")) {
            warn!(file = %file_name, path = %path, "route collides with static files, skipping");
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(templates_dir) else {
            continue;
        };
        let template = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if let Some(existing) = routes.get(&path) {
            warn!(
                path = %path,
                template = %template,
                existing = %existing.template,
                "route already registered, skipping"
            );
            continue;
        }
        routes.insert(
            path.clone(),
            PageRoute {
                path,
                template,
                title: file_name,
            },
        );
    }

    Ok(routes.into_values().collect())
}

/// Build the application router
pub fn router(settings: &Settings) -> Result<Router, ServerError> {
    let state = AppState {
        config: Arc::new(settings.render_config()),
    };

    let index = settings.index_template.clone();
    let mut app = Router::new().route(
        "/",
        get(move |State(state): State<AppState>| {
            let index = index.clone();
            async move { render_page(state, index, "Home".to_string()).await }
        }),
    );

    if settings.auto_register_routes {
        for route in discover_routes(&settings.templates_dir)? {
            info!(template = %route.template, path = %route.path, "registered template route");
            let PageRoute {
                path,
                template,
                title,
            } = route;
            app = app.route(
                &path,
                get(move |State(state): State<AppState>| {
                    let template = template.clone();
                    let title = title.clone();
                    async move { render_page(state, template, title).await }
                }),
            );
        }
    }

    Ok(app
        .nest_service(STATIC_PREFIX, ServeDir::new(&settings.static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Render one template off the async runtime and turn the result into a response
async fn render_page(state: AppState, template: String, title: String) -> Response {
    let config = Arc::clone(&state.config);
    let name = template.clone();
    let result = tokio::task::spawn_blocking(move || {
        let context = RenderContext::new().with("title", title);
        render_with_config(&name, &context, &config)
    })
    .await;

    match result {
        Ok(Ok(html)) => Html(html).into_response(),
        Ok(Err(e)) => {
            warn!(template = %template, error = %e, "render failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Template error: {e}"),
            )
                .into_response()
        }
        Err(e) => {
            warn!(template = %template, error = %e, "render task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

/// Bind and serve until the process is stopped
pub async fn serve(settings: Settings) -> Result<(), ServerError> {
    let app = router(&settings)?;
    let listener = tokio::net::TcpListener::bind(&settings.bind).await?;
    info!(
        address = %listener.local_addr()?,
        templates = %settings.templates_dir.display(),
        "twine server listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
