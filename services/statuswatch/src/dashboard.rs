//! Web dashboard: the rendering adapter over monitor state

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::config::MonitorKind;
use crate::engine::current_epoch_ms;
use crate::reload::Reloader;
use crate::settings::{SettingsPatch, SettingsStore};
use crate::state::{StateHandle, TransitionRecord};

/// Dashboard application state
#[derive(Clone)]
pub struct DashboardState {
    pub state: StateHandle,
    pub settings: SettingsStore,
    pub reloader: Arc<dyn Reloader>,
    pub reload_target: String,
    pub kind: MonitorKind,
}

/// Build the dashboard axum router. CORS is open so the settings UI can
/// talk to the API from another origin.
pub fn build_router(dashboard_state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/status", get(status_handler))
        .route("/api/history", get(history_handler))
        .route("/api/settings", post(settings_handler))
        .route("/api/reload", post(reload_handler))
        .route("/api/dismiss", post(dismiss_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(dashboard_state)
}

/// Storage key the overlay's auto-reload toggle writes through
fn auto_reload_key(kind: MonitorKind) -> &'static str {
    match kind {
        MonitorKind::PageHealth => "autoRefreshAutoReloadEnabled",
        MonitorKind::ErrorPage => "autoReloadEnabled",
    }
}

async fn index_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;

    let overlay_card = match &state.overlay {
        Some(overlay) => {
            let status_class = if overlay.status_up { "up" } else { "down" };
            let (color, bg) = if overlay.status_up {
                ("#155724", "#d4edda")
            } else {
                ("#721c24", "#f8d7da")
            };
            let reload_disabled = if overlay.reload_enabled { "" } else { "disabled" };
            let toggle_checked = if overlay.auto_reload_enabled {
                "checked"
            } else {
                ""
            };
            format!(
                r#"<div id="overlay" class="card">
                    <button id="dismiss" style="float: right;" onclick="dismissOverlay()">&times;</button>
                    <p style="font-weight: 600;">{title}</p>
                    <div style="font-family: monospace;">{origin}</div>
                    <div id="status" class="{status_class}" style="padding: 0.25em 0.6em; border-radius: 0.25rem; color: {color}; background-color: {bg};">{status_text}</div>
                    <div>Time waiting: <span id="offlineCount">{offline}</span> seconds</div>
                    <div>
                        <input type="checkbox" id="autoReloadToggle" {toggle_checked} onchange="toggleAutoReload(this.checked)">
                        <label for="autoReloadToggle">Automatically reload when server is ready</label>
                    </div>
                    <button id="reloadBtn" {reload_disabled} onclick="reloadNow()">Reload Now</button>
                </div>"#,
                title = overlay.title,
                origin = overlay.origin,
                status_class = status_class,
                color = color,
                bg = bg,
                status_text = overlay.status_text,
                offline = state.offline_seconds,
                toggle_checked = toggle_checked,
                reload_disabled = reload_disabled,
            )
        }
        None => format!(
            r#"<div class="card"><p>{origin} is {availability}</p></div>"#,
            origin = state.origin,
            availability = state.availability,
        ),
    };

    let history_rows: String = state
        .history
        .iter()
        .rev()
        .map(|record| {
            let status = if record.success { "OK" } else { "Failed" };
            format!(
                r#"<tr style="border-bottom: 1px solid #dee2e6;">
                    <td style="padding: 0.5rem;">{} &rarr; {}</td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                </tr>"#,
                record.from, record.to, record.action, status
            )
        })
        .collect();

    let dark_mode = state
        .overlay
        .as_ref()
        .map(|overlay| overlay.dark_mode)
        .unwrap_or(false);
    let body_style = if dark_mode {
        "background: #1e1e1e; color: #e2e3e5;"
    } else {
        ""
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Statuswatch</title>
    <script>
        const AUTO_RELOAD_KEY = "{auto_reload_key}";

        function toggleAutoReload(checked) {{
            fetch('/api/settings', {{
                method: 'POST',
                headers: {{'Content-Type': 'application/json'}},
                body: JSON.stringify({{[AUTO_RELOAD_KEY]: checked}})
            }});
        }}

        function reloadNow() {{
            fetch('/api/reload', {{method: 'POST'}}).then(() => location.reload());
        }}

        function dismissOverlay() {{
            fetch('/api/dismiss', {{method: 'POST'}}).then(() => location.reload());
        }}

        function refreshData() {{
            fetch('/api/status')
                .then(r => r.json())
                .then(data => {{
                    if (!data.overlay) {{
                        location.reload();
                        return;
                    }}
                    const status = document.getElementById('status');
                    if (status) {{
                        status.textContent = data.overlay.status_text;
                        status.className = data.overlay.status_up ? 'up' : 'down';
                    }}
                    const count = document.getElementById('offlineCount');
                    if (count) {{
                        count.textContent = data.offline_seconds;
                    }}
                    const reloadBtn = document.getElementById('reloadBtn');
                    if (reloadBtn) {{
                        reloadBtn.disabled = !data.overlay.reload_enabled;
                    }}
                    const toggle = document.getElementById('autoReloadToggle');
                    if (toggle) {{
                        toggle.checked = data.overlay.auto_reload_enabled;
                    }}
                }});
        }}
        setInterval(refreshData, 1000);
    </script>
    <style>
        .card {{ border: 1px solid #dee2e6; border-radius: 0.5rem; padding: 1rem; margin-bottom: 1rem; }}
        .up {{ color: #155724; background-color: #d4edda; }}
        .down {{ color: #721c24; background-color: #f8d7da; }}
    </style>
</head>
<body style="font-family: system-ui, sans-serif; max-width: 720px; margin: 0 auto; padding: 1rem; {body_style}">
    <h1>Statuswatch</h1>
    {overlay_card}
    <section>
        <h2>Transitions</h2>
        <table style="width: 100%; border-collapse: collapse;">
            <thead>
                <tr style="border-bottom: 2px solid #dee2e6;">
                    <th style="padding: 0.5rem; text-align: left;">Transition</th>
                    <th style="padding: 0.5rem; text-align: left;">Action</th>
                    <th style="padding: 0.5rem; text-align: left;">Status</th>
                </tr>
            </thead>
            <tbody>{history_rows}</tbody>
        </table>
    </section>
</body>
</html>"#,
        auto_reload_key = auto_reload_key(dashboard.kind),
        overlay_card = overlay_card,
        history_rows = history_rows,
        body_style = body_style,
    );

    Html(html)
}

async fn status_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;

    Json(serde_json::json!({
        "origin": state.origin,
        "availability": state.availability,
        "last_poll_epoch_ms": state.last_poll_epoch_ms,
        "last_change_epoch_ms": state.last_change_epoch_ms,
        "consecutive_failures": state.consecutive_failures,
        "offline_seconds": state.offline_seconds,
        "overlay": state.overlay,
        "settings": dashboard.settings.current(),
    }))
}

async fn history_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;
    let history: Vec<TransitionRecord> = state.history.iter().cloned().collect();
    Json(history)
}

async fn settings_handler(
    State(dashboard): State<DashboardState>,
    Json(patch): Json<SettingsPatch>,
) -> impl IntoResponse {
    match dashboard.settings.update(&patch) {
        Ok(settings) => (StatusCode::OK, Json(settings)).into_response(),
        Err(e) => {
            tracing::warn!("Settings update failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn reload_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    if !dashboard.state.read().await.reload_enabled() {
        return (StatusCode::CONFLICT, "Reload is not available yet").into_response();
    }

    let outcome = dashboard.reloader.reload(&dashboard.reload_target).await;

    let mut state = dashboard.state.write().await;
    let availability = state.availability;
    state.add_record(TransitionRecord {
        from: availability,
        to: availability,
        action: "manual_reload".to_string(),
        success: outcome.is_ok(),
        error: outcome.as_ref().err().map(|e| e.to_string()),
        timestamp_epoch_ms: current_epoch_ms(),
    });

    match outcome {
        Ok(()) => {
            state.hide_overlay();
            (StatusCode::OK, "Reload dispatched").into_response()
        }
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}

async fn dismiss_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    dashboard.state.write().await.hide_overlay();
    StatusCode::OK
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Mutex;
    use tower::ServiceExt;

    use crate::engine::{OVERLAY_TITLE, PAGE_DOWN_TEXT, PAGE_RECOVERED_TEXT};
    use crate::monitor::AvailabilityState;
    use crate::settings::Settings;
    use crate::state::{new_state_handle, OverlayModel};

    #[derive(Debug)]
    struct TestReloader {
        succeed: bool,
        calls: Mutex<u32>,
    }

    impl TestReloader {
        fn new(succeed: bool) -> Self {
            Self {
                succeed,
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl Reloader for TestReloader {
        fn type_name(&self) -> &str {
            "test"
        }

        async fn reload(&self, _target: &str) -> crate::Result<()> {
            *self.calls.lock().unwrap() += 1;
            if self.succeed {
                Ok(())
            } else {
                Err(crate::WatchError::Reload("test failure".to_string()))
            }
        }
    }

    fn test_overlay() -> OverlayModel {
        OverlayModel {
            title: OVERLAY_TITLE.to_string(),
            origin: "https://files.example.com".to_string(),
            status_text: PAGE_DOWN_TEXT.to_string(),
            status_up: false,
            auto_reload_enabled: true,
            reload_enabled: false,
            dark_mode: false,
        }
    }

    fn setup(reload_succeeds: bool) -> (DashboardState, Arc<TestReloader>) {
        let reloader = Arc::new(TestReloader::new(reload_succeeds));
        let dashboard_state = DashboardState {
            state: new_state_handle("https://files.example.com".to_string(), 10),
            settings: SettingsStore::in_memory(Settings::default()),
            reloader: Arc::clone(&reloader) as Arc<dyn Reloader>,
            reload_target: "https://files.example.com/workspace".to_string(),
            kind: MonitorKind::PageHealth,
        };
        (dashboard_state, reloader)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (dashboard_state, _) = setup(true);
        let app = build_router(dashboard_state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_starts_up_with_null_overlay() {
        let (dashboard_state, _) = setup(true);
        let app = build_router(dashboard_state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["availability"], "up");
        assert_eq!(json["origin"], "https://files.example.com");
        assert!(json["overlay"].is_null());
        assert_eq!(json["settings"]["autoRefreshEnabled"], true);
    }

    #[tokio::test]
    async fn status_reports_the_shown_overlay() {
        let (dashboard_state, _) = setup(true);
        {
            let mut state = dashboard_state.state.write().await;
            state.record_poll(AvailabilityState::Down, 1000);
            state.show_overlay(test_overlay());
            state.tick_offline();
        }
        let app = build_router(dashboard_state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["availability"], "down");
        assert_eq!(json["offline_seconds"], 1);
        assert_eq!(json["overlay"]["status_text"], PAGE_DOWN_TEXT);
        assert_eq!(json["overlay"]["reload_enabled"], false);
    }

    #[tokio::test]
    async fn history_returns_records() {
        let (dashboard_state, _) = setup(true);
        {
            let mut state = dashboard_state.state.write().await;
            state.add_record(TransitionRecord {
                from: AvailabilityState::Up,
                to: AvailabilityState::Down,
                action: "overlay".to_string(),
                success: true,
                error: None,
                timestamp_epoch_ms: 1000,
            });
        }
        let app = build_router(dashboard_state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["action"], "overlay");
        assert_eq!(json[0]["from"], "up");
        assert_eq!(json[0]["to"], "down");
    }

    #[tokio::test]
    async fn settings_post_writes_through_the_store() {
        let (dashboard_state, _) = setup(true);
        let store = dashboard_state.settings.clone();
        let mut rx = store.subscribe();

        let app = build_router(dashboard_state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/settings")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"autoRefreshAutoReloadEnabled": false}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["autoRefreshAutoReloadEnabled"], false);
        assert!(!store.current().auto_refresh_auto_reload_enabled);
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();
    }

    #[tokio::test]
    async fn settings_post_rejects_malformed_body() {
        let (dashboard_state, _) = setup(true);
        let app = build_router(dashboard_state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/settings")
                    .header("content-type", "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn reload_conflicts_until_recovered() {
        let (dashboard_state, reloader) = setup(true);
        {
            let mut state = dashboard_state.state.write().await;
            state.record_poll(AvailabilityState::Down, 1000);
            state.show_overlay(test_overlay());
        }
        let app = build_router(dashboard_state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(reloader.call_count(), 0);
    }

    #[tokio::test]
    async fn reload_dispatches_once_recovered() {
        let (dashboard_state, reloader) = setup(true);
        let handle = Arc::clone(&dashboard_state.state);
        {
            let mut state = handle.write().await;
            state.record_poll(AvailabilityState::Down, 1000);
            state.show_overlay(test_overlay());
            state.record_poll(AvailabilityState::Up, 2000);
            state.mark_recovered(PAGE_RECOVERED_TEXT);
        }
        let app = build_router(dashboard_state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(reloader.call_count(), 1);

        let state = handle.read().await;
        assert!(!state.overlay_shown());
        let last = state.history.back().unwrap();
        assert_eq!(last.action, "manual_reload");
        assert!(last.success);
    }

    #[tokio::test]
    async fn reload_failure_returns_bad_gateway() {
        let (dashboard_state, reloader) = setup(false);
        let handle = Arc::clone(&dashboard_state.state);
        {
            let mut state = handle.write().await;
            state.record_poll(AvailabilityState::Down, 1000);
            state.show_overlay(test_overlay());
            state.record_poll(AvailabilityState::Up, 2000);
            state.mark_recovered(PAGE_RECOVERED_TEXT);
        }
        let app = build_router(dashboard_state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(reloader.call_count(), 1);

        let state = handle.read().await;
        // The overlay stays so the user can retry
        assert!(state.overlay_shown());
        assert!(!state.history.back().unwrap().success);
    }

    #[tokio::test]
    async fn dismiss_hides_the_overlay() {
        let (dashboard_state, _) = setup(true);
        let handle = Arc::clone(&dashboard_state.state);
        {
            let mut state = handle.write().await;
            state.record_poll(AvailabilityState::Down, 1000);
            state.show_overlay(test_overlay());
        }
        let app = build_router(dashboard_state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/dismiss")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!handle.read().await.overlay_shown());
    }

    #[tokio::test]
    async fn index_renders_the_overlay_card() {
        let (dashboard_state, _) = setup(true);
        {
            let mut state = dashboard_state.state.write().await;
            state.record_poll(AvailabilityState::Down, 1000);
            state.show_overlay(test_overlay());
        }
        let app = build_router(dashboard_state);
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains(OVERLAY_TITLE));
        assert!(html.contains("https://files.example.com"));
        assert!(html.contains("Time waiting:"));
        assert!(html.contains("autoRefreshAutoReloadEnabled"));
    }

    #[tokio::test]
    async fn index_without_overlay_shows_availability() {
        let (dashboard_state, _) = setup(true);
        let app = build_router(dashboard_state);
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("is UP"));
        assert!(!html.contains(OVERLAY_TITLE));
    }
}
