//! A small HTML version of the event site served over HTTP, for running the
//! flow against a real browser.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;
use tokio::task::JoinHandle;

#[derive(Clone)]
struct AppState {
    email: String,
    password: String,
    events: Arc<Mutex<Vec<String>>>,
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct EventForm {
    #[serde(rename = "eventName")]
    name: String,
    #[serde(rename = "eventDescription")]
    description: String,
    #[serde(rename = "eventStartDate")]
    start_date: String,
}

pub struct StubServer {
    pub addr: SocketAddr,
    pub events: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Bind on an ephemeral port and serve until the returned handle is dropped.
pub async fn serve(email: &str, password: &str) -> std::io::Result<StubServer> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let state = AppState {
        email: email.to_string(),
        password: password.to_string(),
        events: events.clone(),
    };

    let app = Router::new()
        .route("/login", get(login_page).post(login_submit))
        .route("/dashboard", get(dashboard))
        .route("/events/new", get(new_event))
        .route("/events", axum::routing::post(create_event))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(StubServer {
        addr,
        events,
        handle,
    })
}

fn page(body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>Events</title></head><body>{body}</body></html>"
    ))
}

fn login_html(error: bool) -> Html<String> {
    let error = if error {
        "<p class=\"error\">Invalid email or password</p>"
    } else {
        ""
    };
    page(&format!(
        r#"<h2>Sign in</h2>{error}
<form method="post" action="/login">
  <input type="email" id="email" name="email">
  <input type="password" id="password" name="password">
  <button type="submit">Login</button>
</form>"#
    ))
}

async fn login_page() -> Html<String> {
    login_html(false)
}

async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    if form.email == state.email && form.password == state.password {
        Redirect::to("/dashboard").into_response()
    } else {
        login_html(true).into_response()
    }
}

fn dashboard_html(state: &AppState, toast: bool) -> Html<String> {
    let toast = if toast {
        r#"<div role="alert">Event created successfully</div>"#
    } else {
        ""
    };
    let events: String = state
        .events
        .lock()
        .map(|events| {
            events
                .iter()
                .enumerate()
                .map(|(i, name)| format!("<li><a href=\"/events/{i}\">{name}</a></li>"))
                .collect()
        })
        .unwrap_or_default();
    page(&format!(
        r#"{toast}<h1>Dashboard</h1>
<button type="button" onclick="location.href='/events/new'">Create Event</button>
<ul>{events}</ul>"#
    ))
}

async fn dashboard(State(state): State<AppState>) -> Html<String> {
    dashboard_html(&state, false)
}

async fn new_event() -> Html<String> {
    page(
        r#"<form id="create-event-form" method="post" action="/events">
  <h2>Create Event</h2>
  <input type="text" id="eventName" name="eventName">
  <textarea id="eventDescription" name="eventDescription"></textarea>
  <input type="text" id="eventStartDate" name="eventStartDate">
  <button type="submit">Create</button>
</form>"#,
    )
}

async fn create_event(State(state): State<AppState>, Form(form): Form<EventForm>) -> Response {
    if form.name.trim().is_empty()
        || form.description.trim().is_empty()
        || form.start_date.trim().is_empty()
    {
        return new_event().await.into_response();
    }
    if let Ok(mut events) = state.events.lock() {
        events.push(form.name);
    }
    dashboard_html(&state, true).into_response()
}
