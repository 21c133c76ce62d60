/*
    moodtune | Mood-driven song recommendations for voice assistants.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! HTTP surface: the OAuth redirect and callback used to sign in, and the
//! fulfillment webhook the conversational front-end calls on every turn.

use crate::auth::{MusicProvider, ProviderError};
use crate::config::AppConfig;
use crate::dispatcher::{Dispatcher, Turn, TurnError};
use crate::identity::{IdentityError, IdentityStore};
use axum::{
    extract::{FromRef, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use log::{error, info, warn};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const STATE_COOKIE: &str = "state";

#[derive(Clone)]
pub struct ServerState {
    pub dispatcher: Arc<Dispatcher>,
    pub provider: Arc<dyn MusicProvider>,
    pub identities: Arc<dyn IdentityStore>,
    pub secure_cookies: bool,
    pub outbound_timeout: Duration,
}

impl FromRef<ServerState> for Arc<Dispatcher> {
    fn from_ref(input: &ServerState) -> Self {
        input.dispatcher.clone()
    }
}

#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("State cookie not set or expired. Maybe you took too long to authorize. Please try again.")]
    StateCookieMissing,
    #[error("State validation failed")]
    StateMismatch,
    #[error("Missing authorization code")]
    MissingCode,
    #[error("Token exchange failed: {0}")]
    TokenExchange(#[source] ProviderError),
    #[error("Could not fetch the Spotify profile: {0}")]
    Profile(#[source] ProviderError),
    #[error("Could not provision the account: {0}")]
    Identity(#[from] IdentityError),
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
}

impl CallbackError {
    fn status(&self) -> StatusCode {
        match self {
            CallbackError::StateCookieMissing
            | CallbackError::StateMismatch
            | CallbackError::MissingCode => StatusCode::BAD_REQUEST,
            CallbackError::TokenExchange(_) | CallbackError::Profile(_) => StatusCode::BAD_GATEWAY,
            CallbackError::Identity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CallbackError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub callback: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentRequest {
    pub conversation_id: String,
    pub intent: String,
    /// Sign-in token returned by `/token`.
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FulfillmentResponse {
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl IntoResponse for TurnError {
    fn into_response(self) -> Response {
        let status = match &self {
            TurnError::UnhandledIntent(_) => StatusCode::BAD_REQUEST,
            TurnError::NotSignedIn => StatusCode::UNAUTHORIZED,
            TurnError::NoActiveSong | TurnError::TrackUnavailable(_) => StatusCode::CONFLICT,
            TurnError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            TurnError::Identity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TurnError::TokenRefresh(_) | TurnError::StoreFetch(_) | TurnError::Provider(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        let body = FulfillmentResponse {
            messages: vec![self.spoken()],
            error: Some(self.kind().to_string()),
        };
        (status, Json(body)).into_response()
    }
}

/// 40 hex characters, same shape as 20 random bytes hex encoded.
fn generate_state() -> String {
    let bytes: [u8; 20] = thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn is_valid_callback(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']'))
}

/// Wraps `body` in a call to `callback` when one was asked for, plain JSON otherwise.
fn jsonp(callback: Option<&str>, status: StatusCode, body: serde_json::Value) -> Response {
    match callback.filter(|name| is_valid_callback(name)) {
        Some(name) => {
            let script = format!(
                "/**/ typeof {name} === 'function' && {name}({});",
                body
            );
            (
                status,
                [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
                script,
            )
                .into_response()
        }
        None => (status, Json(body)).into_response(),
    }
}

async fn home() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn redirect(State(state): State<ServerState>, jar: CookieJar) -> Response {
    let csrf_state = jar
        .get(STATE_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(generate_state);

    let url = match state.provider.authorize_url(&csrf_state) {
        Ok(url) => url,
        Err(e) => {
            error!("Could not build the authorize URL: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cookie = Cookie::build((STATE_COOKIE, csrf_state))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookies)
        .max_age(time::Duration::hours(1))
        .build();

    (jar.add(cookie), Redirect::to(&url)).into_response()
}

async fn bounded<T, F>(limit: Duration, call: &'static str, fut: F) -> Result<T, CallbackError>
where
    F: Future<Output = Result<T, CallbackError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| CallbackError::Timeout(call))?
}

/// Validates the CSRF state, trades the code for tokens and signs the user in.
async fn sign_in(
    state: &ServerState,
    jar: &CookieJar,
    query: &TokenQuery,
) -> Result<String, CallbackError> {
    let expected = jar
        .get(STATE_COOKIE)
        .map(Cookie::value)
        .filter(|value| !value.is_empty())
        .ok_or(CallbackError::StateCookieMissing)?;
    if query.state.as_deref() != Some(expected) {
        return Err(CallbackError::StateMismatch);
    }

    let code = query
        .code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or(CallbackError::MissingCode)?;

    let limit = state.outbound_timeout;
    let tokens = bounded(limit, "token exchange", async {
        state
            .provider
            .exchange_code(code)
            .await
            .map_err(CallbackError::TokenExchange)
    })
    .await?;

    let profile = bounded(limit, "profile", async {
        state
            .provider
            .current_user(&tokens.access_token)
            .await
            .map_err(CallbackError::Profile)
    })
    .await?;

    let sign_in_token = bounded(limit, "account provisioning", async {
        Ok::<_, CallbackError>(state.identities.provision(&profile, &tokens).await?)
    })
    .await?;

    info!("Signed in Spotify user {}", profile.id);
    Ok(sign_in_token)
}

async fn token(
    State(state): State<ServerState>,
    jar: CookieJar,
    Query(query): Query<TokenQuery>,
) -> Response {
    let callback = query.callback.as_deref();
    match sign_in(&state, &jar, &query).await {
        Ok(sign_in_token) => jsonp(callback, StatusCode::OK, json!({ "token": sign_in_token })),
        Err(e) => {
            warn!("Sign in failed: {}", e);
            jsonp(callback, e.status(), json!({ "error": e.to_string() }))
        }
    }
}

async fn fulfillment(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(request): Json<FulfillmentRequest>,
) -> Result<Json<FulfillmentResponse>, TurnError> {
    let turn = Turn {
        conversation_id: request.conversation_id,
        intent: request.intent,
        sign_in_token: request.token,
    };

    match dispatcher.handle_turn(&turn).await {
        Ok(reply) => Ok(Json(FulfillmentResponse {
            messages: reply.messages,
            error: None,
        })),
        Err(e) => {
            warn!(
                "Turn {:?} in conversation {} failed: {}",
                turn.intent, turn.conversation_id, e
            );
            Err(e)
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/redirect", get(redirect))
        .route("/token", get(token))
        .route("/fulfillment", post(fulfillment))
        .with_state(state)
}

pub async fn run_server(config: &AppConfig, state: ServerState) -> std::io::Result<()> {
    let app = make_app(state);
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Listening on {}", config.bind);
    axum::serve(listener, app).await
}
