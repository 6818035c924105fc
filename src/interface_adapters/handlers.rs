use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::Json;
use serde_json::Value;
use tracing::{error, warn};

use crate::domain::errors::GuestError;
use crate::domain::policy::JoinDecision;
use crate::interface_adapters::protocol::{
    AllowedResponse, DeactivateResponse, ErrorResponse, InviteRequest, JoinRoomRequest,
    JoinRoomResponse, ProfileUpdateRequest, ProfileUpdateResponse, RegisterGuestResponse,
    SpamCheckResponse, UserRequest,
};
use crate::interface_adapters::state::{AppState, OsRandom};
use crate::use_cases::profile_update::ProfileUpdateUseCase;
use crate::use_cases::provision_guest::ProvisionGuestUseCase;

type ErrorReply = (StatusCode, Json<ErrorResponse>);

const DISPLAYNAME_REQUIRED: &str = "You must provide a 'displayname' as a string";
const NO_FREE_USERNAME: &str = "Internal error: Could not find a free username";

// Handler for registering a new guest account.
#[tracing::instrument(name = "register_guest", skip_all)]
pub async fn register_guest(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterGuestResponse>), ErrorReply> {
    // Unparseable bodies get the same JSON error as a missing name.
    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection, "rejected guest registration body");
        error_response(StatusCode::BAD_REQUEST, DISPLAYNAME_REQUIRED)
    })?;
    // Non-string values are treated like a missing name.
    let display_name = payload
        .get("displayname")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let use_case = ProvisionGuestUseCase {
        backend: state.backend.clone(),
        random: OsRandom,
        user_id_prefix: state.config.user_id_prefix.clone(),
        display_name_suffix: state.config.display_name_suffix.clone(),
        homeserver_url: state.config.public_baseurl.clone(),
    };

    let session = use_case
        .execute(display_name)
        .await
        .map_err(|err| map_guest_error(err, ErrorContext::Registration))?;

    tracing::info!(user_id = %session.user_id, "guest user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterGuestResponse {
            user_id: session.user_id,
            device_id: session.device_id,
            access_token: session.access_token,
            homeserver_url: session.homeserver_url,
        }),
    ))
}

// Host admin surface used by the local reaper.
#[tracing::instrument(name = "admin_deactivate", skip_all, fields(user_id = %user_id))]
pub async fn deactivate_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DeactivateResponse>, ErrorReply> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    let Some(token) = token else {
        return Err(error_response(StatusCode::UNAUTHORIZED, "missing access token"));
    };

    let is_admin = state
        .host
        .is_admin_token(token)
        .await
        .map_err(|err| map_guest_error(err, ErrorContext::Host))?;
    if !is_admin {
        warn!("rejected deactivation with non-admin token");
        return Err(error_response(StatusCode::UNAUTHORIZED, "invalid admin access token"));
    }

    let existed = state
        .host
        .deactivate_user(&user_id)
        .await
        .map_err(|err| map_guest_error(err, ErrorContext::Host))?;
    if !existed {
        return Err(error_response(StatusCode::NOT_FOUND, "unknown user"));
    }

    Ok(Json(DeactivateResponse {
        id_server_unbind_result: "success",
    }))
}

#[tracing::instrument(name = "user_may_create_room", skip_all)]
pub async fn user_may_create_room(
    State(state): State<AppState>,
    Json(payload): Json<UserRequest>,
) -> Json<AllowedResponse> {
    Json(AllowedResponse {
        allowed: state.guard().may_create_room(&payload.user_id),
    })
}

#[tracing::instrument(
    name = "user_may_invite",
    skip_all,
    fields(invitee = %payload.invitee, room_id = %payload.room_id)
)]
pub async fn user_may_invite(
    State(state): State<AppState>,
    Json(payload): Json<InviteRequest>,
) -> Json<AllowedResponse> {
    Json(AllowedResponse {
        allowed: state.guard().may_invite(&payload.inviter),
    })
}

#[tracing::instrument(name = "user_may_join_room", skip_all, fields(room_id = %payload.room_id))]
pub async fn user_may_join_room(
    State(state): State<AppState>,
    Json(payload): Json<JoinRoomRequest>,
) -> Json<JoinRoomResponse> {
    let decision = state.guard().may_join_room(
        &payload.user_id,
        payload.is_invited,
        payload.join_rules.as_deref(),
    );
    let code = match decision {
        JoinDecision::Allowed => None,
        JoinDecision::Forbidden => Some("M_FORBIDDEN"),
        JoinDecision::NoJoinRules => Some("M_BAD_STATE"),
    };

    Json(JoinRoomResponse {
        allowed: decision.is_allowed(),
        code,
    })
}

// `spam: true` keeps guests out of the user directory.
#[tracing::instrument(name = "check_username_for_spam", skip_all)]
pub async fn check_username_for_spam(
    State(state): State<AppState>,
    Json(payload): Json<UserRequest>,
) -> Json<SpamCheckResponse> {
    Json(SpamCheckResponse {
        spam: state.guard().hide_from_directory(&payload.user_id),
    })
}

#[tracing::instrument(name = "profile_update", skip_all, fields(user_id = %payload.user_id))]
pub async fn profile_update(
    State(state): State<AppState>,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<Json<ProfileUpdateResponse>, ErrorReply> {
    let use_case = ProfileUpdateUseCase {
        guard: state.guard(),
        host: state.host.clone(),
    };

    let corrected = use_case
        .execute(&payload.user_id, payload.display_name.as_deref())
        .await
        .map_err(|err| map_guest_error(err, ErrorContext::Host))?;

    Ok(Json(ProfileUpdateResponse { corrected }))
}

// Helper to build a JSON error response.
fn error_response(status: StatusCode, msg: &str) -> ErrorReply {
    (
        status,
        Json(ErrorResponse {
            msg: msg.to_string(),
        }),
    )
}

// Maps domain errors to HTTP responses by endpoint context.
enum ErrorContext {
    Registration,
    Host,
}

fn map_guest_error(err: GuestError, context: ErrorContext) -> ErrorReply {
    match (&err, context) {
        (GuestError::InvalidArgument(_), ErrorContext::Registration) => {
            error_response(StatusCode::BAD_REQUEST, DISPLAYNAME_REQUIRED)
        }
        (GuestError::InvalidArgument(message), ErrorContext::Host) => {
            error_response(StatusCode::BAD_REQUEST, message)
        }
        (GuestError::ResourceExhausted { .. }, _) => {
            error!(error = %err, "guest registration exhausted identifiers");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, NO_FREE_USERNAME)
        }
        (GuestError::Configuration(_), _) => {
            error!(error = %err, "configuration error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal configuration error")
        }
        (
            GuestError::Authentication(_)
            | GuestError::Protocol(_)
            | GuestError::TransientBackend(_),
            _,
        ) => {
            error!(error = %err, "identity backend error");
            error_response(StatusCode::BAD_GATEWAY, "identity backend error")
        }
    }
}
