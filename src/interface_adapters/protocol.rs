use serde::{Deserialize, Serialize};

// Response payload for guest registration. Field names follow the client SDK.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterGuestResponse {
    pub user_id: String,
    pub device_id: String,
    pub access_token: String,
    pub homeserver_url: String,
}

// Error envelope for JSON responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub msg: String,
}

// Response payload for the host admin deactivation call.
#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub id_server_unbind_result: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub inviter: String,
    pub invitee: String,
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub user_id: String,
    pub room_id: String,
    #[serde(default)]
    pub is_invited: bool,
    // `join_rule` values of the room's join-rules state; null when unknown.
    #[serde(default)]
    pub join_rules: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct AllowedResponse {
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct JoinRoomResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct SpamCheckResponse {
    pub spam: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdateResponse {
    pub corrected: Option<String>,
}
