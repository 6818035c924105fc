use crate::interface_adapters::handlers::{
    check_username_for_spam, deactivate_user, profile_update, register_guest,
    user_may_create_room, user_may_invite, user_may_join_room,
};
use crate::interface_adapters::state::AppState;
use axum::{Router, routing::post};

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/register_guest", post(register_guest))
        .route("/admin/v1/deactivate/{user_id}", post(deactivate_user))
        .route("/hooks/user_may_create_room", post(user_may_create_room))
        .route("/hooks/user_may_invite", post(user_may_invite))
        .route("/hooks/user_may_join_room", post(user_may_join_room))
        .route("/hooks/check_username_for_spam", post(check_username_for_spam))
        .route("/hooks/profile_update", post(profile_update))
        .with_state(state)
}
