use crate::domain::identifiers::is_guest;

// Outcome of a guest join check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinDecision {
    Allowed,
    Forbidden,
    // No join-rule state for the room; denied.
    NoJoinRules,
}

impl JoinDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, JoinDecision::Allowed)
    }
}

// Stateless predicates the host consults before letting a user act.
#[derive(Clone, Debug)]
pub struct GuestPolicyGuard {
    user_id_prefix: String,
    display_name_suffix: String,
}

impl GuestPolicyGuard {
    pub fn new(user_id_prefix: impl Into<String>, display_name_suffix: impl Into<String>) -> Self {
        Self {
            user_id_prefix: user_id_prefix.into(),
            display_name_suffix: display_name_suffix.into(),
        }
    }

    pub fn is_guest(&self, user_id: &str) -> bool {
        is_guest(user_id, &self.user_id_prefix)
    }

    pub fn may_create_room(&self, user_id: &str) -> bool {
        !self.is_guest(user_id)
    }

    // Only the inviter matters; anyone may be invited.
    pub fn may_invite(&self, inviter: &str) -> bool {
        !self.is_guest(inviter)
    }

    // Guests join only when invited or when the room is knock-family
    // (`knock`, `knock_restricted`, ...).
    pub fn may_join_room(
        &self,
        user_id: &str,
        is_invited: bool,
        join_rules: Option<&[String]>,
    ) -> JoinDecision {
        if !self.is_guest(user_id) || is_invited {
            return JoinDecision::Allowed;
        }

        let Some(join_rules) = join_rules.filter(|rules| !rules.is_empty()) else {
            return JoinDecision::NoJoinRules;
        };

        if join_rules.iter().any(|rule| rule.starts_with("knock")) {
            JoinDecision::Allowed
        } else {
            JoinDecision::Forbidden
        }
    }

    // True means "filter this user out of the directory": guests are hidden.
    pub fn hide_from_directory(&self, user_id: &str) -> bool {
        self.is_guest(user_id)
    }

    // The display name a guest must be switched to, or None when the current
    // one is fine (or the user is not a guest).
    pub fn corrected_display_name(&self, user_id: &str, display_name: Option<&str>) -> Option<String> {
        if !self.is_guest(user_id) {
            return None;
        }
        let current = display_name.unwrap_or_default();
        if current.ends_with(&self.display_name_suffix) {
            return None;
        }
        Some(with_suffix(current, &self.display_name_suffix))
    }
}

// `trim(name) + suffix`; trimming first avoids doubled separators.
pub fn with_suffix(display_name: &str, suffix: &str) -> String {
    format!("{}{}", display_name.trim(), suffix)
}
