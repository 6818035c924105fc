// Alphabet and length of the random part of a guest localpart.
pub const LOCALPART_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
pub const LOCALPART_RANDOM_LEN: usize = 32;

// Device ids for remote personal sessions. These end up public, so they do not
// need a cryptographic source.
pub const DEVICE_ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-";
pub const DEVICE_ID_LEN: usize = 16;

// Access tokens minted by the bundled host directory.
pub const ACCESS_TOKEN_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
pub const ACCESS_TOKEN_LEN: usize = 40;

// Build `@localpart:server_name`.
pub fn qualify(localpart: &str, server_name: &str) -> String {
    format!("@{localpart}:{server_name}")
}

// A user is a guest iff its qualified id starts with `@<prefix>`.
pub fn is_guest(user_id: &str, prefix: &str) -> bool {
    user_id
        .strip_prefix('@')
        .is_some_and(|rest| rest.starts_with(prefix))
}

// Guest localparts are the prefix followed by exactly the random part.
pub fn is_guest_localpart(localpart: &str, prefix: &str) -> bool {
    localpart.strip_prefix(prefix).is_some_and(|random| {
        random.len() == LOCALPART_RANDOM_LEN && random.bytes().all(|b| LOCALPART_ALPHABET.contains(&b))
    })
}
