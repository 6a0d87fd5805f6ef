use rand::Rng;
use uuid::Uuid;

/// Identifies one client connection for its lifetime.
pub type ConnectionId = Uuid;

/// Room codes are short so they can be read out loud: `AB12CD`.
pub const ROOM_CODE_LEN: usize = 6;

const ROOM_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random room code. Uniqueness against live rooms is the
/// registry's responsibility, not this function's.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_CHARSET[rng.random_range(0..ROOM_CODE_CHARSET.len())] as char)
        .collect()
}

/// Check the `AB12CD` shape: exact length, uppercase alphanumeric only.
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Normalize a client-supplied room id before lookup. Clients type these
/// by hand, so leading/trailing whitespace and lowercase are forgiven.
pub fn normalize_room_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
