use rand::Rng;
use tracing::debug;

use crate::shared::AppError;

/// Length of every room code.
pub const CODE_LENGTH: usize = 6;

/// Bounded number of draws before generation gives up.
pub const MAX_ATTEMPTS: usize = 100;

/// Uppercase alphanumerics minus the visually confusable ones (0/O, 1/I/L),
/// since codes are read off a screen and typed by hand.
const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Generates a unique room code, rejecting candidates for which `in_use`
/// returns true.
///
/// Codes double as the room's access secret, so candidates are drawn from a
/// CSPRNG rather than a seedable generator. Callers must invoke this while
/// holding the room-table lock: the uniqueness check and the subsequent
/// insertion have to be one critical section or two concurrent teacher
/// connects can race to the same code.
pub fn generate<F>(mut in_use: F) -> Result<String, AppError>
where
    F: FnMut(&str) -> bool,
{
    let mut rng = rand::rng();

    for attempt in 0..MAX_ATTEMPTS {
        let code: String = (0..CODE_LENGTH)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();

        if !in_use(&code) {
            debug!(room_code = %code, attempt, "Generated unique room code");
            return Ok(code);
        }
    }

    Err(AppError::CodeSpaceExhausted)
}
