//! Identifier generation.

use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

/// Length of generated end-to-end identifiers. SEPA allows 35 characters;
/// some banks append a suffix of their own.
pub const END_TO_END_ID_LENGTH: usize = 31;

/// Random identifier for payment information and instruction ids.
pub fn random_identifier() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn end_to_end_identifier() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(END_TO_END_ID_LENGTH)
        .map(char::from)
        .collect()
}
