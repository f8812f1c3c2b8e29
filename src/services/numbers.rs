//! Random helpers behind room creation, joins and rounds.
//!
//! Every helper takes the random generator explicitly so callers can keep the
//! thread-local generator out of their futures and tests can seed it.

use std::collections::HashSet;

use rand::{Rng, seq::SliceRandom};

use crate::dao::models::{MAX_NUMBER, MIN_NUMBER, UserEntity};

/// Length of generated room codes.
pub const ROOM_CODE_LENGTH: usize = 6;
const ROOM_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate an uppercase alphanumeric room code.
///
/// Codes are not checked against existing rooms.
pub fn room_code(rng: &mut impl Rng) -> String {
    (0..ROOM_CODE_LENGTH)
        .map(|_| {
            let index = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[index] as char
        })
        .collect()
}

/// Room capacity: one member per number of the range.
pub const ROOM_CAPACITY: usize = MAX_NUMBER as usize - MIN_NUMBER as usize + 1;

/// Draw a number not present in `used` by rejection sampling.
///
/// `used` holds one entry per member. Returns `None` once the room holds
/// [`ROOM_CAPACITY`] members, even when some of them share a number.
pub fn unique_number(used: &[u8], rng: &mut impl Rng) -> Option<u8> {
    if used.len() >= ROOM_CAPACITY {
        return None;
    }

    let taken = used.iter().copied().collect::<HashSet<_>>();
    loop {
        let candidate = rng.random_range(MIN_NUMBER..=MAX_NUMBER);
        if !taken.contains(&candidate) {
            return Some(candidate);
        }
    }
}

/// Every number of the range in a uniformly random order (Fisher-Yates).
pub fn shuffled_pool(rng: &mut impl Rng) -> Vec<u8> {
    let mut pool = (MIN_NUMBER..=MAX_NUMBER).collect::<Vec<_>>();
    pool.shuffle(rng);
    pool
}

/// Give every user a fresh number popped from a shuffled pool.
///
/// Returns `None` when there are more users than numbers.
pub fn reassign_numbers(users: &[UserEntity], rng: &mut impl Rng) -> Option<Vec<UserEntity>> {
    let mut pool = shuffled_pool(rng);
    users
        .iter()
        .map(|user| {
            pool.pop().map(|number| UserEntity {
                username: user.username.clone(),
                number,
            })
        })
        .collect()
}
