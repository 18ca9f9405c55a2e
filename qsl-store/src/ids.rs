//! 24-hex document ids: 4 bytes of unix seconds, 5 bytes chosen once per
//! process, 3 bytes of a counter. Ids created later in the same process sort
//! after earlier ones.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use rand::Rng;

static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

pub fn object_id() -> String {
    let secs = chrono::Utc::now().timestamp().max(0) as u32;
    let unique = PROCESS_UNIQUE.get_or_init(|| rand::thread_rng().gen());
    let counter = COUNTER
        .get_or_init(|| AtomicU32::new(rand::thread_rng().gen_range(0..0x0080_0000)))
        .fetch_add(1, Ordering::Relaxed)
        & 0x00FF_FFFF;

    let mut out = format!("{secs:08x}");
    for b in unique {
        out.push_str(&format!("{b:02x}"));
    }
    out.push_str(&format!("{counter:06x}"));
    out
}

pub fn is_object_id(s: &str) -> bool {
    s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// `count` random lowercase hex characters.
pub fn random_hex(count: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_hex_and_increase() {
        let a = object_id();
        let b = object_id();
        assert!(is_object_id(&a));
        assert_ne!(a, b);
        assert_eq!(a[8..18], b[8..18]);
        assert!(b > a);
    }

    #[test]
    fn random_hex_has_requested_length() {
        let s = random_hex(16);
        assert_eq!(s.len(), 16);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
