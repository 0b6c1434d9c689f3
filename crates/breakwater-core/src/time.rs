//! Clock helpers.

/// Current wall-clock time in milliseconds since the Unix epoch, the
/// timestamp unit every catalog stores.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_past_2020() {
        assert!(now_ms() > 1_577_836_800_000);
    }
}
