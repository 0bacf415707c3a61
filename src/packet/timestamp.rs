//! Send-time stamp carried in the data section of every echo request
//!
//! The stamp is the number of nanoseconds since the Unix epoch as an unsigned 64-bit integer in
//! network byte order. A compliant responder echoes the data back verbatim, so the round-trip
//! time can be computed from the reply alone without keeping per-request state.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Size of the encoded stamp in bytes
pub const TIMESTAMP_LEN: usize = 8;

/// Encode a point in time into the 8-byte payload
///
/// Times before the epoch are clamped to the epoch. The nanosecond count fits into 64 bits until
/// the year 2554.
pub fn encode(time: SystemTime) -> [u8; TIMESTAMP_LEN] {
    let nanos = time
        .duration_since(UNIX_EPOCH)
        .map(|since| since.as_nanos() as u64)
        .unwrap_or(0);
    nanos.to_be_bytes()
}

/// Reconstruct the point in time stored in a payload
pub fn decode(bytes: [u8; TIMESTAMP_LEN]) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(u64::from_be_bytes(bytes))
}

/// Time elapsed between the stamp in `bytes` and `now`
///
/// A stamp from the future (clock stepped backwards, or a forged reply) yields zero.
pub fn elapsed_since(bytes: [u8; TIMESTAMP_LEN], now: SystemTime) -> Duration {
    now.duration_since(decode(bytes)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_significant_byte_first() {
        let time = UNIX_EPOCH + Duration::from_nanos(0x0102_0304_0506_0708);
        assert_eq!(encode(time), [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn decode_restores_nanosecond_precision() {
        let time = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789);
        assert_eq!(decode(encode(time)), time);

        let now = SystemTime::now();
        let truncated = UNIX_EPOCH + Duration::from_nanos(
            now.duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64,
        );
        assert_eq!(decode(encode(now)), truncated);
    }

    #[test]
    fn extremes() {
        assert_eq!(encode(UNIX_EPOCH), [0; 8]);
        assert_eq!(decode([0xFF; 8]), UNIX_EPOCH + Duration::from_nanos(u64::MAX));
        assert_eq!(encode(UNIX_EPOCH - Duration::from_secs(1)), [0; 8]);
    }

    #[test]
    fn elapsed_never_negative() {
        let now = SystemTime::now();
        let earlier = encode(now - Duration::from_millis(20));
        let later = encode(now + Duration::from_secs(1));

        assert_eq!(elapsed_since(later, now), Duration::from_secs(0));
        let rtt = elapsed_since(earlier, now);
        assert!(rtt <= Duration::from_millis(20));
        assert!(rtt > Duration::from_millis(19));
    }
}
