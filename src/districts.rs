//! State roster and congressional district geoid handling.
//!
//! A district geoid is `state FIPS * 100 + district number`. At-large states
//! sometimes ship coded as district 0; those geoids are remapped to the
//! canonical district 1 before any grouping.

pub const STATES: [&'static str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI",
    "ID", "IL", "IN", "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN",
    "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY", "NC", "ND", "OH",
    "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA",
    "WV", "WI", "WY",
];

const STATE_FIPS: [(&'static str, u32); 51] = [
    ("AL", 1), ("AK", 2), ("AZ", 4), ("AR", 5), ("CA", 6), ("CO", 8),
    ("CT", 9), ("DE", 10), ("DC", 11), ("FL", 12), ("GA", 13), ("HI", 15),
    ("ID", 16), ("IL", 17), ("IN", 18), ("IA", 19), ("KS", 20), ("KY", 21),
    ("LA", 22), ("ME", 23), ("MD", 24), ("MA", 25), ("MI", 26), ("MN", 27),
    ("MS", 28), ("MO", 29), ("MT", 30), ("NE", 31), ("NV", 32), ("NH", 33),
    ("NJ", 34), ("NM", 35), ("NY", 36), ("NC", 37), ("ND", 38), ("OH", 39),
    ("OK", 40), ("OR", 41), ("PA", 42), ("RI", 44), ("SC", 45), ("SD", 46),
    ("TN", 47), ("TX", 48), ("UT", 49), ("VT", 50), ("VA", 51), ("WA", 53),
    ("WV", 54), ("WI", 55), ("WY", 56),
];

/// At-large "district 0" geoids and their canonical "district 1" codes.
const AT_LARGE_REMAP: [(u32, u32); 7] = [
    (200, 201),   // AK
    (1000, 1001), // DE
    (1100, 1101), // DC
    (3800, 3801), // ND
    (4600, 4601), // SD
    (5000, 5001), // VT
    (5600, 5601), // WY
];

pub fn state_fips(code: &str) -> Option<u32> {
    STATE_FIPS
        .iter()
        .find(|(s, _)| *s == code)
        .map(|(_, fips)| *fips)
}

/// Remap an at-large district 0 geoid to the canonical district 1 geoid.
/// All other geoids pass through unchanged.
pub fn normalize_geoid(geoid: u32) -> u32 {
    AT_LARGE_REMAP
        .iter()
        .find(|(from, _)| *from == geoid)
        .map(|(_, to)| *to)
        .unwrap_or(geoid)
}

pub fn district_number(geoid: u32) -> u32 {
    geoid % 100
}
