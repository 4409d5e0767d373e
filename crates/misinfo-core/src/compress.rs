//! Reversible key compression for persisted blobs.
//!
//! Every object key that appears in the wire format is swapped for a short
//! code. Keys that are not in the table pass through unchanged unless they
//! start with [`ESCAPE`] or happen to equal a code, in which case they are
//! prefixed with [`ESCAPE`]. That keeps the mapping a bijection on keys, so
//! `decompress(compress(v)) == v` for every JSON value, and decompressing a
//! blob that was never compressed is the identity for ordinary keys.
//!
//! ```
//! use misinfo_core::compress::{compress, decompress};
//! use serde_json::json;
//!
//! let value = json!({"sessionID": "abc", "states": [{"currentPost": {"shown": true}}]});
//! let packed = compress(value.clone());
//! assert_ne!(packed, value);
//! assert_eq!(decompress(packed), value);
//! ```

use serde_json::{Map, Value};

/// Prefix marking a key that was escaped rather than abbreviated.
pub const ESCAPE: char = '~';

/// (wire key, code) pairs. Codes never start with [`ESCAPE`].
const KEYS: &[(&str, &str)] = &[
    ("studyID", "sI"),
    ("studyModTime", "sM"),
    ("sessionID", "sS"),
    ("startTime", "t0"),
    ("endTime", "t1"),
    ("states", "St"),
    ("participant", "Pa"),
    ("dismissedPrompt", "dP"),
    ("completionCode", "cC"),
    ("currentSource", "cS"),
    ("currentPost", "cP"),
    ("sourceID", "sR"),
    ("postID", "pI"),
    ("credibility", "cr"),
    ("followers", "fo"),
    ("remainingUses", "rU"),
    ("numberOfReactions", "nR"),
    ("comments", "cm"),
    ("shown", "sh"),
    ("participantID", "pa"),
    ("interactions", "in"),
    ("credibilityHistory", "cH"),
    ("followerHistory", "fH"),
    ("postReaction", "pR"),
    ("commentReactions", "cR"),
    ("study", "sd"),
    ("lastModifiedTime", "lM"),
];

fn code_for(key: &str) -> Option<&'static str> {
    KEYS.iter()
        .find(|(long, _)| *long == key)
        .map(|(_, code)| *code)
}

fn key_for(code: &str) -> Option<&'static str> {
    KEYS.iter()
        .find(|(_, short)| *short == code)
        .map(|(long, _)| *long)
}

fn compress_key(key: String) -> String {
    if let Some(code) = code_for(&key) {
        code.to_string()
    } else if key.starts_with(ESCAPE) || key_for(&key).is_some() {
        format!("{ESCAPE}{key}")
    } else {
        key
    }
}

fn decompress_key(key: String) -> String {
    if let Some(rest) = key.strip_prefix(ESCAPE) {
        rest.to_string()
    } else if let Some(long) = key_for(&key) {
        long.to_string()
    } else {
        key
    }
}

fn map_keys(value: Value, rename: fn(String) -> String) -> Value {
    match value {
        Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (rename(key), map_keys(value, rename)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| map_keys(item, rename))
                .collect(),
        ),
        other => other,
    }
}

/// Abbreviates every known key, recursively.
pub fn compress(value: Value) -> Value {
    map_keys(value, compress_key)
}

/// Exact inverse of [`compress`].
pub fn decompress(value: Value) -> Value {
    map_keys(value, decompress_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique_and_unescaped() {
        let longs: HashSet<_> = KEYS.iter().map(|(l, _)| *l).collect();
        let codes: HashSet<_> = KEYS.iter().map(|(_, c)| *c).collect();
        assert_eq!(longs.len(), KEYS.len());
        assert_eq!(codes.len(), KEYS.len());
        assert!(codes.iter().all(|c| !c.starts_with(ESCAPE)));
    }

    #[test]
    fn test_colliding_keys_are_escaped() {
        let value = json!({"sI": 1, "~odd": 2, "studyID": 3, "plain": 4});
        let packed = compress(value.clone());
        assert_eq!(packed, json!({"~sI": 1, "~~odd": 2, "sI": 3, "plain": 4}));
        assert_eq!(decompress(packed), value);
    }

    #[test]
    fn test_values_are_untouched() {
        let value = json!({"postReaction": "studyID", "comments": ["states", 1, null]});
        let packed = compress(value.clone());
        assert_eq!(packed["pR"], json!("studyID"));
        assert_eq!(decompress(packed), value);
    }

    #[test]
    fn test_decompress_plain_blob_is_identity() {
        let value = json!({"studyID": "s", "states": [], "participant": {"credibility": 50.0}});
        assert_eq!(decompress(value.clone()), value);
    }
}
