use crate::types::UserId;

/// Orders two user ids.
pub fn canonical_pair(a: &str, b: &str) -> [UserId; 2] {
    if a <= b {
        [a.to_string(), b.to_string()]
    } else {
        [b.to_string(), a.to_string()]
    }
}

/// Order independent key of an unordered user pair.
///
/// Each id is prefixed with its length in bytes, so ids containing the
/// separator cannot make two different pairs produce the same key.
pub fn pair_key(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{}_{}:{}", first.len(), first, second.len(), second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commutative() {
        assert_eq!(pair_key("alice", "bob"), pair_key("bob", "alice"));
        assert_eq!(pair_key("alice", "bob"), "5:alice_3:bob");
        assert_eq!(canonical_pair("bob", "alice"), ["alice", "bob"]);
    }

    #[test]
    fn test_separator_in_ids() {
        // Plain joining would map both pairs to "a_b_c"
        assert_ne!(pair_key("a_b", "c"), pair_key("a", "b_c"));
        assert_ne!(pair_key("1:a", "b"), pair_key("1", "a_1:b"));
    }
}
