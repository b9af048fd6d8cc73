use sha2::{Digest, Sha256};

/// Codes are compared case-insensitively with surrounding whitespace removed.
pub(crate) fn normalize_access_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub(crate) fn hash_access_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_access_code(code).as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn access_code_matches(supplied: &str, stored_hash: &str) -> bool {
    let supplied_hash = hash_access_code(supplied);
    constant_time_eq(supplied_hash.as_bytes(), stored_hash.trim().to_ascii_lowercase().as_bytes())
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_case_and_padding() {
        assert_eq!(hash_access_code("  exam-42 "), hash_access_code("EXAM-42"));
        assert_eq!(hash_access_code("EXAM-42").len(), 64);
    }

    #[test]
    fn matches_only_the_right_code() {
        let stored = hash_access_code("OPEN-SESAME");
        assert!(access_code_matches("open-sesame", &stored));
        assert!(!access_code_matches("open-sesam", &stored));
        assert!(!access_code_matches("", &stored));
    }

    #[test]
    fn stored_hash_in_upper_hex_still_matches() {
        let stored = hash_access_code("K1").to_uppercase();
        assert!(access_code_matches("k1", &stored));
    }
}
