/// Balance at which a student may claim a reward.
pub const CLAIM_THRESHOLD: i64 = 1000;

/// Gems granted to a freshly registered student.
pub const SIGNUP_GEMS: i64 = 50;

pub fn can_claim(balance: i64) -> bool {
    balance >= CLAIM_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_threshold_is_inclusive() {
        assert!(!can_claim(999));
        assert!(can_claim(1000));
        assert!(can_claim(1500));
        assert!(!can_claim(SIGNUP_GEMS));
    }
}
