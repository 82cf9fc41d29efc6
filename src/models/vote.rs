//! Vote payload interpretation

use serde_json::Value;

/// A single up or down vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    /// Read the `voteCount` a client sent.
    ///
    /// Only the numbers `1` and `-1` are votes. Anything else (`0`, `2`,
    /// strings, null, a missing field) is `None` and must leave the counter
    /// alone.
    pub fn from_vote_count(value: Option<&Value>) -> Option<Self> {
        match value.and_then(Value::as_f64) {
            Some(n) if n == 1.0 => Some(Vote::Up),
            Some(n) if n == -1.0 => Some(Vote::Down),
            _ => None,
        }
    }

    pub fn delta(self) -> i64 {
        match self {
            Vote::Up => 1,
            Vote::Down => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_recognised_votes() {
        assert_eq!(Vote::from_vote_count(Some(&json!(1))), Some(Vote::Up));
        assert_eq!(Vote::from_vote_count(Some(&json!(-1))), Some(Vote::Down));
        assert_eq!(Vote::from_vote_count(Some(&json!(1.0))), Some(Vote::Up));
        assert_eq!(Vote::Up.delta(), 1);
        assert_eq!(Vote::Down.delta(), -1);
    }

    #[test]
    fn test_everything_else_is_ignored() {
        for value in [json!(0), json!(2), json!(-2), json!(0.5), json!("1"), json!(null), json!([1]), json!(true)] {
            assert_eq!(Vote::from_vote_count(Some(&value)), None, "{}", value);
        }
        assert_eq!(Vote::from_vote_count(None), None);
    }

    proptest! {
        #[test]
        fn property_only_unit_integers_vote(n in any::<i64>()) {
            let vote = Vote::from_vote_count(Some(&json!(n)));
            match n {
                1 => prop_assert_eq!(vote, Some(Vote::Up)),
                -1 => prop_assert_eq!(vote, Some(Vote::Down)),
                _ => prop_assert_eq!(vote, None),
            }
        }
    }
}
