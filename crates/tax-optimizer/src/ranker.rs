use crate::models::Suggestion;
use std::cmp::Ordering;

/// Ordering used to present suggestions: most urgent priority first, then the larger
/// realized amount, then identifier so the order is total.
pub fn compare(a: &Suggestion, b: &Suggestion) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| b.impact().total_cmp(&a.impact()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort a batch of suggestions for execution.
pub fn rank(mut suggestions: Vec<Suggestion>) -> Vec<Suggestion> {
    suggestions.sort_by(compare);
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Strategy;

    fn suggestion(id: &str, priority: u8, realized: f64) -> Suggestion {
        Suggestion {
            id: id.to_string(),
            instrument_id: id.to_string(),
            shares_to_sell: 1,
            realized_gain_loss: realized,
            strategy: Strategy::Rebalancing,
            rationale: String::new(),
            confidence: 0.9,
            priority,
        }
    }

    #[test]
    fn test_rank_by_priority_then_impact() {
        let ranked = rank(vec![
            suggestion("a", 7, 900.0),
            suggestion("b", 3, 100.0),
            suggestion("c", 3, -500.0),
            suggestion("d", 1, 10.0),
        ]);

        let ids: Vec<&str> = ranked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "c", "b", "a"]);

        for pair in ranked.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.priority < b.priority
                    || (a.priority == b.priority && a.impact() >= b.impact())
            );
        }
    }

    #[test]
    fn test_identifier_breaks_ties() {
        let ranked = rank(vec![suggestion("z", 5, -200.0), suggestion("m", 5, 200.0)]);
        assert_eq!(ranked[0].id, "m");
        assert_eq!(ranked[1].id, "z");
    }
}
