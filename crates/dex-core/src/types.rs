//! Shapes a matcher response is interpreted into.

use serde::Serialize;

/// The display shows at most this many alternative candidates.
pub const MAX_CANDIDATES: usize = 3;

/// One ranked alternative from the matcher's candidate list.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub name: String,
    /// In [0, 1].
    pub confidence: f32,
}

/// The identity the matcher is confident about, prior to directory
/// resolution.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedIdentity {
    pub public_id: String,
    /// In [0, 1].
    pub confidence: f32,
}

/// Interpreted result of one matcher call. Ephemeral; never persisted.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub matched: Option<MatchedIdentity>,
    /// Ranked alternatives, at most [`MAX_CANDIDATES`], descending by
    /// confidence. Ranking comes from the matcher; this side only
    /// normalizes it.
    pub candidates: Vec<Candidate>,
    /// Wall-clock duration of the matcher call, for logging only.
    pub elapsed_seconds: f64,
}

impl MatchOutcome {
    /// Normalize a candidate list as received off the wire: sort
    /// descending by confidence and truncate to [`MAX_CANDIDATES`].
    pub fn normalize_candidates(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(MAX_CANDIDATES);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(name: &str, confidence: f32) -> Candidate {
        Candidate {
            name: name.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_normalize_sorts_descending() {
        let out = MatchOutcome::normalize_candidates(vec![
            cand("low", 0.2),
            cand("high", 0.8),
            cand("mid", 0.5),
        ]);
        let names: Vec<_> = out.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["high", "mid", "low"]);
    }

    #[test]
    fn test_normalize_truncates_to_three() {
        let out = MatchOutcome::normalize_candidates(vec![
            cand("a", 0.9),
            cand("b", 0.8),
            cand("c", 0.7),
            cand("d", 0.6),
        ]);
        assert_eq!(out.len(), MAX_CANDIDATES);
        assert_eq!(out.last().unwrap().name, "c");
    }

    #[test]
    fn test_normalize_empty_is_empty() {
        assert!(MatchOutcome::normalize_candidates(Vec::new()).is_empty());
    }
}
