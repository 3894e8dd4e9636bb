//! Content-negotiation evaluator for the Accept-family headers.
//!
//! One `Negotiation` is built per Accept/Accept-Encoding/Accept-Charset/
//! Accept-Language/TE header on a request (spec.md §4.1). A missing header
//! and an empty-string header both produce an evaluator that scores every
//! candidate `1.0` — they're kept as two call sites (`Negotiation::absent`
//! and parsing `""`) rather than collapsed, since a future caller may care
//! about the distinction even though scoring doesn't.

use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub struct Negotiation {
    values: FxHashMap<String, f64>,
}

impl Negotiation {
    /// The evaluator for a header that was not sent at all.
    pub fn absent() -> Self {
        Self { values: FxHashMap::default() }
    }

    /// Parse a raw header value into comma-separated, semicolon-parameterized
    /// entries. Only the bare pre-`;` token is kept as the lookup key;
    /// `q=<float>` sets its quality (clamped to 5 significant characters
    /// before parsing), and any other parameter is dropped rather than
    /// folded into the key, so a parameterized candidate such as
    /// `text/html;level=2` still matches a stored `text/html` entry via
    /// [`Negotiation::score`]'s own semicolon-stripping retry.
    pub fn parse(raw: &str) -> Self {
        let mut values = FxHashMap::default();
        let raw = raw.trim();
        if raw.is_empty() {
            return Self { values };
        }

        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let mut segments = part.split(';').map(str::trim);
            let token = segments.next().unwrap_or("");
            if token.is_empty() {
                continue;
            }

            let mut q = 1.0f64;
            for seg in segments {
                if let Some(qv) = seg.strip_prefix("q=") {
                    let clamped = &qv[..qv.len().min(5)];
                    q = clamped.parse().unwrap_or(1.0);
                }
            }

            values.insert(token.to_string(), q);
        }

        Self { values }
    }

    pub fn from_header(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) => Self::parse(raw),
            None => Self::absent(),
        }
    }

    /// Score a single candidate token against this evaluator.
    pub fn score(&self, candidate: &str) -> f64 {
        if self.values.is_empty() {
            return 1.0;
        }

        if let Some(q) = self.values.get(candidate) {
            return *q;
        }

        if let Some(semi) = candidate.find(';') {
            return self.score(&candidate[..semi]);
        }

        if let Some(slash) = candidate.find('/') {
            let group_wild = format!("{}/*", &candidate[..slash]);
            if let Some(q) = self.values.get(group_wild.as_str()) {
                return *q;
            }
            if let Some(q) = self.values.get("*/*") {
                return *q;
            }
            return 0.0;
        }

        if let Some(q) = self.values.get("*") {
            return *q;
        }

        0.0
    }

    /// Pick the highest-scoring candidate, ignoring any scoring 0. Ties are
    /// broken by input order (stable argmax).
    pub fn negotiate<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        let mut best: Option<(&'a str, f64)> = None;
        for &candidate in candidates {
            let score = self.score(candidate);
            if score <= 0.0 {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((candidate, score)),
            }
        }
        best.map(|(candidate, _)| candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_empty_both_score_one() {
        let absent = Negotiation::absent();
        assert_eq!(absent.score("gzip"), 1.0);
        assert_eq!(absent.score("anything"), 1.0);

        let empty = Negotiation::parse("");
        assert_eq!(empty.score("gzip"), 1.0);
    }

    #[test]
    fn exact_and_q_value() {
        let neg = Negotiation::parse("gzip;q=0.5, br;q=1.0, identity");
        assert_eq!(neg.score("gzip"), 0.5);
        assert_eq!(neg.score("br"), 1.0);
        assert_eq!(neg.score("identity"), 1.0);
        assert_eq!(neg.score("deflate"), 0.0);
    }

    #[test]
    fn media_type_wildcard_fallback() {
        let neg = Negotiation::parse("text/html, text/*;q=0.8, */*;q=0.1");
        assert_eq!(neg.score("text/html"), 1.0);
        assert_eq!(neg.score("text/plain"), 0.8);
        assert_eq!(neg.score("application/json"), 0.1);
    }

    #[test]
    fn bare_star_fallback_for_non_media_candidates() {
        let neg = Negotiation::parse("gzip, *;q=0.2");
        assert_eq!(neg.score("gzip"), 1.0);
        assert_eq!(neg.score("br"), 0.2);
    }

    #[test]
    fn candidate_with_params_retries_base_token() {
        let neg = Negotiation::parse("text/html;level=1;q=0.7");
        assert_eq!(neg.score("text/html;level=2"), 0.7);
    }

    #[test]
    fn negotiate_breaks_ties_by_input_order() {
        let neg = Negotiation::parse("a;q=0.5, b;q=0.5");
        assert_eq!(neg.negotiate(&["b", "a"]), Some("b"));
        assert_eq!(neg.negotiate(&["a", "b"]), Some("a"));
    }

    #[test]
    fn negotiate_ignores_zero_scores() {
        let neg = Negotiation::parse("gzip;q=0");
        assert_eq!(neg.negotiate(&["gzip", "identity"]), Some("identity"));
    }

    #[test]
    fn q_value_clamped_to_five_significant_chars() {
        let neg = Negotiation::parse("gzip;q=0.123456789");
        assert_eq!(neg.score("gzip"), 0.123);
    }
}
