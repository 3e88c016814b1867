use crate::{
    classifier::signals::{strip_legal_suffix, SignalReport},
    config::MatchConfig,
    domain::{MatchDecision, TrackedApplication},
};

pub const EXACT_MATCH_CONFIDENCE: f64 = 0.95;

/// Links a classified message to one of the user's open applications.
#[derive(Debug, Clone)]
pub struct IdentityMatcher {
    threshold: f64,
}

impl IdentityMatcher {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            threshold: config.threshold,
        }
    }

    /// Exact company-name hits win outright; otherwise the single best fuzzy
    /// score above the threshold. Ties go to the earliest-created application.
    pub fn match_message(
        &self,
        signals: &SignalReport,
        applications: &[TrackedApplication],
    ) -> MatchDecision {
        let candidates = candidate_set(signals);
        if candidates.is_empty() {
            tracing::debug!(target: "matcher", "no candidate companies in message");
            return MatchDecision::NoMatch;
        }

        let mut ordered: Vec<&TrackedApplication> = applications
            .iter()
            .filter(|app| !app.status.is_terminal() && !app.company_name.trim().is_empty())
            .collect();
        ordered.sort_by_key(|app| app.created_at);

        for app in &ordered {
            let name = app.company_name.trim().to_lowercase();
            let stripped = strip_legal_suffix(&name);
            if candidates.iter().any(|c| *c == name || *c == stripped) {
                tracing::debug!(
                    target: "matcher",
                    application_id = %app.id,
                    company = %app.company_name,
                    "exact company match"
                );
                return MatchDecision::Matched {
                    application_id: app.id.clone(),
                    confidence: EXACT_MATCH_CONFIDENCE,
                };
            }
        }

        let mut best: Option<(&TrackedApplication, f64)> = None;
        for app in &ordered {
            for candidate in &candidates {
                let score = similarity(&app.company_name, candidate);
                if best.map_or(true, |(_, top)| score > top) {
                    best = Some((*app, score));
                }
            }
        }

        match best {
            Some((app, score)) if score > self.threshold => {
                tracing::debug!(
                    target: "matcher",
                    application_id = %app.id,
                    score,
                    "fuzzy company match"
                );
                MatchDecision::Matched {
                    application_id: app.id.clone(),
                    confidence: score / 100.0,
                }
            }
            _ => MatchDecision::NoMatch,
        }
    }
}

impl Default for IdentityMatcher {
    fn default() -> Self {
        Self::new(&MatchConfig::default())
    }
}

/// Lower-cased organisation names plus the sender-domain company, in
/// first-seen order. Suffix-stripped forms ride along.
pub fn candidate_set(signals: &SignalReport) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    let names = signals
        .entities
        .organizations
        .iter()
        .chain(signals.sender_company.iter());
    for name in names {
        let lowered = name.trim().to_lowercase();
        if lowered.is_empty() {
            continue;
        }
        let stripped = strip_legal_suffix(&lowered);
        for value in [lowered, stripped] {
            if !value.is_empty() && !candidates.contains(&value) {
                candidates.push(value);
            }
        }
    }
    candidates
}

/// Similarity on a 0-100 scale after lower-casing and dropping legal suffixes.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = strip_legal_suffix(&a.trim().to_lowercase());
    let b = strip_legal_suffix(&b.trim().to_lowercase());
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_damerau_levenshtein(&a, &b) * 100.0
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::{
        classifier::signals::{SenderSignals, SignalReport},
        domain::{ApplicationStatus, Entities},
    };

    fn signals(orgs: &[&str], sender_company: Option<&str>) -> SignalReport {
        SignalReport {
            entities: Entities {
                organizations: orgs.iter().map(|o| o.to_string()).collect(),
                ..Default::default()
            },
            keyword_count: 2,
            token_count: 10,
            keyword_density: 0.2,
            sender: SenderSignals::default(),
            sender_company: sender_company.map(str::to_string),
            role_guess: None,
        }
    }

    fn app(id: &str, company: &str, age_days: i64) -> TrackedApplication {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let created = base - Duration::days(age_days);
        TrackedApplication {
            id: id.into(),
            user_id: "u".into(),
            company_name: company.into(),
            role_title: "Engineer".into(),
            status: ApplicationStatus::Applied,
            status_changed_at: created,
            applied_at: created,
            source: None,
            created_at: created,
            linked_message_ids: vec![],
            last_linked_at: None,
        }
    }

    #[test]
    fn exact_match_is_fixed_confidence() {
        let decision = IdentityMatcher::default()
            .match_message(&signals(&["Acme"], Some("Acme")), &[app("a1", "Acme", 1)]);
        assert_eq!(
            decision,
            MatchDecision::Matched {
                application_id: "a1".into(),
                confidence: EXACT_MATCH_CONFIDENCE
            }
        );
    }

    #[test]
    fn exact_match_beats_earlier_close_fuzzy_candidate() {
        let apps = [app("older", "Acne", 30), app("newer", "Acme", 1)];
        let decision = IdentityMatcher::default().match_message(&signals(&["acme"], None), &apps);
        assert_eq!(decision.application_id(), Some("newer"));
        assert_eq!(decision.confidence(), EXACT_MATCH_CONFIDENCE);
    }

    #[test]
    fn legal_suffix_does_not_block_exact_match() {
        let decision = IdentityMatcher::default()
            .match_message(&signals(&["Initech Inc."], None), &[app("a1", "Initech", 1)]);
        assert_eq!(decision.confidence(), EXACT_MATCH_CONFIDENCE);
    }

    #[test]
    fn fuzzy_match_above_threshold_uses_score() {
        let decision = IdentityMatcher::default().match_message(
            &signals(&["Initech System"], None),
            &[app("a1", "Initech Systems", 1)],
        );
        assert_eq!(decision.application_id(), Some("a1"));
        let expected = strsim::normalized_damerau_levenshtein("initech systems", "initech system");
        assert!((decision.confidence() - expected).abs() < 1e-9);
        assert!(decision.confidence() < EXACT_MATCH_CONFIDENCE);
    }

    #[test]
    fn weak_similarity_is_no_match() {
        let decision = IdentityMatcher::default()
            .match_message(&signals(&["Acme"], None), &[app("a1", "Globex", 1)]);
        assert_eq!(decision, MatchDecision::NoMatch);
    }

    #[test]
    fn no_candidates_is_no_match() {
        let decision =
            IdentityMatcher::default().match_message(&signals(&[], None), &[app("a1", "Gmail", 1)]);
        assert_eq!(decision, MatchDecision::NoMatch);
    }

    #[test]
    fn ties_go_to_earliest_created_application() {
        let apps = [app("late", "Initech Systemz", 1), app("early", "Initech Systemx", 9)];
        let decision =
            IdentityMatcher::default().match_message(&signals(&["Initech Systems"], None), &apps);
        assert_eq!(decision.application_id(), Some("early"));
    }

    #[test]
    fn terminal_applications_are_ignored() {
        let mut closed = app("a1", "Acme", 1);
        closed.status = ApplicationStatus::Rejected;
        let decision =
            IdentityMatcher::default().match_message(&signals(&["Acme"], None), &[closed]);
        assert_eq!(decision, MatchDecision::NoMatch);
    }

    #[test]
    fn threshold_is_configurable() {
        let strict = IdentityMatcher::new(&MatchConfig { threshold: 99.0 });
        let decision = strict.match_message(
            &signals(&["Initech System"], None),
            &[app("a1", "Initech Systems", 1)],
        );
        assert_eq!(decision, MatchDecision::NoMatch);
    }
}
