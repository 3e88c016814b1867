use crate::{
    ai::EscalationClassifier,
    classifier::{PatternClassifier, QuickFilter, SignalExtractor, SignalReport},
    config::AppConfig,
    domain::{
        Category, ClassificationResult, Entities, InboundMessage, MatchDecision, Provenance,
        TrackedApplication,
    },
    infrastructure::shutdown::ShutdownListener,
    matching::IdentityMatcher,
};

/// Confidence attached to messages the quick filter discards.
pub const QUICK_FILTER_CONFIDENCE: f64 = 1.0;

/// Everything the pipeline decided about one message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageOutcome {
    pub message: InboundMessage,
    pub classification: ClassificationResult,
    pub decision: MatchDecision,
    pub company_guess: Option<String>,
    pub role_guess: Option<String>,
}

/// Quick filter, signals, patterns, optional escalation, then matching.
pub struct MessagePipeline {
    quick_filter: QuickFilter,
    signals: SignalExtractor,
    patterns: PatternClassifier,
    escalation: EscalationClassifier,
    matcher: IdentityMatcher,
    max_body_chars: usize,
}

impl MessagePipeline {
    pub fn new(config: &AppConfig, escalation: EscalationClassifier) -> Self {
        Self {
            quick_filter: QuickFilter::new(&config.filters),
            signals: SignalExtractor::new(config.signals.clone()),
            patterns: PatternClassifier,
            escalation,
            matcher: IdentityMatcher::new(&config.matching),
            max_body_chars: config.signals.max_body_chars,
        }
    }

    /// Classifies and matches one message against a snapshot of the user's
    /// open applications. Never fails: a broken escalation call falls back
    /// to the pattern verdict.
    pub async fn process(
        &self,
        message: InboundMessage,
        user_address: Option<&str>,
        applications: &[TrackedApplication],
        shutdown: &mut ShutdownListener,
    ) -> MessageOutcome {
        if let Some(rejection) = self.quick_filter.rejection(&message) {
            tracing::debug!(
                target: "pipeline",
                mailbox_id = %message.mailbox_id,
                ?rejection,
                "message dropped by quick filter"
            );
            return MessageOutcome {
                message,
                classification: ClassificationResult::new(
                    Category::NotJobRelated,
                    QUICK_FILTER_CONFIDENCE,
                    Entities::default(),
                    Provenance::QuickFilter,
                ),
                decision: MatchDecision::NoMatch,
                company_guess: None,
                role_guess: None,
            };
        }

        let report = self.signals.extract(&message);
        let classification = self.classify(&message, &report, user_address, shutdown).await;

        let decision = if classification.category().is_job_related() {
            self.matcher.match_message(&report, applications)
        } else {
            MatchDecision::NoMatch
        };

        tracing::debug!(
            target: "pipeline",
            mailbox_id = %message.mailbox_id,
            category = %classification.category(),
            confidence = classification.confidence(),
            provenance = classification.provenance().as_str(),
            matched = decision.application_id().unwrap_or("-"),
            "message classified"
        );

        MessageOutcome {
            company_guess: company_guess(&report),
            role_guess: report.role_guess,
            message,
            classification,
            decision,
        }
    }

    async fn classify(
        &self,
        message: &InboundMessage,
        report: &SignalReport,
        user_address: Option<&str>,
        shutdown: &mut ShutdownListener,
    ) -> ClassificationResult {
        let text = message.analysis_text(self.max_body_chars);
        let verdict = self.patterns.classify(&text, report, user_address);
        let pattern_result = ClassificationResult::new(
            verdict.category,
            verdict.confidence,
            report.entities.clone(),
            Provenance::Pattern,
        );

        if !self.escalation.should_escalate(pattern_result.confidence()) {
            return pattern_result;
        }

        match self.escalation.escalate(message, shutdown).await {
            Ok(escalated) => {
                tracing::debug!(
                    target: "escalation",
                    mailbox_id = %message.mailbox_id,
                    from = %pattern_result.category(),
                    to = %escalated.category,
                    justification = %escalated.justification,
                    "escalation verdict accepted"
                );
                ClassificationResult::new(
                    escalated.category,
                    escalated.confidence,
                    report.entities.clone(),
                    Provenance::Escalation,
                )
            }
            Err(err) => {
                tracing::warn!(
                    target: "escalation",
                    mailbox_id = %message.mailbox_id,
                    error = %err,
                    "escalation failed, keeping pattern verdict"
                );
                pattern_result
            }
        }
    }
}

/// Company name offered to the user when a lead is confirmed.
fn company_guess(report: &SignalReport) -> Option<String> {
    report
        .sender_company
        .clone()
        .or_else(|| report.entities.organizations.first().cloned())
}
