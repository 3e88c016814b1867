use crate::{config::FilterConfig, domain::InboundMessage};

/// Sender-address fragments that only show up on bulk/promotional mail.
pub const DEFAULT_SENDER_BLOCKLIST: &[&str] = &[
    "newsletter",
    "marketing",
    "promo",
    "deals",
    "digest",
    "unsubscribe",
    "mailer-daemon",
];

pub const DEFAULT_SUBJECT_BLOCKLIST: &[&str] = &[
    "unsubscribe",
    "newsletter",
    "weekly digest",
    "% off",
    "flash sale",
    "discount code",
    "limited time",
    "act now",
    "free trial",
    "click here",
];

/// Senders that always pass: job boards, ATS hosts and careers subdomains.
pub const DEFAULT_PLATFORM_SENDERS: &[&str] = &[
    "linkedin.com",
    "indeed.com",
    "glassdoor.com",
    "monster.com",
    "ziprecruiter.com",
    "greenhouse.io",
    "lever.co",
    "workable.com",
    "ashbyhq.com",
    "smartrecruiters.com",
    "myworkdayjobs.com",
    "taleo.net",
    "icims.com",
    "jobvite.com",
    "workday.com",
    "wellfound.com",
    "angellist.com",
    "angel.co",
    "hired.com",
    "otta.com",
    "builtin.com",
    "hire.",
    "careers.",
    "jobs.",
    "recruiting.",
    "talent.",
];

/// Subject phrases that mark a message as job mail even when it also trips a blocklist.
pub const DEFAULT_JOB_SUBJECT_SIGNALS: &[&str] = &[
    "application",
    "applied",
    "interview",
    "offer",
    "position",
    "role",
    "opportunity",
    "candidate",
    "assessment",
    "coding",
    "next steps",
    "thank you for",
    "regarding your",
    "following up",
    "recruiter",
    "hiring",
    "job",
    "career",
    "resume",
    "shortlisted",
    "vacancy",
    "opening",
    "talent",
    "screening",
    "onboarding",
    "background check",
    "hackerrank",
    "codesignal",
    "codility",
    "phone screen",
    "video call",
    "calendly",
    "schedule",
    "availability",
    "congratulations",
    "unfortunately",
    "regret",
    "selected",
    "moving forward",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Sender(String),
    Subject(String),
}

#[derive(Debug, Clone)]
pub struct QuickFilter {
    platform_senders: Vec<String>,
    job_subject_signals: Vec<String>,
    sender_blocklist: Vec<String>,
    subject_blocklist: Vec<String>,
}

impl QuickFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            platform_senders: lowered(&config.platform_senders),
            job_subject_signals: lowered(&config.job_subject_signals),
            sender_blocklist: lowered(&config.sender_blocklist),
            subject_blocklist: lowered(&config.subject_blocklist),
        }
    }

    /// `None` lets the message continue down the pipeline. Platform senders and
    /// job-signal subjects are let through before either blocklist is consulted.
    pub fn rejection(&self, message: &InboundMessage) -> Option<Rejection> {
        let sender = message.sender_address.to_lowercase();
        let subject = message.subject.to_lowercase();
        if contains_any(&sender, &self.platform_senders)
            || contains_any(&subject, &self.job_subject_signals)
        {
            return None;
        }

        if let Some(fragment) = self
            .sender_blocklist
            .iter()
            .find(|fragment| sender.contains(fragment.as_str()))
        {
            return Some(Rejection::Sender(fragment.clone()));
        }

        self.subject_blocklist
            .iter()
            .find(|phrase| subject.contains(phrase.as_str()))
            .map(|phrase| Rejection::Subject(phrase.clone()))
    }
}

impl Default for QuickFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle.as_str()))
}

fn lowered(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    impl QuickFilter {
        fn should_process(&self, message: &InboundMessage) -> bool {
            self.rejection(message).is_none()
        }
    }

    fn message(sender: &str, subject: &str) -> InboundMessage {
        InboundMessage {
            mailbox_id: "m".into(),
            thread_id: String::new(),
            subject: subject.into(),
            sender_address: sender.into(),
            sender_name: String::new(),
            received_at: Utc::now(),
            preview: String::new(),
            body: None,
        }
    }

    #[test]
    fn blocked_sender_fragments_reject() {
        let filter = QuickFilter::default();
        for sender in ["news@newsletter.shop.com", "Deals@store.io", "MAILER-DAEMON@host"] {
            let msg = message(sender, "Top picks this week");
            assert!(!filter.should_process(&msg), "{sender} should be rejected");
        }
    }

    #[test]
    fn promotional_subjects_reject() {
        let filter = QuickFilter::default();
        let msg = message("hello@shop.com", "50% OFF everything this weekend");
        assert_eq!(
            filter.rejection(&msg),
            Some(Rejection::Subject("% off".into()))
        );
    }

    #[test]
    fn job_mail_and_empty_fields_pass() {
        let filter = QuickFilter::default();
        assert!(filter.should_process(&message("recruiting@acme.com", "Interview Request")));
        assert!(filter.should_process(&message("", "")));
        assert!(filter.should_process(&message("no-reply@greenhouse.io", "Thanks for applying")));
    }

    #[test]
    fn configured_lists_replace_defaults() {
        let filter = QuickFilter::new(&FilterConfig {
            sender_blocklist: vec!["  Spam ".into()],
            subject_blocklist: vec![],
            ..FilterConfig::default()
        });
        assert!(!filter.should_process(&message("spam@x.com", "hi")));
        assert!(filter.should_process(&message("deals@x.com", "50% off")));
    }

    #[test]
    fn platform_senders_pass_despite_blocklisted_fragments() {
        let filter = QuickFilter::default();
        let msg = message("jobs-digest@greenhouse.io", "Weekly digest: 3 new updates");
        assert_eq!(filter.rejection(&msg), None);
        let careers = message("newsletter@careers.acme.com", "Flash sale");
        assert!(filter.should_process(&careers));
    }

    #[test]
    fn job_signal_subjects_pass_despite_blocklisted_words() {
        let filter = QuickFilter::default();
        let invite = message(
            "talent-team@acme.com",
            "Interview invitation - unsubscribe link below",
        );
        assert_eq!(filter.rejection(&invite), None);
        let promo_sender = message("promo@acme.com", "Next steps for your application");
        assert!(filter.should_process(&promo_sender));
        let plain_promo = message("promo@acme.com", "Unsubscribe from these emails");
        assert_eq!(
            filter.rejection(&plain_promo),
            Some(Rejection::Sender("promo".into()))
        );
    }
}
