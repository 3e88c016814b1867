use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::{
    config::SignalConfig,
    domain::{message::truncate_chars, Entities, InboundMessage},
};

pub const DEFAULT_RECRUITER_FRAGMENTS: &[&str] =
    &["recruit", "talent", "hiring", "careers", "hr@", "people@", "jobs@"];

pub const DEFAULT_AUTOMATED_FRAGMENTS: &[&str] = &[
    "noreply",
    "no-reply",
    "donotreply",
    "do-not-reply",
    "notifications@",
    "mailer-daemon",
];

pub const DEFAULT_KNOWN_EMPLOYER_DOMAINS: &[&str] =
    &["google.com", "meta.com", "amazon.com", "microsoft.com", "apple.com"];

pub const DEFAULT_JOB_PLATFORM_DOMAINS: &[&str] = &[
    "greenhouse.io",
    "lever.co",
    "workable.com",
    "ashbyhq.com",
    "smartrecruiters.com",
    "myworkdayjobs.com",
    "workday.com",
    "taleo.net",
    "icims.com",
    "jobvite.com",
    "bamboohr.com",
    "linkedin.com",
    "indeed.com",
    "glassdoor.com",
    "wellfound.com",
];

pub const DEFAULT_PERSONAL_EMAIL_PROVIDERS: &[&str] = &[
    "gmail", "googlemail", "yahoo", "outlook", "hotmail", "live", "msn", "icloud", "me",
    "protonmail", "proton", "aol", "mail", "zoho", "yandex", "gmx",
];

const JOB_KEYWORDS: &[&str] = &[
    "application",
    "applications",
    "applied",
    "applying",
    "interview",
    "interviews",
    "offer",
    "position",
    "role",
    "candidate",
    "hiring",
    "recruiter",
    "recruiting",
    "opportunity",
    "resume",
    "cv",
    "assessment",
    "onsite",
    "submitted",
    "congratulations",
    "unfortunately",
    "regret",
    "rejected",
    "compensation",
    "salary",
    "intern",
    "internship",
    "job",
    "career",
    "careers",
    "hackerrank",
    "codility",
];

const SECOND_LEVEL_LABELS: &[&str] = &["co", "com", "ac", "org", "net", "gov"];

const NON_PERSON_WORDS: &[&str] = &[
    "team", "careers", "career", "talent", "recruiting", "recruitment", "jobs", "hiring", "hr",
    "no", "reply", "noreply", "notifications", "support", "info", "the", "via",
];

const NON_ORG_WORDS: &[&str] = &[
    "the", "a", "an", "our", "we", "i", "you", "your", "this", "that", "us", "monday",
    "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];

static TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9]+(?:'[A-Za-z]+)?").expect("valid token regex"));
static ORG_CONTEXT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:at|with|join|joining)\s+([A-Z][A-Za-z0-9&\-]*(?:\s+[A-Z][A-Za-z0-9&\-]*){0,3})")
        .expect("valid org context regex")
});
static ORG_SUFFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b([A-Z][A-Za-z0-9&\-]*(?:\s+[A-Z][A-Za-z0-9&\-]*){0,2}\s+(?:Inc|LLC|Ltd|Corp|Corporation|Technologies|Labs|GmbH))\b",
    )
    .expect("valid org suffix regex")
});
static GREETING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Hi|Hello|Dear|Hey)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)")
        .expect("valid greeting regex")
});
static SIGN_OFF_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Regards|Best|Thanks|Sincerely|Cheers),?\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)")
        .expect("valid sign-off regex")
});
static DATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:mon|tues|wednes|thurs|fri|satur|sun)day|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+\d{1,2}(?:st|nd|rd|th)?(?:,?\s*\d{4})?|\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}(?:/\d{2,4})?|today|tomorrow|next\s+week|\d{1,2}(?::\d{2})?\s?(?:am|pm))\b",
    )
    .expect("valid date regex")
});
static LEGAL_SUFFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[\s,]+(?:inc|llc|corp|corporation|ltd|limited|gmbh)\.?$")
        .expect("valid legal suffix regex")
});
static DISPLAY_NAME_COMPANY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\sfrom\s+(.+)$").expect("valid display name regex"));
static ROLE_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(?:interview|assessment)(?:\s+(?:request|invitation|invite))?\s*[-:|]\s*(.+)$",
        r"(?i)\b(?:application|applying|applied)\s+(?:for|to)\s+(?:the\s+)?(.+?)(?:\s+(?:position|role)\b|\s+at\s+|$)",
        r"(?i)\b(?:position|role)\s*[-:]\s*(.+)$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid role regex"))
    .collect()
});

/// Local named-entity capability: organisation, person and date spans.
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Entities;
}

/// Rule-based extractor over capitalisation, greetings and date shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEntityExtractor;

impl EntityExtractor for HeuristicEntityExtractor {
    fn extract(&self, text: &str) -> Entities {
        let mut entities = Entities::default();

        for caps in ORG_SUFFIX_REGEX
            .captures_iter(text)
            .chain(ORG_CONTEXT_REGEX.captures_iter(text))
        {
            if let Some(span) = caps.get(1) {
                let span = span.as_str().trim();
                let first = span.split_whitespace().next().unwrap_or_default();
                if !NON_ORG_WORDS.contains(&first.to_lowercase().as_str()) {
                    push_unique(&mut entities.organizations, span);
                }
            }
        }

        for caps in GREETING_REGEX
            .captures_iter(text)
            .chain(SIGN_OFF_REGEX.captures_iter(text))
        {
            if let Some(span) = caps.get(1) {
                if looks_like_person(span.as_str()) {
                    push_unique(&mut entities.persons, span.as_str());
                }
            }
        }

        for found in DATE_REGEX.find_iter(text) {
            push_unique(&mut entities.dates, found.as_str());
        }

        entities
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SenderSignals {
    pub is_recruiter: bool,
    pub is_automated: bool,
    pub is_known_employer: bool,
    pub is_job_platform: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalReport {
    pub entities: Entities,
    pub keyword_count: usize,
    pub token_count: usize,
    pub keyword_density: f64,
    pub sender: SenderSignals,
    pub sender_company: Option<String>,
    pub role_guess: Option<String>,
}

impl SignalReport {
    pub fn is_likely_job_related(&self) -> bool {
        self.keyword_count >= 2 || self.sender.is_recruiter
    }
}

pub struct SignalExtractor {
    config: SignalConfig,
    entities: Box<dyn EntityExtractor>,
}

impl SignalExtractor {
    pub fn new(config: SignalConfig) -> Self {
        Self::with_entity_extractor(config, Box::new(HeuristicEntityExtractor))
    }

    pub fn with_entity_extractor(config: SignalConfig, entities: Box<dyn EntityExtractor>) -> Self {
        Self { config, entities }
    }

    pub fn extract(&self, message: &InboundMessage) -> SignalReport {
        let text = message.analysis_text(self.config.max_body_chars);

        let mut entities = self.entities.extract(&text);
        let sender_company = self.company_from_sender(message);
        if let Some(company) = &sender_company {
            push_unique(&mut entities.organizations, company);
        }
        if let Some(company) = company_from_display_name(&message.sender_name) {
            push_unique(&mut entities.organizations, &company);
        }
        if looks_like_person(&message.sender_name) {
            push_unique(&mut entities.persons, message.sender_name.trim());
        }

        let (keyword_count, token_count) = count_keywords(&text);
        let keyword_density = keyword_count as f64 / token_count.max(1) as f64;

        SignalReport {
            entities,
            keyword_count,
            token_count,
            keyword_density: keyword_density.min(1.0),
            sender: self.sender_signals(message),
            sender_company,
            role_guess: guess_role(&message.subject),
        }
    }

    pub fn sender_signals(&self, message: &InboundMessage) -> SenderSignals {
        let address = message.sender_address.to_lowercase();
        let name = message.sender_name.to_lowercase();
        let domain = message.sender_domain().unwrap_or_default();

        let mentions = |fragments: &[String]| {
            fragments
                .iter()
                .any(|f| address.contains(f.as_str()) || name.contains(f.as_str()))
        };

        SenderSignals {
            is_recruiter: mentions(&self.config.recruiter_fragments),
            is_automated: self
                .config
                .automated_fragments
                .iter()
                .any(|f| address.contains(f.as_str())),
            is_known_employer: domain_in(&domain, &self.config.known_employer_domains),
            is_job_platform: domain_in(&domain, &self.config.job_platform_domains),
        }
    }

    /// Company guessed from the sender's domain, skipping webmail and ATS hosts.
    pub fn company_from_sender(&self, message: &InboundMessage) -> Option<String> {
        let domain = message.sender_domain()?;
        if domain_in(&domain, &self.config.job_platform_domains) {
            return None;
        }
        let label = registrable_label(&domain)?;
        let is_personal = self
            .config
            .personal_email_providers
            .iter()
            .any(|provider| provider == label);
        let is_platform = self
            .config
            .job_platform_domains
            .iter()
            .any(|platform| platform.split('.').next() == Some(label));
        if is_personal || is_platform {
            return None;
        }
        Some(title_case(label))
    }
}

impl Default for SignalExtractor {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

/// Removes a trailing legal-entity suffix such as "Inc." or "LLC".
pub fn strip_legal_suffix(name: &str) -> String {
    LEGAL_SUFFIX_REGEX.replace(name.trim(), "").trim().to_string()
}

fn count_keywords(text: &str) -> (usize, usize) {
    let mut keywords = 0;
    let mut tokens = 0;
    for token in TOKEN_REGEX.find_iter(text) {
        tokens += 1;
        if JOB_KEYWORDS.contains(&token.as_str().to_lowercase().as_str()) {
            keywords += 1;
        }
    }
    (keywords, tokens)
}

fn registrable_label(domain: &str) -> Option<&str> {
    let labels: Vec<&str> = domain.split('.').filter(|l| !l.is_empty()).collect();
    match labels.as_slice() {
        [] => None,
        [only] => Some(*only),
        [.., label, second, tld] if tld.len() == 2 && SECOND_LEVEL_LABELS.contains(second) => {
            Some(*label)
        }
        [.., label, _tld] => Some(*label),
    }
}

fn domain_in(domain: &str, candidates: &[String]) -> bool {
    !domain.is_empty()
        && candidates.iter().any(|candidate| {
            domain == candidate || domain.ends_with(&format!(".{candidate}"))
        })
}

fn company_from_display_name(name: &str) -> Option<String> {
    let caps = DISPLAY_NAME_COMPANY_REGEX.captures(name)?;
    let company = strip_legal_suffix(caps.get(1)?.as_str());
    if company.chars().count() > 2 {
        Some(company)
    } else {
        None
    }
}

fn looks_like_person(name: &str) -> bool {
    let words: Vec<&str> = name.split_whitespace().collect();
    if words.is_empty() || words.len() > 3 {
        return false;
    }
    words.iter().all(|word| {
        let mut chars = word.chars();
        let starts_upper = chars.next().is_some_and(|c| c.is_uppercase());
        starts_upper
            && word.chars().all(|c| c.is_alphabetic() || c == '-' || c == '\'')
            && !NON_PERSON_WORDS.contains(&word.to_lowercase().as_str())
    })
}

fn guess_role(subject: &str) -> Option<String> {
    ROLE_REGEXES.iter().find_map(|regex| {
        let role = regex.captures(subject)?.get(1)?.as_str();
        let role = role
            .trim()
            .trim_end_matches(|c: char| c.is_ascii_punctuation())
            .trim();
        if role.is_empty() {
            None
        } else {
            Some(truncate_chars(role, 80).to_string())
        }
    })
}

fn title_case(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn push_unique(spans: &mut Vec<String>, span: &str) {
    let span = span.trim();
    if span.is_empty() {
        return;
    }
    if !spans.iter().any(|existing| existing.eq_ignore_ascii_case(span)) {
        spans.push(span.to_string());
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn message(sender: &str, name: &str, subject: &str, preview: &str) -> InboundMessage {
        InboundMessage {
            mailbox_id: "m".into(),
            thread_id: String::new(),
            subject: subject.into(),
            sender_address: sender.into(),
            sender_name: name.into(),
            received_at: Utc::now(),
            preview: preview.into(),
            body: None,
        }
    }

    #[test]
    fn interview_request_yields_domain_company_and_keywords() {
        let report = SignalExtractor::default().extract(&message(
            "recruiting@acme.com",
            "",
            "Interview Request - SWE Intern",
            "We'd like to schedule a call...",
        ));
        assert_eq!(report.sender_company.as_deref(), Some("Acme"));
        assert!(report.entities.organizations.contains(&"Acme".to_string()));
        assert!(report.keyword_count >= 2);
        assert!(report.sender.is_recruiter);
        assert!(report.is_likely_job_related());
        assert_eq!(report.role_guess.as_deref(), Some("SWE Intern"));
    }

    #[test]
    fn empty_message_has_zero_density() {
        let report = SignalExtractor::default().extract(&message("", "", "", ""));
        assert_eq!(report.token_count, 0);
        assert_eq!(report.keyword_density, 0.0);
        assert!(!report.is_likely_job_related());
        assert!(report.entities.is_empty());
    }

    #[test]
    fn density_stays_within_unit_interval() {
        let report =
            SignalExtractor::default().extract(&message("a@b.com", "", "interview offer", "job"));
        assert_eq!(report.keyword_count, 3);
        assert!((0.0..=1.0).contains(&report.keyword_density));
    }

    #[test]
    fn webmail_and_ats_domains_give_no_company() {
        let extractor = SignalExtractor::default();
        assert_eq!(extractor.company_from_sender(&message("jane@gmail.com", "", "", "")), None);
        assert_eq!(
            extractor.company_from_sender(&message("no-reply@us.greenhouse.io", "", "", "")),
            None
        );
        assert_eq!(
            extractor.company_from_sender(&message("jobs@careers.globex.co.uk", "", "", "")),
            Some("Globex".to_string())
        );
    }

    #[test]
    fn sender_flags_follow_fragment_lists() {
        let extractor = SignalExtractor::default();
        let signals =
            extractor.sender_signals(&message("no-reply@google.com", "Google Careers", "", ""));
        assert!(signals.is_automated);
        assert!(signals.is_known_employer);
        assert!(signals.is_recruiter);
        assert!(!signals.is_job_platform);

        let platform = extractor.sender_signals(&message("x@mail.lever.co", "", "", ""));
        assert!(platform.is_job_platform);
    }

    #[test]
    fn display_name_company_hint_is_extracted() {
        assert_eq!(
            company_from_display_name("Jane from Initech Inc."),
            Some("Initech".to_string())
        );
        assert_eq!(company_from_display_name("Jane Doe"), None);
    }

    #[test]
    fn heuristic_extractor_finds_orgs_people_and_dates() {
        let entities = HeuristicEntityExtractor.extract(
            "Hi Alex, thanks for interviewing with Umbrella Labs. \
             Are you free Tuesday at 3pm or on March 4th? Best, Dana Scully",
        );
        assert!(entities.organizations.iter().any(|o| o.contains("Umbrella")));
        assert!(entities.persons.contains(&"Alex".to_string()));
        assert!(entities.persons.contains(&"Dana Scully".to_string()));
        assert!(entities.dates.iter().any(|d| d.eq_ignore_ascii_case("tuesday")));
        assert!(entities.dates.iter().any(|d| d.contains("March 4")));
    }

    #[test]
    fn role_guess_reads_common_subject_shapes() {
        assert_eq!(
            guess_role("Thank you for your application for the Data Analyst position"),
            Some("Data Analyst".to_string())
        );
        assert_eq!(guess_role("Position: Backend Engineer"), Some("Backend Engineer".into()));
        assert_eq!(guess_role("Lunch?"), None);
    }

    #[test]
    fn legal_suffixes_are_stripped() {
        assert_eq!(strip_legal_suffix("Acme, Inc."), "Acme");
        assert_eq!(strip_legal_suffix("Globex Corp"), "Globex");
        assert_eq!(strip_legal_suffix("Incredible"), "Incredible");
    }
}
