use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::domain::{ApplicationStatus, Insight, Severity, TrackedApplication};

pub const MAX_INSIGHTS: usize = 5;
pub const HIGH_GHOST_RATE: f64 = 0.3;
pub const FOLLOW_UP_GHOST_RATE: f64 = 0.25;
pub const STRONG_INTERVIEW_RATE: f64 = 0.15;
pub const INDUSTRY_INTERVIEW_RATE: f64 = 0.10;
pub const WEEKLY_TARGET: usize = 5;
/// Applications without a single interview before suggesting a resume review.
pub const RESUME_REVIEW_MIN_APPLICATIONS: usize = 10;

const DIRECT_SOURCE: &str = "direct";

/// Derives a short, ordered list of observations from a user's applications.
///
/// Output depends only on the applications and `now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsightGenerator;

impl InsightGenerator {
    pub fn generate(
        &self,
        applications: &[TrackedApplication],
        now: DateTime<Utc>,
    ) -> Vec<Insight> {
        if applications.is_empty() {
            return vec![Insight {
                title: "Start your job search!".to_string(),
                description: "Add your first job application to start tracking your progress."
                    .to_string(),
                severity: Severity::Tip,
                data: json!({ "kind": "onboarding" }),
            }];
        }

        let rules = [
            source_performance(applications),
            ghost_rate(applications),
            momentum(applications, now),
            interview_conversion(applications),
            offers(applications),
        ];
        rules.into_iter().flatten().take(MAX_INSIGHTS).collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SourceStats {
    total: usize,
    responded: usize,
}

impl SourceStats {
    fn rate(&self) -> f64 {
        ratio(self.responded, self.total)
    }
}

fn source_performance(applications: &[TrackedApplication]) -> Option<Insight> {
    let mut stats: BTreeMap<String, SourceStats> = BTreeMap::new();
    for app in applications {
        let source = app
            .source
            .as_deref()
            .map(str::trim)
            .filter(|source| !source.is_empty())
            .unwrap_or(DIRECT_SOURCE)
            .to_lowercase();
        let entry = stats.entry(source).or_default();
        entry.total += 1;
        if !matches!(app.status, ApplicationStatus::Applied | ApplicationStatus::Ghosted) {
            entry.responded += 1;
        }
    }

    let mut best: Option<(&str, f64)> = None;
    for (source, stat) in &stats {
        let rate = stat.rate();
        if best.map_or(true, |(_, best_rate)| rate > best_rate) {
            best = Some((source.as_str(), rate));
        }
    }
    let (best_source, best_rate) = best?;
    let direct_rate = stats.get(DIRECT_SOURCE).map(SourceStats::rate).unwrap_or(0.0);

    let data: BTreeMap<&str, _> = stats
        .iter()
        .map(|(source, stat)| {
            (
                source.as_str(),
                json!({ "total": stat.total, "responded": stat.responded, "rate": stat.rate() }),
            )
        })
        .collect();

    Some(Insight {
        title: format!("{} works best for you", title_case(best_source)),
        description: format!(
            "{} has a {} response rate vs {} for direct applications.",
            title_case(best_source),
            percent(best_rate),
            percent(direct_rate)
        ),
        severity: Severity::Success,
        data: json!({ "best_source": best_source, "sources": data }),
    })
}

fn ghost_rate(applications: &[TrackedApplication]) -> Option<Insight> {
    let total = applications.len();
    let ghosted = applications
        .iter()
        .filter(|app| app.status == ApplicationStatus::Ghosted)
        .count();
    let rate = ratio(ghosted, total);
    let data = json!({ "ghosted": ghosted, "total": total, "rate": rate });
    if rate <= FOLLOW_UP_GHOST_RATE {
        return None;
    }
    if rate <= HIGH_GHOST_RATE {
        return Some(Insight {
            title: "Some applications may need follow-up".to_string(),
            description: format!(
                "{ghosted} applications haven't received a response. \
                 A polite follow-up email can help."
            ),
            severity: Severity::Tip,
            data,
        });
    }
    Some(Insight {
        title: "High ghost rate detected".to_string(),
        description: format!(
            "{ghosted} of {total} applications ({}) received no response. \
             Consider following up after 1 week.",
            percent(rate)
        ),
        severity: Severity::Warning,
        data,
    })
}

fn momentum(applications: &[TrackedApplication], now: DateTime<Utc>) -> Option<Insight> {
    let week = Duration::days(7);
    let current_start = now - week;
    let prior_start = current_start - week;

    let mut current = 0usize;
    let mut prior = 0usize;
    for app in applications {
        if app.applied_at > now {
            continue;
        }
        if app.applied_at > current_start {
            current += 1;
        } else if app.applied_at > prior_start {
            prior += 1;
        }
    }

    let data = json!({ "current_week": current, "prior_week": prior });
    if current > prior {
        Some(Insight {
            title: "Great momentum!".to_string(),
            description: format!(
                "You applied to {current} jobs this week, up from {prior} last week. Keep it up!"
            ),
            severity: Severity::Success,
            data,
        })
    } else if current < prior && current < WEEKLY_TARGET {
        Some(Insight {
            title: "Keep the momentum going".to_string(),
            description: format!(
                "Only {current} applications this week vs {prior} last week. \
                 Aim for at least {WEEKLY_TARGET} per week."
            ),
            severity: Severity::Tip,
            data,
        })
    } else {
        None
    }
}

fn interview_conversion(applications: &[TrackedApplication]) -> Option<Insight> {
    let total = applications.len();
    let interviews = applications
        .iter()
        .filter(|app| app.status.reached_interview())
        .count();
    let rate = ratio(interviews, total);
    if interviews == 0 && total >= RESUME_REVIEW_MIN_APPLICATIONS {
        return Some(Insight {
            title: "Time to optimize your resume?".to_string(),
            description: format!(
                "No interviews from {total} applications. \
                 Consider getting resume feedback or tailoring applications."
            ),
            severity: Severity::Tip,
            data: json!({ "interviews": 0, "total": total }),
        });
    }
    if rate <= STRONG_INTERVIEW_RATE {
        return None;
    }
    Some(Insight {
        title: "Strong interview rate!".to_string(),
        description: format!(
            "You're converting {} of applications to interviews. Industry average is ~{}.",
            percent(rate),
            percent(INDUSTRY_INTERVIEW_RATE)
        ),
        severity: Severity::Success,
        data: json!({
            "interviews": interviews,
            "total": total,
            "rate": rate,
            "industry_average": INDUSTRY_INTERVIEW_RATE,
        }),
    })
}

fn offers(applications: &[TrackedApplication]) -> Option<Insight> {
    let count = |status| applications.iter().filter(|app| app.status == status).count();
    let accepted = count(ApplicationStatus::Accepted);
    let pending = count(ApplicationStatus::Offer);

    if accepted > 0 {
        Some(Insight {
            title: "Congratulations!".to_string(),
            description: format!(
                "You've accepted {accepted} offer(s). Great job on your job search!"
            ),
            severity: Severity::Success,
            data: json!({ "accepted": accepted, "pending": pending }),
        })
    } else if pending > 0 {
        Some(Insight {
            title: "You have offer(s) pending!".to_string(),
            description: format!(
                "You have {pending} outstanding offer(s). Don't forget to respond!"
            ),
            severity: Severity::Tip,
            data: json!({ "accepted": accepted, "pending": pending }),
        })
    } else {
        None
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

fn title_case(value: &str) -> String {
    value
        .split(|c: char| c == ' ' || c == '_' || c == '-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(status: ApplicationStatus, source: Option<&str>, days_ago: i64) -> TrackedApplication {
        let now = fixed_now();
        TrackedApplication {
            id: format!("{status}-{days_ago}-{source:?}"),
            user_id: "u1".to_string(),
            company_name: "Acme".to_string(),
            role_title: "Engineer".to_string(),
            status,
            status_changed_at: now - Duration::days(days_ago),
            applied_at: now - Duration::days(days_ago),
            source: source.map(str::to_string),
            created_at: now - Duration::days(days_ago),
            linked_message_ids: Vec::new(),
            last_linked_at: None,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_750_000_000, 0).unwrap()
    }

    fn titles(insights: &[Insight]) -> Vec<&str> {
        insights.iter().map(|insight| insight.title.as_str()).collect()
    }

    #[test]
    fn empty_corpus_gets_onboarding_tip_only() {
        let insights = InsightGenerator.generate(&[], fixed_now());
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].severity, Severity::Tip);
        assert_eq!(insights[0].title, "Start your job search!");
    }

    #[test]
    fn high_ghost_rate_is_flagged() {
        let apps = vec![
            app(ApplicationStatus::Ghosted, None, 30),
            app(ApplicationStatus::Ghosted, None, 30),
            app(ApplicationStatus::Applied, None, 30),
            app(ApplicationStatus::Applied, None, 30),
            app(ApplicationStatus::Applied, None, 30),
        ];
        let insights = InsightGenerator.generate(&apps, fixed_now());
        let warning = insights
            .iter()
            .find(|insight| insight.severity == Severity::Warning)
            .expect("ghost warning");
        assert_eq!(warning.title, "High ghost rate detected");
        assert!(warning.description.starts_with("2 of 5 applications (40%)"));
    }

    #[test]
    fn ghost_rate_at_threshold_is_not_flagged() {
        let mut apps = vec![app(ApplicationStatus::Ghosted, None, 30); 3];
        apps.extend(vec![app(ApplicationStatus::Applied, None, 30); 7]);
        let insights = InsightGenerator.generate(&apps, fixed_now());
        assert!(!titles(&insights).contains(&"High ghost rate detected"));
    }

    #[test]
    fn moderate_ghost_rate_suggests_follow_up() {
        let mut apps = vec![app(ApplicationStatus::Ghosted, None, 30); 3];
        apps.extend(vec![app(ApplicationStatus::Interview, None, 30); 7]);
        let insights = InsightGenerator.generate(&apps, fixed_now());
        let tip = insights
            .iter()
            .find(|insight| insight.title == "Some applications may need follow-up")
            .expect("follow-up tip");
        assert_eq!(tip.severity, Severity::Tip);
        assert!(tip.description.starts_with("3 applications"));

        let mut quiet = vec![app(ApplicationStatus::Ghosted, None, 30); 1];
        quiet.extend(vec![app(ApplicationStatus::Applied, None, 30); 4]);
        let insights = InsightGenerator.generate(&quiet, fixed_now());
        assert!(!titles(&insights)
            .iter()
            .any(|title| title.contains("ghost") || title.contains("follow-up")));
    }

    #[test]
    fn no_interviews_after_many_applications_suggests_resume_review() {
        let apps = vec![app(ApplicationStatus::Applied, None, 30); 10];
        let insights = InsightGenerator.generate(&apps, fixed_now());
        let tip = insights
            .iter()
            .find(|insight| insight.title == "Time to optimize your resume?")
            .expect("resume tip");
        assert_eq!(tip.severity, Severity::Tip);
        assert!(tip.description.starts_with("No interviews from 10 applications"));

        let few = vec![app(ApplicationStatus::Applied, None, 30); 9];
        let insights = InsightGenerator.generate(&few, fixed_now());
        assert!(!titles(&insights).contains(&"Time to optimize your resume?"));
    }

    #[test]
    fn best_source_is_compared_with_direct() {
        let apps = vec![
            app(ApplicationStatus::Interview, Some("referral"), 30),
            app(ApplicationStatus::Screening, Some("referral"), 30),
            app(ApplicationStatus::Applied, None, 30),
            app(ApplicationStatus::Applied, None, 30),
        ];
        let insights = InsightGenerator.generate(&apps, fixed_now());
        assert_eq!(insights[0].title, "Referral works best for you");
        assert_eq!(
            insights[0].description,
            "Referral has a 100% response rate vs 0% for direct applications."
        );
        assert_eq!(insights[0].data["best_source"], "referral");
    }

    #[test]
    fn momentum_compares_rolling_weeks() {
        let rising = vec![
            app(ApplicationStatus::Applied, None, 1),
            app(ApplicationStatus::Applied, None, 2),
            app(ApplicationStatus::Applied, None, 10),
        ];
        let insights = InsightGenerator.generate(&rising, fixed_now());
        assert!(titles(&insights).contains(&"Great momentum!"));

        let falling = vec![
            app(ApplicationStatus::Applied, None, 1),
            app(ApplicationStatus::Applied, None, 9),
            app(ApplicationStatus::Applied, None, 10),
        ];
        let insights = InsightGenerator.generate(&falling, fixed_now());
        assert!(titles(&insights).contains(&"Keep the momentum going"));

        let flat = vec![
            app(ApplicationStatus::Applied, None, 1),
            app(ApplicationStatus::Applied, None, 9),
        ];
        let insights = InsightGenerator.generate(&flat, fixed_now());
        assert!(!titles(&insights).iter().any(|title| title.contains("momentum")));
    }

    #[test]
    fn interview_rate_mentions_industry_average() {
        let apps = vec![
            app(ApplicationStatus::Interview, None, 30),
            app(ApplicationStatus::Applied, None, 30),
            app(ApplicationStatus::Applied, None, 30),
            app(ApplicationStatus::Applied, None, 30),
        ];
        let insights = InsightGenerator.generate(&apps, fixed_now());
        let conversion = insights
            .iter()
            .find(|insight| insight.title == "Strong interview rate!")
            .expect("conversion insight");
        assert!(conversion.description.contains("25%"));
        assert!(conversion.description.contains("~10%"));
    }

    #[test]
    fn output_is_capped_and_ordered() {
        let apps = vec![
            app(ApplicationStatus::Accepted, Some("linkedin"), 1),
            app(ApplicationStatus::Offer, Some("linkedin"), 2),
            app(ApplicationStatus::Ghosted, None, 20),
            app(ApplicationStatus::Ghosted, None, 20),
        ];
        let insights = InsightGenerator.generate(&apps, fixed_now());
        assert!(insights.len() <= MAX_INSIGHTS);
        assert_eq!(
            titles(&insights),
            [
                "Linkedin works best for you",
                "High ghost rate detected",
                "Great momentum!",
                "Strong interview rate!",
                "Congratulations!",
            ]
        );
        assert_eq!(insights, InsightGenerator.generate(&apps, fixed_now()));
    }
}
