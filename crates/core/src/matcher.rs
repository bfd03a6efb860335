//! Meeting → organization classification.
//!
//! Rules are evaluated in configured order and the first rule with any
//! matching criterion wins. A rule matches when:
//! 1. the title contains one of its keywords (case-insensitive substring),
//! 2. an attendee email's domain is one of its domains,
//! 3. an attendee email is one of its addresses, or
//! 4. the title, notes, or transcript mention one of its company names.
//!
//! Classification is total: it never fails and never returns an empty name.

use crate::meeting::{MeetingRecord, OrganizationRule};

/// Returned when neither a rule nor the configured default yields a name.
pub const FALLBACK_ORGANIZATION: &str = "Unknown";

/// Which criterion caused a rule to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    TitleKeyword,
    EmailDomain,
    EmailAddress,
    CompanyName,
}

/// A successful rule match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgMatch<'a> {
    pub organization: &'a str,
    pub rule_index: usize,
    pub method: MatchMethod,
}

/// Classify a meeting, falling back to `default_org` when no rule matches.
pub fn classify(meeting: &MeetingRecord, rules: &[OrganizationRule], default_org: &str) -> String {
    match match_rule(meeting, rules) {
        Some(m) => m.organization.to_string(),
        None if default_org.trim().is_empty() => FALLBACK_ORGANIZATION.to_string(),
        None => default_org.to_string(),
    }
}

/// Find the first rule matching the meeting, if any.
///
/// Rules with an empty name are ignored so the result is always usable
/// as an organization label.
pub fn match_rule<'a>(meeting: &MeetingRecord, rules: &'a [OrganizationRule]) -> Option<OrgMatch<'a>> {
    let title = meeting.title.to_lowercase();
    let attendees: Vec<String> = meeting
        .attendees
        .iter()
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .collect();
    let haystack = metadata_text(meeting);

    rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| !rule.name.trim().is_empty())
        .find_map(|(rule_index, rule)| {
            rule_method(rule, &title, &attendees, &haystack).map(|method| OrgMatch {
                organization: rule.name.as_str(),
                rule_index,
                method,
            })
        })
}

fn rule_method(
    rule: &OrganizationRule,
    title: &str,
    attendees: &[String],
    haystack: &str,
) -> Option<MatchMethod> {
    if any_term(&rule.title_keywords, |kw| title.contains(kw)) {
        return Some(MatchMethod::TitleKeyword);
    }

    if any_term(&rule.email_domains, |domain| {
        let domain = domain.trim_start_matches('@');
        attendees
            .iter()
            .any(|email| email_domain(email).is_some_and(|d| d == domain))
    }) {
        return Some(MatchMethod::EmailDomain);
    }

    if any_term(&rule.email_addresses, |addr| attendees.iter().any(|a| a == addr)) {
        return Some(MatchMethod::EmailAddress);
    }

    if any_term(&rule.company_names, |name| haystack.contains(name)) {
        return Some(MatchMethod::CompanyName);
    }

    None
}

/// Apply `pred` to each non-empty, lowercased term.
fn any_term(terms: &[String], mut pred: impl FnMut(&str) -> bool) -> bool {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .any(|t| pred(&t))
}

fn email_domain(email: &str) -> Option<&str> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|d| !d.is_empty())
}

/// Lowercased text that company names are searched in.
fn metadata_text(meeting: &MeetingRecord) -> String {
    let mut text = meeting.title.to_lowercase();
    for part in [meeting.notes.as_deref(), meeting.transcript.as_deref()]
        .into_iter()
        .flatten()
    {
        text.push('\n');
        text.push_str(&part.to_lowercase());
    }
    text
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn rule(name: &str) -> OrganizationRule {
        OrganizationRule {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn sample_rules() -> Vec<OrganizationRule> {
        vec![
            OrganizationRule {
                name: "OMAI".to_string(),
                title_keywords: vec!["OMAI".to_string(), "Team Talk".to_string()],
                email_domains: vec!["omaihq.com".to_string()],
                email_addresses: vec![],
                company_names: vec!["Omai HQ".to_string()],
            },
            OrganizationRule {
                name: "Acme".to_string(),
                title_keywords: vec!["acme".to_string()],
                email_domains: vec!["acme.io".to_string()],
                email_addresses: vec!["ceo@gmail.com".to_string()],
                company_names: vec!["Acme Corporation".to_string()],
            },
        ]
    }

    fn meeting(title: &str, attendees: &[&str]) -> MeetingRecord {
        let mut m = MeetingRecord::new("m-1", title, Utc::now());
        m.attendees = attendees.iter().map(|a| a.to_string()).collect();
        m
    }

    #[test]
    fn team_talk_with_omai_attendee_is_omai() {
        let m = meeting("Team Talk Tuesday", &["josh@omaihq.com"]);
        assert_eq!(classify(&m, &sample_rules(), "Unknown"), "OMAI");
    }

    #[test]
    fn unmatched_meeting_gets_default() {
        let m = meeting("Quarterly Planning", &[]);
        assert_eq!(classify(&m, &sample_rules(), "Unknown"), "Unknown");
    }

    #[test]
    fn title_keyword_is_case_insensitive() {
        let m = meeting("weekly ACME sync", &[]);
        let rules = sample_rules();
        let matched = match_rule(&m, &rules).unwrap();
        assert_eq!(matched.organization, "Acme");
        assert_eq!(matched.method, MatchMethod::TitleKeyword);
    }

    #[test]
    fn domain_match_uses_part_after_at() {
        let m = meeting("Sync", &["Someone@ACME.io"]);
        let rules = sample_rules();
        let matched = match_rule(&m, &rules).unwrap();
        assert_eq!(matched.organization, "Acme");
        assert_eq!(matched.method, MatchMethod::EmailDomain);

        // A domain suffix is not a match.
        let m = meeting("Sync", &["someone@notacme.io.evil"]);
        assert!(match_rule(&m, &sample_rules()).is_none());
    }

    #[test]
    fn domain_rule_tolerates_leading_at() {
        let mut rules = vec![rule("X")];
        rules[0].email_domains = vec!["@x.dev".to_string()];
        let m = meeting("Sync", &["a@x.dev"]);
        assert_eq!(classify(&m, &rules, "Unknown"), "X");
    }

    #[test]
    fn exact_email_address_match() {
        let m = meeting("Coffee", &["CEO@gmail.com"]);
        let rules = sample_rules();
        let matched = match_rule(&m, &rules).unwrap();
        assert_eq!(matched.method, MatchMethod::EmailAddress);
        assert_eq!(matched.organization, "Acme");
    }

    #[test]
    fn company_name_found_in_notes_or_transcript() {
        let mut m = meeting("Intro call", &[]);
        m.notes = Some("Discussed renewal with acme corporation.".to_string());
        assert_eq!(classify(&m, &sample_rules(), "Unknown"), "Acme");

        let mut m = meeting("Intro call", &[]);
        m.transcript = Some("...as we said at Omai HQ last week...".to_string());
        assert_eq!(classify(&m, &sample_rules(), "Unknown"), "OMAI");
    }

    #[test]
    fn first_configured_rule_wins() {
        // Title matches Acme, attendee matches OMAI: OMAI is first.
        let m = meeting("Acme review", &["josh@omaihq.com"]);
        let rules = sample_rules();
        let matched = match_rule(&m, &rules).unwrap();
        assert_eq!(matched.organization, "OMAI");
        assert_eq!(matched.rule_index, 0);
    }

    #[test]
    fn empty_terms_never_match() {
        let mut rules = vec![rule("Empty")];
        rules[0].title_keywords = vec!["".to_string(), "   ".to_string()];
        rules[0].company_names = vec!["".to_string()];
        rules[0].email_domains = vec!["".to_string()];
        let m = meeting("Anything", &["@", "noatsign", ""]);
        assert_eq!(classify(&m, &rules, "Default"), "Default");
    }

    #[test]
    fn never_returns_empty_name() {
        let m = meeting("", &[]);
        assert_eq!(classify(&m, &[], ""), FALLBACK_ORGANIZATION);
        assert_eq!(classify(&m, &[rule("")], "  "), FALLBACK_ORGANIZATION);
    }

    #[test]
    fn total_over_odd_input() {
        let rules = sample_rules();
        for title in ["", "💥 ünïcödé", "@@@", "\n\t"] {
            let m = meeting(title, &["@", "a@", "@b", "x@y@z.com"]);
            assert!(!classify(&m, &rules, "Unknown").is_empty());
        }
    }
}
