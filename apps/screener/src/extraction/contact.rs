//! Regex scrapers for contact details in free resume text.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+\d{1,3}[ \t.-]?)?(?:\(\d{1,4}\)[ \t.-]?)?\d[\d \t.-]{5,}\d")
        .expect("phone regex")
});

// Full dates, plus year-month pairs such as employment ranges.
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\d{4}[-/.]\d{1,2}[-/.]\d{1,2}|\d{1,2}[-/.]\d{1,2}[-/.]\d{4}|\b(?:19|20)\d{2}[-/.](?:0?[1-9]|1[0-2])\b",
    )
    .expect("date regex")
});

static LINKEDIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:https?://)?(?:[a-z]{2,3}\.)?linkedin\.com/(?:in|pub)/[A-Za-z0-9\-_%./]+")
        .expect("linkedin regex")
});

const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;

/// First email-shaped token.
pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}

/// First run that looks like a phone number, or `""`.
///
/// A candidate must carry 10 to 15 digits and must not contain a date.
pub fn extract_phone(text: &str) -> String {
    PHONE_RE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .find(|candidate| {
            let digits = candidate.chars().filter(char::is_ascii_digit).count();
            (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) && !DATE_RE.is_match(candidate)
        })
        .map(str::to_string)
        .unwrap_or_default()
}

/// Longest LinkedIn profile URL in the text.
pub fn extract_profile_link(text: &str) -> Option<String> {
    LINKEDIN_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', '/']))
        .max_by_key(|url| url.len())
        .map(str::to_string)
}
