use once_cell::sync::Lazy;
use regex::Regex;

/// Shape check applied to every address before it enters a membership set.
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$")
        .expect("email pattern should compile")
});

/// Check whether an address has a plausible email shape
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Trim and lower-case an address.
///
/// Returns `None` for empty or malformed input.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || !is_valid_email(&email) {
        return None;
    }
    Some(email)
}

/// Rewrite `@googlemail.com` to `@gmail.com`.
///
/// Google Groups stores googlemail addresses under the gmail domain, so both
/// sides of a comparison must agree on the spelling.
pub fn canonicalize_gmail(email: &str) -> String {
    match email.strip_suffix("@googlemail.com") {
        Some(local) => format!("{}@gmail.com", local),
        None => email.to_string(),
    }
}
