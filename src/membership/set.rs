use super::email::{canonicalize_gmail, normalize_email};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A normalized, deduplicated set of member email addresses.
///
/// Entries are trimmed, lower-cased and shape-checked on the way in.
/// Anything that fails the check is dropped and only counted in
/// [`MembershipSet::rejected`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct MembershipSet {
    emails: BTreeSet<String>,
    rejected: usize,
}

impl MembershipSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw address. Returns `true` if a new normalized entry was added.
    pub fn insert(&mut self, raw: &str) -> bool {
        match normalize_email(raw) {
            Some(email) => self.emails.insert(email),
            None => {
                self.rejected += 1;
                false
            }
        }
    }

    /// Remove an address (normalized before lookup)
    pub fn remove(&mut self, raw: &str) -> bool {
        normalize_email(raw)
            .map(|email| self.emails.remove(&email))
            .unwrap_or(false)
    }

    pub fn contains(&self, raw: &str) -> bool {
        normalize_email(raw)
            .map(|email| self.emails.contains(&email))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    /// Number of raw entries dropped as empty or malformed
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Iterate in lexicographic order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.emails.iter().map(String::as_str)
    }

    /// Addresses in `self` that are not in `other`
    pub fn difference<'a>(&'a self, other: &'a MembershipSet) -> impl Iterator<Item = &'a str> {
        self.emails.difference(&other.emails).map(String::as_str)
    }

    /// Addresses present in both sets
    pub fn intersection<'a>(&'a self, other: &'a MembershipSet) -> impl Iterator<Item = &'a str> {
        self.emails.intersection(&other.emails).map(String::as_str)
    }

    /// Number of addresses present in both sets
    pub fn intersection_count(&self, other: &MembershipSet) -> usize {
        self.intersection(other).count()
    }

    /// Merge another set into this one
    pub fn extend_from(&mut self, other: &MembershipSet) {
        self.emails.extend(other.emails.iter().cloned());
        self.rejected += other.rejected;
    }

    /// Copy with `@googlemail.com` addresses spelled `@gmail.com`
    pub fn gmail_canonicalized(&self) -> MembershipSet {
        MembershipSet {
            emails: self.emails.iter().map(|e| canonicalize_gmail(e)).collect(),
            rejected: self.rejected,
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.emails.iter().cloned().collect()
    }
}

// Equality ignores the rejected counter
impl PartialEq for MembershipSet {
    fn eq(&self, other: &Self) -> bool {
        self.emails == other.emails
    }
}

impl Eq for MembershipSet {}

impl<S: AsRef<str>> FromIterator<S> for MembershipSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = MembershipSet::new();
        for raw in iter {
            set.insert(raw.as_ref());
        }
        set
    }
}

impl From<Vec<String>> for MembershipSet {
    fn from(raw: Vec<String>) -> Self {
        raw.into_iter().collect()
    }
}

impl From<MembershipSet> for Vec<String> {
    fn from(set: MembershipSet) -> Self {
        set.emails.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_iter_normalizes_and_dedups() {
        let set: MembershipSet = ["Alice@Example.com", " alice@example.com ", "bob@x.com"]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains("alice@example.com"));
        assert!(set.contains("BOB@x.com"));
        assert_eq!(set.rejected(), 0);
    }

    #[test]
    fn test_malformed_entries_are_dropped_and_counted() {
        let set: MembershipSet = ["not-an-email", "", "valid@x.com"].into_iter().collect();
        assert_eq!(set.to_vec(), vec!["valid@x.com".to_string()]);
        assert_eq!(set.rejected(), 2);
    }

    #[test]
    fn test_iteration_is_sorted() {
        let set: MembershipSet = ["c@x.com", "a@x.com", "b@x.com"].into_iter().collect();
        let emails: Vec<&str> = set.iter().collect();
        assert_eq!(emails, vec!["a@x.com", "b@x.com", "c@x.com"]);
    }

    #[test]
    fn test_difference_and_intersection() {
        let left: MembershipSet = ["a@x.com", "b@x.com"].into_iter().collect();
        let right: MembershipSet = ["b@x.com", "c@x.com"].into_iter().collect();

        let only_left: Vec<&str> = left.difference(&right).collect();
        assert_eq!(only_left, vec!["a@x.com"]);
        assert_eq!(left.intersection_count(&right), 1);
    }

    #[test]
    fn test_deserialize_normalizes() {
        let set: MembershipSet =
            serde_json::from_str(r#"["  Carol@X.com", "broken", "carol@x.com"]"#).unwrap();
        assert_eq!(set.to_vec(), vec!["carol@x.com".to_string()]);
        assert_eq!(set.rejected(), 1);

        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["carol@x.com"]"#);
    }

    #[test]
    fn test_remove() {
        let mut set: MembershipSet = ["a@x.com"].into_iter().collect();
        assert!(set.remove("A@X.COM"));
        assert!(!set.remove("a@x.com"));
        assert!(set.is_empty());
    }
}
