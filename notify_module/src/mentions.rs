//! Mention extraction from rich-text HTML.
//!
//! The editor wraps structured mentions in spans carrying a
//! `data-user-id` attribute; plain `@handle` tokens are a fallback for
//! content written without the mention widget. This is a text-pattern
//! scan, not an HTML parse: malformed markup is tolerated and simply
//! fails to match.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static USER_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-user-id=["'](\d+)["']"#).unwrap());

static USERNAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@(\w+)").unwrap());

/// Candidates produced by one extraction pass.
///
/// Extraction commits to a single strategy per content blob: if any
/// ID-bearing marker exists, plain-text `@handle` tokens in the same
/// content are ignored entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionCandidates {
    None,
    UserIds(Vec<i64>),
    Usernames(Vec<String>),
}

impl MentionCandidates {
    pub fn is_empty(&self) -> bool {
        match self {
            MentionCandidates::None => true,
            MentionCandidates::UserIds(ids) => ids.is_empty(),
            MentionCandidates::Usernames(names) => names.is_empty(),
        }
    }
}

/// Extract mentioned users from HTML content.
///
/// Returns deduplicated candidates in first-occurrence order. Empty
/// content is not an error; it yields `MentionCandidates::None`.
pub fn extract_mentions(html: &str) -> MentionCandidates {
    if html.trim().is_empty() {
        return MentionCandidates::None;
    }

    let mut seen_ids = HashSet::new();
    let mut ids = Vec::new();
    for capture in USER_ID_PATTERN.captures_iter(html) {
        // \d+ can still overflow i64 on adversarial input; skip those.
        if let Ok(id) = capture[1].parse::<i64>() {
            if seen_ids.insert(id) {
                ids.push(id);
            }
        }
    }
    if !ids.is_empty() {
        return MentionCandidates::UserIds(ids);
    }

    let mut seen_names = HashSet::new();
    let mut names = Vec::new();
    for capture in USERNAME_PATTERN.captures_iter(html) {
        let name = capture[1].to_string();
        if seen_names.insert(name.clone()) {
            names.push(name);
        }
    }
    if names.is_empty() {
        MentionCandidates::None
    } else {
        MentionCandidates::Usernames(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_yields_no_candidates() {
        assert_eq!(extract_mentions(""), MentionCandidates::None);
        assert_eq!(extract_mentions("   \n"), MentionCandidates::None);
    }

    #[test]
    fn extracts_user_ids_from_mention_spans() {
        let html = r#"<p><span class="mention" data-user-id="42">@alice</span> please review</p>"#;
        assert_eq!(extract_mentions(html), MentionCandidates::UserIds(vec![42]));
    }

    #[test]
    fn accepts_single_quoted_attributes() {
        let html = "<span data-user-id='7'>@bob</span>";
        assert_eq!(extract_mentions(html), MentionCandidates::UserIds(vec![7]));
    }

    #[test]
    fn deduplicates_ids_in_first_occurrence_order() {
        let html = r#"
            <span data-user-id="5">@eve</span>
            <span data-user-id="3">@carol</span>
            <span data-user-id="5">@eve</span>
        "#;
        assert_eq!(
            extract_mentions(html),
            MentionCandidates::UserIds(vec![5, 3])
        );
    }

    #[test]
    fn id_markers_win_over_plain_text_handles() {
        let html = r#"<span data-user-id="42">@alice</span> and also @bob"#;
        assert_eq!(extract_mentions(html), MentionCandidates::UserIds(vec![42]));
    }

    #[test]
    fn falls_back_to_usernames_without_markers() {
        let html = "hey @alice and @bob, ping @alice again";
        assert_eq!(
            extract_mentions(html),
            MentionCandidates::Usernames(vec!["alice".to_string(), "bob".to_string()])
        );
    }

    #[test]
    fn username_scan_stops_at_non_word_characters() {
        let html = "ping @jo.hn";
        assert_eq!(
            extract_mentions(html),
            MentionCandidates::Usernames(vec!["jo".to_string()])
        );
    }

    #[test]
    fn malformed_html_is_tolerated() {
        let html = "<div><span data-user-id=\"9\">@x</span><p>unclosed";
        assert_eq!(extract_mentions(html), MentionCandidates::UserIds(vec![9]));
        assert_eq!(extract_mentions("<<<>>>"), MentionCandidates::None);
    }

    #[test]
    fn content_without_mentions_yields_none() {
        assert_eq!(
            extract_mentions("<p>just a plain update</p>"),
            MentionCandidates::None
        );
    }
}
