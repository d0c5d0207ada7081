//! Source-type-to-topic label table for the diversity path (spec §6.8).

/// `(emoji, label)` for a given `sourceType` substring match. Falls back to
/// a generic label when nothing matches, since the diversity path must
/// still bucket unknown provider types rather than fail the request.
pub fn topic_label_for(source_type: &str) -> (&'static str, &'static str) {
    const TABLE: &[(&str, &str, &str)] = &[
        ("mastodon", "🐘", "Mastodon"),
        ("hackernews", "🧑‍💻", "HackerNews"),
        ("reddit", "🔥", "Reddit"),
        ("lobsters", "🐙", "Lobsters"),
        ("rss", "📰", "RSS Feeds"),
        ("github-releases", "🔘", "Github Releases/Issues/PRs"),
        ("github-issues", "🔘", "Github Releases/Issues/PRs"),
        ("github-topic", "⭐", "Github Repositories"),
        ("producthunt", "🚀", "Product Hunt"),
    ];

    for (substring, emoji, label) in TABLE {
        if source_type.contains(substring) {
            return (emoji, label);
        }
    }
    ("🔹", "Other")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_by_substring_not_exact_equality() {
        assert_eq!(topic_label_for("hackernewsposts"), ("🧑‍💻", "HackerNews"));
        assert_eq!(topic_label_for("redditsubreddit"), ("🔥", "Reddit"));
    }

    #[test]
    fn unknown_type_falls_back_to_other() {
        assert_eq!(topic_label_for("some-future-provider"), ("🔹", "Other"));
    }

    #[test]
    fn github_variants_share_a_label() {
        assert_eq!(topic_label_for("github-releases"), topic_label_for("github-issues"));
    }
}
