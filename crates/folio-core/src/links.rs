//! Phrase-to-anchor substitution for the hero description.

/// Wrap every occurrence of each phrase in an `<a target="_blank">` tag.
///
/// Pairs are applied in the given order, each over the output of the
/// previous one. A later phrase that occurs inside an earlier replacement
/// (its text or its URL) is wrapped again.
pub fn apply_auto_links<'a, I>(text: &str, links: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = text.to_string();
    for (phrase, url) in links {
        if phrase.is_empty() {
            continue;
        }
        let anchor = format!("<a href=\"{}\" target=\"_blank\">{}</a>", url, phrase);
        out = out.replace(phrase, &anchor);
    }
    out
}
