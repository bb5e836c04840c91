//! Duplicate-check query construction and matching.
//!
//! A queued file is a duplicate of a remote one when all four of name,
//! enclosing folder, byte size, and uploader email agree. The first two are
//! expressed in the Drive query language; the last two are compared
//! client-side against the returned entries.

use crate::models::{RemoteFile, UNKNOWN};

/// Page size used for the duplicate lookup.
pub const DUPLICATE_PAGE_SIZE: u32 = 100;

/// Fields requested from `files.list` for the duplicate lookup.
pub const DUPLICATE_FIELDS: &str = "files(id, name, size, properties)";

/// Property holding the uploader's email on every file folio creates.
pub const UPLOADER_EMAIL_PROPERTY: &str = "uploader_email";

/// Property holding the byte size, used when Drive omits `size`.
pub const FILE_SIZE_PROPERTY: &str = "file_size";

/// Escape a value for use inside a single-quoted Drive query literal.
pub fn escape_query_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Build the `q` filter matching non-trashed files named `name`, restricted
/// to `folder_id` when one is set.
pub fn duplicate_query(name: &str, folder_id: Option<&str>) -> String {
    let mut query = format!("name='{}' and trashed=false", escape_query_literal(name));
    if let Some(folder) = folder_id.filter(|f| !f.is_empty()) {
        query.push_str(&format!(" and '{}' in parents", escape_query_literal(folder)));
    }
    query
}

/// Size of a remote file: the native `size`, else the `file_size` property.
pub fn remote_size(remote: &RemoteFile) -> Option<u64> {
    remote.size.or_else(|| {
        remote
            .properties
            .get(FILE_SIZE_PROPERTY)
            .and_then(|s| s.trim().parse().ok())
    })
}

/// Whether a name-and-folder match is also a size-and-uploader match.
/// An unidentified uploader never matches.
pub fn is_duplicate(remote: &RemoteFile, local_size: u64, uploader_email: &str) -> bool {
    let size_matches = remote_size(remote) == Some(local_size);
    let uploader_matches = is_identified(uploader_email)
        && remote
            .properties
            .get(UPLOADER_EMAIL_PROPERTY)
            .is_some_and(|email| email == uploader_email);
    size_matches && uploader_matches
}

fn is_identified(email: &str) -> bool {
    !email.is_empty() && email != UNKNOWN
}

pub fn find_duplicate<'a>(
    remotes: &'a [RemoteFile],
    local_size: u64,
    uploader_email: &str,
) -> Option<&'a RemoteFile> {
    remotes
        .iter()
        .find(|r| is_duplicate(r, local_size, uploader_email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn remote(size: Option<u64>, props: &[(&str, &str)]) -> RemoteFile {
        RemoteFile {
            id: "r1".into(),
            name: "report.pdf".into(),
            size,
            properties: props
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn query_without_folder() {
        assert_eq!(
            duplicate_query("report.pdf", None),
            "name='report.pdf' and trashed=false"
        );
    }

    #[test]
    fn query_with_folder_and_quotes() {
        assert_eq!(
            duplicate_query("bob's \\ notes.txt", Some("F123")),
            r"name='bob\'s \\ notes.txt' and trashed=false and 'F123' in parents"
        );
    }

    #[test]
    fn empty_folder_is_ignored() {
        assert_eq!(
            duplicate_query("a", Some("")),
            "name='a' and trashed=false"
        );
    }

    #[test]
    fn match_requires_size_and_uploader() {
        let r = remote(Some(10), &[("uploader_email", "me@x.io")]);
        assert!(is_duplicate(&r, 10, "me@x.io"));
        assert!(!is_duplicate(&r, 11, "me@x.io"));
        assert!(!is_duplicate(&r, 10, "you@x.io"));
    }

    #[test]
    fn missing_uploader_or_size_never_matches() {
        assert!(!is_duplicate(&remote(Some(10), &[]), 10, "me@x.io"));
        assert!(!is_duplicate(
            &remote(None, &[("uploader_email", "me@x.io")]),
            10,
            "me@x.io"
        ));
        assert!(!is_duplicate(
            &remote(Some(10), &[("uploader_email", "")]),
            10,
            ""
        ));
    }

    #[test]
    fn unknown_uploaders_are_never_the_same_person() {
        let r = remote(Some(10), &[("uploader_email", "Unknown")]);
        assert!(!is_duplicate(&r, 10, "Unknown"));
    }

    #[test]
    fn size_falls_back_to_property() {
        let r = remote(None, &[("uploader_email", "me@x.io"), ("file_size", "10")]);
        assert!(is_duplicate(&r, 10, "me@x.io"));
    }

    #[test]
    fn find_returns_first_full_match() {
        let mut a = remote(Some(5), &[("uploader_email", "me@x.io")]);
        a.id = "a".into();
        let mut b = remote(Some(10), &[("uploader_email", "me@x.io")]);
        b.id = "b".into();
        let remotes = vec![a, b];
        assert_eq!(find_duplicate(&remotes, 10, "me@x.io").unwrap().id, "b");
        assert!(find_duplicate(&remotes, 7, "me@x.io").is_none());
    }
}
