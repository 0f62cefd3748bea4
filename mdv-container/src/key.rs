//! Mapping between dataset/group keys and single path components.

use mdv_error::{MdvResult, mdv_bail};

/// Extension used for dataset files.
pub const DATASET_EXT: &str = "mdva";
pub(crate) const TMP_SUFFIX: &str = ".tmp";

/// Escape a key so that it forms exactly one path component.
///
/// Alphanumerics, `_` and `-` pass through; every other byte, and a leading `.`, becomes `%XX`.
pub(crate) fn escape(key: &str) -> MdvResult<String> {
    if key.is_empty() {
        mdv_bail!("container keys must not be empty");
    }
    let mut out = String::with_capacity(key.len());
    for (i, b) in key.bytes().enumerate() {
        let keep = b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || (b == b'.' && i > 0);
        if keep {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    Ok(out)
}

/// Reverse [`escape`]. Returns `None` for names this crate never produces.
pub(crate) fn unescape(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

pub(crate) fn dataset_file_name(key: &str) -> MdvResult<String> {
    Ok(format!("{}.{DATASET_EXT}", escape(key)?))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("gene_score", "gene_score")]
    #[case("a/b", "a%2Fb")]
    #[case(".hidden", "%2Ehidden")]
    #[case("CD4 %", "CD4%20%25")]
    fn escapes_to_one_component(#[case] key: &str, #[case] expected: &str) {
        let escaped = escape(key).unwrap();
        assert_eq!(escaped, expected);
        assert_eq!(unescape(&escaped).unwrap(), key);
    }

    #[test]
    fn unicode_roundtrips() {
        let escaped = escape("Zellgröße").unwrap();
        assert!(escaped.is_ascii());
        assert_eq!(unescape(&escaped).unwrap(), "Zellgröße");
    }

    #[test]
    fn empty_key_rejected() {
        assert!(escape("").is_err());
    }
}
