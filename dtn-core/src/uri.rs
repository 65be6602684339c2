//! DTN URI codec.
//!
//! Addresses take one of two shapes: the hierarchical form
//! `scheme://name[/demux]` or the null endpoint `scheme:none`. Only the
//! printable ASCII range 0x23..=0x7E is allowed anywhere in a URI; space,
//! `!` and `"` are excluded along with all control and non-ASCII bytes.
//!
//! Encoding canonicalizes: a hierarchical URI without demux always gets a
//! trailing slash, so `decode("dtn://node")` re-encodes as `"dtn://node/"`.

use std::fmt;

/// Lowest byte value allowed in a URI.
const CHAR_MIN: u8 = 0x23;
/// Highest byte value allowed in a URI.
const CHAR_MAX: u8 = 0x7E;

/// URI codec error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    /// A byte outside `[0x23, 0x7E]` appeared somewhere in the input.
    InvalidCharacter(u8),
    /// No `:` separating the scheme from the rest.
    MissingDelimiter,
    /// Input ends before the form can be determined.
    Truncated,
    /// Non-hierarchical remainder that is not exactly `none`.
    MalformedNoneForm,
}

impl fmt::Display for UriError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UriError::InvalidCharacter(b) => {
                write!(f, "Invalid byte 0x{:02x} in DTN URI", b)
            }
            UriError::MissingDelimiter => write!(f, "DTN URI has no scheme delimiter"),
            UriError::Truncated => write!(f, "DTN URI truncated after scheme"),
            UriError::MalformedNoneForm => {
                write!(f, "Non-hierarchical DTN URI must be 'scheme:none'")
            }
        }
    }
}

impl std::error::Error for UriError {}

/// A parsed DTN URI.
///
/// `name` is `Some("none")` after decoding `scheme:none`; a URI built with
/// `DtnUri::none()` carries no name at all and is the only shape that
/// encodes back to the `scheme:none` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtnUri {
    pub scheme: String,
    pub name: Option<String>,
    pub demux: Option<String>,
}

impl DtnUri {
    /// The null endpoint for a scheme, encoding as `"{scheme}:none"`.
    pub fn none(scheme: &str) -> Self {
        DtnUri {
            scheme: scheme.into(),
            name: None,
            demux: None,
        }
    }

    /// Parse a DTN URI string.
    pub fn decode(input: &str) -> Result<Self, UriError> {
        for &b in input.as_bytes() {
            if !(CHAR_MIN..=CHAR_MAX).contains(&b) {
                return Err(UriError::InvalidCharacter(b));
            }
        }

        let colon = input.find(':').ok_or(UriError::MissingDelimiter)?;
        let scheme = &input[..colon];
        let rest = &input[colon + 1..];

        if rest.len() < 2 {
            return Err(UriError::Truncated);
        }

        if !rest.starts_with("//") {
            if rest != "none" {
                return Err(UriError::MalformedNoneForm);
            }
            return Ok(DtnUri {
                scheme: scheme.into(),
                name: Some("none".into()),
                demux: None,
            });
        }

        let hier = &rest[2..];
        match hier.find('/') {
            None => Ok(DtnUri {
                scheme: scheme.into(),
                name: Some(hier.into()),
                demux: None,
            }),
            Some(slash) => Ok(DtnUri {
                scheme: scheme.into(),
                name: Some(hier[..slash].into()),
                // Empty string when the slash ends the input, never None.
                demux: Some(hier[slash + 1..].into()),
            }),
        }
    }

    /// Serialize back to string form.
    pub fn encode(&self) -> String {
        match (&self.name, &self.demux) {
            (None, _) => format!("{}:none", self.scheme),
            (Some(name), None) => format!("{}://{}/", self.scheme, name),
            (Some(name), Some(demux)) => format!("{}://{}/{}", self.scheme, name, demux),
        }
    }

    /// A URI addresses a single endpoint when it has a demux that does not
    /// start with `~` (the group/wildcard marker).
    pub fn is_singleton(&self) -> bool {
        match &self.demux {
            Some(demux) => !demux.starts_with('~'),
            None => false,
        }
    }
}

impl fmt::Display for DtnUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full() {
        let uri = DtnUri::decode("dtn://node/inbox").unwrap();
        assert_eq!(uri.scheme, "dtn");
        assert_eq!(uri.name.as_deref(), Some("node"));
        assert_eq!(uri.demux.as_deref(), Some("inbox"));
    }

    #[test]
    fn test_decode_no_demux() {
        let uri = DtnUri::decode("dtn://node").unwrap();
        assert_eq!(uri.name.as_deref(), Some("node"));
        assert_eq!(uri.demux, None);
    }

    #[test]
    fn test_decode_trailing_slash_empty_demux() {
        let uri = DtnUri::decode("dtn://node/").unwrap();
        assert_eq!(uri.name.as_deref(), Some("node"));
        // Slash present: demux is the empty string, not absent.
        assert_eq!(uri.demux.as_deref(), Some(""));
    }

    #[test]
    fn test_decode_demux_keeps_inner_slashes() {
        // Split happens at the first slash after the authority.
        let uri = DtnUri::decode("dtn://node/a/b/c").unwrap();
        assert_eq!(uri.name.as_deref(), Some("node"));
        assert_eq!(uri.demux.as_deref(), Some("a/b/c"));
    }

    #[test]
    fn test_decode_none_form() {
        let uri = DtnUri::decode("dtn:none").unwrap();
        assert_eq!(uri.scheme, "dtn");
        assert_eq!(uri.name.as_deref(), Some("none"));
        assert_eq!(uri.demux, None);
    }

    #[test]
    fn test_decode_malformed_none() {
        assert_eq!(
            DtnUri::decode("dtn:nonsense"),
            Err(UriError::MalformedNoneForm)
        );
        assert_eq!(DtnUri::decode("dtn:non"), Err(UriError::MalformedNoneForm));
    }

    #[test]
    fn test_decode_missing_colon() {
        assert_eq!(DtnUri::decode("no-scheme"), Err(UriError::MissingDelimiter));
    }

    #[test]
    fn test_decode_truncated() {
        assert_eq!(DtnUri::decode("dtn:"), Err(UriError::Truncated));
        assert_eq!(DtnUri::decode("dtn:x"), Err(UriError::Truncated));
    }

    #[test]
    fn test_decode_invalid_characters() {
        assert_eq!(
            DtnUri::decode("dtn://no de/x"),
            Err(UriError::InvalidCharacter(b' '))
        );
        assert_eq!(
            DtnUri::decode("dtn://node/\"x"),
            Err(UriError::InvalidCharacter(b'"'))
        );
        assert_eq!(
            DtnUri::decode("dtn://node!/x"),
            Err(UriError::InvalidCharacter(b'!'))
        );
        assert!(DtnUri::decode("dtn://n\u{f6}de/x").is_err());
        assert!(DtnUri::decode("dtn://node/\x7fx").is_err());
    }

    #[test]
    fn test_encode_shapes() {
        assert_eq!(DtnUri::none("dtn").encode(), "dtn:none");
        let uri = DtnUri {
            scheme: "dtn".into(),
            name: Some("node".into()),
            demux: None,
        };
        assert_eq!(uri.encode(), "dtn://node/");
        let uri = DtnUri {
            scheme: "dtn".into(),
            name: Some("node".into()),
            demux: Some("inbox".into()),
        };
        assert_eq!(uri.encode(), "dtn://node/inbox");
    }

    #[test]
    fn test_roundtrip_exact() {
        for s in ["dtn://node/inbox", "dtn://node/", "ipn://relay/~group"] {
            assert_eq!(DtnUri::decode(s).unwrap().encode(), s);
        }
    }

    #[test]
    fn test_roundtrip_canonicalizes_missing_slash() {
        // No-demux input gains a trailing slash when re-encoded.
        let uri = DtnUri::decode("scheme://name").unwrap();
        assert_eq!(uri.demux, None);
        assert_eq!(uri.encode(), "scheme://name/");
    }

    #[test]
    fn test_none_form_canonicalization() {
        // "scheme:none" decodes with name "none" and so re-encodes
        // hierarchically; only a name-less URI encodes as scheme:none.
        let uri = DtnUri::decode("scheme:none").unwrap();
        assert_eq!(uri.encode(), "scheme://none/");
    }

    #[test]
    fn test_is_singleton() {
        assert!(DtnUri::decode("scheme://name/x").unwrap().is_singleton());
        assert!(!DtnUri::decode("scheme://name/~").unwrap().is_singleton());
        assert!(!DtnUri::decode("scheme://name/~grp").unwrap().is_singleton());
        assert!(!DtnUri::decode("scheme://name").unwrap().is_singleton());
        assert!(!DtnUri::decode("scheme:none").unwrap().is_singleton());
        // Empty demux counts as singleton: present and not a group marker.
        assert!(DtnUri::decode("scheme://name/").unwrap().is_singleton());
    }

    #[test]
    fn test_display_matches_encode() {
        let uri = DtnUri::decode("dtn://node/inbox").unwrap();
        assert_eq!(format!("{}", uri), uri.encode());
    }
}
