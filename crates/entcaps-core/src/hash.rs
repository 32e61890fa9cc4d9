//! XEP-0115 verification string computation and digest checking.
//!
//! The verification string is built from a disco#info reply as:
//! identities sorted by category, type, lang and name
//! (`category/type/lang/name<`), then features sorted by octet order
//! (`feature<`), then extended info forms sorted by `FORM_TYPE`, each
//! contributing `FORM_TYPE<` followed by its other fields sorted by `var`
//! (`var<value<...`, values sorted). The string is hashed with the declared
//! algorithm and base64-encoded.

use base64::Engine;
use sha1::Sha1;
use sha2::Digest as _;
use sha2::Sha256;
use std::collections::HashSet;

use crate::disco::{DataForm, DiscoInfo, FORM_TYPE_FIELD};
use crate::signature::{Digest, HashAlgorithm};

/// Outcome of checking a reply against an advertised digest.
///
/// A mismatch is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The reply hashes to the advertised digest.
    Match,
    /// The reply does not hash to the advertised digest.
    Mismatch {
        /// Recomputed digest, or `None` if the reply is ill-formed for hashing.
        computed: Option<String>,
    },
    /// The declared algorithm cannot be computed locally.
    Unsupported,
}

impl Verification {
    /// Check if the reply verified.
    #[must_use]
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Recomputes and checks XEP-0115 digests.
pub struct HashVerifier;

impl HashVerifier {
    /// Build the canonical verification string for a reply.
    ///
    /// Returns `None` if the reply is ill-formed for hashing: a duplicated
    /// identity or feature, two forms with the same `FORM_TYPE`, or a
    /// `FORM_TYPE` with several values. Forms without a `FORM_TYPE` are
    /// skipped.
    #[must_use]
    pub fn verification_string(info: &DiscoInfo) -> Option<String> {
        let mut identities: Vec<_> = info.identities.iter().collect();
        identities.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        if identities
            .windows(2)
            .any(|pair| pair[0].sort_key() == pair[1].sort_key())
        {
            return None;
        }

        let mut features: Vec<&str> = info.features.iter().map(String::as_str).collect();
        features.sort_unstable();
        if features.windows(2).any(|pair| pair[0] == pair[1]) {
            return None;
        }

        let mut forms = Vec::with_capacity(info.forms.len());
        for form in &info.forms {
            match typed_form(form)? {
                Some(form_type) => forms.push((form_type, form)),
                None => continue,
            }
        }
        forms.sort_by(|a, b| a.0.cmp(b.0));
        if forms.windows(2).any(|pair| pair[0].0 == pair[1].0) {
            return None;
        }

        let mut s = String::new();
        for identity in identities {
            let (category, kind, lang, name) = identity.sort_key();
            for part in [category, "/", kind, "/", lang, "/", name, "<"] {
                s.push_str(part);
            }
        }
        for feature in features {
            s.push_str(feature);
            s.push('<');
        }
        for (form_type, form) in forms {
            s.push_str(form_type);
            s.push('<');

            let mut fields: Vec<_> = form
                .fields
                .iter()
                .filter(|f| f.var != FORM_TYPE_FIELD)
                .collect();
            fields.sort_by(|a, b| a.var.cmp(&b.var));

            for field in fields {
                s.push_str(&field.var);
                s.push('<');
                let mut values: Vec<&str> = field.values.iter().map(String::as_str).collect();
                values.sort_unstable();
                for value in values {
                    s.push_str(value);
                    s.push('<');
                }
            }
        }

        Some(s)
    }

    /// Recompute the base64 digest of a reply.
    ///
    /// Returns `None` if the algorithm is unsupported or the reply is
    /// ill-formed for hashing.
    #[must_use]
    pub fn recompute_digest(algorithm: &HashAlgorithm, info: &DiscoInfo) -> Option<String> {
        let input = Self::verification_string(info)?;
        let raw = match algorithm {
            HashAlgorithm::Sha1 => Sha1::digest(input.as_bytes()).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(input.as_bytes()).to_vec(),
            HashAlgorithm::Other(_) => return None,
        };
        Some(base64::engine::general_purpose::STANDARD.encode(raw))
    }

    /// Check a reply against an advertised digest.
    #[must_use]
    pub fn verify(advertised: &Digest, info: &DiscoInfo) -> Verification {
        if !advertised.algorithm.is_supported() {
            return Verification::Unsupported;
        }

        match Self::recompute_digest(&advertised.algorithm, info) {
            Some(computed) if computed == advertised.value => Verification::Match,
            computed => Verification::Mismatch { computed },
        }
    }
}

/// The form's `FORM_TYPE`.
///
/// Outer `None`: the form makes the reply ill-formed. Inner `None`: the form
/// has no `FORM_TYPE` and is ignored.
fn typed_form(form: &DataForm) -> Option<Option<&str>> {
    let mut type_fields = form.fields.iter().filter(|f| f.var == FORM_TYPE_FIELD);
    let Some(field) = type_fields.next() else {
        return Some(None);
    };
    if type_fields.next().is_some() {
        return None;
    }

    let distinct: HashSet<&str> = field.values.iter().map(String::as_str).collect();
    match distinct.len() {
        0 => Some(None),
        1 => Some(field.values.first().map(String::as_str)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disco::{Identity, SOFTWARE_INFO_FORM_TYPE};
    use crate::features::ns;

    fn exodus() -> DiscoInfo {
        DiscoInfo::new()
            .with_identity(Identity::new("client", "pc").with_name("Exodus 0.9.1"))
            .with_features([
                "http://jabber.org/protocol/disco#info",
                "http://jabber.org/protocol/disco#items",
                "http://jabber.org/protocol/muc",
                "http://jabber.org/protocol/caps",
            ])
    }

    fn fake_client() -> DiscoInfo {
        DiscoInfo::new()
            .with_features([ns::JINGLE_015, ns::JINGLE_015_AUDIO, ns::GOOGLE_P2P])
            .with_form(
                DataForm::new(SOFTWARE_INFO_FORM_TYPE)
                    .with_field("software", "A Fake Client with Twisted")
                    .with_field("software_version", "5.11.2-svn-20080512")
                    .with_field("os", "Debian GNU/Linux unstable (sid) unstable sid")
                    .with_field("os_version", "2.6.24-1-amd64"),
            )
    }

    #[test]
    fn test_simple_generation_example() {
        let info = exodus();
        assert_eq!(
            HashVerifier::verification_string(&info).unwrap(),
            "client/pc//Exodus 0.9.1<http://jabber.org/protocol/caps<\
             http://jabber.org/protocol/disco#info<http://jabber.org/protocol/disco#items<\
             http://jabber.org/protocol/muc<"
        );
        assert_eq!(
            HashVerifier::recompute_digest(&HashAlgorithm::Sha1, &info).unwrap(),
            "QgayPKawpkPSDYmwT/WM94uAlu0="
        );
    }

    #[test]
    fn test_sha256_digest() {
        assert_eq!(
            HashVerifier::recompute_digest(&HashAlgorithm::Sha256, &exodus()).unwrap(),
            "Wr6IGEKhx6b9627gBmi/cCmpxXBc/GYq5zWuYfWGWoc="
        );
    }

    #[test]
    fn test_extended_form_participates() {
        let info = fake_client();
        assert_eq!(
            HashVerifier::recompute_digest(&HashAlgorithm::Sha1, &info).unwrap(),
            "CzO+nkbflbxu1pgzOQSIi8gOyDc="
        );

        let bare = DiscoInfo::new().with_features(info.features.clone());
        assert_eq!(
            HashVerifier::recompute_digest(&HashAlgorithm::Sha1, &bare).unwrap(),
            "JpaYgiKL0y4fUOCTwN3WLGpaftM="
        );
    }

    #[test]
    fn test_order_does_not_matter() {
        let mut shuffled = exodus();
        shuffled.features.reverse();
        assert_eq!(
            HashVerifier::recompute_digest(&HashAlgorithm::Sha1, &shuffled),
            HashVerifier::recompute_digest(&HashAlgorithm::Sha1, &exodus())
        );
    }

    #[test]
    fn test_verify_match_and_mismatch() {
        let good = Digest {
            algorithm: HashAlgorithm::Sha1,
            value: "CzO+nkbflbxu1pgzOQSIi8gOyDc=".into(),
        };
        assert!(HashVerifier::verify(&good, &fake_client()).is_match());

        let tampered = fake_client().with_feature(ns::JINGLE_015_VIDEO);
        match HashVerifier::verify(&good, &tampered) {
            Verification::Mismatch { computed } => assert!(computed.is_some()),
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_feature_is_ill_formed() {
        let info = exodus().with_feature("http://jabber.org/protocol/muc");
        assert!(HashVerifier::verification_string(&info).is_none());

        let digest = Digest {
            algorithm: HashAlgorithm::Sha1,
            value: "QgayPKawpkPSDYmwT/WM94uAlu0=".into(),
        };
        assert_eq!(
            HashVerifier::verify(&digest, &info),
            Verification::Mismatch { computed: None }
        );
    }

    #[test]
    fn test_duplicate_identity_is_ill_formed() {
        let info = exodus().with_identity(Identity::new("client", "pc").with_name("Exodus 0.9.1"));
        assert!(HashVerifier::verification_string(&info).is_none());
    }

    #[test]
    fn test_duplicate_form_type_is_ill_formed() {
        let info = exodus()
            .with_form(DataForm::new("urn:example:a"))
            .with_form(DataForm::new("urn:example:a"));
        assert!(HashVerifier::verification_string(&info).is_none());
    }

    #[test]
    fn test_untyped_form_is_ignored() {
        let info = exodus().with_form(DataForm::default().with_field("x", "y"));
        assert_eq!(
            HashVerifier::verification_string(&info),
            HashVerifier::verification_string(&exodus())
        );
    }

    #[test]
    fn test_unsupported_algorithm() {
        let digest = Digest {
            algorithm: HashAlgorithm::parse("md5"),
            value: "whatever".into(),
        };
        assert_eq!(HashVerifier::verify(&digest, &exodus()), Verification::Unsupported);
    }
}
