//! Feature map: discovered feature URIs to capability bits.
//!
//! The table is static and total. Unknown URIs contribute nothing.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A set of discovered feature URIs.
pub type FeatureSet = BTreeSet<String>;

/// Feature namespaces the map understands.
pub mod ns {
    /// Chat state notifications (XEP-0085).
    pub const CHAT_STATES: &str = "http://jabber.org/protocol/chatstates";
    /// Jingle, pre-standard namespace.
    pub const JINGLE_015: &str = "http://jabber.org/protocol/jingle";
    /// Jingle (XEP-0166).
    pub const JINGLE: &str = "urn:xmpp:jingle:1";
    /// Jingle audio description, pre-standard namespace.
    pub const JINGLE_015_AUDIO: &str = "http://jabber.org/protocol/jingle/description/audio";
    /// Jingle video description, pre-standard namespace.
    pub const JINGLE_015_VIDEO: &str = "http://jabber.org/protocol/jingle/description/video";
    /// Jingle RTP audio (XEP-0167).
    pub const JINGLE_RTP_AUDIO: &str = "urn:xmpp:jingle:apps:rtp:audio";
    /// Jingle RTP video (XEP-0167).
    pub const JINGLE_RTP_VIDEO: &str = "urn:xmpp:jingle:apps:rtp:video";
    /// Google P2P transport.
    pub const GOOGLE_P2P: &str = "http://www.google.com/transport/p2p";
    /// Jingle ICE-UDP transport (XEP-0176).
    pub const JINGLE_ICE_UDP: &str = "urn:xmpp:jingle:transports:ice-udp:1";
    /// Jingle raw UDP transport (XEP-0177).
    pub const JINGLE_RAW_UDP: &str = "urn:xmpp:jingle:transports:raw-udp:1";
    /// Google Talk voice.
    pub const GTALK_VOICE: &str = "http://www.google.com/xmpp/protocol/voice/v1";
    /// Google Talk video.
    pub const GTALK_VIDEO: &str = "http://www.google.com/xmpp/protocol/video/v1";
    /// Stream-initiated file transfer (XEP-0096).
    pub const SI_FILE_TRANSFER: &str = "http://jabber.org/protocol/si/profile/file-transfer";
    /// Telepathy tubes.
    pub const TUBES: &str = "http://telepathy.freedesktop.org/xmpp/tubes";
}

bitflags! {
    /// Capability bits contributed by discovered features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Capabilities: u32 {
        /// Plain text messaging. Always present for a known contact.
        const TEXT = 1 << 0;
        /// Chat state notifications.
        const CHAT_STATES = 1 << 1;
        /// A Jingle session stack.
        const JINGLE = 1 << 2;
        /// Jingle audio description.
        const JINGLE_AUDIO = 1 << 3;
        /// Jingle video description.
        const JINGLE_VIDEO = 1 << 4;
        /// Google P2P transport.
        const GOOGLE_P2P = 1 << 5;
        /// ICE-UDP transport.
        const ICE_UDP = 1 << 6;
        /// Raw UDP transport.
        const RAW_UDP = 1 << 7;
        /// Google Talk voice calls.
        const GTALK_VOICE = 1 << 8;
        /// Google Talk video calls.
        const GTALK_VIDEO = 1 << 9;
        /// Stream-initiated file transfer.
        const FILE_TRANSFER = 1 << 10;
        /// Tubes.
        const TUBES = 1 << 11;

        /// Any transport usable for Jingle media.
        const TRANSPORTS = Self::GOOGLE_P2P.bits() | Self::ICE_UDP.bits() | Self::RAW_UDP.bits();
    }
}

/// The capability set every known contact has, absent any resolved signature.
pub const BASELINE: Capabilities = Capabilities::TEXT;

const FEATURE_TABLE: &[(&str, Capabilities)] = &[
    (ns::CHAT_STATES, Capabilities::CHAT_STATES),
    (ns::JINGLE_015, Capabilities::JINGLE),
    (ns::JINGLE, Capabilities::JINGLE),
    (ns::JINGLE_015_AUDIO, Capabilities::JINGLE_AUDIO),
    (ns::JINGLE_RTP_AUDIO, Capabilities::JINGLE_AUDIO),
    (ns::JINGLE_015_VIDEO, Capabilities::JINGLE_VIDEO),
    (ns::JINGLE_RTP_VIDEO, Capabilities::JINGLE_VIDEO),
    (ns::GOOGLE_P2P, Capabilities::GOOGLE_P2P),
    (ns::JINGLE_ICE_UDP, Capabilities::ICE_UDP),
    (ns::JINGLE_RAW_UDP, Capabilities::RAW_UDP),
    (ns::GTALK_VOICE, Capabilities::GTALK_VOICE),
    (ns::GTALK_VIDEO, Capabilities::GTALK_VIDEO),
    (ns::SI_FILE_TRANSFER, Capabilities::FILE_TRANSFER),
    (ns::TUBES, Capabilities::TUBES),
];

/// Static lookup from feature URIs to capability bits.
pub struct FeatureMap;

impl FeatureMap {
    /// Bits for a single feature URI. Unknown URIs map to the empty set.
    #[must_use]
    pub fn lookup(feature: &str) -> Capabilities {
        FEATURE_TABLE
            .iter()
            .find(|(uri, _)| *uri == feature)
            .map_or(Capabilities::empty(), |(_, bits)| *bits)
    }

    /// Union of the bits of every feature in `features`.
    #[must_use]
    pub fn lookup_all<I, S>(features: I) -> Capabilities
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        features
            .into_iter()
            .fold(Capabilities::empty(), |acc, f| acc | Self::lookup(f.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_feature_is_empty() {
        assert!(FeatureMap::lookup("urn:example:nothing").is_empty());
        assert!(FeatureMap::lookup("").is_empty());
    }

    #[test]
    fn test_both_jingle_generations_map_to_same_bits() {
        assert_eq!(FeatureMap::lookup(ns::JINGLE_015), Capabilities::JINGLE);
        assert_eq!(FeatureMap::lookup(ns::JINGLE), Capabilities::JINGLE);
        assert_eq!(
            FeatureMap::lookup(ns::JINGLE_015_VIDEO),
            FeatureMap::lookup(ns::JINGLE_RTP_VIDEO)
        );
    }

    #[test]
    fn test_lookup_all_unions() {
        let bits = FeatureMap::lookup_all([ns::JINGLE_015, ns::JINGLE_015_AUDIO, ns::GOOGLE_P2P]);
        assert_eq!(
            bits,
            Capabilities::JINGLE | Capabilities::JINGLE_AUDIO | Capabilities::GOOGLE_P2P
        );
        assert!(bits.intersects(Capabilities::TRANSPORTS));
    }

    #[test]
    fn test_features_never_grant_text() {
        for (uri, _) in FEATURE_TABLE {
            assert!(!FeatureMap::lookup(uri).contains(BASELINE));
        }
    }
}
