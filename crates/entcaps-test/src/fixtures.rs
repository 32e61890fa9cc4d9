//! Test fixtures: disco replies, advertisements and addresses.

use entcaps_core::disco::SOFTWARE_INFO_FORM_TYPE;
use entcaps_core::{
    BareJid, CapsAdvertisement, DataForm, DiscoInfo, FullJid, Identity, PresenceUpdate, ns,
};

/// Node of the fake client used throughout the tests.
pub const FAKE_CLIENT_NODE: &str = "http://telepathy.freedesktop.org/fake-client";

/// `sha-1` digest of [`hashed_client_reply`].
pub const FAKE_CLIENT_SHA1: &str = "CzO+nkbflbxu1pgzOQSIi8gOyDc=";

/// Software info form of the fake client.
#[must_use]
pub fn software_info_form() -> DataForm {
    DataForm::new(SOFTWARE_INFO_FORM_TYPE)
        .with_field("software", "A Fake Client with Twisted")
        .with_field("software_version", "5.11.2-svn-20080512")
        .with_field("os", "Debian GNU/Linux unstable (sid) unstable sid")
        .with_field("os_version", "2.6.24-1-amd64")
}

/// Reply advertising Jingle audio over Google P2P.
#[must_use]
pub fn jingle_audio_reply() -> DiscoInfo {
    DiscoInfo::new().with_features([ns::JINGLE_015, ns::JINGLE_015_AUDIO, ns::GOOGLE_P2P])
}

/// Reply to a `video` extension query.
#[must_use]
pub fn jingle_video_ext_reply() -> DiscoInfo {
    DiscoInfo::new().with_features([ns::JINGLE_015_VIDEO])
}

/// Reply that hashes to [`FAKE_CLIENT_SHA1`].
#[must_use]
pub fn hashed_client_reply() -> DiscoInfo {
    jingle_audio_reply().with_form(software_info_form())
}

/// Reply advertising tubes and file transfer, with a client identity.
#[must_use]
pub fn tubes_reply() -> DiscoInfo {
    DiscoInfo::new()
        .with_identity(Identity::new("client", "pc").with_name("Fake"))
        .with_features([ns::TUBES, ns::SI_FILE_TRANSFER])
}

/// Unhashed advertisement with a version token.
#[must_use]
pub fn unhashed_advertisement(ver: &str) -> CapsAdvertisement {
    CapsAdvertisement::new(FAKE_CLIENT_NODE, ver)
}

/// `sha-1` advertisement carrying [`FAKE_CLIENT_SHA1`].
#[must_use]
pub fn hashed_advertisement() -> CapsAdvertisement {
    CapsAdvertisement::new(FAKE_CLIENT_NODE, FAKE_CLIENT_SHA1).with_hash("sha-1")
}

/// Full address of the `n`th test contact, `contact{n}@example.com/Resource`.
#[must_use]
pub fn contact(n: usize) -> FullJid {
    FullJid::parse(&format!("contact{n}@example.com/Resource")).expect("valid test address")
}

/// Bare address of the `n`th test contact.
#[must_use]
pub fn contact_bare(n: usize) -> BareJid {
    contact(n).bare
}

/// Available presence from the `n`th contact with an advertisement.
#[must_use]
pub fn presence_with_caps(n: usize, caps: CapsAdvertisement) -> PresenceUpdate {
    PresenceUpdate::available(contact(n)).with_caps(caps)
}
