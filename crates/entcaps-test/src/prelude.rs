//! Prelude module - commonly used test utilities.
//!
//! Use `use entcaps_test::prelude::*;` to import all essential types.

// Mocks
pub use crate::{DiscoRequest, MockDiscoTransport, MockQuery, QueryInbox, RecordingSink};

// Fixtures
pub use crate::{
    FAKE_CLIENT_NODE, FAKE_CLIENT_SHA1, contact, contact_bare, hashed_advertisement,
    hashed_client_reply, jingle_audio_reply, jingle_video_ext_reply, presence_with_caps,
    software_info_form, tubes_reply, unhashed_advertisement,
};

// Logging
pub use crate::init_test_logging;
