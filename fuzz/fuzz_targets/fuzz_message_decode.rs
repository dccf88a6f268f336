//! Fuzz target: `codec::decode`
//!
//! Feeds arbitrary bytes to the channel message decoder. Decoding must
//! never panic, and every known message that decodes must encode again.
//!
//! cargo fuzz run fuzz_message_decode

#![no_main]

use duplex_rpc::rpc::codec::{self, Message};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(message) = codec::decode(data) else {
        return;
    };
    if message != Message::Unknown {
        let bytes = codec::encode(&message).expect("decoded message must encode");
        assert!(codec::decode(&bytes).is_ok(), "re-encoded message must decode");
    }
});
