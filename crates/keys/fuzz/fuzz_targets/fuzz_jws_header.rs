//! Fuzz target for compact JWS header decoding.
//!
//! Feeds arbitrary strings as tokens. Header decoding must never panic, and
//! a decoded `alg` must either name a supported algorithm or be rejected.

#![no_main]

use libfuzzer_sys::fuzz_target;

use keyrotor_keys::jws::decode_header;
use keyrotor_storage::Alg;

fuzz_target!(|data: &[u8]| {
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(header) = decode_header(token) {
        let _ = header.alg.parse::<Alg>();
    }
});
