//! Fuzz target for the ECDSA DER signature codec.
//!
//! Feeds arbitrary bytes to the DER parser. Every result must be either
//! `Ok([u8; 64])` or `Err(KeyError)`, and anything that parses must
//! re-encode to a DER blob that parses back to the same raw signature.

#![no_main]

use libfuzzer_sys::fuzz_target;

use keyrotor_keys::der::{der_to_raw, raw_to_der};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = der_to_raw(data) else {
        return;
    };

    let der = raw_to_der(&raw).expect("64-byte raw signature always encodes");
    assert_eq!(der_to_raw(&der).expect("re-encoded DER parses"), raw);

    // Strict DER has exactly one encoding per value.
    assert_eq!(der, data);
});
