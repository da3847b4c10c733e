//! Fuzz target for request field validation.
//!
//! Validators must return `Ok` or `Err` for any input and never panic,
//! including on multi-byte characters at the length boundaries.
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_validation -- -max_total_time=60
//! ```

#![no_main]

use blog_service::validation::{
    validate_actor, validate_cover_image_url, validate_id, validate_state, validate_tag_name,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = validate_tag_name(s);
        let _ = validate_actor(s, "created_by");
        let _ = validate_cover_image_url(s);
    }

    if let Some((first, rest)) = data.split_first() {
        let _ = validate_state(*first);

        if let Some(bytes) = rest.get(..4) {
            let id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let _ = validate_id(id, "id");
        }
    }
});
