//! Fuzz target for the `sift.toml` parser.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_config_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use sift_query::SiftConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(config) = SiftConfig::from_str(input) {
            assert!(config.pagination.max_per_page >= 1);
            assert!(config.pagination.default_per_page <= config.pagination.max_per_page);
        }
    }
});
