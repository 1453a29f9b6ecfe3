//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config
//!
//! A config that parses must also validate and resolve its project paths.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = covermate_config::AppConfig::parse(s) {
        assert!(config.validate().is_ok());
        let _ = config.project_paths();
    }
});
