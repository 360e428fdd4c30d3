#![no_main]
use libfuzzer_sys::fuzz_target;
use mango_core::config::WorldConfig;

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary text to the TOML config parser.
    // Must not panic -- returning Err is fine.
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = WorldConfig::from_toml_str(text);
    }
});
