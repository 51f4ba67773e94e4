#![no_main]

use libfuzzer_sys::fuzz_target;
use testgrid_core::TestGridConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(toml_str) = std::str::from_utf8(data) {
        if let Ok(config) = TestGridConfig::parse(toml_str) {
            let _ = config.validate();
            let _ = config.storage_path();
        }
    }
});
