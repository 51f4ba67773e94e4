#![no_main]

use libfuzzer_sys::fuzz_target;
use testgrid_core::PlanFile;

fuzz_target!(|data: &[u8]| {
    if let Ok(toml_str) = std::str::from_utf8(data) {
        if let Ok(plan) = PlanFile::parse(toml_str) {
            // 파싱에 성공한 정의는 이름이 비어 있을 수 없음
            for def in plan.into_definitions() {
                assert!(!def.name.trim().is_empty());
            }
        }
    }
});
