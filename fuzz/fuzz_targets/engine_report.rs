#![no_main]

use libfuzzer_sys::fuzz_target;
use testgrid_coordinator::EngineReport;

fuzz_target!(|data: &[u8]| {
    // 엔진 프로세스의 stdout 또는 HTTP 콜백 본문
    if let Ok(report) = serde_json::from_slice::<EngineReport>(data) {
        let encoded = serde_json::to_vec(&report).expect("re-encode");
        let decoded: EngineReport = serde_json::from_slice(&encoded).expect("re-decode");
        assert_eq!(report, decoded);
    }
});
