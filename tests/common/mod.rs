#![allow(dead_code)]

use opticrep::models::{ActiveSetData, FormQuality, RepRecord};
use std::collections::BTreeMap;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize test logging
pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .init();
    });
}

pub fn set_data(exercise_name: &str, set_number: u32) -> ActiveSetData {
    ActiveSetData {
        session_id: "session-test".to_string(),
        exercise_id: exercise_name.to_lowercase().replace(' ', "-"),
        exercise_name: exercise_name.to_string(),
        set_number,
        weight: Some(20.0),
        target_reps: Some(10),
    }
}

pub fn rep(rep_number: u32) -> RepRecord {
    RepRecord {
        rep_number,
        joint_angles: BTreeMap::new(),
        tempo_seconds: 1.2,
        form_quality: FormQuality::Good,
    }
}

pub fn rep_numbers(reps: &[RepRecord]) -> Vec<u32> {
    reps.iter().map(|r| r.rep_number).collect()
}

/// Yield to other tasks until `condition` holds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
