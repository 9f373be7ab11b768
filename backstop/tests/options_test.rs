//! Loading feature tuning from JSON.

use std::time::Duration;

use backstop::prelude::*;
use backstop::ConfigError;

#[tokio::test(start_paused = true)]
async fn coordinator_and_hub_from_json_options() {
    let options = BackstopOptions::from_json(
        r#"{
            "retry": { "max_attempts": 2, "base_delay_ms": 200, "max_delay_ms": 400 },
            "coalesce": { "quiet_period_ms": 50, "min_interval_ms": 500 }
        }"#,
    )
    .unwrap();

    let retries: RetryCoordinator<u32> = RetryCoordinator::new(options.retry.clone());
    let err = retries
        .run(1, || async { Err::<(), _>(OperationError::network("offline")) })
        .await
        .unwrap_err();
    assert!(matches!(err, RetryError::Exhausted { attempts: 2, .. }));

    let hub = RefreshHub::new(options.coalesce.clone());
    assert_eq!(
        hub.channel("message-counts").config().quiet_period,
        Duration::from_millis(50)
    );
}

#[test]
fn serialized_options_use_millisecond_keys() {
    let options = BackstopOptions::default();
    let json: serde_json::Value = serde_json::from_str(&options.to_json().unwrap()).unwrap();
    assert_eq!(json["retry"]["base_delay_ms"], 1000);
    assert_eq!(json["coalesce"]["min_interval_ms"], 4000);
    assert!(json["retry"].get("attempt_timeout_ms").is_none());
}

#[test]
fn invalid_options_are_rejected() {
    let err = BackstopOptions::from_json(
        r#"{ "retry": { "base_delay_ms": 5000, "max_delay_ms": 1000 } }"#,
    )
    .unwrap_err();
    assert_eq!(
        err,
        ConfigError::DelayOrder {
            base_ms: 5000,
            max_ms: 1000
        }
    );
}
