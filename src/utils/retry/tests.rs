use super::*;

#[test]
fn test_default_policies() {
    assert_eq!(
        BackoffPolicy::fixed_default(),
        BackoffPolicy::Fixed {
            interval_secs: 2,
            max_attempts: 15
        }
    );
    assert_eq!(
        BackoffPolicy::quadratic_default(),
        BackoffPolicy::Quadratic { max_attempts: 10 }
    );
}

#[test]
fn test_quadratic_delays() {
    let policy = BackoffPolicy::Quadratic { max_attempts: 10 };

    for n in 1..=10u32 {
        assert_eq!(
            policy.delay_after_failures(n),
            Duration::from_secs(u64::from(n * n))
        );
    }
}

#[test]
fn test_quadratic_sequence_is_capped() {
    let delays: Vec<Duration> = BackoffPolicy::Quadratic { max_attempts: 4 }.build().collect();

    assert_eq!(
        delays,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(4),
            Duration::from_secs(9),
            Duration::from_secs(16),
        ]
    );
}

#[test]
fn test_fixed_sequence_is_capped() {
    let delays: Vec<Duration> = BackoffPolicy::fixed_default().build().collect();

    assert_eq!(delays.len(), 15);
    assert!(delays.iter().all(|d| *d == Duration::from_secs(2)));
}

#[test]
fn test_zero_cap_never_retries() {
    let mut backoff = BackoffPolicy::Quadratic { max_attempts: 0 }.build();
    assert_eq!(backoff.next(), None);
}

#[test]
fn test_no_overflow_on_large_failure_count() {
    let policy = BackoffPolicy::Quadratic {
        max_attempts: u32::MAX,
    };
    let delay = policy.delay_after_failures(u32::MAX);
    assert_eq!(delay, Duration::from_secs(u64::from(u32::MAX).pow(2)));
}

#[test]
fn test_deserialize_policy() {
    let fixed: BackoffPolicy =
        serde_json::from_str(r#"{"policy":"fixed","interval_secs":3,"max_attempts":5}"#).unwrap();
    assert_eq!(
        fixed,
        BackoffPolicy::Fixed {
            interval_secs: 3,
            max_attempts: 5
        }
    );

    let quadratic: BackoffPolicy =
        serde_json::from_str(r#"{"policy":"quadratic","max_attempts":7}"#).unwrap();
    assert_eq!(quadratic, BackoffPolicy::Quadratic { max_attempts: 7 });
}
