//! 状态机集成测试
//!
//! 按公开API验证阈值、冷却、恢复与分组通知行为

use chrono::{Duration as ChronoDuration, Utc};
use domain_vitals::check::{CheckRound, ProbeErrorKind, ProbeOutcome};
use domain_vitals::config::{DomainTarget, GroupConfig, NotifyMode};
use domain_vitals::monitor::{DomainStatus, EngineSettings, StateEngine};
use domain_vitals::notification::{PayloadKind, ReportEvent};
use std::time::Duration;

fn group(id: &str) -> GroupConfig {
    GroupConfig {
        id: id.to_string(),
        name: format!("{id}组"),
        chat_id: format!("-100{id}"),
        domains: vec![],
        expected_status_codes: None,
    }
}

fn target(domain: &str, group_id: &str) -> DomainTarget {
    DomainTarget::from_entry(domain, &group(group_id)).unwrap()
}

fn ok(target: &DomainTarget) -> ProbeOutcome {
    ProbeOutcome::success(
        target.id.clone(),
        target.url.clone(),
        200,
        Duration::from_millis(30),
    )
}

fn failed(target: &DomainTarget, kind: ProbeErrorKind) -> ProbeOutcome {
    ProbeOutcome::failure(
        target.id.clone(),
        target.url.clone(),
        kind,
        kind.description().to_string(),
        Duration::from_millis(30),
    )
}

fn settings(mode: NotifyMode, threshold: u32, cooldown_minutes: i64) -> EngineSettings {
    EngineSettings {
        mode,
        failure_threshold: threshold,
        cooldown: ChronoDuration::minutes(cooldown_minutes),
        notify_on_recovery: true,
        notify_on_all_success: false,
    }
}

fn round(id: u64, outcomes: Vec<ProbeOutcome>) -> CheckRound {
    CheckRound::new(id, outcomes, false, Utc::now())
}

#[tokio::test]
async fn alert_fires_exactly_at_threshold() {
    for threshold in [1u32, 2, 3, 5] {
        let engine = StateEngine::new(settings(NotifyMode::Smart, threshold, 60));
        let x = target("x.example.com", "a");
        engine.sync_targets(&[x.clone()]).await;

        // 阈值之前的每一轮都不告警
        for i in 1..threshold {
            let payloads = engine
                .apply_round(&round(
                    i as u64,
                    vec![failed(&x, ProbeErrorKind::Timeout)],
                ))
                .await;
            assert!(
                payloads.is_empty(),
                "阈值{threshold}：第{i}轮不应告警"
            );
        }

        // 恰好达到阈值的那一轮告警
        let payloads = engine
            .apply_round(&round(
                threshold as u64,
                vec![failed(&x, ProbeErrorKind::Timeout)],
            ))
            .await;
        assert_eq!(payloads.len(), 1, "阈值{threshold}：应在第{threshold}轮告警");
        assert_eq!(payloads[0].events(ReportEvent::Alert).count(), 1);

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.domains[0].consecutive_failures, threshold);
        assert_eq!(snapshot.stats.alerts_emitted, 1);
    }
}

#[tokio::test]
async fn successful_domains_end_healthy_with_zero_counter() {
    let engine = StateEngine::new(settings(NotifyMode::Smart, 2, 60));
    let targets: Vec<DomainTarget> = (0..5)
        .map(|i| target(&format!("d{i}.example.com"), "a"))
        .collect();
    engine.sync_targets(&targets).await;

    let outcomes: Vec<ProbeOutcome> = targets.iter().map(ok).collect();
    engine.apply_round(&round(1, outcomes)).await;

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.healthy, 5);
    for state in &snapshot.domains {
        assert_eq!(state.status, DomainStatus::Healthy);
        assert_eq!(state.consecutive_failures, 0);
    }
}

#[tokio::test]
async fn recovery_fires_exactly_once() {
    let engine = StateEngine::new(settings(NotifyMode::Smart, 1, 60));
    let x = target("x.example.com", "a");
    engine.sync_targets(&[x.clone()]).await;

    engine
        .apply_round(&round(1, vec![failed(&x, ProbeErrorKind::Connect)]))
        .await;

    // 恢复轮：恰好一条恢复通知
    let payloads = engine.apply_round(&round(2, vec![ok(&x)])).await;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].events(ReportEvent::Recovery).count(), 1);

    // 后续持续正常：不再有任何通知
    for i in 3..=6 {
        let payloads = engine.apply_round(&round(i, vec![ok(&x)])).await;
        assert!(payloads.is_empty(), "第{i}轮不应重复恢复通知");
    }

    assert_eq!(engine.snapshot().await.stats.recoveries_emitted, 1);
}

#[tokio::test]
async fn suppressed_rounds_keep_counting() {
    let engine = StateEngine::new(settings(NotifyMode::Smart, 2, 60));
    let x = target("x.example.com", "a");
    engine.sync_targets(&[x.clone()]).await;

    for i in 1..=5 {
        engine
            .apply_round(&round(i, vec![failed(&x, ProbeErrorKind::Timeout)]))
            .await;
    }

    let snapshot = engine.snapshot().await;
    // 冷却期内计数持续累加，但只发过一次告警
    assert_eq!(snapshot.domains[0].consecutive_failures, 5);
    assert_eq!(snapshot.domains[0].status, DomainStatus::Alerting);
    assert_eq!(snapshot.stats.alerts_emitted, 1);
}

#[tokio::test]
async fn smart_mode_two_groups_only_changed_group_notified() {
    // 双群组：A={x1.com}, B={x2.com}；x1新失败、x2保持正常
    let engine = StateEngine::new(settings(NotifyMode::Smart, 1, 60));
    let x1 = target("x1.com", "groupA");
    let x2 = target("x2.com", "groupB");
    engine.sync_targets(&[x1.clone(), x2.clone()]).await;

    let payloads = engine
        .apply_round(&round(
            1,
            vec![failed(&x1, ProbeErrorKind::Connect), ok(&x2)],
        ))
        .await;

    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].group_id.as_str(), "groupA");
    assert!(payloads[0]
        .domains
        .iter()
        .all(|d| d.domain.as_str() == "x1.com"));
}

#[tokio::test]
async fn full_mode_splits_payload_per_group() {
    let engine = StateEngine::new(settings(NotifyMode::Full, 5, 60));
    let a1 = target("a1.com", "groupA");
    let a2 = target("a2.com", "groupA");
    let b1 = target("b1.com", "groupB");
    engine
        .sync_targets(&[a1.clone(), a2.clone(), b1.clone()])
        .await;

    let payloads = engine
        .apply_round(&round(
            1,
            vec![
                failed(&a1, ProbeErrorKind::Dns),
                ok(&a2),
                failed(&b1, ProbeErrorKind::Timeout),
            ],
        ))
        .await;

    // 两个群组各一个载荷，且只包含本群组的域名
    assert_eq!(payloads.len(), 2);
    for payload in &payloads {
        assert_eq!(payload.kind, PayloadKind::Full);
        match payload.group_id.as_str() {
            "groupA" => {
                assert_eq!(payload.summary.total, 2);
                assert_eq!(payload.summary.failing, 1);
                assert_eq!(payload.domains.len(), 1);
                assert_eq!(payload.domains[0].domain.as_str(), "a1.com");
            }
            "groupB" => {
                assert_eq!(payload.summary.total, 1);
                assert_eq!(payload.domains[0].domain.as_str(), "b1.com");
            }
            other => panic!("意外的群组: {other}"),
        }
    }
}

#[tokio::test]
async fn smart_mode_silent_when_nothing_changes() {
    let engine = StateEngine::new(settings(NotifyMode::Smart, 1, 60));
    let x = target("x.example.com", "a");
    let y = target("y.example.com", "a");
    engine.sync_targets(&[x.clone(), y.clone()]).await;

    // 第1轮：x告警
    let payloads = engine
        .apply_round(&round(1, vec![failed(&x, ProbeErrorKind::Timeout), ok(&y)]))
        .await;
    assert_eq!(payloads.len(), 1);

    // 第2轮：状态没有变化（x仍失败但冷却中，y仍正常）-> 完全静默
    let payloads = engine
        .apply_round(&round(2, vec![failed(&x, ProbeErrorKind::Timeout), ok(&y)]))
        .await;
    assert!(payloads.is_empty());
}

#[tokio::test]
async fn total_outage_round_behaves_normally() {
    // 整体断网：全部域名失败，照常计数与告警，不崩溃
    let engine = StateEngine::new(settings(NotifyMode::Smart, 2, 60));
    let targets: Vec<DomainTarget> = (0..10)
        .map(|i| target(&format!("d{i}.example.com"), "a"))
        .collect();
    engine.sync_targets(&targets).await;

    let all_failed = |id: u64| {
        round(
            id,
            targets
                .iter()
                .map(|t| failed(t, ProbeErrorKind::Connect))
                .collect(),
        )
    };

    let payloads = engine.apply_round(&all_failed(1)).await;
    assert!(payloads.is_empty());

    let payloads = engine.apply_round(&all_failed(2)).await;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].events(ReportEvent::Alert).count(), 10);

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.failing, 10);
}
