use anyhow::Result;
use inventory_devkit::{Behaviour, ChassisFixture, TestHarness};
use inventory_kernel::collector::FanOutCollector;
use inventory_kernel::fetch::{ChassisTarget, FetchWorker};
use inventory_kernel::models::{
    CardRecord, Category, ChassisCredential, ChassisStatus, ChassisSummaryRecord, IxNetworkServerRecord, PortRecord,
    UtilizationSample, NA, UNKNOWN,
};
use inventory_kernel::store::inventory;
use inventory_kernel::store::settings::{self, TagOperation};
use inventory_kernel::timestamp;
use std::sync::Arc;
use time::OffsetDateTime;

fn healthy_row(ip: &str, age: time::Duration) -> ChassisSummaryRecord {
    let at = timestamp::format(OffsetDateTime::now_utc() - age);
    let mut row = ChassisSummaryRecord::unreachable(ip, &at);
    row.status = ChassisStatus::Ready;
    row.chassis_serial = "PRIOR-SERIAL".into();
    row.chassis_type = "Ixia_XGS12".into();
    row.os = "Linux".into();
    row
}

fn assert_recent(raw: &str) {
    let ts = timestamp::parse(raw).expect("parseable timestamp");
    let age = (OffsetDateTime::now_utc() - ts).abs();
    assert!(age < time::Duration::seconds(30), "timestamp {raw} is not recent");
}

#[tokio::test]
async fn test_recent_healthy_row_survives_timeouts() -> Result<()> {
    let h = TestHarness::new()?;
    h.add_chassis("10.0.0.1", Behaviour::Hang).await?;
    h.add_chassis("10.0.0.2", Behaviour::Healthy(ChassisFixture::healthy("SN-B"))).await?;
    h.seed_summary(healthy_row("10.0.0.1", time::Duration::minutes(1))).await?;
    let before = h.summary_row("10.0.0.1").await?;

    let report = h.run(Category::Chassis).await?;
    assert_eq!(report.chassis, 2);
    assert_eq!(report.unreachable, 1);
    assert_eq!(report.preserved, 1);
    assert_eq!(h.connector.connect_count("10.0.0.1"), 3);

    assert_eq!(h.summary_row("10.0.0.1").await?, before);
    let b = h.summary_row("10.0.0.2").await?.expect("B inserted");
    assert_eq!(b.status, ChassisStatus::Ready);
    assert_eq!(b.chassis_serial, "SN-B");
    assert_recent(&b.last_updated_at);
    Ok(())
}

#[tokio::test]
async fn test_stale_healthy_row_becomes_not_reachable() -> Result<()> {
    let h = TestHarness::new()?;
    h.add_chassis("10.0.0.1", Behaviour::Hang).await?;
    h.add_chassis("10.0.0.2", Behaviour::Healthy(ChassisFixture::healthy("SN-B"))).await?;
    h.seed_summary(healthy_row("10.0.0.1", time::Duration::minutes(10))).await?;

    let report = h.run(Category::Chassis).await?;
    assert_eq!(report.preserved, 0);

    let a = h.summary_row("10.0.0.1").await?.expect("A still present");
    assert_eq!(a.status, ChassisStatus::NotReachable);
    assert_eq!(a.chassis_serial, NA);
    assert_recent(&a.last_updated_at);
    assert!(h.summary_row("10.0.0.2").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_prior_row_is_refreshed() -> Result<()> {
    let h = TestHarness::new()?;
    h.add_chassis("10.0.0.1", Behaviour::AlwaysFail).await?;
    let old = timestamp::format(OffsetDateTime::now_utc() - time::Duration::minutes(1));
    h.seed_summary(ChassisSummaryRecord::unreachable("10.0.0.1", &old)).await?;

    h.run(Category::Chassis).await?;
    let row = h.summary_row("10.0.0.1").await?.expect("row");
    assert_ne!(row.last_updated_at, old);
    Ok(())
}

#[tokio::test]
async fn test_two_successful_cycles_are_idempotent() -> Result<()> {
    let h = TestHarness::new()?;
    h.add_chassis("10.0.0.1", Behaviour::Healthy(ChassisFixture::healthy("SN-A"))).await?;
    h.add_chassis("10.0.0.2", Behaviour::Healthy(ChassisFixture::virtual_appliance())).await?;

    h.run(Category::Chassis).await?;
    let first = h.summary().await?;
    h.run(Category::Chassis).await?;
    let second = h.summary().await?;

    assert_eq!(first.len(), 2);
    let strip = |rows: Vec<ChassisSummaryRecord>| {
        rows.into_iter()
            .map(|mut r| {
                r.last_updated_at.clear();
                r
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(first), strip(second));

    let vm = h.summary_row("10.0.0.2").await?.expect("vm row");
    assert_eq!(vm.chassis_serial, "IxiaVM");
    assert_eq!(vm.os, "Windows");
    Ok(())
}

#[tokio::test]
async fn test_failed_chassis_gets_sentinel_row_in_multi_row_tables() -> Result<()> {
    let h = TestHarness::new()?;
    h.add_chassis("10.0.0.1", Behaviour::AlwaysFail).await?;
    h.add_chassis("10.0.0.2", Behaviour::Healthy(ChassisFixture::healthy("SN-B"))).await?;

    h.run(Category::Cards).await?;
    let cards: Vec<CardRecord> = h.table().await?;
    let ips: Vec<&str> = cards.iter().map(|c| c.chassis_ip.as_str()).collect();
    assert_eq!(ips, vec!["10.0.0.1", "10.0.0.2", "10.0.0.2"]);
    assert_eq!(cards[0].card_number, NA);
    assert_eq!(cards[1].card_number, "1");
    assert_eq!(cards[2].card_number, "2");

    h.run(Category::Ports).await?;
    let ports: Vec<PortRecord> = h.table().await?;
    assert_eq!(ports.len(), 4);
    let healthy: Vec<_> = ports.iter().filter(|p| p.chassis_ip == "10.0.0.2").collect();
    assert!(healthy.iter().all(|p| p.total_ports == "3" && p.owned_ports == "1" && p.free_ports == "2"));
    Ok(())
}

#[tokio::test]
async fn test_multi_row_tables_reflect_latest_cycle_only() -> Result<()> {
    let h = TestHarness::new()?;
    h.add_chassis("10.0.0.1", Behaviour::Healthy(ChassisFixture::healthy("SN-A"))).await?;
    h.run(Category::Cards).await?;

    h.connector.script(
        "10.0.0.1",
        Behaviour::Healthy(ChassisFixture::healthy("SN-A").with_cards(serde_json::json!([{"cardNumber": 7}]))),
    );
    h.run(Category::Cards).await?;

    let cards: Vec<CardRecord> = h.table().await?;
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].card_number, "7");
    Ok(())
}

#[tokio::test]
async fn test_recovering_chassis_is_fetched_within_one_cycle() -> Result<()> {
    let h = TestHarness::new()?;
    h.add_chassis("10.0.0.1", Behaviour::FailTimes(2, ChassisFixture::healthy("SN-A"))).await?;

    let report = h.run(Category::Chassis).await?;
    assert_eq!(report.unreachable, 0);
    assert_eq!(h.connector.connect_count("10.0.0.1"), 3);
    assert_eq!(h.summary_row("10.0.0.1").await?.expect("row").status, ChassisStatus::Ready);
    Ok(())
}

#[tokio::test]
async fn test_no_credentials_is_a_noop() -> Result<()> {
    let h = TestHarness::new()?;
    let before = h.store.write_stats().committed;

    let report = h.run(Category::Chassis).await?;
    assert_eq!(report.chassis, 0);
    assert_eq!(h.connector.total_connects(), 0);
    assert_eq!(h.store.write_stats().committed, before);
    assert!(h.summary().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unconfigured_chassis_rows_are_pruned() -> Result<()> {
    let h = TestHarness::new()?;
    h.add_chassis("10.0.0.1", Behaviour::Healthy(ChassisFixture::healthy("SN-A"))).await?;
    h.seed_summary(healthy_row("10.0.0.99", time::Duration::minutes(1))).await?;
    assert_eq!(h.summary().await?.len(), 1);

    h.run(Category::Chassis).await?;
    let ips: Vec<String> = h.summary().await?.into_iter().map(|r| r.chassis_ip).collect();
    assert_eq!(ips, vec!["10.0.0.1".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_user_tags_survive_summary_rewrite() -> Result<()> {
    let h = TestHarness::new()?;
    h.add_chassis("10.0.0.1", Behaviour::Healthy(ChassisFixture::healthy("SN-A"))).await?;
    h.run(Category::Chassis).await?;

    h.store
        .write("tags", |tx| settings::update_tags(tx, "10.0.0.1", &["lab".to_string()], TagOperation::Add))
        .await?;
    h.run(Category::Chassis).await?;

    assert_eq!(h.summary_row("10.0.0.1").await?.expect("row").tags, vec!["lab".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_perf_cycles_append_and_purge_halves() -> Result<()> {
    let h = TestHarness::new()?;
    h.add_chassis("10.0.0.1", Behaviour::Healthy(ChassisFixture::healthy("SN-A").with_perf(512, 1024, 40.0))).await?;
    h.add_chassis("10.0.0.2", Behaviour::AlwaysFail).await?;

    for _ in 0..3 {
        h.run(Category::Perf).await?;
    }
    let samples: Vec<UtilizationSample> = h.table().await?;
    assert_eq!(samples.len(), 6);
    let healthy = samples.iter().find(|s| s.chassis_ip == "10.0.0.1").expect("sample");
    assert_eq!(healthy.mem_utilization, 50.0);
    assert_eq!(healthy.cpu_utilization, 40.0);
    let down = samples.iter().find(|s| s.chassis_ip == "10.0.0.2").expect("sample");
    assert_eq!((down.mem_utilization, down.cpu_utilization), (0.0, 0.0));

    let report = h.run(Category::DataPurge).await?;
    assert_eq!(report.purged, 3);
    let remaining = h.store.read(|conn| inventory::read_utilization(conn, None)).await?;
    assert_eq!(remaining.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_collector_output_matches_input_even_with_panics() -> Result<()> {
    let h = TestHarness::new()?;
    let behaviours = [
        Behaviour::Healthy(ChassisFixture::healthy("SN-0")),
        Behaviour::Panic,
        Behaviour::AlwaysFail,
        Behaviour::Malformed,
        Behaviour::Healthy(ChassisFixture::healthy("SN-4")),
    ];
    let mut targets = Vec::new();
    for (i, behaviour) in behaviours.into_iter().enumerate() {
        let ip = format!("10.0.1.{i}");
        h.connector.script(&ip, behaviour);
        targets.push(ChassisTarget::new(ChassisCredential { ip, username: "u".into(), password: "p".into() }));
    }

    let collector = FanOutCollector::new(FetchWorker::new(Arc::new(h.connector.clone()), inventory_devkit::test_utils::fast_policy()));
    let results = collector.collect(Category::Chassis, &targets).await;

    let ips: Vec<&str> = results.iter().map(|r| r.chassis_ip.as_str()).collect();
    assert_eq!(ips, vec!["10.0.1.0", "10.0.1.1", "10.0.1.2", "10.0.1.3", "10.0.1.4"]);
    let ok: Vec<bool> = results.iter().map(|r| r.is_success()).collect();
    assert_eq!(ok, vec![true, false, false, false, true]);
    Ok(())
}

#[tokio::test]
async fn test_health_tracks_cycles() -> Result<()> {
    let h = TestHarness::new()?;
    h.add_chassis("10.0.0.1", Behaviour::Healthy(ChassisFixture::healthy("SN-A"))).await?;
    h.run(Category::Sensors).await?;

    let sensors = h.health.category(Category::Sensors).expect("sensors health");
    assert_eq!(sensors.cycles, 1);
    assert_eq!(sensors.consecutive_failures, 0);
    assert_eq!(sensors.last_report.expect("report").rows_written, 2);
    Ok(())
}

#[tokio::test]
async fn test_ixnetwork_cycle_polls_api_servers_only() -> Result<()> {
    let h = TestHarness::new()?;
    h.add_chassis("10.0.0.1", Behaviour::Healthy(ChassisFixture::healthy("SN-1"))).await?;
    let windows = serde_json::json!([
        {"state": "RUNNING", "applicationType": "ixnwindows"},
        {"state": "STOPPED", "applicationType": "ixnwindows"}
    ]);
    h.add_api_server("10.0.5.1", Behaviour::Healthy(ChassisFixture::healthy("SN-2").with_sessions(windows))).await?;
    h.add_api_server("10.0.5.2", Behaviour::AlwaysFail).await?;

    let report = h.run(Category::IxNetwork).await?;
    assert_eq!(report.chassis, 2);
    assert_eq!(report.unreachable, 1);
    assert_eq!(h.connector.connect_count("10.0.0.1"), 0);

    let rows: Vec<IxNetworkServerRecord> = h.table().await?;
    assert_eq!(rows.len(), 2);
    let up = rows.iter().find(|r| r.server_ip == "10.0.5.1").expect("reachable server");
    assert_eq!(up.server_type, "Windows");
    assert_eq!((up.sessions, up.running_sessions, up.idle_sessions), (2, 1, 1));
    let down = rows.iter().find(|r| r.server_ip == "10.0.5.2").expect("unreachable server");
    assert_eq!(down.server_type, UNKNOWN);
    assert_eq!(down.sessions, 0);
    Ok(())
}
