use inventory_devkit::{Behaviour, ChassisFixture, TestHarness};
use inventory_kernel::models::{Category, PollSetting};
use inventory_kernel::scheduler::PollScheduler;
use inventory_kernel::store::settings;
use std::time::Duration;

const ERROR_RETRY: Duration = Duration::from_secs(7);

fn scheduler(harness: &TestHarness) -> PollScheduler {
    PollScheduler::new(harness.poller.clone(), ERROR_RETRY)
}

async fn save_setting(harness: &TestHarness, setting: PollSetting) -> anyhow::Result<()> {
    harness.store.write("test_intervals", move |tx| settings::write_poll_setting(tx, &setting)).await?;
    Ok(())
}

#[tokio::test]
async fn test_missing_setting_uses_category_default() -> anyhow::Result<()> {
    let harness = TestHarness::new()?;
    let scheduler = scheduler(&harness);

    assert_eq!(scheduler.resolve_interval(Category::Chassis).await, Duration::from_secs(60));
    assert_eq!(scheduler.resolve_interval(Category::Licensing).await, Duration::from_secs(300));
    assert_eq!(scheduler.resolve_interval(Category::DataPurge).await, Duration::from_secs(86_400));
    Ok(())
}

#[tokio::test]
async fn test_zero_interval_falls_back_to_default() -> anyhow::Result<()> {
    let harness = TestHarness::new()?;
    // écrit hors validation, comme un fichier modifié à la main
    harness
        .store
        .write("test_raw_setting", |tx| {
            tx.execute(
                "INSERT INTO poll_setting (id, chassis, cards, ports, sensors, perf, licensing, data_purge, ixnetwork)
                 VALUES (1, 0, -5, 45, 180, 60, 300, 1, 120)",
                [],
            )?;
            Ok(())
        })
        .await?;
    let scheduler = scheduler(&harness);

    assert_eq!(scheduler.resolve_interval(Category::Chassis).await, Duration::from_secs(60));
    assert_eq!(scheduler.resolve_interval(Category::Cards).await, Duration::from_secs(120));
    assert_eq!(scheduler.resolve_interval(Category::Ports).await, Duration::from_secs(45));
    Ok(())
}

#[tokio::test]
async fn test_persisted_interval_is_used() -> anyhow::Result<()> {
    let harness = TestHarness::new()?;
    save_setting(&harness, PollSetting { ports: 45, ixnetwork: 30, ..PollSetting::default() }).await?;
    let scheduler = scheduler(&harness);

    assert_eq!(scheduler.resolve_interval(Category::Ports).await, Duration::from_secs(45));
    assert_eq!(scheduler.resolve_interval(Category::IxNetwork).await, Duration::from_secs(30));
    assert_eq!(scheduler.resolve_interval(Category::Cards).await, Duration::from_secs(120));
    Ok(())
}

#[tokio::test]
async fn test_data_purge_interval_is_in_days() -> anyhow::Result<()> {
    let harness = TestHarness::new()?;
    save_setting(&harness, PollSetting { data_purge: 2, ..PollSetting::default() }).await?;

    let interval = scheduler(&harness).resolve_interval(Category::DataPurge).await;
    assert_eq!(interval, Duration::from_secs(2 * 86_400));
    Ok(())
}

#[tokio::test]
async fn test_successful_step_sleeps_for_interval() -> anyhow::Result<()> {
    let harness = TestHarness::new()?;
    harness.add_chassis("10.0.0.1", Behaviour::Healthy(ChassisFixture::healthy("SN-1"))).await?;
    save_setting(&harness, PollSetting { chassis: 15, ..PollSetting::default() }).await?;

    let delay = scheduler(&harness).step(Category::Chassis).await;
    assert_eq!(delay, Duration::from_secs(15));
    assert!(harness.summary_row("10.0.0.1").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_empty_cycle_still_sleeps_for_interval() -> anyhow::Result<()> {
    let harness = TestHarness::new()?;
    let delay = scheduler(&harness).step(Category::Chassis).await;
    assert_eq!(delay, Duration::from_secs(60));
    Ok(())
}

#[tokio::test]
async fn test_store_error_retries_after_error_delay() -> anyhow::Result<()> {
    let harness = TestHarness::new()?;
    harness
        .store
        .write("test_break_store", |tx| {
            tx.execute("DROP TABLE chassis_credentials", [])?;
            Ok(())
        })
        .await?;

    let delay = scheduler(&harness).step(Category::Cards).await;
    assert_eq!(delay, ERROR_RETRY);

    let health = harness.health.category(Category::Cards).expect("cards health");
    assert_eq!(health.consecutive_failures, 1);
    assert!(health.last_error.is_some());
    Ok(())
}
