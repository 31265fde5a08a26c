use anyhow::Result;
use inventory_devkit::TestHarness;
use inventory_kernel::models::{CardRecord, UtilizationSample};
use inventory_kernel::store::{inventory, StoreError};
use std::time::Duration;

fn card(ip: &str, number: usize) -> CardRecord {
    CardRecord { card_number: number.to_string(), ..CardRecord::unreachable(ip, "2024-01-01 00:00:00") }
}

#[tokio::test]
async fn test_failure_midway_leaves_no_rows() -> Result<()> {
    let h = TestHarness::new()?;
    let rows: Vec<CardRecord> = (1..=5).map(|n| card("10.0.0.1", n)).collect();

    let result = h
        .store
        .write("cards", move |tx| {
            inventory::replace_rows(tx, &rows[..4])?;
            // échec sur la dernière ligne
            tx.execute("INSERT INTO missing_table VALUES (1)", [])?;
            Ok(())
        })
        .await;
    assert!(matches!(result, Err(StoreError::Sqlite(_))));

    let cards: Vec<CardRecord> = h.table().await?;
    assert!(cards.is_empty());
    assert_eq!(h.store.write_stats().failed, 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_write_keeps_previous_snapshot() -> Result<()> {
    let h = TestHarness::new()?;
    let first = vec![card("10.0.0.1", 1), card("10.0.0.1", 2)];
    let expected = first.clone();
    h.store.write("cards", move |tx| inventory::replace_rows(tx, &first)).await?;

    let result: Result<usize, StoreError> = h
        .store
        .write("cards", |tx| {
            inventory::replace_rows(tx, &[card("10.0.0.2", 1)])?;
            Err(StoreError::Validation("boom".into()))
        })
        .await;
    assert!(result.is_err());

    let cards: Vec<CardRecord> = h.table().await?;
    assert_eq!(cards, expected);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_writers_never_exceed_one() -> Result<()> {
    let h = TestHarness::new()?;

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = h.store.clone();
        handles.push(tokio::spawn(async move {
            store
                .write("samples", move |tx| {
                    std::thread::sleep(Duration::from_millis(5));
                    let sample = UtilizationSample {
                        chassis_ip: format!("10.0.0.{i}"),
                        mem_utilization: 1.0,
                        cpu_utilization: 2.0,
                        last_updated_at: "2024-01-01 00:00:00".into(),
                    };
                    inventory::append_utilization(tx, &[sample])
                })
                .await
        }));
    }
    // lectures concurrentes pendant les écritures
    for _ in 0..4 {
        h.store.read(|conn| inventory::read_utilization(conn, None)).await?;
    }
    for handle in handles {
        handle.await??;
    }

    let stats = h.store.write_stats();
    assert_eq!(stats.committed, 16);
    assert_eq!(stats.peak_concurrent_writers, 1);
    assert_eq!(stats.active_writers, 0);

    let samples: Vec<UtilizationSample> = h.table().await?;
    assert_eq!(samples.len(), 16);
    Ok(())
}

#[tokio::test]
async fn test_purge_keeps_most_recent_half() -> Result<()> {
    let h = TestHarness::new()?;
    let samples: Vec<UtilizationSample> = (0..7)
        .map(|i| UtilizationSample {
            chassis_ip: "10.0.0.1".into(),
            mem_utilization: i as f64,
            cpu_utilization: 0.0,
            last_updated_at: format!("2024-01-0{} 00:00:00", i + 1),
        })
        .collect();
    let mut shuffled = samples.clone();
    shuffled.reverse();
    h.store.write("samples", move |tx| inventory::append_utilization(tx, &shuffled)).await?;

    let deleted = h.store.write("purge", |tx| inventory::purge_utilization(tx)).await?;
    assert_eq!(deleted, 3);

    let remaining = h.store.read(|conn| inventory::read_utilization(conn, None)).await?;
    assert_eq!(remaining, samples[3..].to_vec());
    Ok(())
}

#[tokio::test]
async fn test_store_runs_in_wal_mode() -> Result<()> {
    let h = TestHarness::new()?;
    assert_eq!(h.store.journal_mode().await?.to_lowercase(), "wal");
    Ok(())
}
