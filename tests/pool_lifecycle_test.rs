use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use walletpool::ledger::{BalanceQuery, LedgerClient, SimulatedLedger};
use walletpool::random::SequenceRandom;
use walletpool::store::MemoryStore;
use walletpool::*;

fn at(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000 + ms).unwrap()
}

fn base_config(target: usize) -> PoolConfig {
    PoolConfig {
        target_pool_size: target,
        generation_batch_size: 7,
        funding_target: 1_000_000,
        min_buffer: 10_000,
        transfers_per_second: 10_000,
        cooldown_min_ms: 1000,
        cooldown_max_ms: 1000,
        auto_scale: false,
        shuffle_on_select: false,
        batch_size: 4,
        ..Default::default()
    }
}

fn existing_records(ledger: &SimulatedLedger, count: usize) -> Vec<AccountRecord> {
    (0..count)
        .map(|i| {
            let (id, key) = ledger.generate_keypair();
            AccountRecord::new(id, key, format!("old-{}", i))
        })
        .collect()
}

#[tokio::test]
async fn test_pool_reaches_exact_target_with_unique_ids() {
    let _ = tracing_subscriber::fmt::try_init();

    for existing in [0, 1, 13, 29] {
        let ledger = Arc::new(SimulatedLedger::new());
        let store = MemoryStore::new(existing_records(&ledger, existing));
        let mut pool = PoolManager::new(base_config(30), ledger, store);

        let summary = pool.load_or_generate().await.unwrap();

        let ids: HashSet<&str> = pool.records().iter().map(|r| r.public_id.as_str()).collect();
        assert_eq!(pool.records().len(), 30, "starting from {}", existing);
        assert_eq!(ids.len(), 30, "duplicate ids starting from {}", existing);
        assert_eq!(summary.generated, 30 - existing);
    }
}

#[tokio::test]
async fn test_generated_pool_is_persisted() {
    let ledger = Arc::new(SimulatedLedger::new());
    let mut pool = PoolManager::new(base_config(10), ledger.clone(), MemoryStore::default());

    pool.load_or_generate().await.unwrap();

    assert_eq!(pool.store().save_count(), 1);
    let saved = pool.store().snapshot();
    assert_eq!(saved.as_slice(), pool.records());

    // A second start on the saved data generates nothing
    let mut reloaded = PoolManager::new(base_config(10), ledger, MemoryStore::new(saved.clone()));
    let summary = reloaded.load_or_generate().await.unwrap();

    assert_eq!(summary.generated, 0);
    assert_eq!(reloaded.records(), saved.as_slice());
}

#[tokio::test]
async fn test_startup_funds_pool_from_treasury() {
    let ledger = Arc::new(SimulatedLedger::new());
    let treasury_key = KeyMaterial::new("treasury-secret");
    let treasury_id = ledger.derive_public_id(&treasury_key).unwrap();
    ledger.set_balance(&treasury_id, 100_000_000);

    let records = existing_records(&ledger, 6);
    ledger.set_balance(&records[0].public_id, 900_000);
    ledger.set_balance(&records[1].public_id, 500_000);

    let config = PoolConfig {
        treasury_keys: vec![treasury_key.expose().to_string()],
        ..base_config(6)
    };
    let mut pool = PoolManager::new(config, ledger.clone(), MemoryStore::new(records.clone()));

    let summary = pool.load_or_generate().await.unwrap();

    assert_eq!(pool.treasury().len(), 1);
    assert_eq!(summary.funding.already_funded, 1);
    assert_eq!(summary.funding.funded, 5);
    assert_eq!(summary.funding.failed, 0);
    assert_eq!(pool.distributor().claimed_count(), 6);
    assert!(ledger.transfers_to(&records[0].public_id).is_empty());
    assert_eq!(ledger.transfers_to(&records[1].public_id)[0].amount, 500_000);
    assert_eq!(ledger.transfers_to(&records[2].public_id)[0].amount, 1_000_000);

    // Every account reached the target
    for r in &records {
        assert!(ledger.get_balance(&r.public_id).await.unwrap() >= 900_000);
    }
}

#[tokio::test]
async fn test_orchestrator_cycle_until_breaker_trips() {
    let ledger = Arc::new(SimulatedLedger::new());
    let config = PoolConfig {
        breaker: BreakerConfig {
            max_consecutive_failures: 3,
            failure_rate_window: 50,
            ..Default::default()
        },
        ..base_config(8)
    };
    let breaker_config = config.breaker.clone();
    let mut pool = PoolManager::with_random(
        config,
        ledger.clone(),
        MemoryStore::default(),
        Box::new(SequenceRandom::new(vec![0.0])),
    );
    pool.load_or_generate().await.unwrap();
    let mut breaker = CircuitBreaker::new(breaker_config, pool.sink().cloned());

    // Cycle 1: all succeed
    let batch = pool.select_active_batch(at(0));
    assert_eq!(batch.len(), 4);
    for r in &batch {
        pool.mark_used_at(&r.public_id, at(0));
        breaker.record_outcome(true);
    }
    assert!(!breaker.evaluate(ledger.as_ref()).await.tripped);

    // Cycle 2: the other half, all fail
    let batch = pool.select_active_batch(at(10));
    assert_eq!(batch.len(), 4);
    for r in &batch {
        pool.mark_used_at(&r.public_id, at(10));
        breaker.record_outcome(false);
    }

    let verdict = breaker.evaluate(ledger.as_ref()).await;
    assert!(verdict.tripped);
    assert!(verdict.reason.contains("Consecutive failures: 4"), "{}", verdict.reason);

    assert_eq!(pool.tracker().trade_count(&batch[0].public_id), 1);

    // Everyone is cooling down now
    assert!(pool.select_active_batch(at(20)).is_empty());
}
