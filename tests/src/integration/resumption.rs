//! # Crash and Resume
//!
//! A submitter that dies mid-round is replaced by a fresh one that only has
//! the ledger's dividend object and the persisted result map. The final
//! ledger must match an uninterrupted run, and no account is paid twice.

use super::fixtures::*;
use qc_18_dividend_distribution::{
    keccak256, ApplyPayout, ComputedRound, DividendError, InMemoryResultMapStore, RoundPools,
    RoundQuery, RoundState, RoundSubmitter, ResultMapStore,
};
use std::sync::Arc;

type Store = Arc<InMemoryResultMapStore>;

const VBC_POOL: u64 = 2_000_000;

fn compute(ledger: &SharedLedger, store: Store) -> ComputedRound<Store> {
    engine()
        .compute_round(ledger.snapshot().as_ref(), RoundPools::vbc(VBC_POOL), store)
        .unwrap()
}

async fn reference_run() -> SharedLedger {
    let ledger = ledger(300);
    let round = compute(&ledger, Arc::new(InMemoryResultMapStore::new()));
    RoundSubmitter::new(round, ledger.clone(), direct_sink(&ledger), keypair(), &config())
        .drive()
        .await
        .unwrap();
    ledger
}

#[tokio::test]
async fn test_resume_after_crash_matches_uninterrupted_run() {
    let reference = reference_run().await;

    let ledger = ledger(300);
    let store: Store = Arc::new(InMemoryResultMapStore::new());
    let round = compute(&ledger, store.clone());
    let expected_records = round.records.len();

    // Start plus five applies, then the node goes down.
    let crashed = Arc::new(CrashingSink::new(direct_sink(&ledger), 6));
    let result = RoundSubmitter::new(round, ledger.clone(), crashed.clone(), keypair(), &config())
        .drive()
        .await;
    assert!(matches!(result, Err(DividendError::StorageUnavailable(_))));

    let onchain = ledger.current_round().unwrap();
    assert_eq!(onchain.state, RoundState::Started);
    assert!(onchain.resume_point().is_some());

    let restarted = Arc::new(CrashingSink::new(direct_sink(&ledger), usize::MAX));
    let report = RoundSubmitter::resume(
        store,
        &onchain,
        ledger.clone(),
        restarted.clone(),
        keypair(),
        &config(),
    )
    .unwrap()
    .drive()
    .await
    .unwrap();

    assert!(!report.started);
    assert!(report.finished);
    assert_eq!(report.applied + 5, expected_records);

    let mut applied = crashed.applied.lock().clone();
    for (id, count) in restarted.applied.lock().iter() {
        *applied.entry(*id).or_default() += count;
    }
    assert_eq!(applied.len(), expected_records);
    assert!(applied.values().all(|&count| count == 1));

    assert_eq!(balances(&ledger), balances(&reference));
    assert_eq!(ledger.current_round().unwrap(), reference.current_round().unwrap());
}

#[tokio::test]
async fn test_repeated_crashes_still_converge() {
    let reference = reference_run().await;

    let ledger = ledger(300);
    let store: Store = Arc::new(InMemoryResultMapStore::new());
    let mut fresh = Some(compute(&ledger, store.clone()));

    let mut restarts = 0;
    loop {
        let sink = CrashingSink::new(direct_sink(&ledger), 3);
        let submitter = match fresh.take() {
            Some(round) => {
                RoundSubmitter::new(round, ledger.clone(), sink, keypair(), &config())
            }
            None => RoundSubmitter::resume(
                store.clone(),
                &ledger.current_round().unwrap(),
                ledger.clone(),
                sink,
                keypair(),
                &config(),
            )
            .unwrap(),
        };
        match submitter.drive().await {
            Ok(report) => {
                assert!(report.finished);
                break;
            }
            Err(error) => assert!(error.is_retryable()),
        }
        restarts += 1;
        assert!(restarts < 200, "submission made no progress");
    }

    assert!(restarts > 1);
    assert_eq!(balances(&ledger), balances(&reference));
    assert_eq!(ledger.current_round().unwrap().state, RoundState::Done);
}

#[tokio::test]
async fn test_lost_nodes_are_recovered_from_a_peer() {
    let reference = reference_run().await;

    let ledger = ledger(300);
    let local: Store = Arc::new(InMemoryResultMapStore::new());
    let peer: Store = Arc::new(InMemoryResultMapStore::new());
    let round = compute(&ledger, local.clone());
    let peer_round = compute(&ledger, peer.clone());
    assert_eq!(round.result_hash(), peer_round.result_hash());

    // Drop the leaves of a few records from the local store.
    let root = round.result_hash();
    for record in round.records.iter().step_by(3) {
        let key = ApplyPayout::new(300, record.clone()).key();
        let proof = round.result_map.proof(&key).unwrap().unwrap();
        let leaf = keccak256(proof.nodes.last().unwrap());
        local.remove_node(&leaf);
    }
    assert!(!local.missing_descendants(&root, 64).unwrap().is_empty());

    let result = RoundSubmitter::new(round, ledger.clone(), direct_sink(&ledger), keypair(), &config())
        .drive()
        .await;
    assert!(matches!(result, Err(DividendError::StorageUnavailable(_))));

    // Fetch whatever is missing from the peer until the map is whole.
    loop {
        let missing = local.missing_descendants(&root, 8).unwrap();
        if missing.is_empty() {
            break;
        }
        assert_eq!(local.import_from(peer.as_ref(), &missing).unwrap(), missing.len());
    }

    let onchain = ledger.current_round().unwrap();
    RoundSubmitter::resume(local, &onchain, ledger.clone(), direct_sink(&ledger), keypair(), &config())
        .unwrap()
        .drive()
        .await
        .unwrap();

    assert_eq!(balances(&ledger), balances(&reference));
}
