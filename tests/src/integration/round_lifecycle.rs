//! # Round Lifecycle
//!
//! Snapshot, background computation, hand-off, Start/Apply/Done against the
//! ledger state machine, and what the ledger looks like afterwards.

use super::fixtures::*;
use qc_18_dividend_distribution::{
    verify_proof, ApplyPayout, ControllerKeypair, DividendError, InMemoryLedger,
    InMemoryResultMapStore, RoundPools, RoundQuery, RoundState, RoundSubmitter, RoundWorker,
};
use std::collections::HashMap;
use std::sync::Arc;

type Store = Arc<InMemoryResultMapStore>;

#[tokio::test]
async fn test_round_lifecycle_conserves_pools() {
    let ledger = ledger(100);
    let (coins_before, vbc_before) = totals(&ledger);

    let (worker, mut handoff) = RoundWorker::<Store>::new(Arc::new(engine()), 2);
    let summary = worker
        .compute(
            ledger.snapshot(),
            RoundPools::vbc(1_000_000),
            Arc::new(InMemoryResultMapStore::new()),
        )
        .await
        .unwrap();
    let round = handoff.recv().await.unwrap();
    assert_eq!(round.summary(), summary);

    // every record is provable against the agreed hash
    for record in &round.records {
        let key = ApplyPayout::new(100, record.clone()).key();
        let proof = round.result_map.proof(&key).unwrap().unwrap();
        assert!(verify_proof(&round.result_hash(), &proof));
    }

    let header = round.header.clone();
    let records = round.records.clone();
    let submitter =
        RoundSubmitter::new(round, ledger.clone(), direct_sink(&ledger), keypair(), &config());
    let report = submitter.drive().await.unwrap();

    assert!(report.started && report.finished);
    assert_eq!(report.applied, records.len());
    assert!(report.rejected.is_empty());

    let (coins_after, vbc_after) = totals(&ledger);
    assert_eq!(coins_after - coins_before, header.total_coins as u128);
    assert_eq!(vbc_after - vbc_before, 1_000_000);

    let onchain = ledger.current_round().unwrap();
    assert_eq!(onchain.state, RoundState::Done);
    assert_eq!(onchain.result_hash, header.result_hash);
    assert_eq!(onchain.sum_rank, header.sum_rank);
    assert_eq!(onchain.sum_spread, header.sum_spread);

    for record in &records {
        let stamp = ledger.account_dividend(&record.account_id).unwrap();
        assert_eq!(stamp, Some(record.stamp(100)));
    }
}

#[tokio::test]
async fn test_consecutive_rounds() {
    let ledger = ledger(100);
    let engine = engine();

    for seq in [100, 101] {
        assert_eq!(ledger.ledger_seq(), seq);
        let round = engine
            .compute_round(
                ledger.snapshot().as_ref(),
                RoundPools::vbc(50_000),
                Arc::new(InMemoryResultMapStore::new()),
            )
            .unwrap();
        let paid: Vec<_> = round.records.iter().map(|r| r.account_id).collect();

        RoundSubmitter::new(round, ledger.clone(), direct_sink(&ledger), keypair(), &config())
            .drive()
            .await
            .unwrap();

        let onchain = ledger.current_round().unwrap();
        assert_eq!((onchain.state, onchain.ledger_seq), (RoundState::Done, seq));
        for id in paid {
            let stamp = ledger.account_dividend(&id).unwrap().unwrap();
            assert_eq!(stamp.ledger_seq, seq);
        }
        ledger.advance();
    }
}

#[tokio::test]
async fn test_foreign_controller_cannot_start() {
    let ledger = ledger(100);
    let before = balances(&ledger);
    let round = engine()
        .compute_round(
            ledger.snapshot().as_ref(),
            RoundPools::vbc(1_000),
            Arc::new(InMemoryResultMapStore::new()),
        )
        .unwrap();

    let intruder = ControllerKeypair::from_seed([0x66; 32]);
    let result =
        RoundSubmitter::new(round, ledger.clone(), direct_sink(&ledger), intruder, &config())
            .drive()
            .await;

    assert!(matches!(result, Err(DividendError::Unauthorized(_))));
    assert_eq!(ledger.current_round().unwrap().state, RoundState::Idle);
    assert_eq!(balances(&ledger), before);
}

#[tokio::test]
async fn test_conflicting_round_for_same_ledger_rejected() {
    let ledger = ledger(100);
    let snapshot = ledger.snapshot();
    let compute = |vbc| {
        engine()
            .compute_round(
                snapshot.as_ref(),
                RoundPools::vbc(vbc),
                Arc::new(InMemoryResultMapStore::new()),
            )
            .unwrap()
    };

    RoundSubmitter::new(compute(10_000), ledger.clone(), direct_sink(&ledger), keypair(), &config())
        .drive()
        .await
        .unwrap();
    let after_first = balances(&ledger);

    let result =
        RoundSubmitter::new(compute(20_000), ledger.clone(), direct_sink(&ledger), keypair(), &config())
            .drive()
            .await;

    assert!(matches!(result, Err(DividendError::RoundStateConflict { .. })));
    assert_eq!(balances(&ledger), after_first);
}

#[tokio::test]
async fn test_identical_round_after_done_is_a_no_op() {
    let ledger = ledger(100);
    let snapshot = ledger.snapshot();
    let compute = || {
        engine()
            .compute_round(
                snapshot.as_ref(),
                RoundPools::vbc(10_000),
                Arc::new(InMemoryResultMapStore::new()),
            )
            .unwrap()
    };

    RoundSubmitter::new(compute(), ledger.clone(), direct_sink(&ledger), keypair(), &config())
        .drive()
        .await
        .unwrap();
    let after_first = balances(&ledger);

    let report = RoundSubmitter::new(compute(), ledger.clone(), direct_sink(&ledger), keypair(), &config())
        .drive()
        .await
        .unwrap();

    assert!(report.finished);
    assert_eq!(report.applied, 0);
    assert_eq!(balances(&ledger), after_first);
}

#[tokio::test]
async fn test_payout_to_missing_account_is_rejected_once_and_round_finishes() {
    let accounts = tree_accounts()
        .into_iter()
        .filter(|a| a.account_id != REMAINDER)
        .collect();
    let ledger: SharedLedger = Arc::new(InMemoryLedger::with_accounts(100, accounts));
    let before = balances(&ledger);

    // An explicit coin pool above the payouts always leaves a remainder.
    let round = engine()
        .compute_round(
            ledger.snapshot().as_ref(),
            RoundPools {
                total_coins: Some(1_000_000_000),
                total_coins_vbc: 1_000_000,
            },
            Arc::new(InMemoryResultMapStore::new()),
        )
        .unwrap();
    assert!(round.remaining_coins > 0);
    let records: HashMap<_, _> = round
        .records
        .iter()
        .filter(|r| r.account_id != REMAINDER)
        .map(|r| (r.account_id, r.clone()))
        .collect();

    let report = RoundSubmitter::new(round, ledger.clone(), direct_sink(&ledger), keypair(), &config())
        .drive()
        .await
        .unwrap();

    assert!(report.finished);
    assert_eq!(report.applied, records.len());
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].account, hex::encode(REMAINDER));
    assert!(report.rejected[0].reason.starts_with("Unknown account"));
    assert_eq!(ledger.current_round().unwrap().state, RoundState::Done);

    let after = balances(&ledger);
    assert_eq!(after.len(), before.len());
    for ((id, coins, vbc), (after_id, coins_now, vbc_now)) in before.into_iter().zip(after) {
        assert_eq!(id, after_id);
        let (paid_coins, paid_vbc) = records
            .get(&id)
            .map_or((0, 0), |r| (r.coin_amount, r.vbc_amount));
        assert_eq!((coins_now, vbc_now), (coins + paid_coins, vbc + paid_vbc));
    }
}
