//! # Cross-Node Determinism
//!
//! Validators never exchange payout tables. They agree only if every node
//! derives the same result hash from the same ledger, however its snapshot
//! happens to be iterated.

use super::fixtures::*;
use proptest::prelude::*;
use qc_18_dividend_distribution::{
    verify_proof, AccountEntry, ApplyPayout, InMemoryResultMapStore, LedgerSnapshotReader,
    RoundPools,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;

fn entries() -> Vec<AccountEntry> {
    ledger(500).snapshot().accounts().unwrap()
}

fn node(order: Vec<AccountEntry>) -> qc_18_dividend_distribution::ComputedRound<Arc<InMemoryResultMapStore>> {
    engine()
        .compute_round(
            &OrderedSnapshot {
                ledger_seq: 500,
                entries: order,
            },
            RoundPools::vbc(3_000_000),
            Arc::new(InMemoryResultMapStore::new()),
        )
        .unwrap()
}

#[test]
fn test_iteration_order_does_not_change_result_hash() {
    let forward = entries();
    let mut reversed = forward.clone();
    reversed.reverse();
    let mut shuffled = forward.clone();
    shuffled.shuffle(&mut StdRng::seed_from_u64(7));

    let a = node(forward);
    let b = node(reversed);
    let c = node(shuffled);

    assert_eq!(a.result_hash(), b.result_hash());
    assert_eq!(a.result_hash(), c.result_hash());
    assert_eq!(a.records, c.records);
    assert_eq!(a.header, c.header);
}

#[test]
fn test_proofs_verify_against_another_nodes_root() {
    let local = node(entries());
    let remote = node(entries());

    for record in local.records.iter().take(10) {
        let key = ApplyPayout::new(500, record.clone()).key();
        let proof = local.result_map.proof(&key).unwrap().unwrap();
        assert!(verify_proof(&remote.result_hash(), &proof));

        let mut forged = proof.clone();
        let mut inflated = record.clone();
        inflated.vbc_amount += 1;
        forged.value = ApplyPayout::new(500, inflated).encode();
        assert!(!verify_proof(&remote.result_hash(), &forged));
    }
}

#[test]
fn test_different_pools_disagree() {
    let a = node(entries());
    let b = engine()
        .compute_round(
            &OrderedSnapshot {
                ledger_seq: 500,
                entries: entries(),
            },
            RoundPools::vbc(3_000_001),
            Arc::new(InMemoryResultMapStore::new()),
        )
        .unwrap();

    assert_ne!(a.result_hash(), b.result_hash());
}

fn arbitrary_accounts() -> impl Strategy<Value = Vec<AccountEntry>> {
    prop::collection::vec((0u64..400_000, prop::option::of(0usize..64)), 1..60).prop_map(
        |rows| {
            let len = rows.len();
            rows.into_iter()
                .enumerate()
                .map(|(i, (holding, parent))| {
                    let entry = AccountEntry::new(account(i as u16 + 1), holding);
                    match parent {
                        Some(p) => entry.with_parent(account((p % len) as u16 + 1)),
                        None => entry,
                    }
                })
                .collect()
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_pools_are_conserved_exactly(
        accounts in arbitrary_accounts(),
        vbc in 0u64..5_000_000_000,
    ) {
        let round = engine()
            .compute_round(
                &OrderedSnapshot { ledger_seq: 9, entries: accounts },
                RoundPools::vbc(vbc),
                Arc::new(InMemoryResultMapStore::new()),
            )
            .unwrap();

        let coins: u128 = round.records.iter().map(|r| r.coin_amount as u128).sum();
        let paid: u128 = round.records.iter().map(|r| r.vbc_amount as u128).sum();
        prop_assert_eq!(coins, round.header.total_coins as u128);
        prop_assert_eq!(paid, vbc as u128);
    }

    #[test]
    fn prop_reversed_snapshot_agrees(accounts in arbitrary_accounts()) {
        let compute = |entries: Vec<AccountEntry>| {
            engine()
                .compute_round(
                    &OrderedSnapshot { ledger_seq: 9, entries },
                    RoundPools::vbc(1_000_000),
                    Arc::new(InMemoryResultMapStore::new()),
                )
                .unwrap()
                .result_hash()
        };
        let mut reversed = accounts.clone();
        reversed.reverse();

        prop_assert_eq!(compute(accounts), compute(reversed));
    }
}
