//! Integration test: APR Controller runs end to end.
//!
//! 1. Tier target above the bound is clamped and committed
//! 2. A run during the cooldown changes nothing
//! 3. Rates stay inside the bounds for every deposit level
//! 4. A ledger-side rejection leaves the rate and the audit log untouched
//! 5. Consecutive adjustments push the cooldown forward

use keeper_apr::controller::{adjust, AprController};
use keeper_apr::policy::{AprPolicy, AprTier};
use keeper_apr::AprError;
use keeper_ledger::memory::MemoryLedger;
use keeper_ledger::AprInfo;
use keeper_store::log::AppendLog;
use keeper_store::Store;
use keeper_types::{Address, ErrorClass, VaultState};

const DAY: u64 = 86_400;

fn policy() -> AprPolicy {
    AprPolicy::new(
        1000,
        3000,
        DAY,
        vec![
            AprTier {
                min_deposit: 0,
                apr_bps: 3500,
            },
            AprTier {
                min_deposit: 1_000_000,
                apr_bps: 2500,
            },
            AprTier {
                min_deposit: 50_000_000,
                apr_bps: 800,
            },
        ],
    )
    .expect("valid policy")
}

fn ledger(current: u32, next_adjustment_time: u64, total_deposited: u128) -> MemoryLedger {
    let ledger = MemoryLedger::new(Address::new([0xaa; 20]));
    ledger.set_apr_info(AprInfo {
        current_apr_bps: current,
        next_adjustment_time,
        total_deposited,
    });
    ledger
}

#[tokio::test]
async fn tier_above_max_is_clamped() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let mut store = Store::open(tmp.path()).expect("open store");
    let ledger = ledger(2000, 1_000, 10);
    let policy = policy();

    let record = AprController::new(&ledger, &policy, &mut store.adjustments)
        .run(1_000)
        .await
        .expect("adjustment should commit");

    assert_eq!(record.previous_apr, 2000);
    assert_eq!(record.new_apr, 3000);
    assert_eq!(record.triggering_deposit, 10);
    assert_eq!(ledger.apr().current_apr_bps, 3000);
    assert_eq!(ledger.apr().next_adjustment_time, 1_000 + DAY);

    let log = store.adjustments.entries().expect("read adjustments");
    assert_eq!(log, vec![record]);
}

#[tokio::test]
async fn cooldown_leaves_state_unchanged() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let mut store = Store::open(tmp.path()).expect("open store");
    let ledger = ledger(2000, 5_000, 10);
    let policy = policy();

    let err = AprController::new(&ledger, &policy, &mut store.adjustments)
        .run(4_999)
        .await
        .expect_err("cooldown active");

    assert!(matches!(
        err,
        AprError::CooldownActive {
            remaining_secs: 1,
            next_adjustment_time: 5_000
        }
    ));
    assert_eq!(err.class(), ErrorClass::CooldownActive);
    assert_eq!(err.class().exit_code(), 0);
    assert_eq!(ledger.apr().current_apr_bps, 2000);
    assert_eq!(ledger.apr().next_adjustment_time, 5_000);
    assert!(ledger.adjustments().is_empty());
    assert!(store.adjustments.entries().expect("read").is_empty());
}

#[test]
fn rate_always_within_bounds() {
    let policy = policy();
    let state = policy.apr_state(2000, 0);
    for deposit in [0u128, 1, 999_999, 1_000_000, 49_999_999, 50_000_000, u128::MAX] {
        let vault = VaultState {
            total_deposited: deposit,
            as_of: 0,
        };
        let adjustment = adjust(&policy, 0, &vault, &state).expect("eligible");
        assert!(
            (1000..=3000).contains(&adjustment.new_apr_bps),
            "deposit {deposit} gave {}",
            adjustment.new_apr_bps
        );
    }
}

#[tokio::test]
async fn ledger_rejection_is_transaction_failure() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let mut store = Store::open(tmp.path()).expect("open store");
    let ledger = ledger(2000, 0, 2_000_000);
    ledger.reject_adjustment("AccessControl: missing role");
    let policy = policy();

    let err = AprController::new(&ledger, &policy, &mut store.adjustments)
        .run(10)
        .await
        .expect_err("rejected");

    assert_eq!(err.class(), ErrorClass::TransactionFailure);
    assert_eq!(ledger.apr().current_apr_bps, 2000);
    assert!(store.adjustments.entries().expect("read").is_empty());
}

#[tokio::test]
async fn cooldown_advances_across_runs() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let mut store = Store::open(tmp.path()).expect("open store");
    let ledger = ledger(2000, 0, 2_000_000);
    ledger.set_ledger_now(0);
    let policy = policy();

    let first = AprController::new(&ledger, &policy, &mut store.adjustments)
        .run(0)
        .await
        .expect("first");
    assert_eq!(first.new_apr, 2500);

    // Deposits grow past the top tier; the next window opens a day later.
    ledger.set_apr_info(AprInfo {
        total_deposited: 60_000_000,
        ..ledger.apr()
    });
    ledger.set_ledger_now(DAY);
    let second = AprController::new(&ledger, &policy, &mut store.adjustments)
        .run(DAY)
        .await
        .expect("second");
    assert_eq!(second.previous_apr, 2500);
    assert_eq!(second.new_apr, 1000);
    assert!(second.next_adjustment_time >= first.next_adjustment_time);

    let log = store.adjustments.entries().expect("read adjustments");
    assert_eq!(log.len(), 2);
}
