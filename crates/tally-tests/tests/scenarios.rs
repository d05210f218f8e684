//! End-to-end staking scenarios.
//!
//! Each test drives a ledger through a multi-period history and checks
//! balances against hand-computed values. Pools are sized so that
//! `reward_per_period` comes out round: with a ten-period horizon and `P`
//! undistributed, period 1 distributes `P / 9`.

use tally_core::config::LedgerConfig;
use tally_core::error::{AuthError, InputError, LedgerError};
use tally_ledger::periods::Series;
use tally_tests::helpers::{owner, staker, Harness, DAY};

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

#[test]
fn two_stakers_split_evenly() {
    let mut h = Harness::small();
    let (alice, bob) = (staker(0), staker(1));
    h.fund(270_000);
    h.stake(&alice, 50_000).unwrap();
    h.stake(&bob, 50_000).unwrap();

    h.advance_periods(2);
    assert_eq!(h.claim_now(&alice).unwrap(), 15_000);
    assert_eq!(h.claim_now(&bob).unwrap(), 15_000);

    assert_eq!(h.reward_per_period(0), 0);
    assert_eq!(h.reward_per_period(1), 30_000);
    assert_eq!(h.position(&alice), 65_000);
    assert_eq!(h.position(&bob), 65_000);
}

#[test]
fn sole_staker_compounds_every_period() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.fund(9_000);
    h.stake(&alice, 1_000).unwrap();

    h.advance_periods(4);
    assert_eq!(h.claim_now(&alice).unwrap(), 3_000);
    assert_eq!(h.position(&alice), 4_000);
    for p in 1..4 {
        assert_eq!(h.reward_per_period(p), 1_000);
    }
}

#[test]
fn ten_stakers_split_equally() {
    let mut h = Harness::small();
    h.fund(90_000);
    for i in 0..10 {
        h.stake(&staker(i), 1_000).unwrap();
    }

    h.advance_periods(2);
    for i in 0..10 {
        assert_eq!(h.claim_now(&staker(i)).unwrap(), 1_000);
    }
    assert_eq!(h.ledger.total_staking_balance(2, Series::Unweighted).unwrap(), 20_000);
}

#[test]
fn stake_earns_from_the_next_period() {
    let mut h = Harness::small();
    let (alice, bob) = (staker(0), staker(1));
    h.fund(90_000);
    h.stake(&alice, 10_000).unwrap();
    h.advance_periods(1);
    h.stake(&bob, 10_000).unwrap();

    // Period 1: only alice was earning.
    h.advance_periods(1);
    assert_eq!(h.reward_per_period(1), 10_000);
    assert_eq!(h.claim_now(&alice).unwrap(), 10_000);
    assert_eq!(h.claim_now(&bob).unwrap(), 0);
}

#[test]
fn pool_growth_raises_future_rewards_only() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.fund(9_000);
    h.stake(&alice, 1_000).unwrap();
    h.advance_periods(2);
    h.ledger.handle_new_period(2).unwrap();
    assert_eq!(h.reward_per_period(1), 1_000);

    h.fund(8_000);
    h.advance_periods(1);
    h.ledger.handle_new_period(3).unwrap();
    assert_eq!(h.reward_per_period(1), 1_000);
    assert_eq!(h.reward_per_period(2), 2_000);
}

#[test]
fn horizon_caps_total_distribution() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.fund(9_000);
    h.stake(&alice, 1_000).unwrap();

    h.advance_periods(25);
    assert_eq!(h.claim_now(&alice).unwrap(), 9_000);
    assert_eq!(h.position(&alice), 10_000);
    assert_eq!(h.reward_per_period(12), 0);
    assert_eq!(h.ledger.surplus().unwrap(), 0);
}

#[test]
fn forecast_matches_later_claim() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.fund(9_000);
    h.stake(&alice, 1_000).unwrap();
    h.advance_periods(2);
    h.ledger.handle_new_period(2).unwrap();

    let forecast = h.ledger.calculate_rewards(&alice, 5).unwrap();
    assert_eq!(forecast.reward, 4_000);

    h.advance_periods(3);
    assert_eq!(h.claim_now(&alice).unwrap(), forecast.reward);
}

#[test]
fn claim_twice_is_a_no_op() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.fund(9_000);
    h.stake(&alice, 1_000).unwrap();
    h.advance_periods(3);

    assert!(h.claim_now(&alice).unwrap() > 0);
    let after_first = h.ledger.stakeholder(&alice).cloned();
    let totals = h.ledger.total_staking_balance(3, Series::Weighted).unwrap();
    assert_eq!(h.claim_now(&alice).unwrap(), 0);
    assert_eq!(h.ledger.stakeholder(&alice).cloned(), after_first);
    assert_eq!(h.ledger.total_staking_balance(3, Series::Weighted).unwrap(), totals);
}

#[test]
fn claim_to_wallet_keeps_locked_part() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.fund(9_000);
    h.stake(&alice, 1_000).unwrap();
    h.advance_periods(3);

    // The whole history sits in one lock window: nothing is paid.
    let outcome = h.ledger.claim_rewards(&alice, 3, true).unwrap();
    assert_eq!(outcome.reward, 2_000);
    assert_eq!(outcome.paid, 0);
    assert_eq!(h.balance(&alice), 0);
}

// ---------------------------------------------------------------------------
// Lock window
// ---------------------------------------------------------------------------

fn windowed(k: u64) -> Harness {
    Harness::new(LedgerConfig {
        max_number_of_periods: 10,
        reward_period_duration: DAY,
        periods_for_extra_reward: k,
        cooldown: 10 * DAY,
        ..LedgerConfig::default()
    })
}

#[test]
fn jump_across_boundaries_locks_only_latest_window() {
    let mut h = windowed(2);
    let alice = staker(0);
    h.fund(9_000);
    h.stake(&alice, 1_000).unwrap();
    h.advance_periods(5);

    let outcome = h.ledger.claim_rewards(&alice, 5, false).unwrap();
    // Steps 4 and 5 lie in window 2 with the target.
    assert_eq!(outcome.reward, 4_000);
    assert_eq!(outcome.locked_rewards, 2_000);
    assert_eq!(h.ledger.stakeholder(&alice).unwrap().withdrawable(), 3_000);
}

#[test]
fn crossing_one_boundary_unlocks_the_prior_block() {
    let mut h = windowed(2);
    let alice = staker(0);
    h.fund(9_000);
    h.stake(&alice, 1_000).unwrap();
    h.advance_periods(5);
    h.ledger.claim_rewards(&alice, 5, false).unwrap();

    h.advance_periods(1);
    let outcome = h.ledger.claim_rewards(&alice, 6, false).unwrap();
    assert_eq!(outcome.reward, 1_000);
    assert_eq!(outcome.locked_rewards, 1_000);
    assert_eq!(h.ledger.stakeholder(&alice).unwrap().withdrawable(), 5_000);
}

#[test]
fn claims_within_one_window_accumulate_lock() {
    let mut h = windowed(4);
    let alice = staker(0);
    h.fund(9_000);
    h.stake(&alice, 1_000).unwrap();
    h.advance_periods(5);
    // Steps 4 and 5 open window 1.
    assert_eq!(h.ledger.claim_rewards(&alice, 5, false).unwrap().locked_rewards, 2_000);

    h.advance_periods(1);
    assert_eq!(h.ledger.claim_rewards(&alice, 6, false).unwrap().locked_rewards, 3_000);
}

#[test]
fn locked_totals_follow_the_window() {
    let mut h = windowed(2);
    let alice = staker(0);
    h.fund(9_000);
    h.stake(&alice, 1_000).unwrap();
    h.advance_periods(5);
    h.ledger.handle_new_period(5).unwrap();

    assert_eq!(h.ledger.total_locked_rewards(4), 1_000);
    assert_eq!(h.ledger.total_locked_rewards(5), 2_000);
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

#[test]
fn weight_two_earns_three_times_weight_zero() {
    let mut h = Harness::small();
    let (alice, bob) = (staker(0), staker(1));
    h.fund(108_000);
    h.stake(&alice, 1_000).unwrap();
    h.stake(&bob, 1_000).unwrap();
    h.grant_weight(&bob, 2).unwrap();

    assert_eq!(h.ledger.weight_count(0), 1);
    assert_eq!(h.ledger.weight_count(2), 1);
    assert_eq!(h.ledger.total_new_stake(Series::Weighted).unwrap(), 4_000);

    h.advance_periods(2);
    assert_eq!(h.reward_per_period(1), 12_000);
    assert_eq!(h.claim_now(&alice).unwrap(), 3_000);
    assert_eq!(h.claim_now(&bob).unwrap(), 9_000);
}

#[test]
fn zero_multiplier_ignores_weight() {
    let mut h = Harness::small();
    let (alice, bob) = (staker(0), staker(1));
    h.fund(108_000);
    h.stake(&alice, 1_000).unwrap();
    h.stake(&bob, 1_000).unwrap();
    h.grant_weight(&bob, 2).unwrap();
    h.ledger.set_extra_reward_multiplier(&owner(), 0).unwrap();

    h.advance_periods(2);
    assert_eq!(h.claim_now(&alice).unwrap(), 6_000);
    assert_eq!(h.claim_now(&bob).unwrap(), 6_000);
}

#[test]
fn weight_change_applies_from_the_current_period() {
    let mut h = Harness::small();
    let (alice, bob) = (staker(0), staker(1));
    h.fund(108_000);
    h.stake(&alice, 1_000).unwrap();
    h.stake(&bob, 1_000).unwrap();
    h.advance_periods(2);
    h.grant_weight(&bob, 2).unwrap();

    // Period 1 was split evenly; bob's new weight was settled before it changed.
    let bob_sh = h.ledger.stakeholder(&bob).unwrap();
    assert_eq!(bob_sh.last_claimed, 2);
    assert_eq!(bob_sh.staking_balance, 7_000);
    assert_eq!(h.ledger.reward_period(2).unwrap().max_weight, 2);
    assert_eq!(h.claim_now(&alice).unwrap(), 6_000);
}

#[test]
fn owner_batch_sets_and_lowers_weights() {
    let mut h = Harness::small();
    let (alice, bob) = (staker(0), staker(1));
    h.stake(&alice, 1_000).unwrap();
    h.stake(&bob, 1_000).unwrap();

    h.ledger.update_weight_batch(&owner(), &[alice, bob], &[3, 1]).unwrap();
    assert_eq!(h.ledger.reward_period(0).unwrap().max_weight, 3);
    h.ledger.update_weight_batch(&owner(), &[alice], &[0]).unwrap();
    assert_eq!(h.ledger.reward_period(0).unwrap().max_weight, 1);
    assert_eq!(h.ledger.weight_count(0), 1);
    assert_eq!(h.ledger.weight_count(1), 1);
}

#[test]
fn mismatched_weight_batch_reverts() {
    let mut h = Harness::small();
    let (alice, bob) = (staker(0), staker(1));
    h.stake(&alice, 1_000).unwrap();

    let err = h.ledger.update_weight_batch(&owner(), &[alice, bob], &[2]).unwrap_err();
    assert_eq!(err, LedgerError::Input(InputError::LengthMismatch { addresses: 2, weights: 1 }));
    assert_eq!(h.ledger.stakeholder(&alice).unwrap().weight, 0);
    assert!(h.ledger.stakeholder(&bob).is_none());
}

#[test]
fn weight_batch_is_owner_only() {
    let mut h = Harness::small();
    let alice = staker(0);
    let err = h.ledger.update_weight_batch(&alice, &[alice], &[5]).unwrap_err();
    assert_eq!(err, LedgerError::Auth(AuthError::NotOwner(alice)));
}

#[test]
fn replaced_authorizer_rejects_old_grants() {
    let mut h = Harness::small();
    let alice = staker(0);
    let other = tally_core::crypto::GrantSigner::from_secret_bytes([9u8; 32]);
    h.ledger.set_authorizer(&owner(), std::sync::Arc::new(other.authorizer())).unwrap();

    assert!(matches!(h.grant_weight(&alice, 1), Err(LedgerError::Auth(AuthError::InvalidProof { .. }))));
    let proof = other.sign_grant(&h.ledger_address(), &alice, 1);
    h.ledger.increase_weight(&alice, 1, &proof).unwrap();
}

// ---------------------------------------------------------------------------
// Withdrawals
// ---------------------------------------------------------------------------

#[test]
fn instant_withdrawal_pays_amount_minus_fee() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.stake(&alice, 1_000_000).unwrap();
    h.advance_periods(2);

    let before = h.ledger_balance();
    let outcome = h.ledger.request_withdrawal(&alice, 500_000, true, true).unwrap();
    assert_eq!(outcome.fee, 50_000);
    assert_eq!(outcome.paid, 450_000);
    assert_eq!(h.balance(&alice), 450_000);
    assert_eq!(h.ledger_balance(), before - 450_000);
    assert_eq!(h.ledger.total_staking_balance(2, Series::Unweighted).unwrap(), 500_000);
}

#[test]
fn oversized_request_clamps() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.stake(&alice, 1_000).unwrap();
    h.advance_periods(1);

    let outcome = h.ledger.request_withdrawal(&alice, 1_000_000, false, true).unwrap();
    assert_eq!(outcome.withdrawn, 1_000);
    assert_eq!(h.ledger.withdrawal(&alice, 0).unwrap().release_amount, 1_000);
    assert!(!h.ledger.is_active(&alice));
    assert_eq!(h.ledger.weight_count(0), 0);
}

#[test]
fn withdrawal_without_claim_keeps_accrued_rewards() {
    let mut h = Harness::small();
    let (alice, bob) = (staker(0), staker(1));
    h.fund(90_000);
    h.stake(&alice, 10_000).unwrap();
    h.stake(&bob, 10_000).unwrap();
    h.advance_periods(3);

    // Periods 1 and 2 each pay 10_000, split evenly.
    let outcome = h.ledger.request_withdrawal(&alice, 5_000, false, false).unwrap();
    assert_eq!(outcome.withdrawn, 5_000);
    let sh = h.ledger.stakeholder(&alice).unwrap();
    assert_eq!(sh.last_claimed, 3);
    assert_eq!(sh.staking_balance, 15_000);
    assert_eq!(sh.locked_rewards, 10_000);

    let rest = h.ledger.request_withdrawal(&alice, u128::MAX, false, false).unwrap();
    assert_eq!(rest.withdrawn, 5_000);
    assert!(h.ledger.is_active(&alice));
    assert_eq!(h.position(&alice), 10_000);

    assert_eq!(h.claim_now(&bob).unwrap(), 10_000);
    let total = h.ledger.total_staking_balance(3, Series::Unweighted).unwrap();
    assert_eq!(total, 30_000);
    assert_eq!(total, h.position(&alice) + h.position(&bob));
    assert_eq!(h.ledger.pending_withdrawals(), 10_000);
}

#[test]
fn claim_first_widens_the_withdrawal_cap() {
    fn run(claim_first: bool) -> (u128, u128) {
        let mut h = Harness::new(LedgerConfig {
            max_number_of_periods: 10,
            reward_period_duration: DAY,
            periods_for_extra_reward: 1,
            cooldown: 10 * DAY,
            ..LedgerConfig::default()
        });
        let alice = staker(0);
        h.fund(9_000);
        h.stake(&alice, 1_000).unwrap();
        h.advance_periods(3);
        let outcome = h.ledger.request_withdrawal(&alice, u128::MAX, false, claim_first).unwrap();
        (outcome.withdrawn, h.position(&alice))
    }

    // Reward 2_000 of which the last step's 1_000 is locked.
    assert_eq!(run(true), (2_000, 1_000));
    // Without claiming, only the balance held before settling may leave.
    assert_eq!(run(false), (1_000, 2_000));
}

#[test]
fn withdrawal_of_nothing_is_silent() {
    let mut h = Harness::small();
    let ghost = staker(7);
    let outcome = h.ledger.request_withdrawal(&ghost, 100, true, true).unwrap();
    assert_eq!(outcome.withdrawn, 0);
    assert_eq!(h.balance(&ghost), 0);
}

#[test]
fn matured_request_pays_in_full() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.stake(&alice, 1_000).unwrap();
    h.advance_periods(1);
    h.ledger.request_withdrawal(&alice, 400, false, true).unwrap();

    h.advance_seconds(10 * DAY);
    let payout = h.ledger.withdraw_funds(&alice, 0).unwrap();
    assert_eq!(payout.amount, 400);
    assert_eq!(payout.fee, 0);
    assert_eq!(h.ledger.withdrawal_count(&alice), 0);
    assert_eq!(h.ledger.pending_withdrawals(), 0);
}

#[test]
fn half_cooldown_pays_half_the_fee() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.stake(&alice, 1_000_000).unwrap();
    h.advance_periods(1);
    h.ledger.request_withdrawal(&alice, 400_000, false, true).unwrap();

    h.advance_seconds(5 * DAY);
    let payout = h.ledger.withdraw_funds(&alice, 0).unwrap();
    assert_eq!(payout.fee, 20_000);
    assert_eq!(payout.amount, 380_000);
    assert_eq!(h.balance(&alice), 380_000);
}

#[test]
fn queue_drains_fifo_and_lifo() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.stake(&alice, 1_000).unwrap();
    h.advance_periods(1);
    for amount in [100, 200, 300, 350] {
        h.ledger.request_withdrawal(&alice, amount, false, true).unwrap();
    }
    assert_eq!(h.ledger.withdrawal_count(&alice), 4);
    h.advance_seconds(10 * DAY);

    // FIFO: index 0 repeatedly.
    assert_eq!(h.ledger.withdraw_funds(&alice, 0).unwrap().amount, 100);
    assert_eq!(h.ledger.withdrawal(&alice, 0).unwrap().release_amount, 200);
    // LIFO: last index.
    let last = h.ledger.withdrawal_count(&alice) - 1;
    assert_eq!(h.ledger.withdraw_funds(&alice, last).unwrap().amount, 350);
    // Middle removal shifts later entries down.
    assert_eq!(h.ledger.withdraw_funds(&alice, 0).unwrap().amount, 200);
    assert_eq!(h.ledger.withdrawal(&alice, 0).unwrap().release_amount, 300);
    assert_eq!(h.ledger.withdraw_funds(&alice, 0).unwrap().amount, 300);

    let err = h.ledger.withdraw_funds(&alice, 0).unwrap_err();
    assert_eq!(err, LedgerError::Input(InputError::InvalidRequestIndex { index: 0, len: 0 }));
    assert_eq!(h.balance(&alice), 950);
}

#[test]
fn request_snapshots_fee_terms() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.stake(&alice, 1_000_000).unwrap();
    h.advance_periods(1);
    h.ledger.request_withdrawal(&alice, 100_000, false, true).unwrap();
    h.ledger.set_early_withdrawal_fee(&owner(), 0).unwrap();
    h.ledger.set_cooldown(&owner(), 0).unwrap();

    let payout = h.ledger.withdraw_funds(&alice, 0).unwrap();
    assert_eq!(payout.fee, 10_000);
}

#[test]
fn queued_funds_are_not_distributed() {
    let mut h = Harness::small();
    let (alice, bob) = (staker(0), staker(1));
    h.stake(&alice, 9_000).unwrap();
    h.stake(&bob, 1_000).unwrap();
    h.advance_periods(1);
    h.ledger.request_withdrawal(&alice, 9_000, false, true).unwrap();

    h.advance_periods(1);
    h.ledger.handle_new_period(2).unwrap();
    assert_eq!(h.reward_per_period(1), 0);
    assert_eq!(h.ledger.surplus().unwrap(), 0);
}

#[test]
fn reactivation_starts_fresh() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.stake(&alice, 1_000).unwrap();
    h.ledger.request_withdrawal(&alice, 1_000, true, false).unwrap();
    assert!(!h.ledger.is_active(&alice));

    h.advance_periods(3);
    h.stake(&alice, 500).unwrap();
    let sh = h.ledger.stakeholder(&alice).unwrap();
    assert_eq!(sh.last_claimed, 3);
    assert_eq!(sh.new_stake, 500);
    assert!(sh.start_date > 0);
    assert_eq!(h.ledger.weight_count(0), 1);
}

// ---------------------------------------------------------------------------
// Owner and keeper
// ---------------------------------------------------------------------------

#[test]
fn owner_sweep_clamps_to_surplus() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.fund(5_000);
    h.stake(&alice, 1_000).unwrap();

    let paid = h.ledger.withdraw_remaining_funds(&owner(), 10_000).unwrap();
    assert_eq!(paid, 5_000);
    assert_eq!(h.balance(&owner()), 5_000);
    assert_eq!(h.ledger_balance(), 1_000);
}

#[test]
fn keeper_pins_elapsed_periods() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.fund(9_000);
    h.stake(&alice, 1_000).unwrap();
    assert!(!h.ledger.upkeep_needed());

    h.advance_periods(3);
    assert!(h.ledger.upkeep_needed());
    assert!(h.ledger.perform_upkeep().unwrap());
    assert_eq!(h.ledger.latest_reward_period(), 3);
    assert!(!h.ledger.perform_upkeep().unwrap());
}

#[test]
fn config_setters_round_trip() {
    let mut h = Harness::small();
    h.ledger.set_max_number_of_periods(&owner(), 20).unwrap();
    h.ledger.set_cooldown(&owner(), 3 * DAY).unwrap();
    h.ledger.set_early_withdrawal_fee(&owner(), 1_000_000).unwrap();
    h.ledger.set_extra_reward_multiplier(&owner(), 500_000).unwrap();

    let cfg = h.ledger.config();
    assert_eq!(cfg.max_number_of_periods, 20);
    assert_eq!(cfg.cooldown, 3 * DAY);
    assert_eq!(cfg.early_withdrawal_fee, 1_000_000);
    assert_eq!(cfg.extra_reward_multiplier, 500_000);
}

#[test]
fn shrinking_horizon_raises_reward_rate() {
    let mut h = Harness::small();
    let alice = staker(0);
    h.fund(9_000);
    h.stake(&alice, 1_000).unwrap();
    h.advance_periods(1);
    h.ledger.set_max_number_of_periods(&owner(), 4).unwrap();

    h.advance_periods(1);
    h.ledger.handle_new_period(2).unwrap();
    assert_eq!(h.reward_per_period(1), 3_000);
}
