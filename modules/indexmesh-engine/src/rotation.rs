//! Account rotation policy (C7, §4.7): scores every configured account,
//! selects a rotation plan against a global request budget, and folds run
//! feedback back into each account's state. Grounded on the teacher's
//! `SourceScheduler` (weight/staleness-driven cadence selection) and
//! `BudgetTracker` (atomic spend accounting), generalized from "scrape
//! cadence" to "request allocation per tick".

use chrono::{DateTime, Utc};
use indexmesh_common::{AccountPriority, AccountRunOutcome, AccountState};

/// Consecutive failures at/above this threshold put an account on
/// cool-down: excluded from selection until staleness eventually
/// outweighs the penalty (§4.7 invariant: no account starves forever).
const COOLDOWN_FAILURE_THRESHOLD: u32 = 5;

/// Minimum viable allocation per selected account.
const MIN_ALLOCATION: u32 = 1;

fn priority_weight(p: AccountPriority) -> f64 {
    match p {
        AccountPriority::Low => 1.0,
        AccountPriority::Normal => 2.0,
        AccountPriority::High => 4.0,
    }
}

/// One account's score for this tick: priority dominates, staleness breaks
/// ties, failures apply a bounded penalty so they can never drive a score
/// to permanent exclusion outright (only cool-down does that, and
/// cool-down is itself lifted once staleness grows enough — see
/// [`is_on_cooldown`]).
fn score(state: &AccountState, now: DateTime<Utc>) -> f64 {
    let staleness_hours = state
        .last_attempted_at
        .map(|t| (now - t).num_hours().max(0) as f64)
        .unwrap_or(24.0 * 365.0); // never attempted: maximally stale

    let base = priority_weight(state.priority) * 100.0;
    let staleness_term = staleness_hours.min(24.0 * 30.0) * 0.5;
    let failure_penalty = (state.consecutive_failures as f64 * 5.0).min(80.0);
    let more_data_bonus = if state.has_more_data { 20.0 } else { 0.0 };

    base + staleness_term + more_data_bonus - failure_penalty
}

fn is_on_cooldown(state: &AccountState, now: DateTime<Utc>) -> bool {
    if state.consecutive_failures < COOLDOWN_FAILURE_THRESHOLD {
        return false;
    }
    // Cool-down window shrinks relative to failure streak length so a
    // long-failing account still eventually comes back up for retry
    // instead of being excluded forever.
    let window_hours = (state.consecutive_failures as i64) * 2;
    state
        .last_attempted_at
        .map(|t| (now - t).num_hours() < window_hours)
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct RotationPlanEntry {
    pub handle: String,
    pub allocated_requests: u32,
    pub reason: String,
}

/// Builds a rotation plan for one tick: which accounts to touch this run
/// and how many requests each gets, against a global budget `budget`.
pub fn plan(states: &[AccountState], budget: u32, now: DateTime<Utc>) -> Vec<RotationPlanEntry> {
    if budget == 0 {
        return Vec::new();
    }

    let mut eligible: Vec<(&AccountState, f64)> = states
        .iter()
        .filter(|s| !is_on_cooldown(s, now))
        .map(|s| (s, score(s, now)))
        .collect();

    eligible.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut selected = Vec::new();
    let mut committed = 0u32;
    for (state, sc) in eligible {
        if committed + MIN_ALLOCATION > budget {
            break;
        }
        committed += MIN_ALLOCATION;
        selected.push((state, sc));
    }

    if selected.is_empty() {
        return Vec::new();
    }

    let remaining = budget - committed;
    let priority_sum: f64 = selected.iter().map(|(s, _)| priority_weight(s.priority)).sum();

    let mut plan = Vec::with_capacity(selected.len());
    let mut distributed = 0u32;
    for (idx, (state, sc)) in selected.iter().enumerate() {
        let share = if idx == selected.len() - 1 {
            remaining - distributed
        } else {
            let proportional = (remaining as f64 * priority_weight(state.priority) / priority_sum).floor() as u32;
            distributed += proportional;
            proportional
        };
        plan.push(RotationPlanEntry {
            handle: state.handle.clone(),
            allocated_requests: MIN_ALLOCATION + share,
            reason: format!(
                "priority={:?} score={:.1} staleness_considered has_more_data={}",
                state.priority, sc, state.has_more_data
            ),
        });
    }

    plan
}

/// Folds one account's run outcome back into its persisted state (§4.7
/// feedback rules).
pub fn apply_feedback(state: &mut AccountState, outcome: &AccountRunOutcome, now: DateTime<Utc>) {
    state.last_attempted_at = Some(now);
    state.tweets_processed_last_run = outcome.processed;
    state.has_more_data = outcome.has_more_data;

    if outcome.was_completed {
        state.was_completed = true;
        state.last_completed_at = Some(now);
    } else {
        state.was_completed = false;
    }

    if outcome.requests_used == 0 && outcome.errors > 0 && !outcome.rate_limited {
        state.consecutive_failures += 1;
    } else if !outcome.rate_limited {
        state.consecutive_failures = 0;
    }
    // Rate limiting never touches the failure counter (§4.7, §7.3).
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(handle: &str, priority: AccountPriority) -> AccountState {
        AccountState::new(indexmesh_common::Source::Microblog, handle, priority)
    }

    #[test]
    fn empty_budget_yields_no_plan() {
        let states = vec![account("a", AccountPriority::High)];
        assert!(plan(&states, 0, Utc::now()).is_empty());
    }

    #[test]
    fn high_priority_beats_normal_when_equally_fresh() {
        let states = vec![account("low", AccountPriority::Low), account("high", AccountPriority::High)];
        let result = plan(&states, 1, Utc::now());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].handle, "high");
    }

    #[test]
    fn cooldown_excludes_repeatedly_failing_account_briefly() {
        let mut failing = account("bad", AccountPriority::High);
        failing.consecutive_failures = 10;
        failing.last_attempted_at = Some(Utc::now());
        let states = vec![failing];
        assert!(plan(&states, 5, Utc::now()).is_empty());
    }

    #[test]
    fn staleness_eventually_recovers_a_failing_account() {
        let mut failing = account("bad", AccountPriority::Low);
        failing.consecutive_failures = 5;
        failing.last_attempted_at = Some(Utc::now() - chrono::Duration::hours(100));
        let states = vec![failing];
        let result = plan(&states, 1, Utc::now());
        assert_eq!(result.len(), 1, "stale failing account should eventually re-enter rotation");
    }

    #[test]
    fn budget_is_never_overcommitted() {
        let states: Vec<AccountState> = (0..10).map(|i| account(&format!("h{i}"), AccountPriority::Normal)).collect();
        let result = plan(&states, 3, Utc::now());
        let total: u32 = result.iter().map(|e| e.allocated_requests).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn rate_limit_feedback_does_not_bump_failure_counter() {
        let mut state = account("a", AccountPriority::Normal);
        let outcome = AccountRunOutcome {
            handle: "a".to_string(),
            requests_used: 1,
            rate_limited: true,
            has_more_data: true,
            ..Default::default()
        };
        apply_feedback(&mut state, &outcome, Utc::now());
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn zero_requests_with_error_bumps_failure_counter() {
        let mut state = account("a", AccountPriority::Normal);
        let outcome = AccountRunOutcome {
            handle: "a".to_string(),
            requests_used: 0,
            errors: 1,
            ..Default::default()
        };
        apply_feedback(&mut state, &outcome, Utc::now());
        assert_eq!(state.consecutive_failures, 1);
    }
}
