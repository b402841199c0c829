use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use super::random::{UniformSource, trial_rng};
use super::regime::{
    RegimeState, adjust_recovery_target_for_cash_flow, effective_stock_return, next_regime,
    stock_return,
};
use super::statistics::aggregate_simulation_results;
use super::types::{
    AnnualPlan, DEFAULT_TRIALS, InitialAssets, Regime, RegimeSettings, SimulationResult,
    TrialResult, TrialYearResult, WithdrawalPriority,
};
use super::waterfall::{
    AssetBalances, ReplenishSource, WithdrawalResult, apply_growth, deposit_surplus,
    process_cash_flow, rebalance_excess_cash, replenish_cash, withdraw_by_priority,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub initial_assets: InitialAssets,
    pub annual_plans: Vec<AnnualPlan>,
    pub regime_settings: RegimeSettings,
    /// Fixed bucket order per regime class. `None` uses the bonds/stocks
    /// replenishment heuristic.
    pub withdrawal_priority: Option<WithdrawalPriority>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonteCarloConfig {
    pub num_trials: usize,
    /// Drawn from the thread RNG when absent.
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            num_trials: DEFAULT_TRIALS,
            seed: None,
        }
    }
}

pub fn run_simulation(params: &SimulationParams, config: MonteCarloConfig) -> (SimulationResult, u64) {
    let seed = config.seed.unwrap_or_else(rand::random::<u64>);
    let started = Instant::now();

    let trials = run_monte_carlo(params, config.num_trials, seed);
    let result = aggregate_simulation_results(trials, &params.initial_assets, &params.annual_plans);

    info!(
        trials = config.num_trials,
        years = params.annual_plans.len(),
        seed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        success_rate = result.summary.success_rate,
        "simulation finished"
    );
    (result, seed)
}

// One RNG stream per trial index, so rayon scheduling cannot change the output.
pub fn run_monte_carlo(params: &SimulationParams, num_trials: usize, seed: u64) -> Vec<TrialResult> {
    (0..num_trials)
        .into_par_iter()
        .map(|idx| {
            let mut rng = trial_rng(seed, idx as u64);
            run_single_trial(params, &mut rng)
        })
        .collect()
}

pub fn run_single_trial<U: UniformSource + ?Sized>(params: &SimulationParams, rng: &mut U) -> TrialResult {
    let assets = &params.initial_assets;
    let settings = &params.regime_settings;

    let mut balances = AssetBalances::from_initial(assets);
    let mut regime = RegimeState::initial();
    let mut previous_total = balances.total();
    let mut depletion_year = None;
    let mut crash_count = 0_u32;
    let mut yearly_results = Vec::with_capacity(params.annual_plans.len());

    for plan in &params.annual_plans {
        let previous_regime = regime.current;
        regime = next_regime(regime, settings, balances.stocks, rng);
        if regime.current == Regime::Crash && previous_regime != Regime::Crash {
            crash_count += 1;
        }

        let expense = plan.total_expense();
        let flow = match &params.withdrawal_priority {
            None => process_cash_flow(plan.income, expense, balances),
            Some(priority) => {
                let net = plan.income - expense;
                if net >= 0.0 {
                    WithdrawalResult {
                        balances: deposit_surplus(balances, net, assets.cash_limit, assets.bonds_limit),
                        shortfall: 0.0,
                    }
                } else {
                    withdraw_by_priority(
                        balances,
                        -net,
                        priority.order_for(regime.current),
                        settings.withdrawal_tax_rate,
                    )
                }
            }
        };
        balances = flow.balances;

        let base_return = stock_return(regime.current, settings, rng);
        if regime.current == Regime::Crash {
            regime.crash_return = base_return;
        }
        let equity_return =
            effective_stock_return(regime.current, base_return, assets.foreign_ratio, rng);
        balances = apply_growth(balances, settings.bond_return, equity_return, assets.bonds_limit);

        if params.withdrawal_priority.is_none() {
            balances = rebalance_excess_cash(balances, assets.cash_limit, assets.bonds_limit);
            let source = ReplenishSource::for_year(previous_total, balances.total());
            balances = replenish_cash(balances, assets.cash_limit, source, settings.withdrawal_tax_rate);
        }

        regime = adjust_recovery_target_for_cash_flow(regime, plan.net_income());

        let total = balances.total();
        let is_depleted = balances.is_depleted();
        if is_depleted && depletion_year.is_none() {
            debug!(year = plan.year, age = plan.age, "assets depleted");
            depletion_year = Some(plan.year);
        }

        let reported = balances.floored();
        yearly_results.push(TrialYearResult {
            year: plan.year,
            age: plan.age,
            regime: regime.current,
            stocks_balance: reported.stocks,
            bonds_balance: reported.bonds,
            cash_balance: reported.cash,
            total_assets: total.max(0.0),
            income: plan.income,
            basic_expense: plan.basic_expense,
            extra_expense: plan.extra_expense,
            shortfall: flow.shortfall,
            is_depleted,
        });

        previous_total = total;
    }

    TrialResult {
        yearly_results,
        depletion_year,
        crash_count,
    }
}
