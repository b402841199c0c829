mod engine;
mod historical;
mod plan;
mod random;
mod regime;
mod statistics;
mod types;
mod waterfall;

pub use engine::{MonteCarloConfig, SimulationParams, run_monte_carlo, run_simulation, run_single_trial};
pub use historical::{HistoricalIndex, HistoricalReturn, RegimeStats, historical_index};
pub use plan::{
    IncomeExpensePlan, StockFund, generate_annual_plans, total_stocks, weighted_foreign_ratio,
};
pub use random::{UniformSource, trial_rng};
pub use regime::{
    RegimeState, crash_depth_recovery_multiplier, double_dip_crash_probability, next_regime,
};
pub use statistics::{
    aggregate_simulation_results, depletion_probability, percentile, safe_withdrawal_rate,
};
pub use types::{
    AnnualPlan, AssetType, BootstrapIndex, DEFAULT_AVERAGE_RECOVERY_YEARS, DEFAULT_TRIALS,
    InitialAssets, Regime, RegimeSettings, SimulationResult, SummaryMetrics, TrialResult,
    TrialYearResult, WithdrawalPriority, YearlyResult,
};
pub use waterfall::{AssetBalances, process_cash_flow};
