use serde::Serialize;

use super::historical::historical_index;
use super::random::{STOCK_RETURN_DF, UniformSource, standard_normal, student_t};
use super::types::{DEFAULT_AVERAGE_RECOVERY_YEARS, Regime, RegimeSettings};

// Cap on a single year's equity move in either direction.
const STOCK_RETURN_MAX: f64 = 0.40;
const STOCK_RETURN_MIN: f64 = -0.40;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeState {
    pub current: Regime,
    /// Equity balance when the current crash began; the recovery target.
    pub precrash_stocks_balance: f64,
    pub years_in_recovery: u32,
    /// Realized equity return of the triggering crash year, as a fraction.
    pub crash_return: f64,
}

impl RegimeState {
    pub fn initial() -> Self {
        Self {
            current: Regime::Normal,
            precrash_stocks_balance: 0.0,
            years_in_recovery: 0,
            crash_return: 0.0,
        }
    }

    fn crash_from(stocks_balance: f64) -> Self {
        Self {
            current: Regime::Crash,
            precrash_stocks_balance: stocks_balance,
            years_in_recovery: 0,
            crash_return: 0.0,
        }
    }
}

impl Default for RegimeState {
    fn default() -> Self {
        Self::initial()
    }
}

pub fn double_dip_crash_probability(base_crash_probability: f64, years_in_recovery: u32) -> f64 {
    match years_in_recovery {
        1 => base_crash_probability * 1.5,
        2 => base_crash_probability * 1.15,
        _ => base_crash_probability,
    }
}

pub fn crash_depth_recovery_multiplier(crash_return: f64) -> f64 {
    if crash_return > -0.20 {
        0.6
    } else if crash_return > -0.35 {
        1.0
    } else {
        2.0
    }
}

fn effective_crash_probability(settings: &RegimeSettings) -> f64 {
    match historical_index(settings.bootstrap_index) {
        Some(index) => index.crash_probability,
        None => settings.crash_probability,
    }
}

fn base_recovery_years(settings: &RegimeSettings) -> f64 {
    match historical_index(settings.bootstrap_index) {
        Some(index) => index.average_recovery_years,
        None => settings
            .average_recovery_years
            .unwrap_or(DEFAULT_AVERAGE_RECOVERY_YEARS),
    }
}

pub fn next_regime<U: UniformSource + ?Sized>(
    state: RegimeState,
    settings: &RegimeSettings,
    current_stocks_balance: f64,
    rng: &mut U,
) -> RegimeState {
    let crash_probability = effective_crash_probability(settings);

    match state.current {
        Regime::Normal => {
            if rng.next_uniform() * 100.0 < crash_probability {
                RegimeState::crash_from(current_stocks_balance)
            } else {
                state
            }
        }
        Regime::Crash => RegimeState {
            current: Regime::Recovery,
            precrash_stocks_balance: state.precrash_stocks_balance,
            years_in_recovery: 1,
            crash_return: state.crash_return,
        },
        Regime::Recovery => {
            let double_dip =
                double_dip_crash_probability(crash_probability, state.years_in_recovery);
            if rng.next_uniform() * 100.0 < double_dip {
                return RegimeState::crash_from(current_stocks_balance);
            }

            let adjusted_years =
                base_recovery_years(settings) * crash_depth_recovery_multiplier(state.crash_return);
            let to_normal_probability = 100.0 / adjusted_years;
            let recovered = rng.next_uniform() * 100.0 < to_normal_probability
                || current_stocks_balance >= state.precrash_stocks_balance;

            if recovered {
                RegimeState::initial()
            } else {
                RegimeState {
                    years_in_recovery: state.years_in_recovery + 1,
                    ..state
                }
            }
        }
    }
}

pub fn adjust_recovery_target_for_cash_flow(state: RegimeState, net_income: f64) -> RegimeState {
    match state.current {
        Regime::Normal => state,
        Regime::Crash | Regime::Recovery => RegimeState {
            precrash_stocks_balance: (state.precrash_stocks_balance + net_income).max(0.0),
            ..state
        },
    }
}

pub fn stock_return<U: UniformSource + ?Sized>(
    regime: Regime,
    settings: &RegimeSettings,
    rng: &mut U,
) -> f64 {
    let raw = match historical_index(settings.bootstrap_index) {
        Some(index) => index.sample(rng, regime) / 100.0,
        None => {
            let (mean, std_dev) = settings.return_params(regime);
            student_t(rng, mean, std_dev, STOCK_RETURN_DF) / 100.0
        }
    };
    raw.clamp(STOCK_RETURN_MIN, STOCK_RETURN_MAX)
}

/// Currency move of the foreign-denominated slice (mean, std dev in percent).
fn fx_params(regime: Regime) -> (f64, f64) {
    match regime {
        Regime::Normal => (0.0, 8.0),
        // Flight to safety strengthens the home currency.
        Regime::Crash => (-10.0, 10.0),
        Regime::Recovery => (5.0, 8.0),
    }
}

pub fn fx_return<U: UniformSource + ?Sized>(regime: Regime, rng: &mut U) -> f64 {
    let (mean, std_dev) = fx_params(regime);
    standard_normal(rng) * (std_dev / 100.0) + mean / 100.0
}

pub fn effective_stock_return<U: UniformSource + ?Sized>(
    regime: Regime,
    base_return: f64,
    foreign_ratio: f64,
    rng: &mut U,
) -> f64 {
    if foreign_ratio <= 0.0 {
        return base_return;
    }

    let ratio = foreign_ratio / 100.0;
    let fx = fx_return(regime, rng);
    let domestic = (1.0 - ratio) * base_return;
    let foreign = ratio * ((1.0 + base_return) * (1.0 + fx) - 1.0);
    domestic + foreign
}
