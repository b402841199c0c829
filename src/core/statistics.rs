use super::types::{
    AnnualPlan, InitialAssets, Regime, SimulationResult, SummaryMetrics, TrialResult, YearlyResult,
};

pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0_usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

pub fn depletion_probability(trials: &[TrialResult]) -> f64 {
    if trials.is_empty() {
        return 0.0;
    }
    let depleted = trials.iter().filter(|t| t.depletion_year.is_some()).count();
    depleted as f64 / trials.len() as f64 * 100.0
}

pub fn average_crash_count(trials: &[TrialResult]) -> f64 {
    mean(trials.iter().map(|t| f64::from(t.crash_count))).unwrap_or(0.0)
}

fn depletion_age(trial: &TrialResult) -> Option<u32> {
    let year = trial.depletion_year?;
    trial
        .yearly_results
        .iter()
        .find(|y| y.year == year)
        .map(|y| y.age)
}

/// Percentile over depletion points where survivors sit at `last + 1`.
/// A result past `last` means the percentile trial never depleted.
fn sentinel_percentile(mut points: Vec<f64>, last: f64, p: f64) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    let value = percentile(&mut points, p);
    (value <= last).then(|| value.round())
}

pub fn depletion_year_percentile(trials: &[TrialResult], plans: &[AnnualPlan], p: f64) -> Option<f64> {
    let last = f64::from(plans.last()?.year);
    let points = trials
        .iter()
        .map(|t| t.depletion_year.map_or(last + 1.0, f64::from))
        .collect();
    sentinel_percentile(points, last, p)
}

pub fn depletion_age_percentile(trials: &[TrialResult], plans: &[AnnualPlan], p: f64) -> Option<f64> {
    let last = f64::from(plans.last()?.age);
    let points = trials
        .iter()
        .map(|t| depletion_age(t).map_or(last + 1.0, f64::from))
        .collect();
    sentinel_percentile(points, last, p)
}

pub fn average_depletion_age(trials: &[TrialResult]) -> Option<f64> {
    mean(trials.iter().filter_map(depletion_age).map(f64::from)).map(round_one_decimal)
}

pub fn safe_withdrawal_rate(plans: &[AnnualPlan], initial_total: f64) -> Option<f64> {
    if initial_total <= 0.0 {
        return None;
    }
    let need = mean(plans.iter().map(|p| (p.total_expense() - p.income).max(0.0)))?;
    if need <= 0.0 {
        return None;
    }
    Some(round_one_decimal(need / initial_total * 100.0))
}

pub fn average_recovery_years(trials: &[TrialResult]) -> Option<f64> {
    let mut runs = Vec::new();
    for trial in trials {
        let mut current = 0_u32;
        for year in &trial.yearly_results {
            if year.regime == Regime::Recovery {
                current += 1;
            } else if current > 0 {
                runs.push(current);
                current = 0;
            }
        }
        if current > 0 {
            runs.push(current);
        }
    }
    mean(runs.into_iter().map(f64::from)).map(round_one_decimal)
}

/// Largest peak-to-trough fall of total assets, in percent. The running peak
/// starts at the initial portfolio.
pub fn max_drawdown(trial: &TrialResult, initial_total: f64) -> f64 {
    let mut peak = initial_total.max(0.0);
    let mut worst = 0.0_f64;
    for year in &trial.yearly_results {
        peak = peak.max(year.total_assets);
        if peak > 0.0 {
            worst = worst.max((peak - year.total_assets) / peak * 100.0);
        }
    }
    worst
}

fn column(trials: &[TrialResult], idx: usize, pick: impl Fn(&TrialResult, usize) -> f64) -> Vec<f64> {
    trials.iter().map(|t| pick(t, idx)).collect()
}

fn total_at(trial: &TrialResult, idx: usize) -> f64 {
    trial.yearly_results.get(idx).map_or(0.0, |y| y.total_assets)
}

pub fn aggregate_yearly_results(trials: &[TrialResult], plans: &[AnnualPlan]) -> Vec<YearlyResult> {
    plans
        .iter()
        .enumerate()
        .map(|(idx, plan)| {
            let mut assets = column(trials, idx, total_at);
            let mut stocks = column(trials, idx, |t, i| {
                t.yearly_results.get(i).map_or(0.0, |y| y.stocks_balance)
            });
            let mut bonds = column(trials, idx, |t, i| {
                t.yearly_results.get(i).map_or(0.0, |y| y.bonds_balance)
            });
            let mut cash = column(trials, idx, |t, i| {
                t.yearly_results.get(i).map_or(0.0, |y| y.cash_balance)
            });

            YearlyResult {
                year: plan.year,
                age: plan.age,
                income: plan.income,
                basic_expense: plan.basic_expense,
                extra_expense: plan.extra_expense,
                assets_95th: percentile(&mut assets, 95.0).round(),
                assets_75th: percentile(&mut assets, 75.0).round(),
                assets_50th: percentile(&mut assets, 50.0).round(),
                assets_25th: percentile(&mut assets, 25.0).round(),
                assets_10th: percentile(&mut assets, 10.0).round(),
                assets_5th: percentile(&mut assets, 5.0).round(),
                stocks_50th: percentile(&mut stocks, 50.0).round(),
                bonds_50th: percentile(&mut bonds, 50.0).round(),
                cash_50th: percentile(&mut cash, 50.0).round(),
            }
        })
        .collect()
}

pub fn representative_trial_index(trials: &[TrialResult], years: usize) -> Option<usize> {
    let median_path: Vec<f64> = (0..years)
        .map(|idx| percentile(&mut column(trials, idx, total_at), 50.0))
        .collect();

    trials
        .iter()
        .enumerate()
        .map(|(idx, trial)| {
            let distance: f64 = median_path
                .iter()
                .enumerate()
                .map(|(year, median)| (total_at(trial, year) - median).powi(2))
                .sum();
            (idx, distance)
        })
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(idx, _)| idx)
}

fn final_total(trial: &TrialResult, initial_total: f64) -> f64 {
    trial
        .yearly_results
        .last()
        .map_or(initial_total, |y| y.total_assets)
}

fn min_total(trial: &TrialResult, initial_total: f64) -> f64 {
    trial
        .yearly_results
        .iter()
        .map(|y| y.total_assets)
        .reduce(f64::min)
        .unwrap_or(initial_total)
}

pub fn summary_metrics(
    trials: &[TrialResult],
    initial_assets: &InitialAssets,
    plans: &[AnnualPlan],
) -> SummaryMetrics {
    let initial_total = initial_assets.total();
    let depletion = depletion_probability(trials);

    let mut finals: Vec<f64> = trials.iter().map(|t| final_total(t, initial_total)).collect();
    let mut minimums: Vec<f64> = trials.iter().map(|t| min_total(t, initial_total)).collect();
    let mut drawdowns: Vec<f64> = trials.iter().map(|t| max_drawdown(t, initial_total)).collect();

    SummaryMetrics {
        success_rate: round_one_decimal(if trials.is_empty() { 0.0 } else { 100.0 - depletion }),
        depletion_probability: round_one_decimal(depletion),
        safe_withdrawal_rate: safe_withdrawal_rate(plans, initial_total),
        median_depletion_year: depletion_year_percentile(trials, plans, 50.0),
        // Earlier-depleting tails first: the 10th percentile is the worst case.
        depletion_age_75th: depletion_age_percentile(trials, plans, 75.0),
        depletion_age_50th: depletion_age_percentile(trials, plans, 50.0),
        depletion_age_25th: depletion_age_percentile(trials, plans, 25.0),
        depletion_age_10th: depletion_age_percentile(trials, plans, 10.0),
        final_assets_95th: percentile(&mut finals, 95.0).round(),
        final_assets_75th: percentile(&mut finals, 75.0).round(),
        final_assets_50th: percentile(&mut finals, 50.0).round(),
        final_assets_25th: percentile(&mut finals, 25.0).round(),
        final_assets_10th: percentile(&mut finals, 10.0).round(),
        final_assets_5th: percentile(&mut finals, 5.0).round(),
        min_assets_75th: percentile(&mut minimums, 75.0).round(),
        min_assets_50th: percentile(&mut minimums, 50.0).round(),
        min_assets_25th: percentile(&mut minimums, 25.0).round(),
        min_assets_10th: percentile(&mut minimums, 10.0).round(),
        max_drawdown_50th: round_one_decimal(percentile(&mut drawdowns, 50.0)),
        max_drawdown_90th: round_one_decimal(percentile(&mut drawdowns, 90.0)),
        average_crash_count: round_one_decimal(average_crash_count(trials)),
        average_recovery_years: average_recovery_years(trials),
        average_depletion_age: average_depletion_age(trials),
    }
}

pub fn aggregate_simulation_results(
    trials: Vec<TrialResult>,
    initial_assets: &InitialAssets,
    plans: &[AnnualPlan],
) -> SimulationResult {
    SimulationResult {
        yearly_results: aggregate_yearly_results(&trials, plans),
        summary: summary_metrics(&trials, initial_assets, plans),
        representative_trial_index: representative_trial_index(&trials, plans.len()),
        trial_results: trials,
    }
}
