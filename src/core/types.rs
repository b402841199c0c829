use serde::{Deserialize, Serialize};

pub const DEFAULT_AVERAGE_RECOVERY_YEARS: f64 = 2.5;
pub const DEFAULT_TRIALS: usize = 1_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Normal,
    Crash,
    Recovery,
}

impl Regime {
    /// Crash and recovery years share the equity-preserving withdrawal order.
    pub fn is_crash_like(self) -> bool {
        matches!(self, Regime::Crash | Regime::Recovery)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootstrapIndex {
    #[default]
    None,
    Sp500,
    Acwi,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Stocks,
    Bonds,
    Cash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalPriority {
    pub normal: Vec<AssetType>,
    pub crash: Vec<AssetType>,
}

impl WithdrawalPriority {
    pub fn order_for(&self, regime: Regime) -> &[AssetType] {
        if regime.is_crash_like() {
            &self.crash
        } else {
            &self.normal
        }
    }
}

impl Default for WithdrawalPriority {
    fn default() -> Self {
        Self {
            normal: vec![AssetType::Stocks, AssetType::Cash, AssetType::Bonds],
            crash: vec![AssetType::Cash, AssetType::Bonds, AssetType::Stocks],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialAssets {
    pub stocks: f64,
    pub bonds: f64,
    pub cash: f64,
    pub cash_limit: f64,
    pub bonds_limit: f64,
    pub age: u32,
    pub foreign_ratio: f64,
}

impl InitialAssets {
    pub fn total(&self) -> f64 {
        self.stocks + self.bonds + self.cash
    }
}

impl Default for InitialAssets {
    fn default() -> Self {
        Self {
            stocks: 0.0,
            bonds: 0.0,
            cash: 0.0,
            cash_limit: 500.0,
            bonds_limit: 1_000.0,
            age: 30,
            foreign_ratio: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualPlan {
    pub year: i32,
    pub age: u32,
    pub income: f64,
    pub basic_expense: f64,
    pub extra_expense: f64,
}

impl AnnualPlan {
    pub fn total_expense(&self) -> f64 {
        self.basic_expense + self.extra_expense
    }

    pub fn net_income(&self) -> f64 {
        self.income - self.total_expense()
    }
}

/// Market model configuration. Returns, deviations and probabilities are
/// percentages (`7.0` means 7%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeSettings {
    pub normal_return: f64,
    pub normal_std_dev: f64,
    pub crash_return: f64,
    pub crash_std_dev: f64,
    pub recovery_return: f64,
    pub recovery_std_dev: f64,
    pub crash_probability: f64,
    pub bond_return: f64,
    pub withdrawal_tax_rate: f64,
    #[serde(default)]
    pub bootstrap_index: BootstrapIndex,
    #[serde(default)]
    pub average_recovery_years: Option<f64>,
}

impl RegimeSettings {
    pub fn return_params(&self, regime: Regime) -> (f64, f64) {
        match regime {
            Regime::Normal => (self.normal_return, self.normal_std_dev),
            Regime::Crash => (self.crash_return, self.crash_std_dev),
            Regime::Recovery => (self.recovery_return, self.recovery_std_dev),
        }
    }
}

impl Default for RegimeSettings {
    // MSCI ACWI regime averages, rounded towards the conservative side.
    fn default() -> Self {
        Self {
            normal_return: 12.0,
            normal_std_dev: 12.0,
            crash_return: -24.0,
            crash_std_dev: 12.0,
            recovery_return: 17.0,
            recovery_std_dev: 12.0,
            crash_probability: 12.0,
            bond_return: 1.2,
            withdrawal_tax_rate: 10.0,
            bootstrap_index: BootstrapIndex::None,
            average_recovery_years: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialYearResult {
    pub year: i32,
    pub age: u32,
    pub regime: Regime,
    pub stocks_balance: f64,
    pub bonds_balance: f64,
    pub cash_balance: f64,
    pub total_assets: f64,
    pub income: f64,
    pub basic_expense: f64,
    pub extra_expense: f64,
    pub shortfall: f64,
    pub is_depleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResult {
    pub yearly_results: Vec<TrialYearResult>,
    pub depletion_year: Option<i32>,
    pub crash_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyResult {
    pub year: i32,
    pub age: u32,
    pub income: f64,
    pub basic_expense: f64,
    pub extra_expense: f64,
    pub assets_95th: f64,
    pub assets_75th: f64,
    pub assets_50th: f64,
    pub assets_25th: f64,
    pub assets_10th: f64,
    pub assets_5th: f64,
    pub stocks_50th: f64,
    pub bonds_50th: f64,
    pub cash_50th: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetrics {
    pub success_rate: f64,
    pub depletion_probability: f64,
    pub safe_withdrawal_rate: Option<f64>,
    pub median_depletion_year: Option<f64>,
    pub depletion_age_75th: Option<f64>,
    pub depletion_age_50th: Option<f64>,
    pub depletion_age_25th: Option<f64>,
    pub depletion_age_10th: Option<f64>,
    pub final_assets_95th: f64,
    pub final_assets_75th: f64,
    pub final_assets_50th: f64,
    pub final_assets_25th: f64,
    pub final_assets_10th: f64,
    pub final_assets_5th: f64,
    pub min_assets_75th: f64,
    pub min_assets_50th: f64,
    pub min_assets_25th: f64,
    pub min_assets_10th: f64,
    pub max_drawdown_50th: f64,
    pub max_drawdown_90th: f64,
    pub average_crash_count: f64,
    pub average_recovery_years: Option<f64>,
    pub average_depletion_age: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub trial_results: Vec<TrialResult>,
    pub yearly_results: Vec<YearlyResult>,
    pub summary: SummaryMetrics,
    pub representative_trial_index: Option<usize>,
}

impl SimulationResult {
    pub fn representative_trial(&self) -> Option<&TrialResult> {
        self.representative_trial_index
            .and_then(|idx| self.trial_results.get(idx))
    }
}
