use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    AnnualPlan, AssetType, BootstrapIndex, DEFAULT_TRIALS, HistoricalIndex, IncomeExpensePlan,
    InitialAssets, MonteCarloConfig, Regime, RegimeSettings, RegimeStats, SimulationParams,
    SimulationResult, StockFund, SummaryMetrics, TrialResult, WithdrawalPriority, YearlyResult,
    generate_annual_plans, historical_index, run_simulation, total_stocks, weighted_foreign_ratio,
};

const MAX_AMOUNT: f64 = 100_000.0;
const MAX_TRIALS: usize = 100_000;

#[derive(Debug, Parser)]
#[command(
    name = "fire-regime",
    about = "Regime-switching Monte Carlo simulator for household wealth (stocks + bonds + cash)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run one simulation and print the result as JSON.
    Simulate {
        #[command(flatten)]
        args: SimulationArgs,
        /// JSON payload using the HTTP API keys; its fields override the flags.
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Print per-regime statistics of a bootstrap return table.
    History {
        #[arg(long, value_enum, default_value_t = CliBootstrapIndex::Sp500)]
        index: CliBootstrapIndex,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliBootstrapIndex {
    None,
    Sp500,
    Acwi,
}

impl From<CliBootstrapIndex> for BootstrapIndex {
    fn from(value: CliBootstrapIndex) -> Self {
        match value {
            CliBootstrapIndex::None => BootstrapIndex::None,
            CliBootstrapIndex::Sp500 => BootstrapIndex::Sp500,
            CliBootstrapIndex::Acwi => BootstrapIndex::Acwi,
        }
    }
}

impl From<BootstrapIndex> for CliBootstrapIndex {
    fn from(value: BootstrapIndex) -> Self {
        match value {
            BootstrapIndex::None => CliBootstrapIndex::None,
            BootstrapIndex::Sp500 => CliBootstrapIndex::Sp500,
            BootstrapIndex::Acwi => CliBootstrapIndex::Acwi,
        }
    }
}

#[derive(Debug, Clone, Parser)]
pub struct SimulationArgs {
    #[arg(long, default_value_t = 3_000.0)]
    stocks: f64,
    #[arg(long, default_value_t = 1_000.0)]
    bonds: f64,
    #[arg(long, default_value_t = 500.0)]
    cash: f64,
    #[arg(long, default_value_t = 500.0, help = "Cash ceiling; excess is invested")]
    cash_limit: f64,
    #[arg(long, default_value_t = 1_000.0, help = "Bond ceiling")]
    bonds_limit: f64,
    #[arg(long, default_value_t = 60)]
    age: u32,
    #[arg(long, default_value_t = 0.0, help = "Foreign-currency share of equities")]
    foreign_ratio: f64,

    #[arg(long, default_value_t = 2026)]
    start_year: i32,
    #[arg(long, default_value_t = 30, help = "Number of simulated years")]
    duration: u32,
    #[arg(long, default_value_t = 0.0)]
    annual_income: f64,
    #[arg(long, default_value_t = 200.0)]
    annual_basic_expense: f64,
    #[arg(long, default_value_t = 0.0)]
    annual_extra_expense: f64,
    #[arg(long, default_value_t = 0.0)]
    income_growth_rate: f64,
    #[arg(long, default_value_t = 0.0)]
    expense_growth_rate: f64,

    #[arg(long, default_value_t = 12.0)]
    normal_return: f64,
    #[arg(long, default_value_t = 12.0)]
    normal_std_dev: f64,
    #[arg(long, default_value_t = -24.0, allow_hyphen_values = true)]
    crash_return: f64,
    #[arg(long, default_value_t = 12.0)]
    crash_std_dev: f64,
    #[arg(long, default_value_t = 17.0)]
    recovery_return: f64,
    #[arg(long, default_value_t = 12.0)]
    recovery_std_dev: f64,
    #[arg(long, default_value_t = 12.0, help = "Annual crash probability from normal")]
    crash_probability: f64,
    #[arg(long, default_value_t = 1.2)]
    bond_return: f64,
    #[arg(long, default_value_t = 10.0, help = "Tax on stock/bond sales")]
    withdrawal_tax_rate: f64,
    #[arg(long, value_enum, default_value_t = CliBootstrapIndex::None)]
    bootstrap_index: CliBootstrapIndex,
    #[arg(long, help = "Mean recovery length in years (default 2.5); ignored with a bootstrap index")]
    average_recovery_years: Option<f64>,

    #[arg(long, default_value_t = DEFAULT_TRIALS)]
    trials: usize,
    #[arg(long, help = "Base seed; random when omitted")]
    seed: Option<u64>,
    #[arg(long, help = "Include every trial path in the output")]
    include_trials: bool,

    #[arg(skip)]
    stock_funds: Vec<StockFund>,
    #[arg(skip)]
    annual_plans: Option<Vec<AnnualPlan>>,
    #[arg(skip)]
    withdrawal_priority: Option<WithdrawalPriority>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    stocks: Option<f64>,
    bonds: Option<f64>,
    cash: Option<f64>,
    cash_limit: Option<f64>,
    bonds_limit: Option<f64>,
    age: Option<u32>,
    foreign_ratio: Option<f64>,
    stock_funds: Option<Vec<StockFund>>,

    start_year: Option<i32>,
    duration: Option<u32>,
    annual_income: Option<f64>,
    annual_basic_expense: Option<f64>,
    annual_extra_expense: Option<f64>,
    income_growth_rate: Option<f64>,
    expense_growth_rate: Option<f64>,
    annual_plans: Option<Vec<AnnualPlan>>,

    normal_return: Option<f64>,
    normal_std_dev: Option<f64>,
    crash_return: Option<f64>,
    crash_std_dev: Option<f64>,
    recovery_return: Option<f64>,
    recovery_std_dev: Option<f64>,
    crash_probability: Option<f64>,
    bond_return: Option<f64>,
    withdrawal_tax_rate: Option<f64>,
    bootstrap_index: Option<BootstrapIndex>,
    average_recovery_years: Option<f64>,
    withdrawal_priority: Option<WithdrawalPriority>,

    trials: Option<usize>,
    seed: Option<u64>,
    include_trials: Option<bool>,
}

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },
    #[error("{0} must be > 0")]
    NotPositive(&'static str),
    #[error("--trials must be between 1 and 100000")]
    Trials,
    #[error("withdrawalPriority.{0} must list stocks, bonds and cash exactly once")]
    Priority(&'static str),
}

#[derive(Debug)]
struct ApiRequest {
    params: SimulationParams,
    config: MonteCarloConfig,
    include_trials: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    seed: u64,
    trials: usize,
    yearly_results: Vec<YearlyResult>,
    summary: SummaryMetrics,
    representative_trial: Option<TrialResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trial_results: Option<Vec<TrialResult>>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    index: &'static str,
    first_year: Option<i32>,
    last_year: Option<i32>,
    crash_probability: f64,
    average_recovery_years: f64,
    normal: RegimeStats,
    crash: RegimeStats,
    recovery: RegimeStats,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), InputError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(InputError::OutOfRange {
            field: field.to_string(),
            min,
            max,
        })
    }
}

fn check_priority(regime: &'static str, order: &[AssetType]) -> Result<(), InputError> {
    let complete = order.len() == 3
        && [AssetType::Stocks, AssetType::Bonds, AssetType::Cash]
            .iter()
            .all(|asset| order.contains(asset));
    if complete {
        Ok(())
    } else {
        Err(InputError::Priority(regime))
    }
}

fn build_request(args: SimulationArgs) -> Result<ApiRequest, InputError> {
    for (flag, value) in [
        ("--stocks", args.stocks),
        ("--bonds", args.bonds),
        ("--cash", args.cash),
        ("--cash-limit", args.cash_limit),
        ("--bonds-limit", args.bonds_limit),
        ("--annual-income", args.annual_income),
        ("--annual-basic-expense", args.annual_basic_expense),
        ("--annual-extra-expense", args.annual_extra_expense),
    ] {
        check_range(flag, value, 0.0, MAX_AMOUNT)?;
    }
    check_range("--age", f64::from(args.age), 0.0, 120.0)?;
    check_range("--foreign-ratio", args.foreign_ratio, 0.0, 100.0)?;
    check_range("--start-year", f64::from(args.start_year), 1900.0, 2100.0)?;
    check_range("--income-growth-rate", args.income_growth_rate, -10.0, 10.0)?;
    check_range("--expense-growth-rate", args.expense_growth_rate, -10.0, 10.0)?;

    for (flag, value) in [
        ("--normal-return", args.normal_return),
        ("--crash-return", args.crash_return),
        ("--recovery-return", args.recovery_return),
    ] {
        check_range(flag, value, -100.0, 100.0)?;
    }
    for (flag, value) in [
        ("--normal-std-dev", args.normal_std_dev),
        ("--crash-std-dev", args.crash_std_dev),
        ("--recovery-std-dev", args.recovery_std_dev),
    ] {
        check_range(flag, value, 0.0, 100.0)?;
    }
    check_range("--crash-probability", args.crash_probability, 0.0, 100.0)?;
    check_range("--bond-return", args.bond_return, -10.0, 20.0)?;
    check_range("--withdrawal-tax-rate", args.withdrawal_tax_rate, 0.0, 50.0)?;
    if let Some(years) = args.average_recovery_years {
        if !(years.is_finite() && years > 0.0) {
            return Err(InputError::NotPositive("--average-recovery-years"));
        }
    }
    if args.trials == 0 || args.trials > MAX_TRIALS {
        return Err(InputError::Trials);
    }

    for (idx, fund) in args.stock_funds.iter().enumerate() {
        check_range(&format!("stockFunds[{idx}].amount"), fund.amount, 0.0, MAX_AMOUNT)?;
        check_range(
            &format!("stockFunds[{idx}].foreignRatio"),
            fund.foreign_ratio,
            0.0,
            100.0,
        )?;
    }
    if let Some(priority) = &args.withdrawal_priority {
        check_priority("normal", &priority.normal)?;
        check_priority("crash", &priority.crash)?;
    }

    let explicit_plans = args.annual_plans.unwrap_or_default();
    for (idx, row) in explicit_plans.iter().enumerate() {
        for (name, value) in [
            ("income", row.income),
            ("basicExpense", row.basic_expense),
            ("extraExpense", row.extra_expense),
        ] {
            check_range(&format!("annualPlans[{idx}].{name}"), value, 0.0, MAX_AMOUNT)?;
        }
    }
    check_range("--duration", f64::from(args.duration), 1.0, 60.0)?;

    let template = IncomeExpensePlan {
        start_year: args.start_year,
        duration: args.duration,
        annual_income: args.annual_income,
        annual_basic_expense: args.annual_basic_expense,
        annual_extra_expense: args.annual_extra_expense,
        income_growth_rate: args.income_growth_rate,
        expense_growth_rate: args.expense_growth_rate,
    };
    let annual_plans = generate_annual_plans(&template, args.age, &explicit_plans);

    let (stocks, foreign_ratio) = if args.stock_funds.is_empty() {
        (args.stocks, args.foreign_ratio)
    } else {
        (
            total_stocks(&args.stock_funds),
            weighted_foreign_ratio(&args.stock_funds),
        )
    };

    Ok(ApiRequest {
        params: SimulationParams {
            initial_assets: InitialAssets {
                stocks,
                bonds: args.bonds,
                cash: args.cash,
                cash_limit: args.cash_limit,
                bonds_limit: args.bonds_limit,
                age: args.age,
                foreign_ratio,
            },
            annual_plans,
            regime_settings: RegimeSettings {
                normal_return: args.normal_return,
                normal_std_dev: args.normal_std_dev,
                crash_return: args.crash_return,
                crash_std_dev: args.crash_std_dev,
                recovery_return: args.recovery_return,
                recovery_std_dev: args.recovery_std_dev,
                crash_probability: args.crash_probability,
                bond_return: args.bond_return,
                withdrawal_tax_rate: args.withdrawal_tax_rate,
                bootstrap_index: args.bootstrap_index.into(),
                average_recovery_years: args.average_recovery_years,
            },
            withdrawal_priority: args.withdrawal_priority,
        },
        config: MonteCarloConfig {
            num_trials: args.trials,
            seed: args.seed,
        },
        include_trials: args.include_trials,
    })
}

fn default_args_for_api() -> SimulationArgs {
    SimulationArgs::parse_from(["fire-regime"])
}

fn apply_payload(mut args: SimulationArgs, payload: SimulatePayload) -> SimulationArgs {
    macro_rules! overlay {
        ($($field:ident),* $(,)?) => {
            $(
                if let Some(v) = payload.$field {
                    args.$field = v;
                }
            )*
        };
    }

    overlay!(
        stocks,
        bonds,
        cash,
        cash_limit,
        bonds_limit,
        age,
        foreign_ratio,
        stock_funds,
        start_year,
        annual_income,
        annual_basic_expense,
        annual_extra_expense,
        income_growth_rate,
        expense_growth_rate,
        normal_return,
        normal_std_dev,
        crash_return,
        crash_std_dev,
        recovery_return,
        recovery_std_dev,
        crash_probability,
        bond_return,
        withdrawal_tax_rate,
        trials,
        include_trials,
    );

    if let Some(v) = payload.bootstrap_index {
        args.bootstrap_index = v.into();
    }
    if payload.average_recovery_years.is_some() {
        args.average_recovery_years = payload.average_recovery_years;
    }
    if payload.seed.is_some() {
        args.seed = payload.seed;
    }
    if payload.withdrawal_priority.is_some() {
        args.withdrawal_priority = payload.withdrawal_priority;
    }

    // Explicit rows set the horizon unless a duration is also given.
    if let Some(plans) = payload.annual_plans {
        args.duration = payload.duration.unwrap_or(plans.len() as u32);
        args.annual_plans = Some(plans);
    } else if let Some(v) = payload.duration {
        args.duration = v;
    }
    args
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, InputError> {
    build_request(apply_payload(default_args_for_api(), payload))
}

fn build_simulate_response(
    result: SimulationResult,
    seed: u64,
    include_trials: bool,
) -> SimulateResponse {
    let representative_trial = result.representative_trial().cloned();
    SimulateResponse {
        seed,
        trials: result.trial_results.len(),
        yearly_results: result.yearly_results,
        summary: result.summary,
        representative_trial,
        trial_results: include_trials.then_some(result.trial_results),
    }
}

async fn run_request(request: ApiRequest) -> Result<SimulateResponse, tokio::task::JoinError> {
    let include_trials = request.include_trials;
    let (result, seed) =
        tokio::task::spawn_blocking(move || run_simulation(&request.params, request.config)).await?;
    Ok(build_simulate_response(result, seed, include_trials))
}

fn build_history_response(index: &HistoricalIndex) -> HistoryResponse {
    HistoryResponse {
        index: index.name,
        first_year: index.returns.first().map(|r| r.year),
        last_year: index.returns.last().map(|r| r.year),
        crash_probability: index.crash_probability,
        average_recovery_years: index.average_recovery_years,
        normal: index.regime_stats(Regime::Normal),
        crash: index.regime_stats(Regime::Crash),
        recovery: index.regime_stats(Regime::Recovery),
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve { port } => run_http_server(port).await.context("HTTP server failed"),
        Command::Simulate {
            args,
            input,
            pretty,
        } => {
            let args = match input {
                Some(path) => {
                    let raw = fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    let payload: SimulatePayload = serde_json::from_str(&raw)
                        .with_context(|| format!("invalid JSON payload in {}", path.display()))?;
                    apply_payload(args, payload)
                }
                None => args,
            };
            let request = build_request(args)?;
            let response = run_request(request).await?;
            let json = if pretty {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string(&response)?
            };
            println!("{json}");
            Ok(())
        }
        Command::History { index } => {
            let table = historical_index(index.into())
                .context("no return table for bootstrap index `none`")?;
            println!("{}", serde_json::to_string_pretty(&build_history_response(table))?);
            Ok(())
        }
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "fire-regime HTTP API listening");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    match run_request(request).await {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => {
            warn!(error = %err, "simulation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Simulation failed")
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_args() -> SimulationArgs {
        default_args_for_api()
    }

    #[test]
    fn defaults_build_a_thirty_year_plan() {
        let request = build_request(sample_args()).expect("defaults are valid");
        let params = &request.params;
        assert_eq!(params.annual_plans.len(), 30);
        assert_eq!(params.annual_plans[0].year, 2026);
        assert_eq!(params.annual_plans[0].age, 60);
        assert_approx(params.annual_plans[29].basic_expense, 200.0);
        assert_approx(params.initial_assets.total(), 4_500.0);
        assert_eq!(params.regime_settings, RegimeSettings::default());
        assert_eq!(params.withdrawal_priority, None);
        assert_eq!(request.config.num_trials, DEFAULT_TRIALS);
        assert_eq!(request.config.seed, None);
    }

    #[test]
    fn cli_flags_parse_negative_returns_and_bootstrap() {
        let cli = Cli::parse_from([
            "fire-regime",
            "simulate",
            "--crash-return",
            "-30",
            "--bootstrap-index",
            "sp500",
            "--trials",
            "200",
            "--seed",
            "7",
            "--pretty",
        ]);
        let Command::Simulate { args, pretty, input } = cli.command else {
            panic!("expected simulate");
        };
        assert!(pretty);
        assert!(input.is_none());
        let request = build_request(args).expect("valid flags");
        assert_approx(request.params.regime_settings.crash_return, -30.0);
        assert_eq!(
            request.params.regime_settings.bootstrap_index,
            BootstrapIndex::Sp500
        );
        assert_eq!(request.config.num_trials, 200);
        assert_eq!(request.config.seed, Some(7));
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
          "bonds": 800,
          "cash": 300,
          "cashLimit": 400,
          "bondsLimit": 900,
          "age": 45,
          "stockFunds": [
            { "amount": 3000, "foreignRatio": 100 },
            { "amount": 1000, "foreignRatio": 0 }
          ],
          "startYear": 2030,
          "duration": 3,
          "annualIncome": 50,
          "annualBasicExpense": 300,
          "incomeGrowthRate": 2,
          "crashProbability": 8,
          "bootstrapIndex": "acwi",
          "averageRecoveryYears": 3.5,
          "withdrawalPriority": { "normal": ["cash", "stocks", "bonds"], "crash": ["cash", "bonds", "stocks"] },
          "trials": 250,
          "seed": 11,
          "includeTrials": true
        }"#;
        let request = api_request_from_json(json).expect("json should parse");
        let params = request.params;

        assert_approx(params.initial_assets.stocks, 4_000.0);
        assert_approx(params.initial_assets.foreign_ratio, 75.0);
        assert_approx(params.initial_assets.cash_limit, 400.0);
        assert_eq!(params.initial_assets.age, 45);
        assert_eq!(params.annual_plans.len(), 3);
        assert_eq!(params.annual_plans[2].year, 2032);
        assert_eq!(params.annual_plans[2].age, 47);
        assert_approx(params.annual_plans[1].income, 51.0);
        assert_approx(params.regime_settings.crash_probability, 8.0);
        assert_eq!(params.regime_settings.bootstrap_index, BootstrapIndex::Acwi);
        assert_eq!(params.regime_settings.average_recovery_years, Some(3.5));
        assert_eq!(
            params.withdrawal_priority.map(|p| p.normal),
            Some(vec![AssetType::Cash, AssetType::Stocks, AssetType::Bonds])
        );
        assert_eq!(request.config.num_trials, 250);
        assert_eq!(request.config.seed, Some(11));
        assert!(request.include_trials);
    }

    #[test]
    fn explicit_plan_rows_set_the_horizon() {
        let json = r#"{
          "age": 50,
          "startYear": 2040,
          "annualPlans": [
            { "year": 0, "age": 0, "income": 10, "basicExpense": 20, "extraExpense": 30 },
            { "year": 0, "age": 0, "income": 0, "basicExpense": 100, "extraExpense": 0 }
          ]
        }"#;
        let request = api_request_from_json(json).expect("json should parse");
        let plans = request.params.annual_plans;
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[1].year, 2041);
        assert_eq!(plans[1].age, 51);
        assert_approx(plans[0].extra_expense, 30.0);
    }

    #[test]
    fn build_request_rejects_out_of_range_values() {
        let mut args = sample_args();
        args.crash_probability = 120.0;
        let err = build_request(args).expect_err("must reject probability above 100");
        assert!(err.to_string().contains("--crash-probability"));

        let mut args = sample_args();
        args.withdrawal_tax_rate = 60.0;
        let err = build_request(args).expect_err("must reject tax above 50");
        assert!(err.to_string().contains("--withdrawal-tax-rate"));

        let mut args = sample_args();
        args.duration = 0;
        let err = build_request(args).expect_err("must reject zero duration");
        assert!(err.to_string().contains("--duration"));

        let mut args = sample_args();
        args.stocks = f64::NAN;
        assert!(build_request(args).is_err());
    }

    #[test]
    fn build_request_rejects_trials_and_recovery_years() {
        let mut args = sample_args();
        args.trials = 0;
        assert_eq!(build_request(args).expect_err("zero trials"), InputError::Trials);

        let mut args = sample_args();
        args.average_recovery_years = Some(0.0);
        assert_eq!(
            build_request(args).expect_err("zero recovery years"),
            InputError::NotPositive("--average-recovery-years")
        );
    }

    #[test]
    fn build_request_rejects_incomplete_priority() {
        let mut args = sample_args();
        args.withdrawal_priority = Some(WithdrawalPriority {
            normal: vec![AssetType::Stocks, AssetType::Stocks, AssetType::Cash],
            crash: vec![AssetType::Cash, AssetType::Bonds, AssetType::Stocks],
        });
        assert_eq!(
            build_request(args).expect_err("duplicate bucket"),
            InputError::Priority("normal")
        );
    }

    #[test]
    fn build_request_rejects_bad_plan_rows() {
        let err = api_request_from_json(
            r#"{ "annualPlans": [{ "year": 2026, "age": 60, "income": -1, "basicExpense": 0, "extraExpense": 0 }] }"#,
        )
        .expect_err("negative income");
        assert!(err.contains("annualPlans[0].income"));

        let err = api_request_from_json(r#"{ "annualPlans": [] }"#).expect_err("empty plan");
        assert!(err.contains("--duration"));
    }

    #[test]
    fn unknown_bootstrap_index_is_a_parse_error() {
        let err = api_request_from_json(r#"{ "bootstrapIndex": "nikkei" }"#)
            .expect_err("unknown index");
        assert!(err.starts_with("Invalid API JSON payload"));
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let mut args = sample_args();
        args.duration = 5;
        args.trials = 20;
        args.seed = Some(3);
        let request = build_request(args).expect("valid inputs");
        let (result, seed) = run_simulation(&request.params, request.config);

        let response = build_simulate_response(result.clone(), seed, false);
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"yearlyResults\""));
        assert!(json.contains("\"summary\""));
        assert!(json.contains("\"representativeTrial\""));
        assert!(json.contains("\"depletionProbability\""));
        assert!(json.contains("\"assets50th\""));
        assert!(!json.contains("\"trialResults\""));

        let with_trials = build_simulate_response(result, seed, true);
        assert_eq!(with_trials.trial_results.as_ref().map(Vec::len), Some(20));
        let json = serde_json::to_string(&with_trials).expect("response should serialize");
        assert!(json.contains("\"trialResults\""));
        let regime_labels = [Regime::Normal, Regime::Crash, Regime::Recovery]
            .map(|r| serde_json::to_string(&r).expect("regime serializes"));
        assert!(regime_labels.iter().any(|label| json.contains(label.as_str())));
    }

    #[test]
    fn history_response_summarises_acwi_table() {
        let cli = Cli::parse_from(["fire-regime", "history", "--index", "acwi"]);
        let Command::History { index } = cli.command else {
            panic!("expected history");
        };
        let table = historical_index(index.into()).expect("acwi table");
        let response = build_history_response(table);
        assert_eq!(response.index, "acwi");
        assert_eq!(response.first_year, Some(2001));
        assert_eq!(response.last_year, Some(2025));
        assert_eq!(response.crash.count, 4);
        assert_eq!(
            response.normal.count + response.crash.count + response.recovery.count,
            25
        );
        let json = serde_json::to_string(&response).expect("history serializes");
        assert!(json.contains("\"crashProbability\""));
        assert!(json.contains("\"stdDev\""));
    }

    #[test]
    fn error_response_is_json_and_uncached() {
        let response = error_response(StatusCode::BAD_REQUEST, "bad input");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );
    }
}
