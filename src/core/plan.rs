use serde::{Deserialize, Serialize};

use super::types::AnnualPlan;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeExpensePlan {
    pub start_year: i32,
    pub duration: u32,
    pub annual_income: f64,
    pub annual_basic_expense: f64,
    pub annual_extra_expense: f64,
    /// Percent per year, compounded.
    pub income_growth_rate: f64,
    /// Percent per year, compounded; applies to the basic expense only.
    pub expense_growth_rate: f64,
}

pub fn generate_annual_plans(
    base: &IncomeExpensePlan,
    current_age: u32,
    existing: &[AnnualPlan],
) -> Vec<AnnualPlan> {
    let income_factor = 1.0 + base.income_growth_rate / 100.0;
    let expense_factor = 1.0 + base.expense_growth_rate / 100.0;

    (0..base.duration)
        .map(|i| {
            let year = base.start_year + i as i32;
            let age = current_age + i;
            match existing.get(i as usize) {
                Some(row) => AnnualPlan {
                    year,
                    age,
                    income: row.income,
                    basic_expense: row.basic_expense,
                    extra_expense: row.extra_expense,
                },
                None => AnnualPlan {
                    year,
                    age,
                    income: base.annual_income * income_factor.powi(i as i32),
                    basic_expense: base.annual_basic_expense * expense_factor.powi(i as i32),
                    extra_expense: base.annual_extra_expense,
                },
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockFund {
    pub amount: f64,
    /// Percent of the fund denominated in foreign currency.
    pub foreign_ratio: f64,
}

pub fn total_stocks(funds: &[StockFund]) -> f64 {
    funds.iter().map(|f| f.amount).sum()
}

/// Amount-weighted foreign share across funds, in percent.
pub fn weighted_foreign_ratio(funds: &[StockFund]) -> f64 {
    let total = total_stocks(funds);
    if total == 0.0 {
        return 0.0;
    }
    funds.iter().map(|f| f.amount * f.foreign_ratio).sum::<f64>() / total
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

    fn base_plan() -> IncomeExpensePlan {
        IncomeExpensePlan {
            start_year: 2026,
            duration: 3,
            annual_income: 100.0,
            annual_basic_expense: 200.0,
            annual_extra_expense: 10.0,
            income_growth_rate: 10.0,
            expense_growth_rate: 5.0,
        }
    }

    #[test]
    fn generated_rows_compound_from_the_template() {
        let plans = generate_annual_plans(&base_plan(), 60, &[]);
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].year, 2026);
        assert_eq!(plans[2].year, 2028);
        assert_eq!(plans[2].age, 62);
        assert_approx(plans[0].income, 100.0);
        assert_approx(plans[2].income, 121.0);
        assert_approx(plans[1].basic_expense, 210.0);
        assert_approx(plans[2].extra_expense, 10.0);
    }

    #[test]
    fn existing_rows_keep_amounts_but_take_new_timeline() {
        let existing = [AnnualPlan {
            year: 1999,
            age: 1,
            income: 5.0,
            basic_expense: 6.0,
            extra_expense: 7.0,
        }];
        let plans = generate_annual_plans(&base_plan(), 40, &existing);
        assert_eq!(plans[0].year, 2026);
        assert_eq!(plans[0].age, 40);
        assert_approx(plans[0].income, 5.0);
        assert_approx(plans[0].extra_expense, 7.0);
        assert_approx(plans[1].income, 110.0);
    }

    #[test]
    fn zero_duration_yields_no_rows() {
        let plan = IncomeExpensePlan {
            duration: 0,
            ..base_plan()
        };
        assert!(generate_annual_plans(&plan, 60, &[]).is_empty());
    }

    #[test]
    fn funds_aggregate_by_amount() {
        let funds = [
            StockFund {
                amount: 300.0,
                foreign_ratio: 100.0,
            },
            StockFund {
                amount: 100.0,
                foreign_ratio: 0.0,
            },
        ];
        assert_approx(total_stocks(&funds), 400.0);
        assert_approx(weighted_foreign_ratio(&funds), 75.0);
        assert_approx(weighted_foreign_ratio(&[]), 0.0);
    }
}
