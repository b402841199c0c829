use serde::Serialize;

use super::types::{AssetType, InitialAssets};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AssetBalances {
    pub stocks: f64,
    pub bonds: f64,
    pub cash: f64,
}

impl AssetBalances {
    pub fn from_initial(assets: &InitialAssets) -> Self {
        Self {
            stocks: assets.stocks,
            bonds: assets.bonds,
            cash: assets.cash,
        }
    }

    pub fn total(&self) -> f64 {
        self.stocks + self.bonds + self.cash
    }

    pub fn is_depleted(&self) -> bool {
        self.total() <= 0.0
    }

    pub fn floored(&self) -> Self {
        Self {
            stocks: self.stocks.max(0.0),
            bonds: self.bonds.max(0.0),
            cash: self.cash.max(0.0),
        }
    }

    fn get(&self, asset: AssetType) -> f64 {
        match asset {
            AssetType::Stocks => self.stocks,
            AssetType::Bonds => self.bonds,
            AssetType::Cash => self.cash,
        }
    }

    fn slot(&mut self, asset: AssetType) -> &mut f64 {
        match asset {
            AssetType::Stocks => &mut self.stocks,
            AssetType::Bonds => &mut self.bonds,
            AssetType::Cash => &mut self.cash,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WithdrawalResult {
    pub balances: AssetBalances,
    /// Part of the year's deficit no bucket could cover.
    pub shortfall: f64,
}

fn tax_multiplier(tax_rate: f64) -> f64 {
    1.0 + tax_rate / 100.0
}

pub fn process_cash_flow(income: f64, expense: f64, balances: AssetBalances) -> WithdrawalResult {
    let mut next = balances;
    next.cash += income - expense;

    if next.cash >= 0.0 {
        return WithdrawalResult {
            balances: next,
            shortfall: 0.0,
        };
    }

    let mut remaining = -next.cash;
    next.cash = 0.0;

    let from_bonds = next.bonds.min(remaining);
    next.bonds -= from_bonds;
    remaining -= from_bonds;

    if remaining > 0.0 {
        let from_stocks = next.stocks.min(remaining);
        next.stocks -= from_stocks;
        remaining -= from_stocks;
    }

    WithdrawalResult {
        balances: next,
        shortfall: remaining,
    }
}

pub fn apply_growth(
    balances: AssetBalances,
    bond_return: f64,
    stock_return: f64,
    bonds_limit: f64,
) -> AssetBalances {
    let mut next = balances;
    next.bonds += next.bonds * bond_return / 100.0;

    let stock_gain = next.stocks * stock_return;
    if stock_gain > 0.0 && next.bonds < bonds_limit {
        let to_bonds = stock_gain.min(bonds_limit - next.bonds);
        next.bonds += to_bonds;
        next.stocks += stock_gain - to_bonds;
    } else {
        next.stocks += stock_gain;
    }
    next
}

pub fn rebalance_excess_cash(
    balances: AssetBalances,
    cash_limit: f64,
    bonds_limit: f64,
) -> AssetBalances {
    if balances.cash <= cash_limit {
        return balances;
    }

    let mut next = balances;
    let excess = next.cash - cash_limit;
    next.cash = cash_limit;

    let bonds_room = (bonds_limit - next.bonds).max(0.0);
    let to_bonds = excess.min(bonds_room);
    next.bonds += to_bonds;
    next.stocks += excess - to_bonds;
    next
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplenishSource {
    BondsFirst,
    StocksFirst,
}

impl ReplenishSource {
    /// Sell bonds after a flat or down year; sell stocks after an up year.
    pub fn for_year(previous_total: f64, current_total: f64) -> Self {
        let change = if previous_total > 0.0 {
            (current_total - previous_total) / previous_total
        } else {
            0.0
        };
        if change <= 0.0 {
            ReplenishSource::BondsFirst
        } else {
            ReplenishSource::StocksFirst
        }
    }

    fn order(self) -> [AssetType; 2] {
        match self {
            ReplenishSource::BondsFirst => [AssetType::Bonds, AssetType::Stocks],
            ReplenishSource::StocksFirst => [AssetType::Stocks, AssetType::Bonds],
        }
    }
}

fn sell_grossed_up(balances: &mut AssetBalances, asset: AssetType, amount: f64, multiplier: f64) -> f64 {
    let available = balances.get(asset).max(0.0);
    let gross = available.min(amount * multiplier);
    *balances.slot(asset) -= gross;
    gross / multiplier
}

// Overflow from the first source falls to the other one.
pub fn replenish_cash(
    balances: AssetBalances,
    cash_limit: f64,
    source: ReplenishSource,
    tax_rate: f64,
) -> AssetBalances {
    if balances.cash >= cash_limit {
        return balances;
    }

    let multiplier = tax_multiplier(tax_rate);
    let mut next = balances;
    let mut remaining = cash_limit - next.cash;

    for asset in source.order() {
        if remaining <= 0.0 {
            break;
        }
        let raised = sell_grossed_up(&mut next, asset, remaining, multiplier);
        next.cash += raised;
        remaining -= raised;
    }
    next
}

pub fn withdraw_by_priority(
    balances: AssetBalances,
    deficit: f64,
    order: &[AssetType],
    tax_rate: f64,
) -> WithdrawalResult {
    let multiplier = tax_multiplier(tax_rate);
    let mut next = balances;
    let mut remaining = deficit.max(0.0);

    for &asset in order {
        if remaining <= 0.0 {
            break;
        }
        remaining -= match asset {
            AssetType::Cash => {
                let taken = next.cash.max(0.0).min(remaining);
                next.cash -= taken;
                taken
            }
            AssetType::Stocks | AssetType::Bonds => {
                sell_grossed_up(&mut next, asset, remaining, multiplier)
            }
        };
    }

    WithdrawalResult {
        balances: next,
        shortfall: remaining.max(0.0),
    }
}

pub fn deposit_surplus(
    balances: AssetBalances,
    surplus: f64,
    cash_limit: f64,
    bonds_limit: f64,
) -> AssetBalances {
    let mut next = balances;
    let mut remaining = surplus.max(0.0);

    let to_cash = remaining.min((cash_limit - next.cash).max(0.0));
    next.cash += to_cash;
    remaining -= to_cash;

    let to_bonds = remaining.min((bonds_limit - next.bonds).max(0.0));
    next.bonds += to_bonds;
    remaining -= to_bonds;

    next.stocks += remaining;
    next
}
