use std::sync::LazyLock;

use serde::Serialize;

use super::random::{UniformSource, pick_index};
use super::types::Regime::{Crash as C, Normal as N, Recovery as R};
use super::types::{BootstrapIndex, Regime};

#[derive(Copy, Clone, Debug)]
pub struct HistoricalReturn {
    pub year: i32,
    pub annual_return: f64,
    pub regime: Regime,
}

const fn row(year: i32, annual_return: f64, regime: Regime) -> HistoricalReturn {
    HistoricalReturn {
        year,
        annual_return,
        regime,
    }
}

// Crash: a year at or below -10%. Recovery: until the pre-crash level is regained.
pub const SP500_RETURNS: &[HistoricalReturn] = &[
    row(1928, 43.61, N),
    row(1929, -8.42, N),
    row(1930, -24.90, C),
    row(1931, -43.34, C),
    row(1932, -8.19, R),
    row(1933, 53.99, R),
    row(1934, -1.44, R),
    row(1935, 47.67, R),
    row(1936, 33.92, N),
    row(1937, -35.03, C),
    row(1938, 31.12, R),
    row(1939, -0.41, R),
    row(1940, -9.78, R),
    row(1941, -11.59, C),
    row(1942, 20.34, R),
    row(1943, 25.90, R),
    row(1944, 19.75, N),
    row(1945, 36.44, N),
    row(1946, -8.07, N),
    row(1947, 5.71, N),
    row(1948, 5.50, N),
    row(1949, 18.79, N),
    row(1950, 31.71, N),
    row(1951, 24.02, N),
    row(1952, 18.37, N),
    row(1953, -0.99, N),
    row(1954, 52.62, N),
    row(1955, 31.56, N),
    row(1956, 6.56, N),
    row(1957, -10.78, C),
    row(1958, 43.36, R),
    row(1959, 11.96, N),
    row(1960, 0.47, N),
    row(1961, 26.89, N),
    row(1962, -8.73, N),
    row(1963, 22.80, N),
    row(1964, 16.48, N),
    row(1965, 12.45, N),
    row(1966, -10.06, C),
    row(1967, 23.98, R),
    row(1968, 11.06, N),
    row(1969, -8.50, N),
    row(1970, 4.01, N),
    row(1971, 14.31, N),
    row(1972, 18.98, N),
    row(1973, -14.66, C),
    row(1974, -26.47, C),
    row(1975, 37.20, R),
    row(1976, 23.84, R),
    row(1977, -7.18, R),
    row(1978, 6.56, R),
    row(1979, 18.44, N),
    row(1980, 32.50, N),
    row(1981, -4.92, N),
    row(1982, 21.55, N),
    row(1983, 22.56, N),
    row(1984, 6.27, N),
    row(1985, 31.73, N),
    row(1986, 18.67, N),
    row(1987, 5.25, N),
    row(1988, 16.61, N),
    row(1989, 31.69, N),
    row(1990, -3.10, N),
    row(1991, 30.47, N),
    row(1992, 7.62, N),
    row(1993, 10.08, N),
    row(1994, 1.32, N),
    row(1995, 37.58, N),
    row(1996, 22.96, N),
    row(1997, 33.36, N),
    row(1998, 28.58, N),
    row(1999, 21.04, N),
    row(2000, -9.10, N),
    row(2001, -11.89, C),
    row(2002, -22.10, C),
    row(2003, 28.68, R),
    row(2004, 10.88, R),
    row(2005, 4.91, R),
    row(2006, 15.79, R),
    row(2007, 5.49, N),
    row(2008, -37.00, C),
    row(2009, 26.46, R),
    row(2010, 15.06, R),
    row(2011, 2.11, R),
    row(2012, 16.00, R),
    row(2013, 32.39, N),
    row(2014, 13.69, N),
    row(2015, 1.38, N),
    row(2016, 11.96, N),
    row(2017, 21.83, N),
    row(2018, -4.38, N),
    row(2019, 31.49, N),
    row(2020, 18.40, N),
    row(2021, 28.71, N),
    row(2022, -18.11, C),
    row(2023, 26.29, R),
    row(2024, 24.88, N),
    row(2025, 17.78, N),
];

pub const ACWI_RETURNS: &[HistoricalReturn] = &[
    row(2001, -16.21, C),
    row(2002, -19.32, C),
    row(2003, 33.99, R),
    row(2004, 15.23, R),
    row(2005, 10.84, R),
    row(2006, 20.95, N),
    row(2007, 11.66, N),
    row(2008, -42.19, C),
    row(2009, 34.63, R),
    row(2010, 12.67, R),
    row(2011, -7.35, R),
    row(2012, 16.13, R),
    row(2013, 22.80, N),
    row(2014, 4.16, N),
    row(2015, -2.36, N),
    row(2016, 8.40, N),
    row(2017, 24.35, N),
    row(2018, -9.12, N),
    row(2019, 26.58, N),
    row(2020, 16.33, N),
    row(2021, 18.67, N),
    row(2022, -18.37, C),
    row(2023, 22.30, R),
    row(2024, 17.45, N),
    row(2025, 22.41, N),
];

// Mean of per-event recovery lengths (consecutive crash years count as one event).
const SP500_AVERAGE_RECOVERY_YEARS: f64 = 2.7;
const ACWI_AVERAGE_RECOVERY_YEARS: f64 = 2.7;

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug)]
pub struct HistoricalIndex {
    pub name: &'static str,
    pub returns: &'static [HistoricalReturn],
    normal: Vec<f64>,
    crash: Vec<f64>,
    recovery: Vec<f64>,
    /// Share of crash years in the record, in percent.
    pub crash_probability: f64,
    pub average_recovery_years: f64,
}

impl HistoricalIndex {
    fn build(
        name: &'static str,
        returns: &'static [HistoricalReturn],
        average_recovery_years: f64,
    ) -> Self {
        let by_regime = |regime: Regime| {
            returns
                .iter()
                .filter(|r| r.regime == regime)
                .map(|r| r.annual_return)
                .collect::<Vec<_>>()
        };
        let crash = by_regime(Regime::Crash);
        let crash_probability = if returns.is_empty() {
            0.0
        } else {
            crash.len() as f64 * 100.0 / returns.len() as f64
        };

        Self {
            name,
            returns,
            normal: by_regime(Regime::Normal),
            crash,
            recovery: by_regime(Regime::Recovery),
            crash_probability,
            average_recovery_years,
        }
    }

    pub fn returns_for(&self, regime: Regime) -> &[f64] {
        match regime {
            Regime::Normal => &self.normal,
            Regime::Crash => &self.crash,
            Regime::Recovery => &self.recovery,
        }
    }

    pub fn sample<U: UniformSource + ?Sized>(&self, rng: &mut U, regime: Regime) -> f64 {
        let pool = self.returns_for(regime);
        if pool.is_empty() {
            return 0.0;
        }
        pool[pick_index(rng, pool.len())]
    }

    pub fn regime_stats(&self, regime: Regime) -> RegimeStats {
        let values = self.returns_for(regime);
        if values.is_empty() {
            return RegimeStats {
                count: 0,
                mean: 0.0,
                std_dev: 0.0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        RegimeStats {
            count: values.len(),
            mean,
            std_dev: variance.sqrt(),
        }
    }
}

static SP500: LazyLock<HistoricalIndex> =
    LazyLock::new(|| HistoricalIndex::build("sp500", SP500_RETURNS, SP500_AVERAGE_RECOVERY_YEARS));

static ACWI: LazyLock<HistoricalIndex> =
    LazyLock::new(|| HistoricalIndex::build("acwi", ACWI_RETURNS, ACWI_AVERAGE_RECOVERY_YEARS));

pub fn historical_index(index: BootstrapIndex) -> Option<&'static HistoricalIndex> {
    match index {
        BootstrapIndex::None => None,
        BootstrapIndex::Sp500 => Some(&*SP500),
        BootstrapIndex::Acwi => Some(&*ACWI),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::random::ScriptedUniform;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn none_index_has_no_table() {
        assert!(historical_index(BootstrapIndex::None).is_none());
    }

    #[test]
    fn tables_are_chronological_and_contiguous() {
        for table in [SP500_RETURNS, ACWI_RETURNS] {
            for pair in table.windows(2) {
                assert_eq!(pair[1].year, pair[0].year + 1);
            }
        }
    }

    #[test]
    fn every_crash_year_is_at_or_below_minus_ten_percent() {
        for r in SP500_RETURNS.iter().chain(ACWI_RETURNS) {
            if r.regime == Regime::Crash {
                assert!(r.annual_return <= -10.0, "{} classified as crash", r.year);
            }
        }
    }

    #[test]
    fn crash_probability_is_share_of_crash_years() {
        let sp500 = historical_index(BootstrapIndex::Sp500).expect("sp500 table");
        assert_eq!(sp500.returns_for(Regime::Crash).len(), 12);
        assert_approx(sp500.crash_probability, 12.0 / 98.0 * 100.0);

        let acwi = historical_index(BootstrapIndex::Acwi).expect("acwi table");
        assert_eq!(acwi.returns_for(Regime::Crash).len(), 4);
        assert_approx(acwi.crash_probability, 16.0);
        assert_approx(acwi.average_recovery_years, 2.7);
    }

    #[test]
    fn regime_partitions_cover_the_whole_record() {
        let acwi = historical_index(BootstrapIndex::Acwi).expect("acwi table");
        let total: usize = [Regime::Normal, Regime::Crash, Regime::Recovery]
            .into_iter()
            .map(|r| acwi.regime_stats(r).count)
            .sum();
        assert_eq!(total, ACWI_RETURNS.len());
        let crash = acwi.regime_stats(Regime::Crash);
        assert_approx(crash.mean, (-16.21 - 19.32 - 42.19 - 18.37) / 4.0);
        assert!(crash.std_dev > 0.0);
    }

    #[test]
    fn sample_picks_from_regime_pool() {
        let acwi = historical_index(BootstrapIndex::Acwi).expect("acwi table");
        let mut rng = ScriptedUniform::new(&[0.0, 0.999_999]);
        assert_approx(acwi.sample(&mut rng, Regime::Crash), -16.21);
        assert_approx(acwi.sample(&mut rng, Regime::Crash), -18.37);
    }
}
