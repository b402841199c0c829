use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Degrees of freedom for fat-tailed equity returns.
pub const STOCK_RETURN_DF: f64 = 5.0;

pub trait UniformSource {
    fn next_uniform(&mut self) -> f64;
}

impl<R: RngCore> UniformSource for R {
    fn next_uniform(&mut self) -> f64 {
        self.random::<f64>()
    }
}

/// Box-Muller transform. A zero draw for the logarithm is rejected.
pub fn standard_normal<U: UniformSource + ?Sized>(rng: &mut U) -> f64 {
    let mut u1 = rng.next_uniform();
    while u1 == 0.0 {
        u1 = rng.next_uniform();
    }
    let u2 = rng.next_uniform();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Marsaglia-Tsang gamma sampler with unit scale.
pub fn gamma<U: UniformSource + ?Sized>(rng: &mut U, shape: f64) -> f64 {
    if shape < 1.0 {
        let boosted = gamma(rng, shape + 1.0);
        return boosted * rng.next_uniform().powf(1.0 / shape);
    }

    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();

    loop {
        let (x, v) = loop {
            let x = standard_normal(rng);
            let v = 1.0 + c * x;
            if v > 0.0 {
                break (x, v);
            }
        };

        let v = v * v * v;
        let u = rng.next_uniform();
        let x2 = x * x;

        if u < 1.0 - 0.0331 * x2 * x2 {
            return d * v;
        }
        if u.ln() < 0.5 * x2 + d * (1.0 - v + v.ln()) {
            return d * v;
        }
    }
}

pub fn chi_squared<U: UniformSource + ?Sized>(rng: &mut U, df: f64) -> f64 {
    2.0 * gamma(rng, df / 2.0)
}

/// Student's t rescaled so that its standard deviation equals `std_dev`.
/// Requires `df > 2`.
pub fn student_t<U: UniformSource + ?Sized>(rng: &mut U, mean: f64, std_dev: f64, df: f64) -> f64 {
    let scale = std_dev * ((df - 2.0) / df).sqrt();
    let z = standard_normal(rng);
    let v = chi_squared(rng, df);
    mean + scale * z / (v / df).sqrt()
}

pub fn pick_index<U: UniformSource + ?Sized>(rng: &mut U, len: usize) -> usize {
    let idx = (rng.next_uniform() * len as f64).floor() as usize;
    idx.min(len.saturating_sub(1))
}

pub fn trial_rng(base_seed: u64, trial_index: u64) -> StdRng {
    StdRng::seed_from_u64(derive_seed(base_seed, trial_index))
}

fn derive_seed(base_seed: u64, trial_index: u64) -> u64 {
    splitmix64(base_seed ^ trial_index.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Replays a fixed list of uniforms, then repeats the last one.
#[cfg(test)]
pub(crate) struct ScriptedUniform {
    values: Vec<f64>,
    cursor: usize,
}

#[cfg(test)]
impl ScriptedUniform {
    pub(crate) fn new(values: &[f64]) -> Self {
        assert!(!values.is_empty(), "scripted source needs at least one value");
        Self {
            values: values.to_vec(),
            cursor: 0,
        }
    }

    pub(crate) fn consumed(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
impl UniformSource for ScriptedUniform {
    fn next_uniform(&mut self) -> f64 {
        let idx = self.cursor.min(self.values.len() - 1);
        self.cursor += 1;
        self.values[idx]
    }
}
