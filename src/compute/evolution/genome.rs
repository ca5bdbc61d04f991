//! Genotype variation operators for evolutionary search.
//!
//! Provides random generation, crossover, and mutation. Every operator keeps
//! genes inside their configured [`GeneDomain`] and is deterministic for a
//! given seed.

use crate::schema::{GeneDomain, Genotype, GenotypeConfig, MutationOperator, VariationConfig};
use rand::prelude::*;

/// Random number generator wrapper for genotype operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Sample every gene independently and uniformly from its domain.
    pub fn random_genotype(&mut self, config: &GenotypeConfig) -> Genotype {
        let genes = (0..config.length)
            .map(|_| self.random_gene(&config.domain))
            .collect();
        Genotype::new(genes)
    }

    fn random_gene(&mut self, domain: &GeneDomain) -> f32 {
        match domain {
            GeneDomain::Sampled { values } => values.choose(&mut self.rng).copied().unwrap_or(0.0),
            GeneDomain::Continuous { min, max } => self.rng.gen_range(*min..=*max),
        }
    }

    /// Produce one offspring from one or two parents.
    ///
    /// Crossover happens only when `mate` is given and the crossover roll
    /// succeeds; mutation is always attempted afterwards.
    pub fn offspring(
        &mut self,
        parent: &Genotype,
        mate: Option<&Genotype>,
        domain: &GeneDomain,
        variation: &VariationConfig,
    ) -> Genotype {
        let mut child = match mate {
            Some(mate) => self.crossover(parent, mate, domain, variation.eta_c),
            None => parent.clone(),
        };
        self.mutate(&mut child, domain, variation);
        child
    }

    /// Roll a probability.
    pub fn chance(&mut self, probability: f32) -> bool {
        probability > 0.0 && self.rng.r#gen::<f32>() < probability
    }

    /// Perform crossover between two genotypes.
    ///
    /// Sampled domains use one-point crossover, continuous domains use SBX.
    pub fn crossover(
        &mut self,
        parent1: &Genotype,
        parent2: &Genotype,
        domain: &GeneDomain,
        eta_c: f32,
    ) -> Genotype {
        let len = parent1.len().min(parent2.len());
        match domain {
            GeneDomain::Sampled { .. } => {
                if len < 2 {
                    return parent1.clone();
                }
                let cut = self.rng.gen_range(1..len);
                let genes = parent1.genes()[..cut]
                    .iter()
                    .chain(&parent2.genes()[cut..len])
                    .copied()
                    .collect();
                Genotype::new(genes)
            }
            GeneDomain::Continuous { min, max } => {
                let genes = parent1
                    .genes()
                    .iter()
                    .zip(parent2.genes())
                    .map(|(&x1, &x2)| self.sbx(x1, x2, (*min, *max), eta_c))
                    .collect();
                Genotype::new(genes)
            }
        }
    }

    /// Simulated binary crossover for one gene; returns one of the two children.
    fn sbx(&mut self, x1: f32, x2: f32, bounds: (f32, f32), eta_c: f32) -> f32 {
        let (lo, hi) = bounds;
        if !self.rng.gen_bool(0.5) || (x1 - x2).abs() <= 1e-14 || hi <= lo {
            return x1;
        }

        let (y1, y2) = if x1 < x2 { (x1, x2) } else { (x2, x1) };
        let exponent = 1.0 / (eta_c + 1.0);
        let spread = |beta: f32, u: f32| {
            let alpha = 2.0 - beta.powf(-(eta_c + 1.0));
            if u <= 1.0 / alpha {
                (u * alpha).powf(exponent)
            } else {
                (1.0 / (2.0 - u * alpha)).powf(exponent)
            }
        };

        let u = self.rng.r#gen::<f32>();
        let beta_low = 1.0 + 2.0 * (y1 - lo) / (y2 - y1);
        let c1 = 0.5 * ((y1 + y2) - spread(beta_low, u) * (y2 - y1));
        let beta_high = 1.0 + 2.0 * (hi - y2) / (y2 - y1);
        let c2 = 0.5 * ((y1 + y2) + spread(beta_high, u) * (y2 - y1));

        let child = if self.rng.gen_bool(0.5) { c1 } else { c2 };
        if child.is_finite() {
            child.clamp(lo, hi)
        } else {
            x1
        }
    }

    /// Mutate each gene with probability `variation.mutation_rate`.
    pub fn mutate(
        &mut self,
        genotype: &mut Genotype,
        domain: &GeneDomain,
        variation: &VariationConfig,
    ) {
        let rate = variation.mutation_rate;
        for gene in genotype.genes_mut() {
            if !self.chance(rate) {
                continue;
            }
            *gene = match domain {
                GeneDomain::Sampled { values } => {
                    values.choose(&mut self.rng).copied().unwrap_or(*gene)
                }
                GeneDomain::Continuous { min, max } => match &variation.mutation {
                    MutationOperator::Polynomial { eta_m } => {
                        self.polynomial_mutate(*gene, *eta_m, (*min, *max))
                    }
                    MutationOperator::Gaussian { strength } => {
                        self.gaussian_mutate(*gene, *strength, (*min, *max))
                    }
                    MutationOperator::Uniform => self.rng.gen_range(*min..=*max),
                },
            };
        }
    }

    /// Polynomial mutation: bounded perturbation with distribution index `eta_m`.
    pub fn polynomial_mutate(&mut self, value: f32, eta_m: f32, bounds: (f32, f32)) -> f32 {
        let (lo, hi) = bounds;
        let range = hi - lo;
        if range <= 0.0 {
            return lo;
        }

        let delta1 = (value - lo) / range;
        let delta2 = (hi - value) / range;
        let power = 1.0 / (eta_m + 1.0);
        let u = self.rng.r#gen::<f32>();

        let deltaq = if u <= 0.5 {
            let xy = 1.0 - delta1;
            let val = 2.0 * u + (1.0 - 2.0 * u) * xy.powf(eta_m + 1.0);
            val.powf(power) - 1.0
        } else {
            let xy = 1.0 - delta2;
            let val = 2.0 * (1.0 - u) + 2.0 * (u - 0.5) * xy.powf(eta_m + 1.0);
            1.0 - val.powf(power)
        };

        let mutated = value + deltaq * range;
        if mutated.is_finite() {
            mutated.clamp(lo, hi)
        } else {
            value.clamp(lo, hi)
        }
    }

    /// Gaussian mutation: add noise to a value.
    pub fn gaussian_mutate(&mut self, value: f32, strength: f32, bounds: (f32, f32)) -> f32 {
        let noise: f32 = self.rng.sample(rand_distr::StandardNormal);
        let mutated = value + noise * strength * (bounds.1 - bounds.0);
        mutated.clamp(bounds.0, bounds.1)
    }

    /// Uniform index in `0..len`. `len` must be positive.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn continuous() -> GeneDomain {
        GeneDomain::Continuous { min: 0.0, max: 1.0 }
    }

    #[test]
    fn test_random_genotype_in_domain() {
        let mut rng = GenomeRng::new(42);
        let config = GenotypeConfig::default();
        let genotype = rng.random_genotype(&config);
        assert_eq!(genotype.len(), 36);
        assert!(genotype.genes().iter().all(|&g| config.domain.contains(g)));
    }

    #[test]
    fn test_same_seed_same_genotype() {
        let config = GenotypeConfig::default();
        let a = GenomeRng::new(7).random_genotype(&config);
        let b = GenomeRng::new(7).random_genotype(&config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sampled_mutation_stays_in_domain() {
        let mut rng = GenomeRng::new(3);
        let domain = GeneDomain::default();
        let variation = VariationConfig {
            mutation_rate: 1.0,
            ..Default::default()
        };
        let mut genotype = Genotype::filled(36, 0.5);
        for _ in 0..20 {
            rng.mutate(&mut genotype, &domain, &variation);
            assert!(genotype.genes().iter().all(|&g| domain.contains(g)));
        }
    }

    #[test]
    fn test_continuous_mutation_stays_in_bounds() {
        let mut rng = GenomeRng::new(11);
        let domain = continuous();
        for mutation in [
            MutationOperator::Polynomial { eta_m: 10.0 },
            MutationOperator::Gaussian { strength: 2.0 },
            MutationOperator::Uniform,
        ] {
            let variation = VariationConfig {
                mutation_rate: 1.0,
                mutation,
                ..Default::default()
            };
            let mut genotype = Genotype::new(vec![0.0, 1.0, 0.5, 0.999]);
            for _ in 0..50 {
                rng.mutate(&mut genotype, &domain, &variation);
                assert!(genotype.genes().iter().all(|&g| (0.0..=1.0).contains(&g)));
            }
        }
    }

    #[test]
    fn test_zero_rate_leaves_genotype() {
        let mut rng = GenomeRng::new(5);
        let variation = VariationConfig {
            mutation_rate: 0.0,
            ..Default::default()
        };
        let parent = Genotype::filled(8, 0.25);
        let child = rng.offspring(&parent, None, &GeneDomain::default(), &variation);
        assert_eq!(child, parent);
    }

    #[test]
    fn test_one_point_crossover() {
        let mut rng = GenomeRng::new(42);
        let p1 = Genotype::filled(10, 0.0);
        let p2 = Genotype::filled(10, 1.0);
        let child = rng.crossover(&p1, &p2, &GeneDomain::default(), 10.0);
        assert_eq!(child.len(), 10);
        assert_eq!(child.genes()[0], 0.0);
        assert_eq!(child.genes()[9], 1.0);
        let cut = child.genes().iter().position(|&g| g == 1.0).unwrap();
        assert!(child.genes()[cut..].iter().all(|&g| g == 1.0));
    }

    #[test]
    fn test_sbx_within_bounds() {
        let mut rng = GenomeRng::new(9);
        let p1 = Genotype::new(vec![0.1, 0.9, 0.5, 0.0]);
        let p2 = Genotype::new(vec![0.8, 0.2, 0.5, 1.0]);
        for _ in 0..100 {
            let child = rng.crossover(&p1, &p2, &continuous(), 10.0);
            assert_eq!(child.len(), 4);
            assert!(child.genes().iter().all(|&g| (0.0..=1.0).contains(&g)));
        }
    }
}
