use rand::Rng;

/// How to generate the initial values of a parameter slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamGen {
    Uniform { low: f32, high: f32 },
    /// Uniform in `[-1/sqrt(fan_in), 1/sqrt(fan_in)]`, the usual default for affine layers.
    LecunUniform { fan_in: usize },
}

impl ParamGen {
    /// Fills `out` with values drawn from this generator.
    ///
    /// # Arguments
    /// * `rng` - The random number generator to draw from.
    /// * `out` - The slice to overwrite.
    pub fn fill<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut [f32]) {
        match *self {
            ParamGen::Uniform { low, high } => uniform(rng, out, low, high),
            ParamGen::LecunUniform { fan_in } => {
                let bound = 1. / (fan_in.max(1) as f32).sqrt();
                uniform(rng, out, -bound, bound);
            }
        }
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, out: &mut [f32], low: f32, high: f32) {
    if low >= high {
        out.fill(low);
        return;
    }

    for w in out.iter_mut() {
        *w = rng.random_range(low..high);
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn lecun_uniform_respects_its_bound() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut out = vec![0.; 1000];

        ParamGen::LecunUniform { fan_in: 100 }.fill(&mut rng, &mut out);

        assert!(out.iter().all(|w| w.abs() <= 0.1));
        assert!(out.iter().any(|w| *w != 0.));
    }

    #[test]
    fn degenerate_uniform_is_constant() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut out = vec![1.; 4];

        ParamGen::Uniform { low: 2., high: 2. }.fill(&mut rng, &mut out);
        assert_eq!(out, [2.; 4]);
    }
}
