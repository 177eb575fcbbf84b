use super::{LeakyRelu, Tanh};

#[derive(Clone, Debug)]
pub enum ActFn {
    LeakyRelu(LeakyRelu),
    Tanh(Tanh),
}

impl ActFn {
    pub fn relu() -> Self {
        Self::LeakyRelu(LeakyRelu::new(0.))
    }

    pub fn leaky_relu(slope: f32) -> Self {
        Self::LeakyRelu(LeakyRelu::new(slope))
    }

    pub fn tanh() -> Self {
        Self::Tanh(Tanh::new())
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::LeakyRelu(a) => a.f(x),
            Self::Tanh(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::LeakyRelu(a) => a.df(x),
            Self::Tanh(a) => a.df(x),
        }
    }

    /// Whether the derivative is locally constant almost everywhere, which makes the input
    /// gradient of a layer independent of its biases and linear in each weight matrix.
    pub fn is_piecewise_linear(&self) -> bool {
        matches!(self, Self::LeakyRelu(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaky_relu_scales_negative_inputs() {
        let act = ActFn::leaky_relu(0.2);
        assert_eq!(act.f(3.0), 3.0);
        assert_eq!(act.f(-2.0), -0.4);
        assert_eq!(act.df(3.0), 1.0);
        assert_eq!(act.df(-2.0), 0.2);
    }

    #[test]
    fn relu_zeroes_negative_inputs() {
        let act = ActFn::relu();
        assert_eq!(act.f(-1.5), 0.0);
        assert_eq!(act.df(-1.5), 0.0);
        assert!(act.is_piecewise_linear());
    }

    #[test]
    fn tanh_is_bounded_and_smooth() {
        let act = ActFn::tanh();
        assert!(act.f(100.0) <= 1.0);
        assert!(act.f(-100.0) >= -1.0);
        assert_eq!(act.df(0.0), 1.0);
        assert!(!act.is_piecewise_linear());
        assert!(matches!(act, ActFn::Tanh(_)));
    }
}
