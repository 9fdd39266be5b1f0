use serde::{Serialize, Deserialize};

/// Default leakage for the leaky ReLU variant.
pub const LEAKY_RELU_LEAKAGE: f64 = 0.01;

/// Catalog of scalar activation functions and their derivatives.
///
/// Every variant is pure and stateless: layers hold one by value and apply it
/// elementwise during the forward pass, and its derivative during
/// backpropagation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Identity,
    Tanh,
    Sigmoid,
    ReLU,
    SoftPlus,
    LeakyReLU { leakage: f64 },
}

impl ActivationFunction {
    /// Leaky ReLU with the standard 0.01 leakage.
    pub fn leaky_relu() -> ActivationFunction {
        ActivationFunction::LeakyReLU {
            leakage: LEAKY_RELU_LEAKAGE,
        }
    }

    /// Element-wise activation.
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Identity => x,
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            ActivationFunction::ReLU => if x >= 0.0 { x } else { 0.0 },
            ActivationFunction::SoftPlus => (1.0 + x.exp()).ln(),
            ActivationFunction::LeakyReLU { leakage } => {
                if x >= 0.0 { x } else { leakage * x }
            }
        }
    }

    /// Element-wise derivative of the activation.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Identity => 1.0,
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::Sigmoid => {
                let e = (-x).exp();
                e / ((1.0 + e) * (1.0 + e))
            }
            ActivationFunction::ReLU => if x >= 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::SoftPlus => 1.0 / (1.0 + (-x).exp()),
            ActivationFunction::LeakyReLU { leakage } => {
                if x >= 0.0 { 1.0 } else { *leakage }
            }
        }
    }
}
