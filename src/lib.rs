pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod optim;

// Convenience re-exports
pub use error::{Error, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::{Layer, LayerActivation};
pub use network::network::Network;
pub use optim::optimizable::Optimizable;
pub use optim::optimizer::{Batching, Optimizer};
pub use optim::rules::{RuleState, UpdateRule};
