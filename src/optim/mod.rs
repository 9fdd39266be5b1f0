pub mod optimizable;
pub mod optimizer;
pub mod rules;
