//! P-value combination and multiple-testing adjustment

pub mod adjusters; // Bonferroni, Holm, Hochberg, BH, BY
pub mod brown; // empirical Brown's method
pub mod combiners; // Fisher, Stouffer, mean, logit, Wilkinson, ...

pub use adjusters::Adjuster;
pub use brown::{empirical_brown, BrownContext};
pub use combiners::Combiner;
