//! Descriptive statistics engine.
//!
//! Responsibilities:
//!
//! - moments and order statistics of a return sample
//! - location tests against zero (t-test, signed-rank test)
//! - percentile-t bootstrap confidence interval (seeded per call)
//! - Kruskal-Wallis comparison of independent samples

pub mod bootstrap;
pub mod describe;
pub mod hypothesis;
pub mod kruskal;

pub use bootstrap::{BootstrapConfig, PercentileTInterval, percentile_t_interval};
pub use describe::describe;
pub use hypothesis::{TestDegeneracy, t_test_p_value, wilcoxon_p_value};
pub use kruskal::{KruskalWallis, kruskal_wallis};
