//! Statistical utilities for the keycomfort project.
//!
//! This crate provides the numeric building blocks shared by the model, selection and
//! recommendation crates:
//!
//! - **Descriptive statistics**: mean, median, variance, standard deviation
//! - **Percentiles**: nearest-rank percentiles and credible intervals of posterior draws
//! - **Convergence diagnostics**: split R-hat and effective sample size for MCMC chains
//! - **Principal component analysis**: projection of feature vectors onto directions of
//!   largest variance
//! - **Classification metrics**: accuracy, AUC and log loss of probabilistic predictions
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`percentiles`]: Percentile computation and credible intervals
//! - [`diagnostics`]: MCMC convergence diagnostics
//! - [`pca`]: Principal component analysis
//! - [`metrics`]: Evaluation metrics for preference predictions
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use keycomfort_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```
//!
//! ## Summarizing posterior draws
//!
//! ```
//! use keycomfort_stats::percentiles::CredibleInterval;
//!
//! let draws: Vec<f64> = (0..=100).map(f64::from).collect();
//! let interval = CredibleInterval::new(&draws, 0.9);
//! assert_eq!(interval.lower, 5.0);
//! assert_eq!(interval.upper, 95.0);
//! ```
//!
//! ## Checking chain convergence
//!
//! ```
//! use keycomfort_stats::diagnostics::split_rhat;
//!
//! let chains = vec![
//!     vec![0.1, -0.2, 0.3, 0.0, -0.1, 0.2],
//!     vec![0.0, 0.2, -0.3, 0.1, -0.2, 0.1],
//! ];
//! let rhat = split_rhat(&chains);
//! assert!(rhat < 1.5);
//! ```

pub mod descriptive;
pub mod diagnostics;
pub mod metrics;
pub mod pca;
pub mod percentiles;
