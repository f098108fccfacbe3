use keycomfort_core::{DataError, PreferenceDataset};
use keycomfort_features::{FeatureSet, FeatureStore};

use crate::{
    config::ModelConfig,
    design::DesignMatrix,
    diagnostics,
    error::ModelError,
    hmc::HmcSampler,
    likelihood::HierarchicalLikelihood,
    sampler::{PosteriorSampler, SamplerError, SamplerSettings},
    trained::TrainedModel,
};

/// Hierarchical preference model bound to a sampler.
#[derive(Debug, Clone)]
pub struct PreferenceModel<S = HmcSampler> {
    config: ModelConfig,
    sampler: S,
}

impl PreferenceModel<HmcSampler> {
    #[must_use]
    pub fn new(config: ModelConfig) -> Self {
        Self::with_sampler(config, HmcSampler)
    }
}

impl<S> PreferenceModel<S>
where
    S: PosteriorSampler,
{
    #[must_use]
    pub fn with_sampler(config: ModelConfig, sampler: S) -> Self {
        Self { config, sampler }
    }

    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Fits the model to `dataset` using the columns of `feature_set`.
    ///
    /// Configuration, feature names, and data are validated before sampling starts.
    /// The fit fails if any parameter's split R-hat exceeds `max_rhat` or if divergent
    /// transitions exceed `max_divergence_fraction` of the draws; sampling stops with a
    /// timeout error once `timeout_secs` has elapsed.
    pub fn fit(
        &self,
        dataset: &PreferenceDataset,
        store: &FeatureStore,
        feature_set: &FeatureSet,
    ) -> Result<TrainedModel, ModelError> {
        self.config.validate()?;
        feature_set.require_columns()?;
        store.validate(feature_set)?;
        if dataset.is_empty() {
            return Err(DataError::EmptyDataset {
                source_name: dataset.source().to_owned(),
            }
            .into());
        }

        let design = DesignMatrix::build(dataset, store, feature_set)?;
        let target = HierarchicalLikelihood::new(
            &design,
            self.config.feature_prior_scale,
            self.config.participant_prior_scale,
        );
        let names: Vec<String> = design
            .columns
            .iter()
            .cloned()
            .chain(design.participant_ids.iter().map(|p| format!("participant[{p}]")))
            .collect();

        log::info!(
            "fitting {} columns on {} preferences from {} participants ({} chains x {} draws)",
            design.n_columns(),
            design.len(),
            design.n_participants(),
            self.config.n_chains,
            self.config.n_draws
        );
        let settings = SamplerSettings::from_config(&self.config);
        let output = self.sampler.sample(&target, &settings)?;
        if output.chains.len() != self.config.n_chains {
            return Err(SamplerError::ChainCount {
                expected: self.config.n_chains,
                found: output.chains.len(),
            }
            .into());
        }

        let (diagnostics, parameter_diagnostics) =
            diagnostics::assess(&output, &names, &self.config)?;
        log::info!(
            "fit converged: max R-hat {:.4}, min ESS {:.0}, {} divergences",
            diagnostics.max_rhat,
            diagnostics.min_ess,
            diagnostics.divergences
        );
        Ok(TrainedModel::from_draws(
            feature_set.clone(),
            self.config.clone(),
            &output,
            &names,
            diagnostics,
            &parameter_diagnostics,
            design.len(),
        ))
    }
}
