use std::path::PathBuf;

use anyhow::Context;
use keycomfort_model::PreferenceModel;
use keycomfort_recommend::{RecommendationEngine, RecommendationReport, fit_for_recommendation};

use crate::{
    command::{InputArg, model_features},
    util,
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct RecommendPairsArg {
    #[command(flatten)]
    input: InputArg,
    /// Model file written by `train-model`; a model is fitted when omitted
    #[arg(long)]
    model: Option<PathBuf>,
    /// Selection report whose selected features are used when fitting
    #[arg(long, conflicts_with = "model")]
    selection: Option<PathBuf>,
    /// Rank by coverage alone, without any model
    #[arg(long, conflicts_with = "model")]
    coverage_only: bool,
    /// Number of pairs to recommend
    #[arg(long)]
    count: Option<usize>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &RecommendPairsArg) -> anyhow::Result<()> {
    let RecommendPairsArg {
        input,
        model,
        selection,
        coverage_only,
        count,
        output,
    } = arg;

    let mut config = input.pipeline_config()?;
    if let Some(seed) = input.seed {
        config.recommendation.seed = seed;
    }
    if let Some(count) = count {
        config.recommendation.n_recommendations = *count;
    }
    if *coverage_only {
        config.recommendation.information_weight = 0.0;
        config.recommendation.coverage_weight = 1.0;
    }
    let engine = RecommendationEngine::new(config.recommendation.clone())?;

    // Observed pairs come from every collected preference, whatever the split.
    let dataset = input.dataset(&config)?;
    let store = util::build_store(&config, util::read_frequencies(&config)?)?;

    let trained = match (model, *coverage_only) {
        (_, true) => None,
        (Some(path), false) => {
            let artifact = util::read_model_file(path)?;
            if artifact.layout != store.layout().name {
                log::warn!(
                    "model {} was trained on layout '{}', recommending for '{}'",
                    path.display(),
                    artifact.layout,
                    store.layout().name
                );
            }
            store
                .validate(artifact.model.feature_set())
                .with_context(|| format!("Model {} uses unavailable features", path.display()))?;
            Some(artifact.model)
        }
        (None, false) => {
            config.model.validate()?;
            let features = model_features(&config, selection.as_deref())?;
            eprintln!(
                "Fitting {:?} on {} preferences...",
                features.column_names(),
                dataset.len()
            );
            let model = PreferenceModel::new(config.model.clone());
            Some(fit_for_recommendation(
                engine.config(),
                &model,
                &dataset,
                &store,
                &features,
            )?)
        }
    };

    let features = match &trained {
        Some(model) => model.feature_set().clone(),
        None => model_features(&config, selection.as_deref())?,
    };
    let report = engine.recommend(&dataset, &store, &features, trained.as_ref())?;
    print_report(&report);

    util::write_report("recommendations", &report, output.as_deref())?;
    Ok(())
}

fn print_report(report: &RecommendationReport) {
    eprintln!(
        "{} candidates, {} observed pairs, explained variance {:.3?}",
        report.n_candidates, report.n_observed_pairs, report.explained_variance
    );
    eprintln!(
        "  {:>4} {:>6} {:>6} {:>8} {:>8} {:>8}",
        "rank", "a", "b", "info", "coverage", "score"
    );
    for rec in &report.recommendations {
        eprintln!(
            "  {:>4} {:>6} {:>6} {:>8.4} {:>8.4} {:>8.4}",
            rec.rank,
            rec.bigram_a,
            rec.bigram_b,
            rec.score.information_value,
            rec.score.coverage_value,
            rec.score.combined_value
        );
    }
}
