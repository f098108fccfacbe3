use std::path::PathBuf;

use keycomfort_model::PreferenceModel;
use keycomfort_selection::{FeatureSelector, ImportanceReport};

use crate::{command::InputArg, util};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct AnalyzeFeatureImportanceArg {
    #[command(flatten)]
    input: InputArg,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &AnalyzeFeatureImportanceArg) -> anyhow::Result<()> {
    let AnalyzeFeatureImportanceArg { input, output } = arg;

    let mut config = input.pipeline_config()?;
    if let Some(seed) = input.seed {
        config.selection.seed = seed;
    }
    config.selection.validate()?;
    config.model.validate()?;

    let partition = input.partition(&config)?;
    let store = util::build_store(&config, util::read_frequencies(&config)?)?;

    let selector = FeatureSelector::new(
        config.features.clone(),
        config.selection.clone(),
        PreferenceModel::new(config.model.clone()),
    );
    eprintln!(
        "Analyzing {} candidates against controls {:?}...",
        config.features.candidates().len(),
        config.features.controls()
    );
    let report = selector.analyze_importance(&partition.train, &store)?;
    print_report(&report);

    util::write_report("importance report", &report, output.as_deref())?;
    Ok(())
}

fn print_report(report: &ImportanceReport) {
    eprintln!(
        "Folds: {} (sizes {:?}, {} merged)",
        report.folds.n_folds, report.folds.sizes, report.folds.merged
    );
    eprintln!(
        "  {:<32} {:>12} {:>14}",
        "feature", "importance", "accuracy gain"
    );
    for candidate in &report.candidates {
        eprintln!(
            "  {:<32} {:>12.5} {:>14.4}",
            candidate.candidate, candidate.importance, candidate.accuracy_gain
        );
    }
}
