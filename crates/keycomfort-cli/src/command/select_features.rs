use std::path::PathBuf;

use keycomfort_model::PreferenceModel;
use keycomfort_selection::{FeatureSelector, SelectionReport};

use crate::{command::InputArg, util};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct SelectFeaturesArg {
    #[command(flatten)]
    pub(super) input: InputArg,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &SelectFeaturesArg) -> anyhow::Result<()> {
    let SelectFeaturesArg { input, output } = arg;

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
        "Selecting among {} candidates on {} preferences...",
        config.features.candidates().len(),
        partition.train.len()
    );
    let report = selector.select(&partition.train, &store)?;
    print_report(&report);

    util::write_report("feature metrics", &report, output.as_deref())?;
    Ok(())
}

fn print_report(report: &SelectionReport) {
    for round in &report.rounds {
        let best = round
            .candidates
            .iter()
            .max_by(|a, b| a.importance.total_cmp(&b.importance));
        match (&round.accepted, best) {
            (Some(name), Some(best)) => eprintln!(
                "Round {}: accepted {name} (importance {:.5})",
                round.round, best.importance
            ),
            (None, Some(best)) => eprintln!(
                "Round {}: nothing accepted (best {} at {:.5})",
                round.round, best.candidate, best.importance
            ),
            (_, None) => eprintln!("Round {}: no eligible candidates", round.round),
        }
    }
    eprintln!("Selected columns: {:?}", report.selected.column_names());
    for feature in &report.features {
        if feature.accepted_round.is_none() {
            eprintln!("  rejected: {}", feature.feature);
        }
    }
}
