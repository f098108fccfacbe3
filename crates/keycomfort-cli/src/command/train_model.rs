use std::path::PathBuf;

use chrono::Utc;
use keycomfort_model::{PreferenceModel, TrainedModel};

use crate::{
    command::{InputArg, model_features},
    schema::artifact::ModelArtifact,
    util,
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct TrainModelArg {
    #[command(flatten)]
    input: InputArg,
    /// Selection report whose selected features are fitted; the declared features
    /// otherwise
    #[arg(long)]
    selection: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &TrainModelArg) -> anyhow::Result<()> {
    let TrainModelArg {
        input,
        selection,
        output,
    } = arg;

    let mut config = input.pipeline_config()?;
    if let Some(seed) = input.seed {
        config.model.seed = seed;
    }
    config.model.validate()?;
    let features = model_features(&config, selection.as_deref())?;

    let partition = input.partition(&config)?;
    let store = util::build_store(&config, util::read_frequencies(&config)?)?;

    eprintln!(
        "Fitting {:?} on {} preferences...",
        features.column_names(),
        partition.train.len()
    );
    let model = PreferenceModel::new(config.model.clone()).fit(&partition.train, &store, &features)?;
    print_model(&model);

    let held_out = match &partition.test {
        Some(test) => {
            let evaluation = model.evaluate(test, &store)?;
            eprintln!(
                "Held-out: accuracy {:.3}, AUC {}, log loss {:.4}, mean uncertainty {:.4} ({} preferences)",
                evaluation.accuracy,
                evaluation
                    .auc
                    .map_or_else(|| "n/a".to_owned(), |auc| format!("{auc:.3}")),
                evaluation.log_loss,
                evaluation.mean_uncertainty,
                evaluation.n_observations
            );
            Some(evaluation)
        }
        None => None,
    };

    let artifact = ModelArtifact {
        trained_at: Utc::now(),
        layout: store.layout().name.clone(),
        training_data: partition.train.fingerprint(),
        split: partition.split.map(|s| s.dataset_fingerprint),
        held_out,
        model,
    };
    util::write_report("model", &artifact, output.as_deref())?;
    Ok(())
}

fn print_model(model: &TrainedModel) {
    let diagnostics = model.diagnostics();
    eprintln!(
        "Converged: max R-hat {:.4} ({}), min ESS {:.0}, {} divergences, {} tree-depth hits",
        diagnostics.max_rhat,
        diagnostics.worst_parameter,
        diagnostics.min_ess,
        diagnostics.divergences,
        diagnostics.tree_depth_hits
    );
    eprintln!(
        "  {:<32} {:>9} {:>9} {:>20}",
        "weight", "mean", "sd", "95% interval"
    );
    for weight in model.feature_weights() {
        eprintln!(
            "  {:<32} {:>9.4} {:>9.4}   [{:>7.3}, {:>7.3}]",
            weight.name, weight.mean, weight.std_dev, weight.lower, weight.upper
        );
    }
}
