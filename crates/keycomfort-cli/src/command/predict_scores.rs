use std::path::PathBuf;

use keycomfort_model::{Agreement, KeyWeightingKind, ScorePredictor, ScoreReport};
use serde::Serialize;

use crate::{command::load_pipeline_config, util};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct PredictScoresArg {
    /// Pipeline configuration JSON; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Model file written by `train-model`
    #[arg(long)]
    model: PathBuf,
    /// Preference CSV used to measure agreement with the scores
    #[arg(long)]
    data: Option<PathBuf>,
    /// Second preference CSV merged into `--data`, as given to `split`
    #[arg(long, requires = "data")]
    extra_data: Option<PathBuf>,
    /// Split JSON; agreement is then measured on the test side only
    #[arg(long, requires = "data")]
    split: Option<PathBuf>,
    /// Per-bigram CSV export
    #[arg(long)]
    bigram_csv: Option<PathBuf>,
    /// Per-key CSV export
    #[arg(long)]
    key_csv: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ScoreExport {
    #[serde(flatten)]
    report: ScoreReport,
    agreement: Option<Agreement>,
}

pub(crate) fn run(arg: &PredictScoresArg) -> anyhow::Result<()> {
    let PredictScoresArg {
        config,
        model,
        data,
        extra_data,
        split,
        bigram_csv,
        key_csv,
        output,
    } = arg;

    let config = load_pipeline_config(config.as_deref())?;
    if config.scores.key_weighting == KeyWeightingKind::Frequency && config.frequencies.is_none() {
        anyhow::bail!(
            "scores.key_weighting is 'frequency' but no `frequencies` table is configured"
        );
    }
    let artifact = util::read_model_file(model)?;
    let frequencies = util::read_frequencies(&config)?;
    let store = util::build_store(&config, frequencies.clone())?;
    let predictor = ScorePredictor::new(&artifact.model, &store, frequencies.as_deref());

    let report = predictor.predict(&config.scores)?;
    eprintln!(
        "Scored {} bigrams and {} keys of layout '{}' ({:?} key weighting)",
        report.bigrams.len(),
        report.keys.len(),
        report.layout,
        report.key_weighting
    );
    if !report.skipped_keys.is_empty() {
        let skipped: String = report.skipped_keys.iter().collect();
        eprintln!("No weighted bigrams for keys '{skipped}'; left out of the key table");
    }

    let agreement = match data {
        Some(data) => {
            let dataset = util::load_dataset(data, extra_data.as_deref(), &config)?;
            let partition = util::partition(dataset, split.as_deref())?;
            let target = partition.test.as_ref().unwrap_or(&partition.train);
            let agreement = predictor.agreement(target)?;
            eprintln!(
                "Agreement: {} of {} preferences ({:.3})",
                agreement.agreed, agreement.n_observations, agreement.fraction
            );
            Some(agreement)
        }
        None => None,
    };

    if let Some(path) = bigram_csv {
        util::write_csv(path, &report.bigrams)?;
        eprintln!("Saved bigram scores to {}", path.display());
    }
    if let Some(path) = key_csv {
        util::write_csv(path, &report.keys)?;
        eprintln!("Saved key scores to {}", path.display());
    }

    let export = ScoreExport { report, agreement };
    util::write_report("comfort scores", &export, output.as_deref())?;
    Ok(())
}
