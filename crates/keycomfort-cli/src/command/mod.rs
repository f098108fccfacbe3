use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use keycomfort_core::PreferenceDataset;
use keycomfort_features::FeatureSet;
use keycomfort_selection::SelectionReport;

use crate::{
    schema::pipeline::PipelineConfig,
    util::{self, Partition},
};

use self::{
    analyze_feature_importance::AnalyzeFeatureImportanceArg, predict_scores::PredictScoresArg,
    recommend_pairs::RecommendPairsArg, select_features::SelectFeaturesArg, split::SplitArg,
    train_model::TrainModelArg,
};

mod analyze_feature_importance;
mod predict_scores;
mod recommend_pairs;
mod select_features;
mod split;
mod train_model;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Create or verify a participant-aware train/test split
    Split(#[clap(flatten)] SplitArg),
    /// Score every declared feature against the controls, without selecting
    AnalyzeFeatureImportance(#[clap(flatten)] AnalyzeFeatureImportanceArg),
    /// Select features by participant-fold cross-validation
    SelectFeatures(#[clap(flatten)] SelectFeaturesArg),
    /// Fit the preference model on the training side of the split
    TrainModel(#[clap(flatten)] TrainModelArg),
    /// Recommend bigram pairs to collect next
    RecommendPairs(#[clap(flatten)] RecommendPairsArg),
    /// Export bigram and key comfort scores of a trained model
    PredictScores(#[clap(flatten)] PredictScoresArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Split(arg) => split::run(&arg)?,
        Mode::AnalyzeFeatureImportance(arg) => analyze_feature_importance::run(&arg)?,
        Mode::SelectFeatures(arg) => select_features::run(&arg)?,
        Mode::TrainModel(arg) => train_model::run(&arg)?,
        Mode::RecommendPairs(arg) => recommend_pairs::run(&arg)?,
        Mode::PredictScores(arg) => predict_scores::run(&arg)?,
    }
    Ok(())
}

/// Inputs shared by every mode that reads preference data.
#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct InputArg {
    /// Pipeline configuration JSON; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Preference CSV
    #[arg(long)]
    data: PathBuf,
    /// Second preference CSV merged into `--data`
    #[arg(long)]
    extra_data: Option<PathBuf>,
    /// Split JSON written by the `split` mode
    #[arg(long)]
    split: Option<PathBuf>,
    /// Overrides the seed of the configuration section the mode uses
    #[arg(long)]
    seed: Option<u64>,
}

impl InputArg {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        load_pipeline_config(self.config.as_deref())
    }

    fn dataset(&self, config: &PipelineConfig) -> anyhow::Result<PreferenceDataset> {
        util::load_dataset(&self.data, self.extra_data.as_deref(), config)
    }

    fn partition(&self, config: &PipelineConfig) -> anyhow::Result<Partition> {
        util::partition(self.dataset(config)?, self.split.as_deref())
    }
}

fn load_pipeline_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => util::read_pipeline_config(path),
        None => Ok(PipelineConfig::default()),
    }
}

/// The `selected` set of a selection report, or the declared features when no
/// report is given.
fn model_features(config: &PipelineConfig, selection: Option<&Path>) -> anyhow::Result<FeatureSet> {
    let features = match selection {
        Some(path) => {
            let report: SelectionReport = util::read_json("selection report", path)?;
            report.selected
        }
        None => config.features.clone(),
    };
    features
        .require_columns()
        .context("The model needs at least one feature column")?;
    Ok(features)
}
