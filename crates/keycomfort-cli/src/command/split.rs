use std::path::PathBuf;

use anyhow::Context;
use keycomfort_core::Split;

use crate::{command::InputArg, util};

/// With `--split`, the existing split is verified instead of creating a new one.
#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct SplitArg {
    #[command(flatten)]
    input: InputArg,
    /// Fraction of participants held out for testing
    #[arg(long)]
    test_ratio: Option<f64>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &SplitArg) -> anyhow::Result<()> {
    let SplitArg {
        input,
        test_ratio,
        output,
    } = arg;

    let mut config = input.pipeline_config()?;
    if let Some(ratio) = test_ratio {
        config.split.test_ratio = *ratio;
    }
    if let Some(seed) = input.seed {
        config.split.seed = seed;
    }
    config.split.validate()?;

    let dataset = input.dataset(&config)?;
    let transitivity = dataset.check_transitivity();
    eprintln!(
        "Transitivity: {} violations in {} triples ({:.2}%)",
        transitivity.violations,
        transitivity.total_triples,
        transitivity.violation_rate * 100.0
    );

    if let Some(path) = &input.split {
        let split = util::read_split_file(path)?;
        split
            .verify(&dataset)
            .with_context(|| format!("Split {} does not match the dataset", path.display()))?;
        eprintln!("Split {} matches the dataset", path.display());
        print_summary(&split);
        return Ok(());
    }

    let split = dataset
        .split(config.split.test_ratio, config.split.seed)
        .context("Failed to split the dataset")?;
    print_summary(&split);

    util::write_report("split", &split, output.as_deref())?;
    Ok(())
}

fn print_summary(split: &Split) {
    eprintln!(
        "  participants: {} train / {} test",
        split.train_participants.len(),
        split.test_participants.len()
    );
    eprintln!(
        "  preferences:  {} train / {} test",
        split.train_rows.len(),
        split.test_rows.len()
    );
    eprintln!(
        "  test fraction: {:.3} of rows (requested {:.3}, deviation {:.3})",
        split.realized_test_fraction(),
        split.test_ratio,
        split.row_fraction_deviation()
    );
}
