use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::Path,
    sync::Arc,
};

use anyhow::Context;
use keycomfort_core::{MergePolicy, PreferenceDataset, Split};
use keycomfort_features::{BigramFrequencies, FeatureStore, Layout, source};

use crate::schema::{artifact::ModelArtifact, pipeline::PipelineConfig};

/// Writes `report` as pretty JSON to `path`, or to stdout when no path is given.
///
/// `kind` names the report in progress and error messages.
pub fn write_report<T>(kind: &str, report: &T, path: Option<&Path>) -> anyhow::Result<()>
where
    T: serde::Serialize,
{
    let target = path.map_or_else(|| "stdout".to_owned(), |p| p.display().to_string());
    eprintln!("Saving {kind} to {target}");
    let writer: Box<dyn Write> = match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {kind} file: {target}"))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout().lock()),
    };
    write_pretty_json(writer, report).with_context(|| format!("Failed to write {kind} to {target}"))
}

fn write_pretty_json<W, T>(mut writer: W, value: &T) -> io::Result<()>
where
    W: Write,
    T: serde::Serialize,
{
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Reads a JSON document of the given `kind` (model, split, layout, ...).
pub fn read_json<T, P>(kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {kind} from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid {kind} document", path.display()))
}

/// Writes one CSV record per item, with a header derived from the field names.
pub fn write_csv<T, P>(path: P, records: &[T]) -> anyhow::Result<()>
where
    T: serde::Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("Failed to write CSV record to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush CSV file: {}", path.display()))?;
    Ok(())
}

pub fn read_pipeline_config<P>(path: P) -> anyhow::Result<PipelineConfig>
where
    P: AsRef<Path>,
{
    read_json("pipeline configuration", path)
}

pub fn read_split_file<P>(path: P) -> anyhow::Result<Split>
where
    P: AsRef<Path>,
{
    read_json("split", path)
}

pub fn read_model_file<P>(path: P) -> anyhow::Result<ModelArtifact>
where
    P: AsRef<Path>,
{
    read_json("model", path)
}

/// Read a preference CSV
///
/// # Errors
///
/// Returns error if the file cannot be opened or any row fails validation
pub fn read_preferences<P>(path: P) -> anyhow::Result<PreferenceDataset>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open preference file: {}", path.display()))?;
    let dataset = PreferenceDataset::from_csv_reader(path.display().to_string(), file)
        .with_context(|| format!("Invalid preference data in {}", path.display()))?;
    eprintln!(
        "Loaded {} preferences from {} participants ({})",
        dataset.len(),
        dataset.participants().len(),
        path.display()
    );
    Ok(dataset)
}

/// Loads `data`, merging `extra_data` into it when given.
///
/// Without a configured merge policy, equal participant identifiers in the two files
/// are taken to be the same person.
pub fn load_dataset(
    data: &Path,
    extra_data: Option<&Path>,
    config: &PipelineConfig,
) -> anyhow::Result<PreferenceDataset> {
    let dataset = read_preferences(data)?;
    let Some(extra_data) = extra_data else {
        return Ok(dataset);
    };
    let extra = read_preferences(extra_data)?;
    let policy = config
        .merge
        .clone()
        .unwrap_or(MergePolicy::SharedParticipants);
    let merged = dataset
        .merge(&extra, &policy)
        .with_context(|| format!("Failed to merge {}", extra_data.display()))?;
    eprintln!(
        "Merged dataset: {} preferences from {} participants",
        merged.len(),
        merged.participants().len()
    );
    Ok(merged)
}

pub fn read_frequencies(config: &PipelineConfig) -> anyhow::Result<Option<Arc<BigramFrequencies>>> {
    let Some(path) = &config.frequencies else {
        return Ok(None);
    };
    let file = File::open(path)
        .with_context(|| format!("Failed to open frequency file: {}", path.display()))?;
    let frequencies = BigramFrequencies::from_csv_reader(file)
        .with_context(|| format!("Invalid frequency table in {}", path.display()))?;
    Ok(Some(Arc::new(frequencies)))
}

/// Builds the feature store for the configured layout.
///
/// The `bigram_frequency` source is only available when a frequency table is
/// configured.
pub fn build_store(
    config: &PipelineConfig,
    frequencies: Option<Arc<BigramFrequencies>>,
) -> anyhow::Result<FeatureStore> {
    let layout = match &config.layout {
        Some(path) => {
            let layout: Layout = read_json("layout", path)?;
            layout
                .validate()
                .with_context(|| format!("Invalid layout in {}", path.display()))?;
            layout
        }
        None => Layout::qwerty_left(),
    };
    let name = layout.name.clone();
    let store = FeatureStore::new(layout, source::all_bigram_feature_sources(frequencies))
        .with_context(|| format!("Failed to build features for layout '{name}'"))?;
    store
        .validate(&config.features)
        .context("Feature configuration references an unavailable feature")?;
    Ok(store)
}

/// Train side, optional test side, and the split that produced them.
pub struct Partition {
    pub train: PreferenceDataset,
    pub test: Option<PreferenceDataset>,
    pub split: Option<Split>,
}

/// Applies the split file at `split_path`, verifying it belongs to `dataset`.
///
/// Without a split file the whole dataset is used for training.
pub fn partition(dataset: PreferenceDataset, split_path: Option<&Path>) -> anyhow::Result<Partition> {
    let Some(path) = split_path else {
        return Ok(Partition {
            train: dataset,
            test: None,
            split: None,
        });
    };
    let split = read_split_file(path)?;
    split
        .verify(&dataset)
        .with_context(|| format!("Split {} does not match the dataset", path.display()))?;
    let (train, test) = split
        .apply(&dataset)
        .with_context(|| format!("Failed to apply split {}", path.display()))?;
    eprintln!(
        "Using split {}: {} train / {} test preferences",
        path.display(),
        train.len(),
        test.len()
    );
    Ok(Partition {
        train,
        test: Some(test),
        split: Some(split),
    })
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Record {
        key: char,
        mean: f64,
        normalized: Option<f64>,
    }

    #[test]
    fn test_write_csv_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.csv");
        let records = [
            Record {
                key: 'q',
                mean: 0.5,
                normalized: Some(1.0),
            },
            Record {
                key: 'a',
                mean: -0.25,
                normalized: None,
            },
        ];
        write_csv(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "key,mean,normalized\nq,0.5,1.0\na,-0.25,\n");
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = PipelineConfig::default();
        write_report("pipeline configuration", &config, Some(&path)).unwrap();
        let reloaded = read_pipeline_config(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_pretty_json_ends_with_newline() {
        let mut buf = Vec::new();
        write_pretty_json(&mut buf, &serde_json::json!({"rank": 1})).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "{\n  \"rank\": 1\n}\n");
    }

    #[test]
    fn test_invalid_json_names_the_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = read_model_file(&path).unwrap_err();
        assert!(err.to_string().contains("not a valid model document"), "{err}");
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let err = read_pipeline_config("/nonexistent/pipeline.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pipeline.json"));
    }

    #[test]
    fn test_split_file_is_verified() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("prefs.csv");
        let mut csv = String::from("user_id,bigram1,bigram2,chosen_bigram\n");
        for p in 0..4 {
            csv.push_str(&format!("p{p},qa,sd,qa\np{p},fg,zx,zx\n"));
        }
        std::fs::write(&data, csv).unwrap();
        let dataset = read_preferences(&data).unwrap();
        let split = dataset.split(0.25, 3).unwrap();
        let split_path = dir.path().join("split.json");
        write_report("split", &split, Some(&split_path)).unwrap();

        let partition = partition(dataset.clone(), Some(&split_path)).unwrap();
        assert_eq!(partition.train.len() + partition.test.unwrap().len(), 8);

        let other = dataset.subset(&[0, 1, 2]).unwrap();
        assert!(super::partition(other, Some(&split_path)).is_err());
    }

    #[test]
    fn test_split_of_merged_data_needs_the_same_merge() {
        let dir = tempfile::tempdir().unwrap();
        let header = "user_id,bigram1,bigram2,chosen_bigram\n";
        let data = dir.path().join("prefs.csv");
        let extra = dir.path().join("more.csv");
        std::fs::write(&data, format!("{header}p0,qa,sd,qa\np1,qa,sd,sd\np2,fg,zx,zx\n")).unwrap();
        std::fs::write(&extra, format!("{header}p3,qa,sd,qa\np4,fg,zx,fg\n")).unwrap();
        let config = PipelineConfig::default();

        let merged = load_dataset(&data, Some(&extra), &config).unwrap();
        assert_eq!(merged.len(), 5);
        let split_path = dir.path().join("split.json");
        write_report("split", &merged.split(0.4, 1).unwrap(), Some(&split_path)).unwrap();

        let reloaded = load_dataset(&data, Some(&extra), &config).unwrap();
        assert!(partition(reloaded, Some(&split_path)).is_ok());
        let data_only = load_dataset(&data, None, &config).unwrap();
        assert!(partition(data_only, Some(&split_path)).is_err());
    }
}
