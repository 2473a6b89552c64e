use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Background for metric columns in grid views
pub const METRIC_BACKGROUND: &str = "#f0f8ff";
/// Background for parameter columns in grid views
pub const PARAMETER_BACKGROUND: &str = "#fff8f0";
const DYNAMIC_COLUMN_WIDTH: u16 = 120;

/// Fixed name sets used to classify logged-model columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub identity_names: Vec<String>,
    pub parameter_prefix: String,
    pub dataset_labels: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            identity_names: [
                "model_id",
                "model_name",
                "creation_timestamp",
                "last_updated_timestamp",
                "user_id",
                "description",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            parameter_prefix: "param_".to_string(),
            dataset_labels: ["train", "validation", "val", "test", "eval", "evaluation"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// What a column name means for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnClass {
    Identity,
    DatasetMetric { dataset: String, metric: String },
    GeneralMetric { metric: String },
    Parameter { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GroupKind {
    Identity,
    Metric,
    Parameter,
}

/// Presentation metadata handed to the grid renderer untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStyle {
    pub sortable: bool,
    pub filter: bool,
    pub resizable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<&'static str>,
}

impl ColumnStyle {
    pub fn for_group(group: GroupKind) -> Self {
        let (width, background) = match group {
            GroupKind::Identity => (None, None),
            GroupKind::Metric => (Some(DYNAMIC_COLUMN_WIDTH), Some(METRIC_BACKGROUND)),
            GroupKind::Parameter => (Some(DYNAMIC_COLUMN_WIDTH), Some(PARAMETER_BACKGROUND)),
        };
        Self {
            sortable: true,
            filter: true,
            resizable: true,
            width,
            background,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayColumn {
    pub field: String,
    pub label: String,
    pub group: GroupKind,
    #[serde(flatten)]
    pub style: ColumnStyle,
}

impl DisplayColumn {
    fn new(field: &str, label: String, group: GroupKind) -> Self {
        Self {
            field: field.to_string(),
            label,
            group,
            style: ColumnStyle::for_group(group),
        }
    }
}

/// Splits logged-model result columns into identity, per-dataset metric,
/// general metric and parameter groups.
#[derive(Debug, Clone)]
pub struct ColumnClassifier {
    config: ClassifierConfig,
    labels: BTreeSet<String>,
}

impl Default for ColumnClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl ColumnClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let labels = config
            .dataset_labels
            .iter()
            .map(|l| l.to_lowercase())
            .collect();
        Self { config, labels }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Identity wins over the parameter prefix when the configured sets overlap.
    pub fn classify(&self, name: &str) -> ColumnClass {
        if self.config.identity_names.iter().any(|n| n == name) {
            return ColumnClass::Identity;
        }
        if let Some(rest) = name.strip_prefix(self.config.parameter_prefix.as_str()) {
            return ColumnClass::Parameter {
                name: rest.to_string(),
            };
        }
        match name.split_once('_') {
            Some((left, right)) if !right.is_empty() && self.labels.contains(&left.to_lowercase()) => {
                ColumnClass::DatasetMetric {
                    dataset: left.to_string(),
                    metric: right.to_string(),
                }
            }
            _ => ColumnClass::GeneralMetric {
                metric: name.to_string(),
            },
        }
    }

    /// Ordered display columns for a set of column names. Input order does not
    /// matter and duplicate names are collapsed.
    pub fn classify_and_group<I, S>(&self, columns: I) -> Vec<DisplayColumn>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = columns
            .into_iter()
            .map(|c| c.as_ref().to_string())
            .collect();

        let mut dataset_metrics: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut general: BTreeSet<String> = BTreeSet::new();
        let mut params: BTreeMap<String, String> = BTreeMap::new();

        for name in &names {
            match self.classify(name) {
                ColumnClass::Identity => {}
                ColumnClass::DatasetMetric { dataset, metric } => {
                    dataset_metrics
                        .entry(dataset)
                        .or_default()
                        .insert(metric, name.clone());
                }
                ColumnClass::GeneralMetric { metric } => {
                    general.insert(metric);
                }
                ColumnClass::Parameter { name: stripped } => {
                    params.insert(stripped, name.clone());
                }
            }
        }

        let mut out = Vec::with_capacity(names.len());

        for identity in &self.config.identity_names {
            if names.contains(identity) {
                out.push(DisplayColumn::new(identity, title_case(identity), GroupKind::Identity));
            }
        }

        for (dataset, metrics) in &dataset_metrics {
            for (metric, field) in metrics {
                let label = format!("{}: {}", dataset.to_uppercase(), title_case(metric));
                out.push(DisplayColumn::new(field, label, GroupKind::Metric));
            }
        }

        for metric in &general {
            out.push(DisplayColumn::new(metric, title_case(metric), GroupKind::Metric));
        }

        for (stripped, field) in &params {
            let label = format!("Param: {}", title_case(stripped));
            out.push(DisplayColumn::new(field, label, GroupKind::Parameter));
        }

        out
    }

    /// Metric columns keyed by dataset name; metrics without a dataset land under `general`.
    pub fn group_metrics_by_dataset<I, S>(&self, columns: I) -> BTreeMap<String, Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for column in columns {
            match self.classify(column.as_ref()) {
                ColumnClass::DatasetMetric { dataset, metric } => {
                    grouped.entry(dataset).or_default().push(metric)
                }
                ColumnClass::GeneralMetric { metric } => {
                    grouped.entry("general".to_string()).or_default().push(metric)
                }
                ColumnClass::Identity | ColumnClass::Parameter { .. } => {}
            }
        }
        for metrics in grouped.values_mut() {
            metrics.sort();
            metrics.dedup();
        }
        grouped
    }
}

/// Header list for tables without metric grouping (runs, jobs): input order, title-cased.
pub fn plain_columns<I, S>(columns: I) -> Vec<DisplayColumn>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    columns
        .into_iter()
        .map(|c| {
            let field = c.as_ref();
            DisplayColumn {
                field: field.to_string(),
                label: title_case(field),
                group: GroupKind::Identity,
                style: ColumnStyle::for_group(GroupKind::Identity),
            }
        })
        .collect()
}

/// `learning_rate` -> `Learning Rate`, `f1` -> `F1`.
///
/// A letter is upper-cased when the character before it is not a letter and
/// lower-cased otherwise.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_is_letter = false;
    for ch in name.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn fields(cols: &[DisplayColumn]) -> Vec<&str> {
        cols.iter().map(|c| c.field.as_str()).collect()
    }

    fn labels(cols: &[DisplayColumn]) -> Vec<&str> {
        cols.iter().map(|c| c.label.as_str()).collect()
    }

    #[test]
    fn test_classify_examples() {
        let c = ColumnClassifier::default();
        assert_eq!(
            c.classify("train_accuracy"),
            ColumnClass::DatasetMetric {
                dataset: "train".into(),
                metric: "accuracy".into()
            }
        );
        assert_eq!(
            c.classify("validation_f1"),
            ColumnClass::DatasetMetric {
                dataset: "validation".into(),
                metric: "f1".into()
            }
        );
        assert_eq!(c.classify("loss"), ColumnClass::GeneralMetric { metric: "loss".into() });
        assert_eq!(
            c.classify("param_learning_rate"),
            ColumnClass::Parameter {
                name: "learning_rate".into()
            }
        );
        assert_eq!(c.classify("model_id"), ColumnClass::Identity);
    }

    #[test]
    fn test_labels_for_examples() {
        let c = ColumnClassifier::new(ClassifierConfig::default());
        let cols = c.classify_and_group(["train_accuracy", "validation_f1", "loss", "param_learning_rate"]);
        assert_eq!(
            labels(&cols),
            vec!["TRAIN: Accuracy", "VALIDATION: F1", "Loss", "Param: Learning Rate"]
        );
        assert_eq!(cols.last().unwrap().group, GroupKind::Parameter);
    }

    #[test]
    fn test_scenario_ordering() {
        let c = ColumnClassifier::new(ClassifierConfig::default());
        let cols = c.classify_and_group([
            "model_id",
            "description",
            "eval_auc",
            "train_auc",
            "accuracy",
            "param_depth",
        ]);
        assert_eq!(
            fields(&cols),
            vec!["model_id", "description", "eval_auc", "train_auc", "accuracy", "param_depth"]
        );
        assert_eq!(
            labels(&cols),
            vec!["Model Id", "Description", "EVAL: Auc", "TRAIN: Auc", "Accuracy", "Param: Depth"]
        );
    }

    #[test]
    fn test_deterministic_regardless_of_input_order() {
        let c = ColumnClassifier::new(ClassifierConfig::default());
        let a = c.classify_and_group(["param_b", "test_rmse", "user_id", "r2", "param_a", "model_id"]);
        let b = c.classify_and_group(["model_id", "param_a", "r2", "user_id", "test_rmse", "param_b"]);
        assert_eq!(a, b);
        assert_eq!(fields(&a), vec!["model_id", "user_id", "test_rmse", "r2", "param_a", "param_b"]);
    }

    #[test]
    fn test_empty_input() {
        let c = ColumnClassifier::new(ClassifierConfig::default());
        assert!(c.classify_and_group(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_dataset_label_without_metric_is_general() {
        let c = ColumnClassifier::new(ClassifierConfig::default());
        assert_eq!(c.classify("train"), ColumnClass::GeneralMetric { metric: "train".into() });
        assert_eq!(c.classify("train_"), ColumnClass::GeneralMetric { metric: "train_".into() });
    }

    #[test]
    fn test_dataset_label_is_case_insensitive_and_keeps_label_case() {
        let c = ColumnClassifier::new(ClassifierConfig::default());
        let cols = c.classify_and_group(["Test_score", "VAL_loss"]);
        assert_eq!(labels(&cols), vec!["TEST: Score", "VAL: Loss"]);
    }

    #[test]
    fn test_dataset_metrics_sorted_within_dataset() {
        let c = ColumnClassifier::new(ClassifierConfig::default());
        let cols = c.classify_and_group(["val_zeta", "val_alpha", "eval_mid"]);
        assert_eq!(fields(&cols), vec!["eval_mid", "val_alpha", "val_zeta"]);
    }

    #[test]
    fn test_identity_wins_when_sets_overlap() {
        let mut config = ClassifierConfig::default();
        config.identity_names.push("param_owner".to_string());
        let c = ColumnClassifier::new(config);
        assert_eq!(c.classify("param_owner"), ColumnClass::Identity);
        let cols = c.classify_and_group(["param_owner", "param_depth"]);
        assert_eq!(cols[0].group, GroupKind::Identity);
        assert_eq!(cols[1].label, "Param: Depth");
    }

    #[test]
    fn test_absent_identity_names_are_skipped() {
        let c = ColumnClassifier::new(ClassifierConfig::default());
        let cols = c.classify_and_group(["user_id", "loss"]);
        assert_eq!(fields(&cols), vec!["user_id", "loss"]);
    }

    #[test]
    fn test_style_hints() {
        let c = ColumnClassifier::new(ClassifierConfig::default());
        let cols = c.classify_and_group(["model_id", "loss", "param_x"]);
        assert_eq!(cols[0].style.background, None);
        assert_eq!(cols[1].style.background, Some(METRIC_BACKGROUND));
        assert_eq!(cols[2].style.background, Some(PARAMETER_BACKGROUND));
        assert!(cols.iter().all(|c| c.style.sortable && c.style.filter && c.style.resizable));
    }

    #[test]
    fn test_serializes_flat_camel_case() {
        let c = ColumnClassifier::new(ClassifierConfig::default());
        let cols = c.classify_and_group(["train_loss"]);
        let json = serde_json::to_value(&cols[0]).unwrap();
        assert_eq!(json["field"], "train_loss");
        assert_eq!(json["label"], "TRAIN: Loss");
        assert_eq!(json["group"], "metric");
        assert_eq!(json["width"], 120);
        assert_eq!(json["background"], METRIC_BACKGROUND);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("learning_rate"), "Learning Rate");
        assert_eq!(title_case("f1"), "F1");
        assert_eq!(title_case("AUC"), "Auc");
        assert_eq!(title_case("last_updated_timestamp"), "Last Updated Timestamp");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_group_metrics_by_dataset() {
        let c = ColumnClassifier::new(ClassifierConfig::default());
        let grouped = c.group_metrics_by_dataset(["train_loss", "train_acc", "r2", "model_id", "param_x"]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["train"], vec!["acc", "loss"]);
        assert_eq!(grouped["general"], vec!["r2"]);
    }

    #[test]
    fn test_plain_columns_keep_order() {
        let cols = plain_columns(["run_name", "start_time"]);
        assert_eq!(labels(&cols), vec!["Run Name", "Start Time"]);
    }
}
