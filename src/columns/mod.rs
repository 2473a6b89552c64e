pub mod classifier;

pub use classifier::{
    plain_columns, title_case, ClassifierConfig, ColumnClass, ColumnClassifier, ColumnStyle,
    DisplayColumn, GroupKind,
};
