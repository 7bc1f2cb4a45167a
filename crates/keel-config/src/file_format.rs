use serde::{Deserialize, Serialize};

/// Supported file formats for migration definitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Json,
    Yaml,
    Yml,
    Sql,
}

impl FileFormat {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Yaml => "yaml",
            FileFormat::Yml => "yml",
            FileFormat::Sql => "sql",
        }
    }

    /// Format for a file extension, if it is one of ours.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(FileFormat::Json),
            "yaml" => Some(FileFormat::Yaml),
            "yml" => Some(FileFormat::Yml),
            "sql" => Some(FileFormat::Sql),
            _ => None,
        }
    }
}
