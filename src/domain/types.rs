//! Shared domain enumerations: output formats and job lifecycle states.

use std::{fmt, str::FromStr};

use kartenwerk_api_types::JobStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raster size variant requested for PNG output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PngSize {
    /// Plain `png`: rendered at native resolution, stored without a size suffix.
    Native,
    Small,
    Medium,
    Large,
}

impl PngSize {
    /// Post-render scale factor applied to the native raster.
    pub fn scale(self) -> f64 {
        match self {
            PngSize::Native | PngSize::Large => 1.0,
            PngSize::Medium => 0.75,
            PngSize::Small => 0.5,
        }
    }

    pub fn as_str(self) -> Option<&'static str> {
        match self {
            PngSize::Native => None,
            PngSize::Small => Some("small"),
            PngSize::Medium => Some("medium"),
            PngSize::Large => Some("large"),
        }
    }
}

/// Artifact format, parsed once from the `"<ext>[:<size>]"` wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FileFormat {
    Svg,
    Png(PngSize),
    Pdf,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FileFormatError {
    #[error("unsupported file type `{0}`")]
    UnsupportedExtension(String),
    #[error("unsupported size `{size}` for file type `{extension}`")]
    UnsupportedSize { extension: String, size: String },
}

impl FileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Svg => "svg",
            FileFormat::Png(_) => "png",
            FileFormat::Pdf => "pdf",
        }
    }

    pub fn mimetype(self) -> &'static str {
        match self {
            FileFormat::Svg => "image/svg+xml",
            FileFormat::Png(_) => "image/png",
            FileFormat::Pdf => "application/pdf",
        }
    }

    /// Scale factor for the rendered output; only PNG sizes differ from 1.
    pub fn scale(self) -> f64 {
        match self {
            FileFormat::Png(size) => size.scale(),
            FileFormat::Svg | FileFormat::Pdf => 1.0,
        }
    }

    /// Size component of the artifact name (`small` in `{version}_small.png`).
    pub fn size_suffix(self) -> Option<&'static str> {
        match self {
            FileFormat::Png(size) => size.as_str(),
            FileFormat::Svg | FileFormat::Pdf => None,
        }
    }
}

impl FromStr for FileFormat {
    type Err = FileFormatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (extension, size) = match trimmed.split_once(':') {
            Some((extension, size)) => (extension, Some(size)),
            None => (trimmed, None),
        };

        match (extension.to_ascii_lowercase().as_str(), size) {
            ("svg", None) => Ok(FileFormat::Svg),
            ("pdf", None) => Ok(FileFormat::Pdf),
            ("png", None) => Ok(FileFormat::Png(PngSize::Native)),
            ("png", Some(size)) => match size.to_ascii_lowercase().as_str() {
                "small" => Ok(FileFormat::Png(PngSize::Small)),
                "medium" => Ok(FileFormat::Png(PngSize::Medium)),
                "large" => Ok(FileFormat::Png(PngSize::Large)),
                _ => Err(FileFormatError::UnsupportedSize {
                    extension: extension.to_string(),
                    size: size.to_string(),
                }),
            },
            ("svg" | "pdf", Some(size)) => Err(FileFormatError::UnsupportedSize {
                extension: extension.to_string(),
                size: size.to_string(),
            }),
            _ => Err(FileFormatError::UnsupportedExtension(trimmed.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size_suffix() {
            Some(size) => write!(f, "{}:{size}", self.extension()),
            None => f.write_str(self.extension()),
        }
    }
}

impl TryFrom<String> for FileFormat {
    type Error = FileFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FileFormat> for String {
    fn from(value: FileFormat) -> Self {
        value.to_string()
    }
}

/// Lifecycle of a render job: `Queued -> Started -> {Finished, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Started,
    Finished,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Started => "started",
            JobState::Finished => "finished",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Finished | JobState::Failed)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Queued, JobState::Started)
                | (JobState::Started, JobState::Finished)
                | (JobState::Started, JobState::Failed)
        )
    }
}

impl TryFrom<&str> for JobState {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "queued" => Ok(JobState::Queued),
            "started" => Ok(JobState::Started),
            "finished" => Ok(JobState::Finished),
            "failed" => Ok(JobState::Failed),
            _ => Err(()),
        }
    }
}

impl From<JobState> for JobStatus {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Queued => JobStatus::Queued,
            JobState::Started => JobStatus::Started,
            JobState::Finished => JobStatus::Finished,
            JobState::Failed => JobStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_formats() {
        assert_eq!("svg".parse::<FileFormat>(), Ok(FileFormat::Svg));
        assert_eq!("pdf".parse::<FileFormat>(), Ok(FileFormat::Pdf));
        assert_eq!(
            "png".parse::<FileFormat>(),
            Ok(FileFormat::Png(PngSize::Native))
        );
        assert_eq!(
            "png:small".parse::<FileFormat>(),
            Ok(FileFormat::Png(PngSize::Small))
        );
        assert_eq!(
            "PNG:Medium".parse::<FileFormat>(),
            Ok(FileFormat::Png(PngSize::Medium))
        );
    }

    #[test]
    fn rejects_unknown_extensions_and_sizes() {
        assert_eq!(
            "jpg".parse::<FileFormat>(),
            Err(FileFormatError::UnsupportedExtension("jpg".to_string()))
        );
        assert!(matches!(
            "png:huge".parse::<FileFormat>(),
            Err(FileFormatError::UnsupportedSize { .. })
        ));
        assert!(matches!(
            "svg:small".parse::<FileFormat>(),
            Err(FileFormatError::UnsupportedSize { .. })
        ));
        assert!("".parse::<FileFormat>().is_err());
    }

    #[test]
    fn size_variants_map_to_scale_and_suffix() {
        assert_eq!(FileFormat::Png(PngSize::Small).scale(), 0.5);
        assert_eq!(FileFormat::Png(PngSize::Medium).scale(), 0.75);
        assert_eq!(FileFormat::Png(PngSize::Large).scale(), 1.0);
        assert_eq!(FileFormat::Png(PngSize::Native).size_suffix(), None);
        assert_eq!(FileFormat::Png(PngSize::Large).size_suffix(), Some("large"));
        assert_eq!(FileFormat::Pdf.size_suffix(), None);
    }

    #[test]
    fn display_is_the_wire_form() {
        assert_eq!(FileFormat::Png(PngSize::Medium).to_string(), "png:medium");
        assert_eq!(FileFormat::Svg.to_string(), "svg");
        assert_eq!(FileFormat::Pdf.mimetype(), "application/pdf");
        assert_eq!(FileFormat::Svg.mimetype(), "image/svg+xml");
    }

    #[test]
    fn job_state_transitions_are_forward_only() {
        assert!(JobState::Queued.can_transition_to(JobState::Started));
        assert!(JobState::Started.can_transition_to(JobState::Finished));
        assert!(JobState::Started.can_transition_to(JobState::Failed));
        assert!(!JobState::Queued.can_transition_to(JobState::Finished));
        assert!(!JobState::Finished.can_transition_to(JobState::Failed));
        assert!(!JobState::Failed.can_transition_to(JobState::Started));
        assert_eq!(JobState::try_from("started"), Ok(JobState::Started));
    }
}
