//! Pipeline manifest configuration.
//!
//! The manifest is a YAML document loaded once at startup and injected
//! into each component as an immutable structure. It registers every
//! pipeline under its control-file name: where its files land, which
//! markers cascade to dependent pipelines, which workflow schedules it
//! drives, and the runtime SQL parameters handed to downstream tasks.
//!
//! # Example
//!
//! ```yaml
//! settings:
//!   stage: prod
//!   landing_db: landing_db_prod
//! pipelines:
//!   state_emission_daily.done:
//!     type: state_emission_daily
//!     incoming_path: incoming/all_ef_files
//!     dependent_markers:
//!       - state_emission_monthly.done
//!     schedules:
//!       - cadence: daily
//!         workflow_parameter: /pipeline/wf-emission-daily
//!     runtime_sql_params:
//!       param_landing_db_name: landing_db_prod
//! ```

mod vars;

pub use vars::{interpolate, InterpolationResult};

use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_stage() -> String {
    "dev".to_string()
}

fn default_descriptor_prefix() -> String {
    "pipeline_meta".to_string()
}

fn default_omit_suffixes() -> Vec<String> {
    vec![".done".to_string(), ".completed".to_string()]
}

fn default_monthly_run_day() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

/// How often a workflow schedule should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Monthly,
    Yearly,
}

impl Cadence {
    /// The lowercase wire form used in workflow payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Monthly => "monthly",
            Cadence::Yearly => "yearly",
        }
    }
}

/// One workflow schedule declared by a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    /// How often this schedule fires.
    pub cadence: Cadence,
    /// Reference date for the monthly gating flag. Resolved from
    /// `settings.monthly_run_day` at load time when not given explicitly.
    #[serde(default)]
    pub monthly: Option<NaiveDate>,
    /// Reference date for the yearly gating flag.
    #[serde(default)]
    pub yearly: Option<NaiveDate>,
    /// Parameter-store key naming the downstream workflow.
    pub workflow_parameter: String,
}

/// Static registration of one pipeline, keyed by its control-file name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline type identifier (e.g. `state_emission_daily`).
    #[serde(rename = "type")]
    pub pipeline_type: String,
    /// Prefix under which this pipeline's files land, without the
    /// trailing execution-date segment.
    pub incoming_path: String,
    /// Control-file names written into dependent pipelines' incoming
    /// folders when this pipeline completes.
    #[serde(default)]
    pub dependent_markers: Vec<String>,
    /// Workflow schedules driven by this pipeline.
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    /// Whether file arrival triggers the downstream workflow at all.
    #[serde(default = "default_true")]
    pub trigger_workflow: bool,
    /// Runtime SQL parameters forwarded to downstream tasks.
    #[serde(default)]
    pub runtime_sql_params: IndexMap<String, String>,
    /// Static top-level workflow payload fields.
    #[serde(default)]
    pub workflow_payload: IndexMap<String, String>,
}

impl PipelineConfig {
    /// Whether any declared schedule runs daily.
    pub fn has_daily_schedule(&self) -> bool {
        self.schedules
            .iter()
            .any(|schedule| schedule.cadence == Cadence::Daily)
    }
}

/// Process-wide settings shared by every pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Deployment stage tag stamped into workflow payloads.
    #[serde(default = "default_stage")]
    pub stage: String,
    /// Database name rooting landing-table destination paths.
    pub landing_db: String,
    /// Object-store prefix holding per-pipeline file descriptors.
    #[serde(default = "default_descriptor_prefix")]
    pub descriptor_prefix: String,
    /// File-name suffixes excluded from copy planning (markers etc).
    #[serde(default = "default_omit_suffixes")]
    pub omit_suffixes: Vec<String>,
    /// Day of month on which monthly-gated schedules fire.
    #[serde(default = "default_monthly_run_day")]
    pub monthly_run_day: u32,
}

impl Settings {
    /// Whether a file name carries one of the to-be-omitted suffixes.
    pub fn is_omitted(&self, file_name: &str) -> bool {
        self.omit_suffixes
            .iter()
            .any(|suffix| file_name.contains(suffix.as_str()))
    }
}

/// The full pipeline manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Shared settings.
    pub settings: Settings,
    /// Pipelines keyed by control-file name.
    pub pipelines: IndexMap<String, PipelineConfig>,
}

impl Manifest {
    /// Parse a manifest from YAML text.
    ///
    /// Environment variables are interpolated into the raw text first,
    /// schedule reference dates are resolved against `today`, and the
    /// result is validated.
    pub fn parse(contents: &str, today: NaiveDate) -> Result<Self, ConfigError> {
        let result = interpolate(contents);
        if !result.is_ok() {
            return Err(ConfigError::EnvInterpolation {
                message: result.errors.join("\n"),
            });
        }

        let mut manifest: Manifest = serde_yaml::from_str(&result.text)
            .map_err(|source| ConfigError::YamlParse { source })?;

        manifest.resolve_reference_dates(today);
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load a manifest from a file.
    pub fn from_file(path: &str, today: NaiveDate) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile { source })?;
        Self::parse(&contents, today)
    }

    /// Resolve schedule reference dates that were not given explicitly.
    ///
    /// Monthly references default to `settings.monthly_run_day` in the
    /// current month. On the `dev` stage every reference resolves to
    /// today, so development environments exercise monthly and yearly
    /// tasks on every run.
    fn resolve_reference_dates(&mut self, today: NaiveDate) {
        let dev = self.settings.stage == "dev";
        let monthly_default =
            NaiveDate::from_ymd_opt(today.year(), today.month(), self.settings.monthly_run_day);

        for pipeline in self.pipelines.values_mut() {
            for schedule in &mut pipeline.schedules {
                if dev {
                    schedule.monthly = Some(today);
                    schedule.yearly = Some(today);
                    continue;
                }
                if schedule.monthly.is_none() {
                    schedule.monthly = monthly_default;
                }
            }
        }
    }

    /// Validate the manifest.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_types = Vec::new();
        for (control_file, pipeline) in &self.pipelines {
            if pipeline.incoming_path.trim().is_empty() {
                return Err(ConfigError::EmptyIncomingPath {
                    pipeline: control_file.clone(),
                });
            }
            if pipeline.trigger_workflow && pipeline.schedules.is_empty() {
                return Err(ConfigError::NoSchedules {
                    pipeline: control_file.clone(),
                });
            }
            if seen_types.contains(&pipeline.pipeline_type) {
                return Err(ConfigError::DuplicatePipelineType {
                    pipeline_type: pipeline.pipeline_type.clone(),
                });
            }
            seen_types.push(pipeline.pipeline_type.clone());
        }
        Ok(())
    }

    /// Look up a pipeline by the exact control-file name.
    pub fn by_control_file(&self, control_file: &str) -> Result<&PipelineConfig, ConfigError> {
        self.pipelines
            .get(control_file)
            .ok_or_else(|| ConfigError::UnknownControlFile {
                control_file: control_file.to_string(),
            })
    }

    /// Look up a pipeline by its type identifier.
    ///
    /// Returns the control-file name alongside the configuration.
    pub fn by_pipeline_type(
        &self,
        pipeline_type: &str,
    ) -> Result<(&str, &PipelineConfig), ConfigError> {
        self.pipelines
            .iter()
            .find(|(_, pipeline)| pipeline.pipeline_type == pipeline_type)
            .map(|(control_file, pipeline)| (control_file.as_str(), pipeline))
            .ok_or_else(|| ConfigError::UnknownPipelineType {
                pipeline_type: pipeline_type.to_string(),
            })
    }

    /// Iterate over all pipelines with their control-file names.
    pub fn pipelines(&self) -> impl Iterator<Item = (&String, &PipelineConfig)> {
        self.pipelines.iter()
    }
}
