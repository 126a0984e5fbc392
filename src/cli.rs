use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::EngineConfig;
use crate::core::input::MappingPolicy;
use crate::entities::Variant;

// Build version with codec info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Codecs: png, jpeg, webp (image 0.25)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Input mapping override
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyArg {
    Absolute,
    Damped,
    External,
}

impl PolicyArg {
    /// Switch modes, keeping configured damped tunables when already damped
    pub fn apply(self, current: MappingPolicy) -> MappingPolicy {
        match self {
            PolicyArg::Absolute => MappingPolicy::Absolute,
            PolicyArg::External => MappingPolicy::External,
            PolicyArg::Damped if current.is_damped() => current,
            PolicyArg::Damped => MappingPolicy::default(),
        }
    }
}

/// Scroll-synchronized frame sequence renderer
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Config file (default: $SCRUBSEQ_CONFIG_DIR or platform config dir)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Variant id from the config catalog (default: first)
    #[arg(long = "variant", value_name = "ID", conflicts_with = "template")]
    pub variant: Option<String>,

    /// Ad-hoc variant URL template, with "000" as the frame placeholder
    #[arg(short = 't', long = "template", value_name = "TEMPLATE", requires = "frames")]
    pub template: Option<String>,

    /// Frame count for --template
    #[arg(short = 'n', long = "frames", value_name = "N", requires = "template")]
    pub frames: Option<usize>,

    /// Base directory for relative frame URLs
    #[arg(short = 'r', long = "root", value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Switch to the next variant N times (negative: previous) after the first load
    #[arg(long = "cycle", value_name = "N", default_value_t = 0, allow_hyphen_values = true)]
    pub cycle: i32,

    /// Surface width in pixels
    #[arg(long = "width", value_name = "PX", default_value_t = 1280)]
    pub width: u32,

    /// Surface height in pixels (also the viewport height for --scroll)
    #[arg(long = "height", value_name = "PX", default_value_t = 720)]
    pub height: u32,

    /// Resize the surface to WIDTH HEIGHT after input, before saving
    #[arg(long = "resize", value_names = ["WIDTH", "HEIGHT"], num_args = 2)]
    pub resize: Option<Vec<u32>>,

    /// Mapping policy override
    #[arg(short = 'm', long = "policy", value_enum)]
    pub policy: Option<PolicyArg>,

    /// Initial batch size override
    #[arg(short = 'b', long = "batch", value_name = "N")]
    pub batch: Option<usize>,

    /// Fetch worker threads override
    #[arg(short = 'w', long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Scroll offset (absolute policy)
    #[arg(long = "scroll", value_name = "OFFSET", conflicts_with_all = ["progress", "wheel"])]
    pub scroll: Option<f64>,

    /// Total page height for --scroll
    #[arg(long = "page-height", value_name = "PX", default_value_t = 4000.0)]
    pub page_height: f64,

    /// Wheel delta (damped policy); repeat for several events
    #[arg(
        long = "wheel",
        value_name = "DELTA",
        allow_hyphen_values = true,
        conflicts_with = "progress"
    )]
    pub wheel: Vec<f64>,

    /// Normalized progress 0..1 (external or absolute policy)
    #[arg(short = 'p', long = "progress", value_name = "P")]
    pub progress: Option<f64>,

    /// Output PNG for the final surface
    #[arg(short = 'o', long = "output", value_name = "PNG", default_value = "frame.png")]
    pub output: PathBuf,

    /// Seconds to wait for loads before giving up
    #[arg(long = "timeout", value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Write the effective config back to the config file and exit
    #[arg(long = "save-config")]
    pub save_config: bool,

    /// Enable debug logging to file (default: scrubseq.log in the config dir)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl Args {
    /// Fold CLI overrides into the loaded config
    pub fn apply_overrides(&self, config: &mut EngineConfig) {
        if let Some(batch) = self.batch {
            config.initial_batch = batch;
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(policy) = self.policy {
            config.mapping = policy.apply(config.mapping);
        }
    }

    /// Variant to mount first and its position in the catalog (None for --template)
    pub fn initial_variant(&self, config: &EngineConfig) -> Result<(Variant, Option<usize>)> {
        if let (Some(template), Some(frames)) = (&self.template, self.frames) {
            let variant = Variant::new("cli", "", template.as_str(), frames)?;
            return Ok((variant, None));
        }

        let index = match &self.variant {
            Some(id) => match config.variants.position(id) {
                Some(i) => i,
                None => bail!("Unknown variant '{}'", id),
            },
            None => 0,
        };
        match config.variants.get(index) {
            Some(v) => Ok((v.clone(), Some(index))),
            None => bail!("No variants configured; pass --template and --frames"),
        }
    }
}
