use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub hashing: Hashing,
    #[serde(default)]
    pub docling: Docling,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default)]
    pub images: Images,
    #[serde(default)]
    pub postprocess: Postprocess,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Global {
    pub keep_intermediates: bool,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            keep_intermediates: false,
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub work_dir: String,
    pub scripts_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            work_dir: ".markbridge-work".into(),
            scripts_dir: "scripts".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Hashing {
    pub mode: String,
    pub fast_window_bytes: u64,
}
impl Default for Hashing {
    fn default() -> Self {
        Self {
            mode: "fast_2x16mb".into(),
            fast_window_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Docling {
    pub python_exe: String,
    pub timeout_seconds: u64,
    pub doctor_timeout_seconds: u64,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub pipeline: DoclingPipeline,
    #[serde(default)]
    pub ocr: DoclingOcr,
}
impl Default for Docling {
    fn default() -> Self {
        Self {
            python_exe: "auto".into(),
            timeout_seconds: 900,
            doctor_timeout_seconds: 60,
            env: Default::default(),
            pipeline: Default::default(),
            ocr: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DoclingPipeline {
    pub do_ocr: bool,
    pub do_table_structure: bool,
    pub generate_picture_images: bool,
    pub generate_page_images: bool,
    pub generate_table_images: bool,
    pub images_scale: f32,
}
impl Default for DoclingPipeline {
    fn default() -> Self {
        Self {
            do_ocr: true,
            do_table_structure: true,
            generate_picture_images: true,
            generate_page_images: true,
            generate_table_images: true,
            images_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DoclingOcr {
    pub engine: String,
    pub models_dir: String,
    pub force_full_page_ocr: bool,
}
impl Default for DoclingOcr {
    fn default() -> Self {
        Self {
            engine: "rapidocr".into(),
            models_dir: "".into(),
            force_full_page_ocr: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Placement {
    pub enabled: bool,
    pub context_marker_chars: usize,
    pub context_lookahead: usize,
    pub alt_label: String,
    pub trailer_heading: String,
}
impl Default for Placement {
    fn default() -> Self {
        Self {
            enabled: true,
            context_marker_chars: 30,
            context_lookahead: 4,
            alt_label: "Table".into(),
            trailer_heading: "## Table Images".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Images {
    /// File name for saved table images; `{index}` is replaced by the
    /// 0-based table index.
    pub table_filename: String,
    pub make_paths_relative: bool,
    pub require_existing: bool,
}
impl Default for Images {
    fn default() -> Self {
        Self {
            table_filename: "table_{index}.png".into(),
            make_paths_relative: true,
            require_existing: true,
        }
    }
}

impl Images {
    pub fn table_file_name(&self, index: usize) -> String {
        self.table_filename.replace("{index}", &index.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Postprocess {
    pub normalize_newlines: bool,
    pub normalize_unicode: bool,
    pub trim_trailing_whitespace: bool,
}
impl Default for Postprocess {
    fn default() -> Self {
        Self {
            normalize_newlines: true,
            normalize_unicode: false,
            trim_trailing_whitespace: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    /// Images are left out of the Markdown.
    Placeholder,
    /// Images are inlined as base64 data URIs.
    Embedded,
    /// Images are saved next to the Markdown and linked by relative path.
    #[default]
    Referenced,
}

impl ImageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMode::Placeholder => "placeholder",
            ImageMode::Embedded => "embedded",
            ImageMode::Referenced => "referenced",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub image_mode: ImageMode,
    pub write_report_json: bool,
    pub write_document_json: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            image_mode: ImageMode::Referenced,
            write_report_json: true,
            write_document_json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    pub keep_python_stderr: bool,
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_python_stderr: true,
            dump_effective_config: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    pub reject_url_inputs: bool,
    pub pin_scripts_dir: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
            pin_scripts_dir: true,
        }
    }
}
