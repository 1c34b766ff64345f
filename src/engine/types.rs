use crate::config::ImageMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocDiag {
    pub python_exe: String,
    pub python_version: String,
    pub docling_version: Option<String>,
    #[serde(default)]
    pub ocr_engine: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertIn {
    pub input_path: String,
    /// Directory the runner saves picture and table images into.
    pub images_dir: String,
    pub image_mode: ImageMode,
    pub do_ocr: bool,
    pub force_full_page_ocr: bool,
    pub generate_table_images: bool,
    /// File name pattern for table images, `{index}` substituted.
    pub table_filename: String,
    /// Per-run directory for the runner's temporary files. Nothing is
    /// written next to the output except into `images_dir`.
    pub scratch_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableImage {
    pub index: usize,
    /// Absolute path of the saved image; absent when Docling produced none.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertOut {
    pub ok: bool,
    pub markdown: String,
    /// Docling's JSON export of the converted document.
    #[serde(default)]
    pub document: serde_json::Value,
    #[serde(default)]
    pub tables: Vec<TableImage>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub meta: serde_json::Value,
}
