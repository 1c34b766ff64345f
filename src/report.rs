use crate::{
    config::ImageMode,
    placement::{InsertionRecord, PlacementSummary},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub input: String,
    pub output: String,
    pub image_mode: ImageMode,
    pub started: String,
    pub finished: String,
    pub tables_detected: usize,
    pub images_in_output: usize,
    pub links_relinked: usize,
    pub placement: Option<PlacementReport>,
    pub warnings: Vec<String>,
    pub meta: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementReport {
    pub summary: PlacementSummary,
    pub records: Vec<InsertionRecord>,
}
