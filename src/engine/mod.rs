pub mod python;
pub mod types;

use anyhow::Result;

pub use types::{ConvertIn, ConvertOut, DocDiag, TableImage};

pub trait Engine {
    fn doctor(&self) -> Result<DocDiag>;
    fn convert(&self, req: &ConvertIn) -> Result<ConvertOut>;
}
