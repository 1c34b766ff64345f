pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod pipeline;
pub mod placement;
pub mod postprocess;
pub mod relink;
pub mod report;
pub mod util;
