use crate::{
    config::{Config, ImageMode},
    context,
    engine::{ConvertIn, ConvertOut, Engine, TableImage},
    placement::{self, PlacementOptions, Table},
    postprocess,
    relink,
    report::{JobReport, PlacementReport},
    util::{self, ensure_dir, now_rfc3339},
};
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct Pipeline<E: Engine> {
    cfg: Config,
    engine: E,
}

#[derive(Debug)]
pub struct JobOutput {
    pub markdown: String,
    pub document: serde_json::Value,
    pub report: JobReport,
}

impl<E: Engine> Pipeline<E> {
    pub fn new(cfg: &Config, engine: E) -> Self {
        Self {
            cfg: cfg.clone(),
            engine,
        }
    }

    /// Converts `input` into Markdown destined for `output_md`. Images land in
    /// a folder named after the output file's stem, next to it. Nothing is
    /// written to `output_md` itself.
    pub fn run_job(&self, input: &Path, output_md: &Path) -> Result<JobOutput> {
        let started = now_rfc3339();
        let mode = self.cfg.output.image_mode;
        let job_id = util::job_id(&self.cfg, input)?;

        let out_dir = output_dir(output_md)?;
        let stem = output_md
            .file_stem()
            .ok_or_else(|| anyhow!("output has no file name: {}", output_md.display()))?;
        let images_dir = out_dir.join(stem);
        if mode != ImageMode::Placeholder {
            ensure_dir(&images_dir)?;
        }

        // Each run stages into its own directory; the same input converted
        // twice at once must not share a copy.
        let work_root = PathBuf::from(&self.cfg.paths.work_dir);
        ensure_dir(&work_root)?;
        let staging = tempfile::Builder::new()
            .prefix(&format!("{job_id}-"))
            .keep(self.cfg.global.keep_intermediates)
            .tempdir_in(&work_root)
            .with_context(|| format!("creating staging dir in {}", work_root.display()))?;
        let staging_dir = staging.path().to_path_buf();
        let staged = util::stage_input(input, &staging_dir)?;
        info!("job_id={job_id} input={} staged={}", input.display(), staged.display());

        let req = ConvertIn {
            input_path: staged.display().to_string(),
            images_dir: images_dir.display().to_string(),
            image_mode: mode,
            do_ocr: self.cfg.docling.pipeline.do_ocr,
            force_full_page_ocr: self.cfg.docling.ocr.force_full_page_ocr,
            generate_table_images: self.cfg.docling.pipeline.generate_table_images,
            table_filename: self.cfg.images.table_filename.clone(),
            scratch_dir: staging_dir.display().to_string(),
        };
        let converted = self.engine.convert(&req);

        if self.cfg.global.keep_intermediates {
            debug!("kept staging dir {}", staging_dir.display());
        } else if let Err(err) = staging.close() {
            warn!("failed to remove staging dir {}: {err}", staging_dir.display());
        }

        let out = converted.with_context(|| format!("convert failed for {}", input.display()))?;
        if !out.ok {
            return Err(anyhow!(
                "conversion failed for {}; warnings={:?}",
                input.display(),
                out.warnings
            ));
        }

        let mut markdown = postprocess::normalize_markdown(&self.cfg, &out.markdown);

        let mut links_relinked = 0;
        if self.cfg.images.make_paths_relative {
            let (md, n) = relink::relativize_image_links(
                &markdown,
                &out_dir,
                self.cfg.images.require_existing,
            );
            markdown = md;
            links_relinked = n;
            debug!("relinked {n} image references");
        }

        let mut placement_report = None;
        if mode == ImageMode::Referenced && self.cfg.placement.enabled && !out.tables.is_empty() {
            let tables = self.tables_for(&out, &out_dir, &images_dir);
            let placed = placement::place(
                &markdown,
                &tables,
                &PlacementOptions::from(&self.cfg.placement),
            );
            let summary = placed.summary();
            info!(
                "tables placed={} anchored={} block={} appended={} skipped={}",
                summary.placed, summary.anchored, summary.block_placed, summary.appended, summary.skipped
            );
            markdown = placed.markdown;
            placement_report = Some(PlacementReport {
                summary,
                records: placed.records,
            });
        }

        let report = JobReport {
            job_id,
            input: input.display().to_string(),
            output: output_md.display().to_string(),
            image_mode: mode,
            started,
            finished: now_rfc3339(),
            tables_detected: out.tables.len(),
            images_in_output: postprocess::count_image_refs(&markdown),
            links_relinked,
            placement: placement_report,
            warnings: out.warnings,
            meta: out.meta,
        };

        Ok(JobOutput {
            markdown,
            document: out.document,
            report,
        })
    }

    fn tables_for(&self, out: &ConvertOut, out_dir: &Path, images_dir: &Path) -> Vec<Table> {
        let markers =
            context::markers_from_json(&out.document, (&self.cfg.placement).into());
        out.tables
            .iter()
            .map(|t: &TableImage| Table {
                index: t.index,
                image: self.table_image_path(t, images_dir).map(|p| {
                    relink::relative_link(out_dir, &p)
                        .unwrap_or_else(|| p.display().to_string())
                }),
                context_marker: markers.get(&t.index).cloned(),
            })
            .collect()
    }

    /// Path the engine reported, or the configured file name if the engine
    /// left the path out but the image was written anyway.
    fn table_image_path(&self, t: &TableImage, images_dir: &Path) -> Option<PathBuf> {
        if let Some(p) = &t.path {
            return Some(PathBuf::from(p));
        }
        let guess = images_dir.join(self.cfg.images.table_file_name(t.index));
        guess.exists().then_some(guess)
    }
}

fn output_dir(output_md: &Path) -> Result<PathBuf> {
    let dir = util::absolute_parent(output_md)?;
    ensure_dir(&dir)?;
    Ok(dir)
}
