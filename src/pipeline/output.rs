//! Output writer for subscription artifacts
//!
//! Layout under the output directory:
//! - `v2ray/all_sub.txt` — plain newline-delimited links
//! - `base64/all_sub.txt` — base64 of the plain list
//! - `regions/<CODE>.txt` — per-region lists
//! - `filtered/subs/<protocol>.txt` — per-protocol lists

use crate::pipeline::ranker::Aggregate;
use crate::Result;
use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Subdirectory for the plain all-in-one list
const V2RAY_DIR: &str = "v2ray";

/// Subdirectory for the base64 all-in-one list
const BASE64_DIR: &str = "base64";

/// Subdirectory for per-region lists
const REGIONS_DIR: &str = "regions";

/// Subdirectory for per-protocol lists
const FILTERED_SUBS_DIR: &str = "filtered/subs";

/// File name of the all-in-one lists
const ALL_SUB_FILE: &str = "all_sub.txt";

/// Writer for the subscription output tree
pub struct OutputWriter {
    out_dir: PathBuf,
}

impl OutputWriter {
    pub fn new<P: Into<PathBuf>>(out_dir: P) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Create the output directory tree
    pub fn setup_directories(&self) -> Result<()> {
        for dir in [V2RAY_DIR, BASE64_DIR, REGIONS_DIR, FILTERED_SUBS_DIR] {
            let path = self.out_dir.join(dir);
            fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create output directory {:?}", path))?;
        }
        Ok(())
    }

    /// Write all artifact families for one cycle
    pub fn write(&self, aggregate: &Aggregate) -> Result<()> {
        self.setup_directories()?;

        let joined = aggregate.links.join("\n");
        write_file(&self.out_dir.join(V2RAY_DIR).join(ALL_SUB_FILE), &joined)?;
        write_file(
            &self.out_dir.join(BASE64_DIR).join(ALL_SUB_FILE),
            &STANDARD.encode(&joined),
        )?;

        for bucket in &aggregate.regions {
            let path = self
                .out_dir
                .join(REGIONS_DIR)
                .join(format!("{}.txt", bucket.code));
            write_file(&path, &bucket.links.join("\n"))?;
        }

        for (scheme, links) in &aggregate.protocols {
            let path = self
                .out_dir
                .join(FILTERED_SUBS_DIR)
                .join(format!("{}.txt", scheme));
            write_file(&path, &links.join("\n"))?;
        }

        info!(
            links = aggregate.links.len(),
            regions = aggregate.regions.len(),
            protocols = aggregate.protocols.len(),
            out_dir = %self.out_dir.display(),
            "wrote subscription artifacts"
        );

        Ok(())
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}
