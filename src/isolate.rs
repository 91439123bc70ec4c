// Optional vocal-isolation step. We shell out to demucs once per source file
// and expect to end up with <stem>_vocals<ext> next to the original. Every
// failure mode here is non-fatal: worst case we track pitch against the full
// mix instead of the isolated vocal.

use std::path::{Path, PathBuf};
use std::process::Command;

// demucs drops its output under ./separated/htdemucs/<stem>/vocals.wav
const SEPARATED_DIR: &str = "separated";
const DEMUCS_MODEL: &str = "htdemucs";

fn vocals_sibling(source: &Path) -> PathBuf {
    let stem = source.file_stem().unwrap_or_default().to_string_lossy();
    let ext = source.extension().unwrap_or_default().to_string_lossy();
    let name = if ext.is_empty() {
        format!("{stem}_vocals")
    } else {
        format!("{stem}_vocals.{ext}")
    };
    source.with_file_name(name)
}

/// Returns the path to sing against: the isolated vocal stem if we have one
/// (or can produce one), the original file otherwise.
pub fn isolated_or_original(source: &Path) -> PathBuf {
    let target = vocals_sibling(source);
    if target.exists() {
        log::info!("vocal file {} already exists, skipping isolation", target.display());
        return target;
    }

    let status = Command::new("demucs")
        .arg("--two-stems=vocals")
        .arg(source)
        .status();
    if let Err(e) = status {
        log::warn!("could not run demucs ({e}), using original audio");
        return source.to_path_buf();
    }

    let stem = source.file_stem().unwrap_or_default();
    let generated = Path::new(SEPARATED_DIR)
        .join(DEMUCS_MODEL)
        .join(stem)
        .join("vocals.wav");

    if generated.exists() {
        if let Err(e) = std::fs::rename(&generated, &target) {
            log::warn!("could not move {} ({e}), using original audio", generated.display());
            return source.to_path_buf();
        }
        let _ = std::fs::remove_dir_all(SEPARATED_DIR);
        target
    } else {
        log::warn!(
            "generated vocal file not found at {}, using original audio",
            generated.display()
        );
        source.to_path_buf()
    }
}
