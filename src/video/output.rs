//! Output file naming.

use std::io;
use std::path::{Path, PathBuf};

const OUTPUT_SUFFIX: &str = "_visual";
const OUTPUT_EXTENSION: &str = "mp4";

/// Pick an unused output path for `audio_path` inside `output_dir`.
///
/// Tries `<stem>_visual.mp4`, then `<stem>_visual_1.mp4`, `_2`, ... and
/// creates `output_dir` if needed.
pub fn derive_output_path(output_dir: &Path, audio_path: &Path) -> io::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let stem = audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string());

    let first = output_dir.join(format!("{stem}{OUTPUT_SUFFIX}.{OUTPUT_EXTENSION}"));
    if !first.exists() {
        return Ok(first);
    }

    let mut counter = 1u32;
    loop {
        let candidate =
            output_dir.join(format!("{stem}{OUTPUT_SUFFIX}_{counter}.{OUTPUT_EXTENSION}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_output_path_avoids_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("output");
        let audio = Path::new("/music/track.mp3");

        let first = derive_output_path(&out_dir, audio).unwrap();
        assert_eq!(first, out_dir.join("track_visual.mp4"));
        assert!(out_dir.is_dir());

        std::fs::write(&first, b"").unwrap();
        let second = derive_output_path(&out_dir, audio).unwrap();
        assert_eq!(second, out_dir.join("track_visual_1.mp4"));

        std::fs::write(&second, b"").unwrap();
        assert_eq!(
            derive_output_path(&out_dir, audio).unwrap(),
            out_dir.join("track_visual_2.mp4")
        );
    }
}
