use std::io::Write;
use std::path::Path;

use anyhow::Result;

use super::load_artifact;

/// One speaker name per line, for shell completion of `--speaker`.
pub fn run(index: &Path, out: &mut dyn Write) -> Result<()> {
    let artifact = load_artifact(index)?;
    for name in artifact.speaker_names() {
        writeln!(out, "{}", name)?;
    }
    Ok(())
}
