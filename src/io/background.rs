//! Background (light-source) scan lookup.

use std::path::{Path, PathBuf};

use log::debug;

use crate::domain::AcquisitionMetadata;
use crate::error::Result;
use crate::io::discover::list_spectrum_files;
use crate::io::metadata::parse_file_name;

/// Find the background scan for `metadata` in `dir`.
///
/// A candidate matches when its name marks it as a background and it shares
/// the sample id and polarization. The first match in path order wins.
/// `Ok(None)` means there is no background and the caller should fall back to
/// max normalization.
pub fn find_background(
    dir: &Path,
    metadata: &AcquisitionMetadata,
) -> Result<Option<(PathBuf, AcquisitionMetadata)>> {
    for path in list_spectrum_files(dir)? {
        let candidate = match parse_file_name(&path, None) {
            Ok(meta) => meta,
            Err(e) => {
                debug!("ignoring '{}' as background candidate: {e}", path.display());
                continue;
            }
        };
        if metadata.matches_background(&candidate) {
            debug!(
                "background for '{}' is '{}'",
                metadata.file_name(),
                candidate.file_name()
            );
            return Ok(Some((path, candidate)));
        }
    }
    Ok(None)
}
