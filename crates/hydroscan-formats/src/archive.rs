//! ZIP containers: KMZ contours in, report archives out.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::FormatError;

fn archive_error(e: impl std::fmt::Display) -> FormatError {
    FormatError::Archive(e.to_string())
}

fn is_kml(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("kml"))
}

/// Extract the first `.kml` entry of a KMZ archive.
///
/// # Errors
///
/// Returns [`FormatError::Archive`] if the bytes are not a ZIP archive,
/// an entry cannot be read, or the archive holds no `.kml` entry.
pub fn kml_from_kmz(bytes: &[u8]) -> Result<Vec<u8>, FormatError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_error)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(archive_error)?;
        if !entry.is_file() || !is_kml(entry.name()) {
            continue;
        }
        log::debug!("reading {} from KMZ", entry.name());
        let mut kml = Vec::new();
        entry.read_to_end(&mut kml).map_err(archive_error)?;
        return Ok(kml);
    }
    Err(FormatError::Archive("no .kml entry in KMZ".to_string()))
}

/// Pack named files into a deflated ZIP archive, in the given order.
///
/// # Errors
///
/// Returns [`FormatError::Archive`] if an entry cannot be written, for
/// example when two entries share a name.
pub fn zip_entries<'a, I>(entries: I) -> Result<Vec<u8>, FormatError>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer.start_file(name, options).map_err(archive_error)?;
        writer.write_all(contents).map_err(archive_error)?;
    }
    Ok(writer.finish().map_err(archive_error)?.into_inner())
}
