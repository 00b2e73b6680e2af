//! In-memory `.tar.gz` builders mimicking GitHub release archives

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

/// Build a gzip'd tarball whose entries all live under `root/`.
///
/// Paths ending in `/` become directory entries.
pub fn release_tarball(root: &str, entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    for (path, contents) in entries {
        let full_path = format!("{}/{}", root, path);
        let mut header = tar::Header::new_gnu();
        if path.ends_with('/') {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder
                .append_data(&mut header, &full_path, std::io::empty())
                .unwrap();
        } else {
            header.set_entry_type(tar::EntryType::Regular);
            header.set_mode(0o644);
            header.set_size(contents.len() as u64);
            builder
                .append_data(&mut header, &full_path, contents.as_bytes())
                .unwrap();
        }
    }

    let tar = builder.into_inner().unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}
