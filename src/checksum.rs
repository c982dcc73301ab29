// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Content checksums tagged with their algorithm

use crate::types::{Checksum, ChecksumAlgorithm, SourceFile};
use sha2::{Digest, Sha256, Sha512};

/// Hash UTF-8 content with the given algorithm, as lowercase hex
#[must_use]
pub fn digest(algorithm: ChecksumAlgorithm, content: &str) -> String {
    match algorithm {
        ChecksumAlgorithm::Sha256 => hex::encode(Sha256::digest(content.as_bytes())),
        ChecksumAlgorithm::Sha512 => hex::encode(Sha512::digest(content.as_bytes())),
    }
}

/// Compute a tagged checksum for content
#[must_use]
pub fn compute(algorithm: ChecksumAlgorithm, content: &str) -> Checksum {
    Checksum {
        algorithm,
        checksum: digest(algorithm, content),
    }
}

/// Recompute `algorithm` for a file whose content may have changed.
///
/// Entries for other algorithms survive only while `content_changed` is false.
/// A file without content carries no checksums.
pub fn refresh(file: &mut SourceFile, algorithm: ChecksumAlgorithm, content_changed: bool) {
    let Some(content) = file.content.as_deref() else {
        file.checksums.clear();
        return;
    };
    let fresh = compute(algorithm, content);
    if content_changed {
        file.checksums = vec![fresh];
        return;
    }
    match file.checksums.iter_mut().find(|c| c.algorithm == algorithm) {
        Some(existing) => *existing = fresh,
        None => file.checksums.push(fresh),
    }
    file.checksums.sort_by_key(|c| c.algorithm);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileType;

    #[test]
    fn test_known_sha256() {
        assert_eq!(
            digest(ChecksumAlgorithm::Sha256, "abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_algorithms_differ() {
        let a = digest(ChecksumAlgorithm::Sha256, "v1");
        let b = digest(ChecksumAlgorithm::Sha512, "v1");
        assert_eq!(a.len(), 64);
        assert_eq!(b.len(), 128);
    }

    #[test]
    fn test_refresh_keeps_other_algorithms_when_unchanged() {
        let mut file = SourceFile::new(FileType::DockstoreWdl, "a.wdl", "/a.wdl", Some("x".into()));
        file.checksums.push(compute(ChecksumAlgorithm::Sha512, "x"));

        refresh(&mut file, ChecksumAlgorithm::Sha256, false);

        assert_eq!(file.checksums.len(), 2);
        assert!(file.checksum(ChecksumAlgorithm::Sha512).is_some());
    }

    #[test]
    fn test_refresh_drops_stale_algorithms_on_change() {
        let mut file = SourceFile::new(FileType::DockstoreWdl, "a.wdl", "/a.wdl", Some("y".into()));
        file.checksums.push(compute(ChecksumAlgorithm::Sha512, "x"));

        refresh(&mut file, ChecksumAlgorithm::Sha256, true);

        assert_eq!(file.checksums.len(), 1);
        assert_eq!(
            file.checksum(ChecksumAlgorithm::Sha256),
            Some(digest(ChecksumAlgorithm::Sha256, "y").as_str())
        );
    }

    #[test]
    fn test_refresh_without_content_clears() {
        let mut file = SourceFile::new(FileType::WdlTestJson, "t.json", "/t.json", None);
        file.checksums.push(compute(ChecksumAlgorithm::Sha256, "old"));
        refresh(&mut file, ChecksumAlgorithm::Sha256, true);
        assert!(file.checksums.is_empty());
    }
}
