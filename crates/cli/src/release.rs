//! Binary-stub packing for the `release` subcommand: splice a compiled
//! artifact into a prebuilt stub executable at a `|#|...|#|` marker.
//!
//! The marker is a literal byte sequence, not a pattern, so this is a plain
//! substring scan rather than a regex — the stub's reserved placeholder
//! region between the two `|#|` delimiters fixes the maximum artifact size;
//! a shorter artifact is zero-padded to preserve the stub's total length,
//! a longer one is rejected.

use std::fmt;
use std::fs;
use std::path::Path;

const MARKER: &[u8] = b"|#|";

#[derive(Debug)]
pub enum ReleaseError {
    Io(std::io::Error),
    MarkerNotFound,
    ArtifactTooLarge { available: usize, needed: usize },
}

impl fmt::Display for ReleaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseError::Io(e) => write!(f, "{}", e),
            ReleaseError::MarkerNotFound => write!(f, "stub is missing the |#|...|#| marker"),
            ReleaseError::ArtifactTooLarge { available, needed } => write!(
                f,
                "compiled artifact ({needed} bytes) does not fit the stub's reserved {available}-byte placeholder"
            ),
        }
    }
}

impl std::error::Error for ReleaseError {}

impl From<std::io::Error> for ReleaseError {
    fn from(e: std::io::Error) -> Self {
        ReleaseError::Io(e)
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Splice `artifact` into the marker region of the stub at `stub_path` and
/// write the result to `dst_path`.
pub fn pack(stub_path: &Path, artifact: &[u8], dst_path: &Path) -> Result<(), ReleaseError> {
    let stub = fs::read(stub_path)?;

    let first = find(&stub, MARKER, 0).ok_or(ReleaseError::MarkerNotFound)?;
    let second = find(&stub, MARKER, first + MARKER.len()).ok_or(ReleaseError::MarkerNotFound)?;
    let placeholder_start = first + MARKER.len();
    let placeholder_len = second - placeholder_start;

    if artifact.len() > placeholder_len {
        return Err(ReleaseError::ArtifactTooLarge {
            available: placeholder_len,
            needed: artifact.len(),
        });
    }

    let mut packed = Vec::with_capacity(stub.len());
    packed.extend_from_slice(&stub[..placeholder_start]);
    packed.extend_from_slice(artifact);
    packed.resize(packed.len() + (placeholder_len - artifact.len()), 0);
    packed.extend_from_slice(&stub[second..]);

    fs::write(dst_path, packed)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TargetOs {
    Darwin,
    Linux,
    Windows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TargetArch {
    Amd64,
    Arm64,
    Arm,
    #[value(name = "386")]
    X86_32,
    X86,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn pack_zero_pads_a_shorter_artifact() {
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let stub_path = dir.path().join("stub.bin");
        let dst_path = dir.path().join("out.bin");

        let mut stub = fs::File::create(&stub_path).unwrap();
        stub.write_all(b"HEADER|#|0000000000|#|TRAILER").unwrap();
        drop(stub);

        pack(&stub_path, b"abcd", &dst_path).unwrap();
        let out = fs::read(&dst_path).unwrap();

        assert_eq!(&out[..b"HEADER|#|".len()], b"HEADER|#|");
        assert!(out.windows(b"|#|TRAILER".len()).any(|w| w == b"|#|TRAILER"));
        assert_eq!(out.len(), b"HEADER|#|0000000000|#|TRAILER".len());
    }

    #[test]
    fn pack_rejects_an_oversized_artifact() {
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let stub_path = dir.path().join("small_stub.bin");
        fs::write(&stub_path, b"|#||#|").unwrap();

        let err = pack(&stub_path, b"too big", &dir.path().join("unused.bin")).unwrap_err();
        assert!(matches!(err, ReleaseError::ArtifactTooLarge { .. }));
    }
}
