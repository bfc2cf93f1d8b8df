use crate::{Error, Result};
use std::cmp::Ordering;
use std::io::{Cursor, Read};

const DIGEST_PREFIX: &str = "blake3:";

/// Compute the content digest of a byte slice (`blake3:<64-char-hex>`).
pub fn compute_digest(bytes: &[u8]) -> String {
    format!("{}{}", DIGEST_PREFIX, hex::encode(blake3::hash(bytes).as_bytes()))
}

/// Parse a `blake3:<hex>` digest into raw bytes.
pub fn parse_digest(digest: &str) -> Result<[u8; 32]> {
    let hex_part = digest
        .strip_prefix(DIGEST_PREFIX)
        .ok_or_else(|| Error::InvalidDigest(format!("expected '{}' prefix: {}", DIGEST_PREFIX, digest)))?;
    let bytes = hex::decode(hex_part).map_err(|e| Error::InvalidDigest(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| Error::InvalidDigest(format!("expected 32 bytes: {}", digest)))
}

/// Verify that `bytes` match the expected digest.
pub fn verify_digest(bytes: &[u8], expected: &str) -> Result<()> {
    let expected_bytes = parse_digest(expected)?;
    let actual = blake3::hash(bytes);
    if actual.as_bytes() != &expected_bytes {
        return Err(Error::DigestMismatch {
            expected: expected.to_string(),
            actual: compute_digest(bytes),
        });
    }
    Ok(())
}

/// Normalize a distribution name (lowercase, runs of `-_.` become `-`).
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut last_dash = false;
    for ch in name.trim().chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !last_dash {
                normalized.push('-');
            }
            last_dash = true;
        } else {
            normalized.extend(ch.to_lowercase());
            last_dash = false;
        }
    }
    normalized
}

/// Components of a wheel file name: `{name}-{version}(-{build})?-{python}-{abi}-{platform}.whl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelFilename {
    /// Distribution name as written in the file name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Compatibility tag, e.g. `py3-none-any`.
    pub tag: String,
}

impl WheelFilename {
    /// Parse a wheel file name. Returns `None` for non-wheel names.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".whl")?;
        let parts: Vec<&str> = stem.split('-').collect();
        if parts.len() < 5 || parts.len() > 6 {
            return None;
        }
        let tag_start = parts.len() - 3;
        Some(Self {
            name: parts[0].to_string(),
            version: parts[1].to_string(),
            tag: parts[tag_start..].join("-"),
        })
    }

    /// Whether this wheel provides `name` (and `version`, when given).
    pub fn matches(&self, name: &str, version: Option<&str>) -> bool {
        normalize_name(&self.name) == normalize_name(name)
            && version.map_or(true, |v| v == self.version)
    }
}

/// Order two version strings segment by segment.
///
/// Dot-separated segments that are both numeric compare as numbers, others
/// lexically; a version that is a prefix of another sorts first.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// A parsed wheel archive.
#[derive(Debug, Clone)]
pub struct Wheel {
    name: String,
    version: String,
    files: Vec<String>,
    digest: String,
}

impl Wheel {
    /// Parse a wheel from its raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut files = Vec::with_capacity(archive.len());
        let mut metadata = None;

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();

            if is_metadata_entry(&name) {
                if metadata.is_some() {
                    return Err(Error::InvalidWheel(
                        "multiple .dist-info/METADATA entries".to_string(),
                    ));
                }
                let mut text = String::new();
                file.read_to_string(&mut text)?;
                metadata = Some(text);
            }

            if !file.is_dir() {
                files.push(name);
            }
        }

        let metadata =
            metadata.ok_or_else(|| Error::MissingEntry("*.dist-info/METADATA".to_string()))?;
        let (name, version) = parse_metadata(&metadata)?;

        Ok(Self {
            name,
            version,
            files,
            digest: compute_digest(bytes),
        })
    }

    /// Distribution name from `METADATA`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized distribution name.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Version from `METADATA`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// All file entries in the archive.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Content digest of the archive bytes.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

fn is_metadata_entry(name: &str) -> bool {
    match name.split_once('/') {
        Some((dir, rest)) => dir.ends_with(".dist-info") && rest == "METADATA",
        None => false,
    }
}

fn parse_metadata(text: &str) -> Result<(String, String)> {
    let mut name = None;
    let mut version = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            match key.trim() {
                "Name" => name = Some(value.trim().to_string()),
                "Version" => version = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    match (name, version) {
        (Some(name), Some(version)) if !name.is_empty() && !version.is_empty() => {
            Ok((name, version))
        }
        _ => Err(Error::InvalidWheel(
            "METADATA must declare Name and Version".to_string(),
        )),
    }
}
