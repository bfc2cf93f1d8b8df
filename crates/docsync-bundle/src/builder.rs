use crate::{Error, Result};
use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use zip::{write::FileOptions, ZipWriter};

/// Builder for creating wheel archives.
#[derive(Debug, Default, Clone)]
pub struct WheelBuilder {
    name: String,
    version: String,
    tag: Option<String>,
    files: Vec<(String, Vec<u8>)>,
}

impl WheelBuilder {
    /// Create a builder for the given distribution.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Override the compatibility tag (defaults to `py3-none-any`).
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Add a file to the archive.
    pub fn with_file(mut self, path: impl Into<String>, contents: impl AsRef<[u8]>) -> Self {
        self.files.push((path.into(), contents.as_ref().to_vec()));
        self
    }

    /// Conventional file name, e.g. `bokeh-2.4.3-py3-none-any.whl`.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.whl",
            self.name.replace('-', "_"),
            self.version,
            self.tag.as_deref().unwrap_or("py3-none-any")
        )
    }

    /// Build the archive in memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let cursor = self.write_archive(Cursor::new(Vec::new()))?;
        Ok(cursor.into_inner())
    }

    /// Write the archive into `dir` under its conventional file name.
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        self.write_archive(File::create(&path)?)?;
        Ok(path)
    }

    fn write_archive<W: Write + Seek>(&self, writer: W) -> Result<W> {
        if self.name.trim().is_empty() || self.version.trim().is_empty() {
            return Err(Error::InvalidWheel(
                "wheel name and version are required".to_string(),
            ));
        }

        let dist_info = format!("{}-{}.dist-info", self.name.replace('-', "_"), self.version);
        let metadata = format!(
            "Metadata-Version: 2.1\nName: {}\nVersion: {}\n\n",
            self.name, self.version
        );
        let wheel_meta = format!(
            "Wheel-Version: 1.0\nGenerator: docsync-bundle\nRoot-Is-Purelib: true\nTag: {}\n",
            self.tag.as_deref().unwrap_or("py3-none-any")
        );

        let mut zip = ZipWriter::new(writer);
        let options: FileOptions<()> =
            FileOptions::default().compression_method(zip::CompressionMethod::Stored);

        for (path, contents) in &self.files {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(contents)?;
        }

        zip.start_file(format!("{}/METADATA", dist_info), options)?;
        zip.write_all(metadata.as_bytes())?;

        zip.start_file(format!("{}/WHEEL", dist_info), options)?;
        zip.write_all(wheel_meta.as_bytes())?;

        Ok(zip.finish()?)
    }
}
