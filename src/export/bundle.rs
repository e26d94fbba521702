use super::RenderedFile;
use crate::utils::error::Result;
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Pack `files` into a single ZIP archive called `name`.
pub fn bundle(name: &str, files: &[RenderedFile]) -> Result<RenderedFile> {
    tracing::debug!("Creating ZIP archive {} with {} files", name, files.len());

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for file in files {
        zip.start_file(file.name.as_str(), options)?;
        zip.write_all(&file.contents)?;
    }

    let cursor = zip.finish()?;
    Ok(RenderedFile::new(name, cursor.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_bundle_contains_every_file() {
        let files = vec![
            RenderedFile::new("model.m", "classdef model\nend\n"),
            RenderedFile::new("model_example.m", "m = model();\n"),
        ];
        let archive = bundle("model_dae.zip", &files).unwrap();
        assert_eq!(archive.name, "model_dae.zip");

        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive.contents)).unwrap();
        assert_eq!(zip.len(), 2);

        let mut content = String::new();
        zip.by_name("model_example.m")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "m = model();\n");
    }
}
