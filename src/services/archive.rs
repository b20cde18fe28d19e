//! Archive extraction for downloaded zip and rar files.
//!
//! Every supported entry is stored as its own document, classified from its
//! file name, and linked back to a parent document for the archive itself.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use super::download::{FileUploader, UploadRequest};
use super::error::PipelineError;
use crate::models::{display_name, StoredFile};
use crate::utils::{file_name_extension, fold_turkish_lower, is_supported_extension};

/// Errors that can occur while unpacking an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to open archive: {0}")]
    OpenFailed(String),

    #[error("Failed to extract archive: {0}")]
    ExtractFailed(String),

    #[error("Unpack tool not available: {0}")]
    ToolMissing(String),

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// A file taken out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    /// Path inside the archive, used to build a unique source key.
    pub entry_name: String,
    /// Base file name shown to users.
    pub file_name: String,
    /// Dotted, lowercased extension.
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Guess a document category from a file name.
///
/// Rules are checked in a fixed priority order and the first match wins;
/// `default` is returned when nothing matches.
pub fn detect_category_from_file_name(file_name: &str, default: &str) -> String {
    let name = fold_turkish_lower(file_name).replace(['_', '-'], " ");
    let has = |needles: &[&str]| needles.iter().any(|n| name.contains(n));

    let category = if has(&["zeyilname"]) {
        if has(&["teknik"]) || default == "tech_spec" {
            "zeyilname_tech_spec"
        } else if has(&["idari"]) || default == "admin_spec" {
            "zeyilname_admin_spec"
        } else {
            "zeyilname"
        }
    } else if has(&["duzeltme"]) {
        "correction_notice"
    } else if has(&["ilan", "announcement"]) {
        // Before the item-list rule: "sonuc ilani" style names often mention "hizmet".
        "announcement"
    } else if has(&["sozlesme", "tasari", "contract"]) {
        "contract"
    } else if has(&["teknik", "tech"]) {
        "tech_spec"
    } else if has(&["idari", "admin"]) {
        "admin_spec"
    } else if has(&["birim", "fiyat", "cetvel", "price"]) {
        "unit_price"
    } else if has(&["mal ", "hizmet ", "malzeme", "liste"]) {
        "item_list"
    } else if has(&["pursantaj"]) {
        "pursantaj"
    } else if has(&["mahal", "metraj"]) {
        "quantity_survey"
    } else if has(&["form", "standart"]) {
        "standard_forms"
    } else if default.is_empty() {
        "other"
    } else {
        default
    };
    category.to_string()
}

/// Pick the display name for a zip entry.
///
/// Names written by legacy tools are stored in a single-byte code page and
/// decode as mojibake; when the raw bytes are valid UTF-8 they win.
pub fn repair_entry_name(raw: &[u8], decoded: &str) -> String {
    let utf8 = String::from_utf8_lossy(raw);
    if !utf8.is_empty() && !utf8.contains('\u{FFFD}') {
        utf8.into_owned()
    } else {
        decoded.to_string()
    }
}

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_ENTRY_RESERVE: u64 = 64 << 20;

/// Initial buffer size for an entry; the header value is not trusted.
fn entry_reserve(declared_size: u64) -> usize {
    declared_size.min(MAX_ENTRY_RESERVE) as usize
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Read every supported file out of a zip archive.
pub fn read_zip_members(archive_path: &Path) -> Result<Vec<ArchiveMember>, ArchiveError> {
    let file = File::open(archive_path).map_err(|e| ArchiveError::OpenFailed(e.to_string()))?;
    let mut archive = ZipArchive::new(file)?;
    info!("Zip archive holds {} entries", archive.len());

    let mut members = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        let entry_name = repair_entry_name(entry.name_raw(), entry.name());
        if entry_name.starts_with("__MACOSX") {
            continue;
        }
        let file_name = base_name(&entry_name).to_string();

        let Some(extension) =
            file_name_extension(&file_name).filter(|ext| is_supported_extension(ext))
        else {
            warn!("Skipping unsupported archive entry: {}", file_name);
            continue;
        };

        let mut bytes = Vec::with_capacity(entry_reserve(entry.size()));
        entry.read_to_end(&mut bytes)?;
        debug!("Read {} ({:.1} KB)", file_name, bytes.len() as f64 / 1024.0);

        members.push(ArchiveMember {
            entry_name,
            file_name,
            extension,
            bytes,
        });
    }
    Ok(members)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Read every supported file out of a directory tree.
pub fn read_extracted_members(root: &Path) -> Result<Vec<ArchiveMember>, ArchiveError> {
    let mut files = Vec::new();
    collect_files(root, &mut files)?;
    files.sort();

    let mut members = Vec::new();
    for path in files {
        let entry_name = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        let file_name = base_name(&entry_name).to_string();
        let Some(extension) =
            file_name_extension(&file_name).filter(|ext| is_supported_extension(ext))
        else {
            warn!("Skipping unsupported archive entry: {}", file_name);
            continue;
        };
        members.push(ArchiveMember {
            entry_name,
            file_name,
            extension,
            bytes: std::fs::read(&path)?,
        });
    }
    Ok(members)
}

/// Unpack a rar archive with the external tool into `dest`.
pub async fn extract_rar(
    tool: &str,
    archive_path: &Path,
    dest: &Path,
) -> Result<Vec<ArchiveMember>, ArchiveError> {
    let tool_path = which::which(tool).map_err(|e| ArchiveError::ToolMissing(format!("{}: {}", tool, e)))?;
    tokio::fs::create_dir_all(dest).await?;

    let output = tokio::process::Command::new(&tool_path)
        .arg("x")
        .arg("-o+")
        .arg(archive_path)
        .arg(format!("{}/", dest.display()))
        .output()
        .await?;
    if !output.status.success() {
        return Err(ArchiveError::ExtractFailed(format!(
            "{} exited with {}: {}",
            tool,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let root = dest.to_path_buf();
    let members = tokio::task::spawn_blocking(move || read_extracted_members(&root))
        .await
        .map_err(|e| ArchiveError::ExtractFailed(e.to_string()))??;
    info!("Extracted {} files from rar archive", members.len());
    Ok(members)
}

/// Unpacks archives and stores their contents through the shared uploader.
#[derive(Clone)]
pub struct ArchiveExtractor {
    uploader: FileUploader,
    unpack_tool: String,
}

impl ArchiveExtractor {
    pub fn new(uploader: FileUploader, unpack_tool: impl Into<String>) -> Self {
        Self {
            uploader,
            unpack_tool: unpack_tool.into(),
        }
    }

    /// Store every supported entry of the archive at `archive_path`, then
    /// the archive itself as their parent.
    ///
    /// Returns the parent first, followed by the extracted children. A rar
    /// that cannot be unpacked is stored on its own.
    pub async fn extract_and_upload(
        &self,
        tender_id: i64,
        doc_type: &str,
        archive_path: &Path,
        source_url: &str,
    ) -> Result<Vec<StoredFile>, PipelineError> {
        let extension = file_name_extension(&archive_path.to_string_lossy())
            .ok_or_else(|| ArchiveError::UnsupportedFormat(archive_path.display().to_string()))?;

        let members = match extension.as_str() {
            ".zip" => {
                info!("Opening zip archive {}", archive_path.display());
                let path = archive_path.to_path_buf();
                tokio::task::spawn_blocking(move || read_zip_members(&path))
                    .await
                    .map_err(|e| ArchiveError::ExtractFailed(e.to_string()))??
            }
            ".rar" => {
                let dest = archive_path
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join("extracted");
                match extract_rar(&self.unpack_tool, archive_path, &dest).await {
                    Ok(members) => members,
                    Err(e) => {
                        warn!("Could not unpack rar archive, storing it as is: {}", e);
                        let parent = self
                            .store_archive(tender_id, doc_type, archive_path, &extension, source_url)
                            .await?;
                        return Ok(vec![parent]);
                    }
                }
            }
            other => return Err(ArchiveError::UnsupportedFormat(other.to_string()).into()),
        };

        let mut children = Vec::with_capacity(members.len());
        for member in &members {
            let category = detect_category_from_file_name(&member.file_name, doc_type);
            let source = format!(
                "{}#file={}",
                source_url,
                urlencoding::encode(&member.entry_name)
            );
            let stored = self
                .uploader
                .upload(UploadRequest {
                    tender_id,
                    doc_type: &category,
                    bytes: &member.bytes,
                    extension: &member.extension,
                    display_name: &member.file_name,
                    source_url: &source,
                    is_extracted: true,
                    is_zip_parent: false,
                })
                .await?;
            children.push(stored);
        }

        let parent = self
            .store_archive(tender_id, doc_type, archive_path, &extension, source_url)
            .await?;
        if !children.is_empty() {
            let ids: Vec<i64> = children.iter().map(|c| c.document_id).collect();
            self.uploader
                .documents()
                .set_parent(parent.document_id, &ids)
                .await?;
        }
        info!(
            "Stored {} files from archive {}",
            children.len(),
            parent.file_name
        );

        let mut files = Vec::with_capacity(children.len() + 1);
        files.push(parent);
        files.extend(children);
        Ok(files)
    }

    async fn store_archive(
        &self,
        tender_id: i64,
        doc_type: &str,
        archive_path: &Path,
        extension: &str,
        source_url: &str,
    ) -> Result<StoredFile, PipelineError> {
        let bytes = tokio::fs::read(archive_path).await?;
        let name = format!("{}{}", display_name(doc_type), extension);
        self.uploader
            .upload(UploadRequest {
                tender_id,
                doc_type,
                bytes: &bytes,
                extension,
                display_name: &name,
                source_url,
                is_extracted: false,
                is_zip_parent: true,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    #[test]
    fn test_category_priority() {
        let cases = [
            ("Teknik_Şartname_Zeyilnamesi.pdf", "admin_spec", "zeyilname_tech_spec"),
            ("zeyilname-1.pdf", "admin_spec", "zeyilname_admin_spec"),
            ("zeyilname-1.pdf", "project_files", "zeyilname"),
            ("Düzeltme İlanı.pdf", "other", "correction_notice"),
            ("İhale İlanı hizmet alımı.pdf", "x", "announcement"),
            ("Sözleşme Tasarısı.docx", "x", "contract"),
            ("TEKNİK ŞARTNAME.pdf", "x", "tech_spec"),
            ("İdari Şartname.pdf", "x", "admin_spec"),
            ("Birim Fiyat Teklif Cetveli.xlsx", "x", "unit_price"),
            ("mal listesi.xlsx", "x", "item_list"),
            ("Mahal Listesi.xlsx", "x", "item_list"),
            ("pursantaj.xlsx", "x", "pursantaj"),
            ("metraj.xlsx", "x", "quantity_survey"),
            ("Standart Formlar.doc", "x", "standard_forms"),
            ("ekler.pdf", "project_files", "project_files"),
            ("ekler.pdf", "", "other"),
        ];
        for (name, default, expected) in cases {
            assert_eq!(
                detect_category_from_file_name(name, default),
                expected,
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_entry_reserve_is_capped() {
        assert_eq!(entry_reserve(0), 0);
        assert_eq!(entry_reserve(4096), 4096);
        assert_eq!(entry_reserve(u64::MAX), 64 << 20);
    }

    #[test]
    fn test_repair_prefers_valid_utf8() {
        let raw = "Teknik Şartname.pdf".as_bytes();
        assert_eq!(repair_entry_name(raw, "Teknik ┼Şartname.pdf"), "Teknik Şartname.pdf");
        // CP857 bytes are not valid UTF-8, keep the decoder's result.
        assert_eq!(repair_entry_name(&[0x9E, b'a'], "şa"), "şa");
    }

    #[test]
    fn test_read_zip_members_filters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("download.zip");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        let opts = SimpleFileOptions::default();
        zip.add_directory("docs/", opts).unwrap();
        zip.start_file("docs/Teknik Şartname.pdf", opts).unwrap();
        zip.write_all(b"%PDF-1.4").unwrap();
        zip.start_file("setup.exe", opts).unwrap();
        zip.write_all(b"MZ").unwrap();
        zip.start_file("__MACOSX/docs/._x.pdf", opts).unwrap();
        zip.write_all(b"junk").unwrap();
        zip.start_file("Birim Fiyat.XLSX", opts).unwrap();
        zip.write_all(b"PK").unwrap();
        zip.finish().unwrap();

        let members = read_zip_members(&path).unwrap();
        let names: Vec<&str> = members.iter().map(|m| m.file_name.as_str()).collect();
        assert_eq!(names, vec!["Teknik Şartname.pdf", "Birim Fiyat.XLSX"]);
        assert_eq!(members[0].entry_name, "docs/Teknik Şartname.pdf");
        assert_eq!(members[1].extension, ".xlsx");
        assert_eq!(members[0].bytes, b"%PDF-1.4");
    }

    #[test]
    fn test_corrupt_zip_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("download.zip");
        std::fs::write(&path, b"PK\x03\x04garbage").unwrap();
        assert!(read_zip_members(&path).is_err());
    }

    #[test]
    fn test_read_extracted_members_walks_tree() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/idari.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("notes.md"), b"#").unwrap();

        let members = read_extracted_members(dir.path()).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].entry_name, "a/b/idari.pdf");
        assert_eq!(members[0].file_name, "idari.pdf");
    }

    #[tokio::test]
    async fn test_missing_unpack_tool() {
        let dir = TempDir::new().unwrap();
        let err = extract_rar(
            "definitely-not-an-unrar-binary",
            &dir.path().join("x.rar"),
            &dir.path().join("out"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ArchiveError::ToolMissing(_)));
    }
}
