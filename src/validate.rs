//! Upload validation: the untrusted-bytes gate in front of storage.
//!
//! Pure functions over `(bytes, declared filename, max size)` — no side
//! effects, callers own storage. Failure is always a full rejection with a
//! human-readable reason, never partial acceptance.

use crate::error::{EngineError, Result};

/// Extensions accepted for upload: documents, text, data, and source code.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    ".pdf", ".txt", ".md", ".docx", ".doc", ".csv", ".json", ".py", ".js", ".jsx", ".ts", ".tsx",
    ".html", ".css",
];

/// Absolute cap on the declared uncompressed size of zip-based formats.
const MAX_EXTRACTED_SIZE: u64 = 100 * 1024 * 1024;

/// Compression ratio above which an archive is treated as a zip bomb.
const MAX_COMPRESSION_RATIO: f64 = 100.0;

/// How many leading bytes to scan for PDF directives and signatures.
const MAX_CONTENT_SCAN_SIZE: usize = 10 * 1024 * 1024;

const MAX_FILENAME_LEN: usize = 255;

/// PDF directive tokens that enable script execution, auto-launch, remote
/// goto, or auto-open behavior.
const PDF_DANGEROUS_PATTERNS: &[&[u8]] = &[
    b"/JavaScript",
    b"/JS",
    b"/Launch",
    b"/SubmitForm",
    b"/ImportData",
    b"/GoToR",
    b"/GoToE",
    b"/OpenAction",
    b"/AA",
];

/// Executable and archive signatures checked against the declared extension.
const DANGEROUS_SIGNATURES: &[(&[u8], &str)] = &[
    (b"MZ", "Windows executable"),
    (b"\x7fELF", "Linux executable"),
    (b"\xca\xfe\xba\xbe", "Mach-O executable"),
    (b"PK\x03\x04", "ZIP archive"),
];

/// Output of a successful validation.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    /// Safe basename suitable for on-disk storage.
    pub filename: String,
    /// Lowercased extension including the leading dot.
    pub extension: String,
}

/// Validates raw uploaded bytes against the declared filename.
///
/// Checks, in order: size limit, extension allow-list, filename
/// sanitization, executable signature sniffing, zip-bomb limits for
/// zip-based formats, and dangerous PDF directives.
pub fn validate(bytes: &[u8], declared_filename: &str, max_size: u64) -> Result<ValidatedUpload> {
    if bytes.is_empty() {
        return Err(EngineError::Validation("file is empty".to_string()));
    }

    if bytes.len() as u64 > max_size {
        return Err(EngineError::Validation(format!(
            "file size ({:.2} MB) exceeds maximum ({:.0} MB)",
            bytes.len() as f64 / (1024.0 * 1024.0),
            max_size as f64 / (1024.0 * 1024.0),
        )));
    }

    let filename = sanitize_filename(declared_filename)?;
    let extension = extension_of(&filename)
        .ok_or_else(|| EngineError::Validation("filename must have an extension".to_string()))?;

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(EngineError::Validation(format!(
            "file type '{}' not allowed",
            extension
        )));
    }

    check_signature(bytes, &extension)?;

    if extension == ".docx" {
        check_zip_bomb(bytes)?;
    }

    if extension == ".pdf" {
        scan_pdf_content(bytes)?;
    }

    Ok(ValidatedUpload {
        filename,
        extension,
    })
}

/// Strips path components and dangerous characters from a filename.
///
/// The result is a non-empty basename that keeps letters, digits, dots,
/// dashes, and underscores, carries an extension, does not start with a
/// dot, and fits in [`MAX_FILENAME_LEN`] bytes.
pub fn sanitize_filename(filename: &str) -> Result<String> {
    if filename.is_empty() {
        return Err(EngineError::Validation("filename cannot be empty".to_string()));
    }

    // Basename only: drop any path, whichever separator was used
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    if base.is_empty() || base == "." || base == ".." {
        return Err(EngineError::Validation("invalid filename".to_string()));
    }

    // Keep letters, numbers, dots, dashes, underscores; everything else
    // (shell metacharacters, control characters, spaces) becomes '_'
    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", "_");
    }
    while cleaned.contains("__") {
        cleaned = cleaned.replace("__", "_");
    }

    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_').to_string();

    if cleaned.is_empty() {
        return Err(EngineError::Validation(
            "filename is empty after sanitization".to_string(),
        ));
    }

    let mut cleaned = match cleaned.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{}.{}", stem, ext.to_lowercase())
        }
        _ => {
            return Err(EngineError::Validation(
                "filename must have an extension".to_string(),
            ))
        }
    };

    if cleaned.len() > MAX_FILENAME_LEN {
        let (stem, ext) = cleaned.rsplit_once('.').unwrap_or((cleaned.as_str(), ""));
        let keep = MAX_FILENAME_LEN.saturating_sub(ext.len() + 1);
        let stem: String = stem.chars().take(keep).collect();
        cleaned = format!("{}.{}", stem, ext);
    }

    Ok(cleaned)
}

/// Lowercased extension of a filename, including the dot.
pub fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
        .map(|(_, ext)| format!(".{}", ext.to_lowercase()))
}

/// Rejects files whose magic bytes contradict the declared extension.
fn check_signature(bytes: &[u8], extension: &str) -> Result<()> {
    let header = &bytes[..bytes.len().min(1024)];

    for (signature, description) in DANGEROUS_SIGNATURES {
        if header.starts_with(signature) {
            if *signature == b"PK\x03\x04" {
                // Zip container is legitimate only for zip-based documents
                if extension != ".docx" {
                    return Err(EngineError::Validation(format!(
                        "file contains {} signature but has extension '{}'",
                        description, extension
                    )));
                }
            } else {
                return Err(EngineError::Validation(format!(
                    "file contains executable code signature: {}",
                    description
                )));
            }
        }
    }

    Ok(())
}

/// Rejects highly compressed or oversized archives before extraction.
fn check_zip_bomb(bytes: &[u8]) -> Result<()> {
    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|_| EngineError::Validation("invalid DOCX file (not a valid ZIP archive)".to_string()))?;

    let total_uncompressed: u64 = archive.decompressed_size().unwrap_or(u128::MAX).min(u128::from(u64::MAX)) as u64;

    if total_uncompressed > MAX_EXTRACTED_SIZE {
        return Err(EngineError::Validation(format!(
            "compressed file extracts to {:.1} MB, exceeds maximum {:.0} MB",
            total_uncompressed as f64 / (1024.0 * 1024.0),
            MAX_EXTRACTED_SIZE as f64 / (1024.0 * 1024.0),
        )));
    }

    let compressed = bytes.len() as f64;
    if compressed > 0.0 {
        let ratio = total_uncompressed as f64 / compressed;
        if ratio > MAX_COMPRESSION_RATIO {
            return Err(EngineError::Validation(format!(
                "suspicious compression ratio: {:.1}:1 (possible zip bomb)",
                ratio
            )));
        }
    }

    Ok(())
}

/// Scans the leading bytes of a PDF for dangerous directive tokens.
fn scan_pdf_content(bytes: &[u8]) -> Result<()> {
    let window = &bytes[..bytes.len().min(MAX_CONTENT_SCAN_SIZE)];

    for pattern in PDF_DANGEROUS_PATTERNS {
        if contains_subslice(window, pattern) {
            return Err(EngineError::Validation(format!(
                "PDF contains potentially dangerous code: {}",
                String::from_utf8_lossy(pattern)
            )));
        }
    }

    Ok(())
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const MAX: u64 = 10 * 1024 * 1024;

    #[test]
    fn accepts_plain_text() {
        let v = validate(b"hello world", "notes.txt", MAX).unwrap();
        assert_eq!(v.filename, "notes.txt");
        assert_eq!(v.extension, ".txt");
    }

    #[test]
    fn rejects_oversized_file() {
        let big = vec![b'a'; 11];
        let err = validate(&big, "big.txt", 10).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn rejects_disallowed_extension() {
        let err = validate(b"binary", "tool.exe", MAX).unwrap_err();
        assert!(err.to_string().contains("not allowed"));
    }

    #[test]
    fn rejects_elf_disguised_as_txt() {
        let mut bytes = b"\x7fELF".to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        let err = validate(&bytes, "innocent.txt", MAX).unwrap_err();
        assert!(err.to_string().contains("Linux executable"));
    }

    #[test]
    fn rejects_pe_disguised_as_md() {
        let err = validate(b"MZ\x90\x00rest", "readme.md", MAX).unwrap_err();
        assert!(err.to_string().contains("Windows executable"));
    }

    #[test]
    fn zip_signature_only_allowed_for_docx() {
        let err = validate(b"PK\x03\x04junk", "data.csv", MAX).unwrap_err();
        assert!(err.to_string().contains("ZIP archive"));
    }

    #[test]
    fn sanitizes_path_traversal() {
        let name = sanitize_filename("../../etc/passwd.txt").unwrap();
        assert!(!name.contains(".."));
        assert!(!name.contains('/'));
        assert_eq!(name, "passwd.txt");
    }

    #[test]
    fn traversal_without_extension_rejected() {
        assert!(sanitize_filename("../../etc/passwd").is_err());
    }

    #[test]
    fn sanitizes_windows_paths_and_shell_chars() {
        let name = sanitize_filename("C:\\temp\\bad name;rm -rf.txt").unwrap();
        assert!(!name.contains('\\'));
        assert!(!name.contains(';'));
        assert!(!name.contains(' '));
        assert!(name.ends_with(".txt"));
    }

    #[test]
    fn hidden_file_names_lose_leading_dot() {
        let name = sanitize_filename(".hidden.txt").unwrap();
        assert!(!name.starts_with('.'));
        assert_eq!(name, "hidden.txt");
    }

    #[test]
    fn long_filenames_truncated_preserving_extension() {
        let long = format!("{}.txt", "a".repeat(400));
        let name = sanitize_filename(&long).unwrap();
        assert!(name.len() <= 255);
        assert!(name.ends_with(".txt"));
    }

    #[test]
    fn rejects_pdf_with_launch_action() {
        let pdf = b"%PDF-1.4\n1 0 obj\n<< /Type /Action /S /Launch >>\nendobj\n";
        let err = validate(pdf, "doc.pdf", MAX).unwrap_err();
        assert!(err.to_string().contains("/Launch"));
    }

    #[test]
    fn rejects_pdf_with_openaction() {
        let pdf = b"%PDF-1.4\n<< /OpenAction 2 0 R >>\n";
        let err = validate(pdf, "doc.pdf", MAX).unwrap_err();
        assert!(err.to_string().contains("dangerous"));
    }

    #[test]
    fn accepts_benign_pdf_bytes() {
        let pdf = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF";
        assert!(validate(pdf, "doc.pdf", MAX).is_ok());
    }

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let opts = SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            for (name, data) in entries {
                writer.start_file(*name, opts).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn rejects_zip_bomb_ratio() {
        // Highly repetitive content deflates far beyond 100:1
        let payload = vec![b'0'; 4 * 1024 * 1024];
        let bytes = build_zip(&[("word/document.xml", &payload)]);
        assert!((payload.len() as f64) / (bytes.len() as f64) > 100.0);
        let err = validate(&bytes, "bomb.docx", MAX).unwrap_err();
        assert!(err.to_string().contains("zip bomb"));
    }

    #[test]
    fn accepts_normal_docx_archive() {
        let bytes = build_zip(&[(
            "word/document.xml",
            b"<w:document><w:t>regular content here</w:t></w:document>".as_slice(),
        )]);
        assert!(validate(&bytes, "report.docx", MAX).is_ok());
    }

    #[test]
    fn rejects_docx_that_is_not_a_zip() {
        let err = validate(b"this is not a zip at all", "fake.docx", MAX).unwrap_err();
        assert!(err.to_string().contains("not a valid ZIP"));
    }

    #[test]
    fn rejects_empty_file() {
        assert!(validate(b"", "empty.txt", MAX).is_err());
    }
}
