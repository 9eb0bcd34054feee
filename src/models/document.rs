use std::path::Path;

/// An uploaded document: its name, the type the uploader declared for it,
/// and the raw bytes. Never persisted.
#[derive(Clone, PartialEq)]
pub struct Document {
    filename: String,
    declared_type: Option<String>,
    bytes: Vec<u8>,
}

impl Document {
    pub fn new(filename: &str, declared_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.to_string(),
            declared_type: declared_type
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            bytes,
        }
    }

    /// Read a document from disk. The declared type is guessed from the
    /// extension, the same information a browser reports for a picked file.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let declared = mime_guess::from_path(path).first_raw();
        Ok(Self::new(&filename, declared, bytes))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn declared_type(&self) -> Option<&str> {
        self.declared_type.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("filename", &self.filename)
            .field("declared_type", &self.declared_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn blank_declared_type_is_none() {
        let doc = Document::new("a.bin", Some("  "), vec![1, 2, 3]);
        assert_eq!(doc.declared_type(), None);
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn from_path_guesses_type_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claim.pdf");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"%PDF-1.4 test").unwrap();

        let doc = Document::from_path(&path).unwrap();
        assert_eq!(doc.filename(), "claim.pdf");
        assert_eq!(doc.declared_type(), Some("application/pdf"));
        assert_eq!(doc.bytes(), b"%PDF-1.4 test");
    }

    #[test]
    fn from_path_unknown_extension_has_no_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evidence.zzqx");
        std::fs::write(&path, b"raw").unwrap();

        let doc = Document::from_path(&path).unwrap();
        assert_eq!(doc.declared_type(), None);
    }

    #[test]
    fn from_path_missing_file_errors() {
        let result = Document::from_path(Path::new("/definitely/not/here.pdf"));
        assert!(result.is_err());
    }

    #[test]
    fn debug_omits_bytes() {
        let doc = Document::new("photo.jpg", Some("image/jpeg"), vec![0xFF; 4096]);
        let printed = format!("{doc:?}");
        assert!(printed.contains("len: 4096"));
        assert!(!printed.contains("255"));
    }
}
