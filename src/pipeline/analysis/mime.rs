use crate::models::Document;

const PDF: &str = "application/pdf";
const PLAIN_TEXT: &str = "text/plain";
const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const DOC: &str = "application/msword";
const OCTET_STREAM: &str = "application/octet-stream";

/// Content-type tag sent to the model with a document payload.
///
/// Declared PDF, image, and plain-text types pass through. Word documents
/// are recognized by extension because uploaders often leave their type
/// blank. Anything else keeps its declared type, or falls back to
/// octet-stream.
pub fn transport_tag(document: &Document) -> String {
    let declared = document.declared_type().unwrap_or("");
    let name = document.filename().to_ascii_lowercase();

    if declared == PDF {
        return PDF.to_string();
    }
    if declared.starts_with("image/") {
        return declared.to_string();
    }
    if declared == PLAIN_TEXT {
        return PLAIN_TEXT.to_string();
    }
    if name.ends_with(".docx") {
        return DOCX.to_string();
    }
    if name.ends_with(".doc") {
        return DOC.to_string();
    }

    if declared.is_empty() {
        OCTET_STREAM.to_string()
    } else {
        declared.to_string()
    }
}
