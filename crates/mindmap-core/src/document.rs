//! Documents and the intake rules that decide which files may be analyzed.
//!
//! A [`Document`] holds raw bytes. Before it is handed to the extraction
//! client it is turned into an [`EncodedDocument`], whose payload is a base64
//! data URL (`data:application/pdf;base64,...`). That is the same shape the
//! browser uploads to `POST /api/generate`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::InputRejected;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF-";
const GENERIC_MEDIA_TYPE: &str = "application/octet-stream";

/// An accepted document, raw bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

impl Document {
    /// Encode into the transport-safe textual form.
    pub fn encode(&self) -> EncodedDocument {
        EncodedDocument {
            name: self.name.clone(),
            media_type: self.media_type.clone(),
            data: format!("data:{};base64,{}", self.media_type, STANDARD.encode(&self.bytes)),
        }
    }
}

/// A document as it travels over the wire: `{ name, type, data }`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedDocument {
    pub name: String,
    #[serde(rename = "type", default)]
    pub media_type: String,
    /// Base64 data URL, or bare base64.
    pub data: String,
}

impl std::fmt::Debug for EncodedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedDocument")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("data", &format_args!("<{} chars>", self.data.len()))
            .finish()
    }
}

impl EncodedDocument {
    /// The base64 payload without any `data:...;base64,` prefix.
    pub fn base64_payload(&self) -> &str {
        match self.data.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map_or("", |(_, payload)| payload),
            None => &self.data,
        }
    }

    /// Media type declared in the data URL header, if any.
    fn data_url_media_type(&self) -> Option<&str> {
        let rest = self.data.strip_prefix("data:")?;
        let (meta, _) = rest.split_once(',')?;
        let media_type = meta.split(';').next().unwrap_or("");
        (!media_type.is_empty()).then_some(media_type)
    }

    /// Decode back into raw bytes.
    pub fn decode(&self) -> Result<Document, InputRejected> {
        let malformed = |reason: &str| InputRejected::MalformedDataUrl {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if let Some(rest) = self.data.strip_prefix("data:") {
            let (meta, _) = rest.split_once(',').ok_or_else(|| malformed("missing ','"))?;
            if !meta.split(';').any(|part| part == "base64") {
                return Err(malformed("payload is not base64-encoded"));
            }
        }

        let bytes = STANDARD
            .decode(self.base64_payload().trim())
            .map_err(|e| malformed(&e.to_string()))?;

        let media_type = if self.media_type.is_empty() {
            self.data_url_media_type().unwrap_or("").to_string()
        } else {
            self.media_type.clone()
        };

        Ok(Document {
            name: self.name.clone(),
            media_type,
            bytes,
        })
    }
}

/// Request body of `POST /api/generate`. Only the first file is analyzed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadPayload {
    pub files: Vec<EncodedDocument>,
}

/// A file offered for analysis, before intake checks.
#[derive(Clone)]
pub struct CandidateFile {
    pub name: String,
    /// Declared media type, if the sender gave one.
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Which files are accepted for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakePolicy {
    pub max_bytes: usize,
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

/// Result of checking a batch of candidates.
#[derive(Debug, Default)]
pub struct Selection {
    pub accepted: Vec<Document>,
    pub rejected: Vec<InputRejected>,
}

impl IntakePolicy {
    /// Resolve the effective media type: the declared one, or a sniffed one
    /// when the declaration is missing or generic.
    fn effective_media_type(declared: Option<&str>, bytes: &[u8]) -> String {
        match declared.map(str::trim) {
            Some(t) if !t.is_empty() && !t.eq_ignore_ascii_case(GENERIC_MEDIA_TYPE) => {
                t.to_ascii_lowercase()
            }
            _ if bytes.starts_with(PDF_MAGIC) => PDF_MEDIA_TYPE.to_string(),
            _ => declared
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(GENERIC_MEDIA_TYPE)
                .to_string(),
        }
    }

    /// Check one candidate against the type and size ceiling.
    pub fn admit(&self, candidate: CandidateFile) -> Result<Document, InputRejected> {
        let media_type =
            Self::effective_media_type(candidate.media_type.as_deref(), &candidate.bytes);
        self.check(Document {
            name: candidate.name,
            media_type,
            bytes: candidate.bytes,
        })
    }

    /// Check an already-encoded upload; returns it normalized on success.
    pub fn admit_encoded(&self, encoded: EncodedDocument) -> Result<EncodedDocument, InputRejected> {
        let decoded = encoded.decode()?;
        let declared = (!decoded.media_type.is_empty()).then_some(decoded.media_type.as_str());
        let media_type = Self::effective_media_type(declared, &decoded.bytes);
        let document = self.check(Document {
            media_type,
            ..decoded
        })?;
        Ok(EncodedDocument {
            media_type: document.media_type,
            ..encoded
        })
    }

    fn check(&self, document: Document) -> Result<Document, InputRejected> {
        if document.bytes.is_empty() {
            return Err(InputRejected::Empty {
                name: document.name,
            });
        }
        if document.media_type != PDF_MEDIA_TYPE || !document.bytes.starts_with(PDF_MAGIC) {
            return Err(InputRejected::WrongType {
                name: document.name,
                media_type: document.media_type,
            });
        }
        if document.bytes.len() > self.max_bytes {
            return Err(InputRejected::TooLarge {
                name: document.name,
                size: document.bytes.len(),
                max: self.max_bytes,
            });
        }
        Ok(document)
    }

    /// The user-facing notice naming this policy's constraints.
    pub fn rejection_notice(&self) -> String {
        format!(
            "Only PDF files under {} are allowed.",
            human_size(self.max_bytes)
        )
    }

    /// Check every candidate, keeping accepted and rejected apart.
    pub fn select(&self, candidates: Vec<CandidateFile>) -> Selection {
        let mut selection = Selection::default();
        for candidate in candidates {
            match self.admit(candidate) {
                Ok(doc) => selection.accepted.push(doc),
                Err(rejected) => {
                    tracing::debug!(%rejected, "file rejected by intake");
                    selection.rejected.push(rejected);
                }
            }
        }
        selection
    }
}

fn human_size(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * KIB;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{}KB", bytes / KIB)
    } else {
        format!("{bytes} bytes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::REJECTION_NOTICE;

    fn pdf_bytes(len: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.resize(len.max(bytes.len()), b'x');
        bytes
    }

    fn candidate(name: &str, media_type: Option<&str>, bytes: Vec<u8>) -> CandidateFile {
        CandidateFile {
            name: name.into(),
            media_type: media_type.map(String::from),
            bytes,
        }
    }

    #[test]
    fn data_url_roundtrip_keeps_type() {
        let doc = Document {
            name: "paper.pdf".into(),
            media_type: PDF_MEDIA_TYPE.into(),
            bytes: pdf_bytes(64),
        };
        let encoded = doc.encode();
        assert!(encoded.data.starts_with("data:application/pdf;base64,JVBERi0"));
        assert_eq!(encoded.decode().unwrap(), doc);
    }

    #[test]
    fn bare_base64_is_accepted() {
        let encoded = EncodedDocument {
            name: "a.pdf".into(),
            media_type: PDF_MEDIA_TYPE.into(),
            data: STANDARD.encode(pdf_bytes(16)),
        };
        assert_eq!(encoded.base64_payload(), encoded.data);
        assert_eq!(encoded.decode().unwrap().bytes, pdf_bytes(16));
    }

    #[test]
    fn type_falls_back_to_data_url_header() {
        let encoded = EncodedDocument {
            name: "a.pdf".into(),
            media_type: String::new(),
            data: format!("data:application/pdf;base64,{}", STANDARD.encode(pdf_bytes(16))),
        };
        assert_eq!(encoded.decode().unwrap().media_type, PDF_MEDIA_TYPE);
    }

    #[test]
    fn non_base64_data_url_is_malformed() {
        let encoded = EncodedDocument {
            name: "a.pdf".into(),
            media_type: PDF_MEDIA_TYPE.into(),
            data: "data:application/pdf,%25PDF-".into(),
        };
        assert!(matches!(
            encoded.decode(),
            Err(InputRejected::MalformedDataUrl { .. })
        ));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let policy = IntakePolicy::default();
        let err = policy
            .admit(candidate("notes.txt", Some("text/plain"), b"hello".to_vec()))
            .unwrap_err();
        assert!(matches!(err, InputRejected::WrongType { .. }));
    }

    #[test]
    fn pdf_label_without_magic_is_rejected() {
        let policy = IntakePolicy::default();
        let err = policy
            .admit(candidate("fake.pdf", Some(PDF_MEDIA_TYPE), b"PK\x03\x04".to_vec()))
            .unwrap_err();
        assert!(matches!(err, InputRejected::WrongType { .. }));
    }

    #[test]
    fn six_megabyte_pdf_is_rejected() {
        let policy = IntakePolicy::default();
        let err = policy
            .admit(candidate("big.pdf", Some(PDF_MEDIA_TYPE), pdf_bytes(6 * 1024 * 1024)))
            .unwrap_err();
        assert_eq!(
            err,
            InputRejected::TooLarge {
                name: "big.pdf".into(),
                size: 6 * 1024 * 1024,
                max: DEFAULT_MAX_DOCUMENT_BYTES,
            }
        );
    }

    #[test]
    fn rejection_notice_names_the_configured_ceiling() {
        assert_eq!(IntakePolicy::default().rejection_notice(), REJECTION_NOTICE);
        assert_eq!(
            IntakePolicy { max_bytes: 20 * 1024 * 1024 }.rejection_notice(),
            "Only PDF files under 20MB are allowed."
        );
        assert_eq!(
            IntakePolicy { max_bytes: 1024 }.rejection_notice(),
            "Only PDF files under 1KB are allowed."
        );
        assert_eq!(
            IntakePolicy { max_bytes: 1500 }.rejection_notice(),
            "Only PDF files under 1500 bytes are allowed."
        );
    }

    #[test]
    fn exactly_at_ceiling_is_accepted() {
        let policy = IntakePolicy::default();
        let doc = policy
            .admit(candidate("edge.pdf", Some(PDF_MEDIA_TYPE), pdf_bytes(DEFAULT_MAX_DOCUMENT_BYTES)))
            .unwrap();
        assert_eq!(doc.bytes.len(), DEFAULT_MAX_DOCUMENT_BYTES);
    }

    #[test]
    fn generic_type_is_sniffed() {
        let policy = IntakePolicy::default();
        let doc = policy
            .admit(candidate("scan", Some("application/octet-stream"), pdf_bytes(32)))
            .unwrap();
        assert_eq!(doc.media_type, PDF_MEDIA_TYPE);
        let doc = policy.admit(candidate("scan", None, pdf_bytes(32))).unwrap();
        assert_eq!(doc.media_type, PDF_MEDIA_TYPE);
    }

    #[test]
    fn empty_file_is_rejected() {
        let policy = IntakePolicy::default();
        assert!(matches!(
            policy.admit(candidate("empty.pdf", Some(PDF_MEDIA_TYPE), vec![])),
            Err(InputRejected::Empty { .. })
        ));
    }

    #[test]
    fn admit_encoded_checks_decoded_size() {
        let policy = IntakePolicy { max_bytes: 100 };
        let doc = Document {
            name: "a.pdf".into(),
            media_type: PDF_MEDIA_TYPE.into(),
            bytes: pdf_bytes(101),
        };
        assert!(matches!(
            policy.admit_encoded(doc.encode()),
            Err(InputRejected::TooLarge { size: 101, .. })
        ));
        let small = Document {
            bytes: pdf_bytes(50),
            ..doc
        };
        let admitted = policy.admit_encoded(small.encode()).unwrap();
        assert_eq!(admitted.media_type, PDF_MEDIA_TYPE);
    }

    #[test]
    fn select_splits_accepted_and_rejected() {
        let policy = IntakePolicy::default();
        let selection = policy.select(vec![
            candidate("a.pdf", Some(PDF_MEDIA_TYPE), pdf_bytes(10)),
            candidate("b.png", Some("image/png"), vec![0x89, b'P', b'N', b'G']),
        ]);
        assert_eq!(selection.accepted.len(), 1);
        assert_eq!(selection.rejected.len(), 1);
    }
}
