//! File uploads
//!
//! Every upload names a kind, which fixes the accepted content types.
//! Accepted files are written under the upload directory with a random
//! name and served back from the public prefix.

use crate::config::UploadConfig;
use anyhow::Context;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use uuid::Uuid;

const DOCUMENT_TYPES: [&str; 3] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadKind {
    HeroImage,
    ProfilePhoto,
    Logo,
    TeamPhoto,
    Resume,
    ResearchPdf,
    Attachment,
    PaymentProof,
}

impl UploadKind {
    pub const ALL: [UploadKind; 8] = [
        UploadKind::HeroImage,
        UploadKind::ProfilePhoto,
        UploadKind::Logo,
        UploadKind::TeamPhoto,
        UploadKind::Resume,
        UploadKind::ResearchPdf,
        UploadKind::Attachment,
        UploadKind::PaymentProof,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::HeroImage => "hero-image",
            UploadKind::ProfilePhoto => "profile-photo",
            UploadKind::Logo => "logo",
            UploadKind::TeamPhoto => "team-photo",
            UploadKind::Resume => "resume",
            UploadKind::ResearchPdf => "research-pdf",
            UploadKind::Attachment => "attachment",
            UploadKind::PaymentProof => "payment-proof",
        }
    }

    fn accepts_images(&self) -> bool {
        matches!(
            self,
            UploadKind::HeroImage
                | UploadKind::ProfilePhoto
                | UploadKind::Logo
                | UploadKind::TeamPhoto
                | UploadKind::PaymentProof
        )
    }

    fn accepts_documents(&self) -> bool {
        matches!(
            self,
            UploadKind::Resume
                | UploadKind::ResearchPdf
                | UploadKind::Attachment
                | UploadKind::PaymentProof
        )
    }

    /// Whether a file with `content_type` may be stored under this kind.
    /// Parameters such as `; charset=` are ignored.
    pub fn accepts(&self, content_type: &str) -> bool {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        // SVG can carry script
        let image = mime.starts_with("image/") && mime != "image/svg+xml";
        let document = DOCUMENT_TYPES.contains(&mime.as_str());
        (image && self.accepts_images()) || (document && self.accepts_documents())
    }

    fn describe_accepted(&self) -> &'static str {
        match (self.accepts_images(), self.accepts_documents()) {
            (true, true) => "an image, PDF or Word document",
            (true, false) => "an image",
            _ => "a PDF or Word document",
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadKind {
    type Err = UploadServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UploadKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UploadServiceError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadServiceError {
    #[error("Unknown upload kind: {0}")]
    UnknownKind(String),

    #[error("No file provided")]
    Empty,

    #[error("Invalid file type {content_type}: {kind} uploads must be {expected}")]
    UnsupportedType {
        kind: UploadKind,
        content_type: String,
        expected: &'static str,
    },

    #[error("File too large. Maximum size: {max} bytes ({} MB)", .max / 1024 / 1024)]
    TooLarge { max: u64 },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    pub kind: UploadKind,
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

pub struct UploadService {
    config: UploadConfig,
}

impl UploadService {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    /// Check type and size without touching the disk
    pub fn validate(
        &self,
        kind: UploadKind,
        content_type: &str,
        size: u64,
    ) -> Result<(), UploadServiceError> {
        if size == 0 {
            return Err(UploadServiceError::Empty);
        }
        if size > self.config.max_file_size {
            return Err(UploadServiceError::TooLarge {
                max: self.config.max_file_size,
            });
        }
        if !kind.accepts(content_type) {
            return Err(UploadServiceError::UnsupportedType {
                kind,
                content_type: content_type.to_string(),
                expected: kind.describe_accepted(),
            });
        }
        Ok(())
    }

    /// Validate then write `data`, returning its public URL
    pub async fn store(
        &self,
        kind: UploadKind,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<UploadedFile, UploadServiceError> {
        self.validate(kind, content_type, data.len() as u64)?;

        fs::create_dir_all(&self.config.path)
            .await
            .with_context(|| format!("Failed to create upload dir {:?}", self.config.path))?;

        let filename = format!(
            "{}.{}",
            Uuid::new_v4(),
            extension(original_name, content_type)
        );
        let path = self.config.path.join(&filename);
        fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to save upload {:?}", path))?;

        tracing::info!("Stored {} upload {} ({} bytes)", kind, filename, data.len());
        Ok(UploadedFile {
            kind,
            url: format!(
                "{}/{}",
                self.config.public_prefix.trim_end_matches('/'),
                filename
            ),
            filename,
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }
}

/// Extension from the content type, else a short alphanumeric one from
/// the client's file name
fn extension(original_name: &str, content_type: &str) -> String {
    let known = match content_type.split(';').next().unwrap_or("").trim() {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "application/pdf" => Some("pdf"),
        "application/msword" => Some("doc"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }

    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() < 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_lowercase)
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(dir: &TempDir, max_file_size: u64) -> UploadService {
        UploadService::new(UploadConfig {
            path: dir.path().to_path_buf(),
            public_prefix: "/uploads".to_string(),
            max_file_size,
        })
    }

    #[test]
    fn test_kind_from_str() {
        for kind in UploadKind::ALL {
            assert_eq!(kind.as_str().parse::<UploadKind>().unwrap(), kind);
        }
        assert!(matches!(
            "avatar".parse::<UploadKind>(),
            Err(UploadServiceError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_type_rules() {
        assert!(UploadKind::HeroImage.accepts("image/png"));
        assert!(!UploadKind::HeroImage.accepts("application/pdf"));
        assert!(!UploadKind::Logo.accepts("image/svg+xml"));
        assert!(UploadKind::Resume.accepts("application/pdf"));
        assert!(UploadKind::Resume.accepts(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        ));
        assert!(!UploadKind::Resume.accepts("image/jpeg"));
        assert!(UploadKind::PaymentProof.accepts("image/jpeg"));
        assert!(UploadKind::PaymentProof.accepts("application/pdf; charset=binary"));
        assert!(!UploadKind::Attachment.accepts("text/html"));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("scan.PNG", "image/png"), "png");
        assert_eq!(extension("photo.HEIC", "image/heic"), "heic");
        assert_eq!(extension("evil.ph/p", "image/x-unknown"), "bin");
        assert_eq!(extension("noext", "image/x-unknown"), "bin");
    }

    #[tokio::test]
    async fn test_store_writes_file() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, 1024);

        let file = service
            .store(UploadKind::ResearchPdf, "paper.pdf", "application/pdf", b"%PDF-1.4")
            .await
            .unwrap();
        assert!(file.url.starts_with("/uploads/"));
        assert!(file.filename.ends_with(".pdf"));
        assert_eq!(file.size, 8);
        let written = std::fs::read(dir.path().join(&file.filename)).unwrap();
        assert_eq!(written, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_store_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, 4);

        assert!(matches!(
            service.store(UploadKind::Logo, "a.png", "image/png", b"too big").await,
            Err(UploadServiceError::TooLarge { max: 4 })
        ));
        assert!(matches!(
            service.store(UploadKind::Logo, "a.pdf", "application/pdf", b"pdf").await,
            Err(UploadServiceError::UnsupportedType { .. })
        ));
        assert!(matches!(
            service.store(UploadKind::Logo, "a.png", "image/png", b"").await,
            Err(UploadServiceError::Empty)
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
