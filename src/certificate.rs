//! Public-facing certificate documents.
//!
//! A certificate is a point-in-time rendering of one track record, sealed with
//! a BLAKE3 digest over its canonical fields. The verification url and its QR
//! code are presentation: they follow the public endpoint and are not sealed.

use chrono::{DateTime, SecondsFormat, Utc};
use qrcode::{EcLevel, QrCode, render::svg};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::PublicEndpoint,
    domain::{ids::TrackId, track::TrackRecord},
    public_endpoint::verification_url,
};

#[derive(Debug, Error)]
#[error("certificate rendering failed: {0}")]
pub struct RenderError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSnapshot {
    pub certificate_id: TrackId,
    pub title: String,
    pub artist: String,
    pub fingerprint: String,
    pub external_ref: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub issued_at: DateTime<Utc>,
    pub verification_url: String,
    /// SVG QR code pointing at `verification_url`
    pub verification_code: String,
    pub seal: String,
}

impl CertificateSnapshot {
    pub fn for_record(
        record: &TrackRecord,
        endpoint: &PublicEndpoint,
    ) -> Result<Self, RenderError> {
        let verification_url = verification_url(endpoint, &record.id);
        let verification_code = qr_svg(&verification_url)?;

        Ok(Self {
            certificate_id: record.id,
            title: record.title.clone(),
            artist: record.artist.clone(),
            fingerprint: record.fingerprint.clone(),
            external_ref: record.external_ref.clone(),
            original_name: record.file_meta.original_name.clone(),
            mime_type: record.file_meta.mime_type.clone(),
            size_bytes: record.file_meta.size_bytes,
            issued_at: record.created_at,
            verification_url,
            verification_code,
            seal: seal(record),
        })
    }

    /// Whether this certificate still attests to `record`.
    ///
    /// Only sealed fields are compared, so moving the public endpoint does not
    /// invalidate certificates issued before the move.
    pub fn attests(&self, record: &TrackRecord) -> bool {
        self.certificate_id == record.id
            && self.title == record.title
            && self.artist == record.artist
            && self.fingerprint == record.fingerprint
            && self.external_ref == record.external_ref
            && self.original_name == record.file_meta.original_name
            && self.mime_type == record.file_meta.mime_type
            && self.size_bytes == record.file_meta.size_bytes
            && self.issued_at == record.created_at
            && self.seal == seal(record)
    }
}

fn qr_svg(url: &str) -> Result<String, RenderError> {
    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::H)
        .map_err(|e| RenderError(format!("cannot encode {url} as QR code: {e}")))?;

    Ok(code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .dark_color(svg::Color("#f1f1f1"))
        .light_color(svg::Color("#1a1a2e"))
        .build())
}

/// Digest over the record fields a certificate attests to.
///
/// Fields are NUL separated so that moving bytes between adjacent fields
/// changes the digest.
pub fn seal(record: &TrackRecord) -> String {
    let id = record.id.to_string();
    let size = record.file_meta.size_bytes.to_string();
    let created = record
        .created_at
        .to_rfc3339_opts(SecondsFormat::Nanos, true);

    let mut hasher = blake3::Hasher::new();
    for field in [
        id.as_str(),
        record.title.as_str(),
        record.artist.as_str(),
        record.fingerprint.as_str(),
        record.external_ref.as_str(),
        record.file_meta.original_name.as_str(),
        record.file_meta.mime_type.as_str(),
        size.as_str(),
        created.as_str(),
    ] {
        hasher.update(field.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Turns certificate data into a document stored next to the index
pub trait CertificateRenderer: Send + Sync {
    fn render(&self, snapshot: &CertificateSnapshot) -> Result<Vec<u8>, RenderError>;

    /// Reads back a document produced by [`CertificateRenderer::render`]
    fn parse(&self, document: &[u8]) -> Result<CertificateSnapshot, RenderError>;

    /// file extension of rendered documents, without the dot
    fn extension(&self) -> &'static str;

    fn mime_type(&self) -> &'static str;
}

/// Renders certificates as pretty-printed JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCertificateRenderer;

impl CertificateRenderer for JsonCertificateRenderer {
    fn render(&self, snapshot: &CertificateSnapshot) -> Result<Vec<u8>, RenderError> {
        serde_json::to_vec_pretty(snapshot).map_err(|e| RenderError(e.to_string()))
    }

    fn parse(&self, document: &[u8]) -> Result<CertificateSnapshot, RenderError> {
        serde_json::from_slice(document).map_err(|e| RenderError(e.to_string()))
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn mime_type(&self) -> &'static str {
        "application/json"
    }
}

#[cfg(test)]
pub(crate) mod doubles {
    use super::*;

    /// Test double: renderer whose collaborator is always down
    pub struct FailingRenderer;

    impl CertificateRenderer for FailingRenderer {
        fn render(&self, _snapshot: &CertificateSnapshot) -> Result<Vec<u8>, RenderError> {
            Err(RenderError("renderer offline".to_string()))
        }

        fn parse(&self, _document: &[u8]) -> Result<CertificateSnapshot, RenderError> {
            Err(RenderError("renderer offline".to_string()))
        }

        fn extension(&self) -> &'static str {
            "json"
        }

        fn mime_type(&self) -> &'static str {
            "application/json"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::track::FileMeta;
    use chrono::TimeZone;

    fn record() -> TrackRecord {
        TrackRecord {
            id: TrackId(1_760_000_000_123),
            title: "Test Track".to_string(),
            artist: "Jane Doe".to_string(),
            fingerprint: "bafyabc".to_string(),
            external_ref: "0xabc".to_string(),
            file_meta: FileMeta {
                original_name: "t.mp3".to_string(),
                mime_type: "audio/mpeg".to_string(),
                size_bytes: 1024,
            },
            created_at: Utc.with_ymd_and_hms(2025, 10, 9, 12, 0, 0).unwrap(),
            certificate_ref: "http://localhost:4000/certificates/1760000000123".to_string(),
        }
    }

    fn endpoint() -> PublicEndpoint {
        endpoint_at("http://localhost:4000")
    }

    fn endpoint_at(base_url: &str) -> PublicEndpoint {
        PublicEndpoint {
            base_url: base_url.to_string(),
        }
    }

    #[test]
    fn test_snapshot_copies_record_fields() -> anyhow::Result<()> {
        let snapshot = CertificateSnapshot::for_record(&record(), &endpoint())?;

        assert_eq!(snapshot.certificate_id, TrackId(1_760_000_000_123));
        assert_eq!(snapshot.title, "Test Track");
        assert_eq!(snapshot.original_name, "t.mp3");
        assert_eq!(
            snapshot.verification_url,
            "http://localhost:4000/verify/1760000000123"
        );
        assert_eq!(snapshot.seal, seal(&record()));
        assert!(snapshot.attests(&record()));
        Ok(())
    }

    #[test]
    fn test_snapshot_carries_qr_code_for_verification_url() -> anyhow::Result<()> {
        let local = CertificateSnapshot::for_record(&record(), &endpoint())?;
        let public =
            CertificateSnapshot::for_record(&record(), &endpoint_at("https://vault.example.com"))?;

        assert!(local.verification_code.contains("<svg"));
        assert!(local.verification_code.contains("#1a1a2e"));
        assert_ne!(local.verification_code, public.verification_code);
        Ok(())
    }

    #[test]
    fn test_attests_ignores_endpoint_but_not_sealed_fields() -> anyhow::Result<()> {
        let moved =
            CertificateSnapshot::for_record(&record(), &endpoint_at("https://vault.example.com"))?;
        assert!(moved.attests(&record()));

        let mut forged = moved.clone();
        forged.artist = "Someone Else".to_string();
        assert!(!forged.attests(&record()));

        let mut forged = moved;
        forged.seal = seal(&TrackRecord {
            title: "Other".to_string(),
            ..record()
        });
        assert!(!forged.attests(&record()));
        Ok(())
    }

    #[test]
    fn test_seal_changes_with_any_field() {
        let base = seal(&record());

        let mut other = record();
        other.title.push('!');
        assert_ne!(seal(&other), base);

        let mut other = record();
        other.file_meta.size_bytes += 1;
        assert_ne!(seal(&other), base);

        // shifting a character across a field boundary must not collide
        let mut shifted = record();
        shifted.title = "Test Trac".to_string();
        shifted.artist = "kJane Doe".to_string();
        assert_ne!(seal(&shifted), base);
    }

    #[test]
    fn test_json_renderer_output_parses_back() -> anyhow::Result<()> {
        let snapshot = CertificateSnapshot::for_record(&record(), &endpoint())?;

        let bytes = JsonCertificateRenderer.render(&snapshot)?;

        assert_eq!(JsonCertificateRenderer.parse(&bytes)?, snapshot);
        let text = String::from_utf8(bytes)?;
        assert!(text.contains("\"verificationUrl\""));
        assert!(text.contains("\"verificationCode\""));
        assert!(JsonCertificateRenderer.parse(b"{ not json").is_err());
        Ok(())
    }
}
