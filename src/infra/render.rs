//! Certificate document rendering (external collaborator boundary).
//!
//! The coordinator calls the renderer only after a certificate reaches
//! ACTIVE, and tolerates its failure silently: the credential is valid
//! on-chain regardless of whether a derived document renders.

use anyhow::Result;
use async_trait::async_trait;
use primitive_types::H256;

use crate::crypto::hashing::artifact_content_hash;
use crate::domain::model::Certificate;

pub struct RenderedArtifact {
    pub bytes: Vec<u8>,
    pub content_hash: H256,
}

#[async_trait]
pub trait ArtifactRenderer: Send + Sync {
    async fn render(&self, certificate: &Certificate) -> Result<RenderedArtifact>;
}

/// Plain-text rendition of the certificate facts. A real deployment swaps in
/// a PDF renderer behind the same trait.
pub struct TextCertificateRenderer;

#[async_trait]
impl ArtifactRenderer for TextCertificateRenderer {
    async fn render(&self, certificate: &Certificate) -> Result<RenderedArtifact> {
        let mut doc = String::new();
        doc.push_str("INTERNSHIP CERTIFICATE\n");
        doc.push_str(&format!("Certificate No: {}\n", certificate.cert_no));
        doc.push_str(&format!("Student: {}\n", certificate.student_id));
        doc.push_str(&format!("University: {}\n", certificate.university_code));
        doc.push_str(&format!("Company: {}\n", certificate.company_code));
        doc.push_str(&format!("Position: {}\n", certificate.position));
        doc.push_str(&format!(
            "Period: {} .. {}\n",
            certificate.start_date.format("%Y-%m-%d"),
            certificate.end_date.format("%Y-%m-%d")
        ));
        if let Some(evaluation) = &certificate.evaluation {
            doc.push_str(&format!("Evaluation: {}\n", evaluation));
        }
        if let Some(hash) = certificate.cert_hash {
            doc.push_str(&format!("Certificate hash: {}\n", hex::encode(hash.as_bytes())));
        }
        doc.push_str(&format!("Verify at: {}\n", certificate.verify_url));

        let bytes = doc.into_bytes();
        let content_hash = artifact_content_hash(&bytes);
        Ok(RenderedArtifact { bytes, content_hash })
    }
}
