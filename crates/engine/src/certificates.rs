// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tester certificate minting for public systems.

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, PKCS_ECDSA_P256_SHA256};
use ro_core::TesterCertificate;
use thiserror::Error;
use time::OffsetDateTime;

/// How long a minted tester certificate stays valid.
pub const CERTIFICATE_TIMEOUT_MS: u64 = 300 * 60 * 1000;

/// Errors from certificate minting.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("certificate generation failed: {0}")]
    Generation(#[from] rcgen::Error),
    #[error("validity instant out of range")]
    Validity,
}

/// Mint a self-signed EC P-256 certificate for the tester, valid for
/// [`CERTIFICATE_TIMEOUT_MS`] from now.
pub fn mint_tester_certificate(
    common_name: &str,
    now_ms: u64,
) -> Result<TesterCertificate, CertificateError> {
    let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)?;
    let not_after_ms = now_ms + CERTIFICATE_TIMEOUT_MS;

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, common_name);

    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name;
    params.not_before = OffsetDateTime::from_unix_timestamp((now_ms / 1000) as i64)
        .map_err(|_| CertificateError::Validity)?;
    params.not_after = OffsetDateTime::from_unix_timestamp((not_after_ms / 1000) as i64)
        .map_err(|_| CertificateError::Validity)?;

    let certificate = params.self_signed(&key)?;
    Ok(TesterCertificate::new(common_name, certificate.pem(), now_ms, not_after_ms))
}
