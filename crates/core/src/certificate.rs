// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tester certificate record.

use serde::{Deserialize, Serialize};

/// A tester's self-signed certificate together with its validity window.
///
/// The window is recorded when the certificate is minted, so validity checks
/// need no ASN.1 parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TesterCertificate {
    common_name: String,
    pem: String,
    not_before_ms: u64,
    not_after_ms: u64,
}

impl TesterCertificate {
    pub fn new(
        common_name: impl Into<String>,
        pem: impl Into<String>,
        not_before_ms: u64,
        not_after_ms: u64,
    ) -> Self {
        Self {
            common_name: common_name.into(),
            pem: pem.into(),
            not_before_ms,
            not_after_ms,
        }
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn not_before_ms(&self) -> u64 {
        self.not_before_ms
    }

    pub fn not_after_ms(&self) -> u64 {
        self.not_after_ms
    }

    pub fn is_valid_at(&self, now_ms: u64) -> bool {
        self.not_before_ms <= now_ms && now_ms < self.not_after_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert() -> TesterCertificate {
        TesterCertificate::new("t.a.i-t.system-test.1", "-----BEGIN CERTIFICATE-----", 100, 200)
    }

    #[yare::parameterized(
        before  = { 99,  false },
        at      = { 100, true },
        within  = { 150, true },
        expiry  = { 200, false },
        after   = { 201, false },
    )]
    fn validity_window(now_ms: u64, valid: bool) {
        assert_eq!(cert().is_valid_at(now_ms), valid);
    }

    #[test]
    fn serde_round_trip() {
        let json = serde_json::to_string(&cert()).unwrap();
        let parsed: TesterCertificate = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cert());
    }
}
