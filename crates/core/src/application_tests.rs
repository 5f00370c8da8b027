// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn application_id_round_trip() {
    let id = ApplicationId::new("tenant", "real", "default").unwrap();
    assert_eq!(id.serialized_form(), "tenant.real.default");
    assert_eq!(ApplicationId::from_serialized("tenant.real.default").unwrap(), id);
}

#[yare::parameterized(
    empty          = { "" },
    uppercase      = { "Tenant" },
    leading_dash   = { "-tenant" },
    trailing_dash  = { "tenant-" },
    dotted         = { "ten.ant" },
)]
fn rejects_invalid_parts(part: &str) {
    assert!(ApplicationId::new(part, "app", "default").is_err());
}

#[test]
fn rejects_malformed_serialized_form() {
    assert!(ApplicationId::from_serialized("tenant.app").is_err());
    assert!(ApplicationId::from_serialized("a.b.c.d").is_err());
}

#[test]
fn tester_id_appends_suffix() {
    let id = ApplicationId::new("tenant", "real", "default").unwrap();
    assert_eq!(id.tester().id().instance(), "default-t");
    assert_eq!(id.tester().to_string(), "tenant.real.default-t");
}

#[test]
fn record_tracks_versions() {
    let id = ApplicationId::new("tenant", "real", "default").unwrap();
    let mut record = ApplicationRecord::new(id, 2);
    record
        .versions
        .push(ApplicationVersion::new(SourceRevision::new("repo", "branch", "bada55"), 1));
    assert!(record.version(1).is_some());
    assert!(record.version(2).is_none());
}

#[test]
fn oldest_production_build_is_min_across_jobs() {
    let id = ApplicationId::new("tenant", "real", "default").unwrap();
    let mut record = ApplicationRecord::new(id, 2);
    assert_eq!(record.oldest_deployed_production_build(), None);
    record.deployed_production_builds.insert(JobType::ProductionUsEast3, 7);
    record.deployed_production_builds.insert(JobType::ProductionUsWest1, 5);
    assert_eq!(record.oldest_deployed_production_build(), Some(5));
}

#[test]
fn application_version_serde_round_trip() {
    let version = ApplicationVersion::new(SourceRevision::new("repo", "branch", "bada55"), 321)
        .author_email("a@b")
        .compile_version(PlatformVersion::new(1, 2, 3))
        .build_time_ms(1_000u64);
    let json = serde_json::to_string(&version).unwrap();
    let parsed: ApplicationVersion = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, version);
}
