//! Tests for resolving configuration document locations

use ows_fs::{ConfigLocation, DocumentRef, Error, NormalizedPath, file_loc};
use rstest::rstest;

fn cwd() -> NormalizedPath {
    NormalizedPath::new(std::env::current_dir().unwrap())
}

#[test]
fn local_file_locations_are_absolute_directories() {
    let cwd = cwd();

    assert_eq!(file_loc("foo.bar", false).unwrap(), ConfigLocation::Local(cwd.clone()));
    assert_eq!(file_loc("./foo.bar", false).unwrap(), ConfigLocation::Local(cwd.clone()));
    assert_eq!(
        file_loc("baz/foo.bar", false).unwrap(),
        ConfigLocation::Local(cwd.join("baz"))
    );
}

#[cfg(unix)]
#[test]
fn absolute_local_file_location() {
    assert_eq!(
        file_loc("/etc/conf/foo.bar", false).unwrap(),
        ConfigLocation::Local(NormalizedPath::new("/etc/conf"))
    );
}

#[rstest]
#[case("s3://testbucket/foo.bar", "s3://testbucket")]
#[case("s3://testbucket/dir/foo.bar", "s3://testbucket/dir")]
#[case("s3://testbucket/frobnicate/biz/baz.bar", "s3://testbucket/frobnicate/biz")]
fn s3_locations_when_enabled(#[case] raw: &str, #[case] expected: &str) {
    assert_eq!(
        file_loc(raw, true).unwrap(),
        ConfigLocation::Remote(expected.to_string())
    );
}

#[test]
fn s3_locations_rejected_when_disabled() {
    let err = file_loc("s3://testbucket/foo.bar", false).unwrap_err();
    assert!(matches!(err, Error::RemoteDisabled { .. }));
    assert!(err.to_string().contains("DATACUBE_OWS_CFG_ALLOW_S3"));
}

#[rstest]
#[case(false)]
#[case(true)]
fn other_url_schemes_always_rejected(#[case] allow_remote: bool) {
    let err = file_loc("http://testbucket/directory/foo.bar", allow_remote).unwrap_err();
    match err {
        Error::UnsupportedScheme { scheme } => assert_eq!(scheme, "http"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn local_location_resolves_relative_documents() {
    let loc = ConfigLocation::Local(NormalizedPath::new("/srv/ows"));
    assert_eq!(
        loc.resolve("layers/a.json", false).unwrap(),
        DocumentRef::Local(NormalizedPath::new("/srv/ows/layers/a.json"))
    );
}

#[test]
fn absolute_url_in_local_location_is_not_joined() {
    let loc = ConfigLocation::Local(NormalizedPath::new("/srv/ows"));
    assert_eq!(
        loc.resolve("s3://bucket/a.json", true).unwrap(),
        DocumentRef::Remote("s3://bucket/a.json".into())
    );
}
