//! All integration tests are skipped by default (using the `ignore` attribute)
//! since performing builds is slow. To run them use: `cargo test -- --ignored`.

// Required due to: https://github.com/rust-lang/rust/issues/95513
#![allow(unused_crate_dependencies)]

use libcnb_test::{assert_contains, assert_not_contains, BuildConfig, PackResult, TestRunner};

#[test]
#[ignore = "integration test"]
fn processes_from_procfile() {
    TestRunner::default().build(
        BuildConfig::new("heroku/builder:24", "tests/fixtures/procfile-app"),
        |context| {
            assert_contains!(context.pack_stdout, "Using processes from Procfile");
            assert_contains!(context.pack_stdout, "Setting default process type 'web'");
        },
    );
}

#[test]
#[ignore = "integration test"]
fn entrypoint_from_env_wins() {
    TestRunner::default().build(
        BuildConfig::new("heroku/builder:24", "tests/fixtures/procfile-app")
            .env("GOOGLE_ENTRYPOINT", "FOO=bar ruby custom.rb"),
        |context| {
            assert_contains!(
                context.pack_stdout,
                "Using GOOGLE_ENTRYPOINT: FOO=bar ruby custom.rb"
            );
            assert_not_contains!(context.pack_stdout, "Using processes from Procfile");
        },
    );
}

#[test]
#[ignore = "integration test"]
fn fails_without_entrypoint() {
    TestRunner::default().build(
        BuildConfig::new("heroku/builder:24", "tests/fixtures/no-entrypoint")
            .expected_pack_result(PackResult::Failure),
        |context| {
            assert_contains!(
                context.pack_stderr,
                r#"for Ruby, an entrypoint must be manually set, either with "GOOGLE_ENTRYPOINT" env var or by creating a "Procfile" file"#
            );
        },
    );
}
