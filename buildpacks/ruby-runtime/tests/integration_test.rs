//! All integration tests are skipped by default (using the `ignore` attribute)
//! since performing builds is slow. To run them use: `cargo test -- --ignored`.

// Required due to: https://github.com/rust-lang/rust/issues/95513
#![allow(unused_crate_dependencies)]

use libcnb_test::{assert_contains, BuildConfig, PackResult, TestRunner};

#[test]
#[ignore = "integration test"]
fn installs_version_from_gemfile_lock() {
    TestRunner::default().build(
        BuildConfig::new("heroku/builder:24", "tests/fixtures/simple"),
        |context| {
            assert_contains!(context.pack_stdout, "Gemfile.lock was bundled with Bundler 2.2.32");
            assert_contains!(
                context.pack_stdout,
                "Resolved Ruby version 3.0.3 (from Gemfile.lock)"
            );

            let ruby_version = context.run_shell_command("ruby --version");
            assert_contains!(ruby_version.stdout, "ruby 3.0.3");
        },
    );
}

#[test]
#[ignore = "integration test"]
fn installs_version_from_env() {
    TestRunner::default().build(
        BuildConfig::new("heroku/builder:24", "tests/fixtures/version-unlocked")
            .env("GOOGLE_RUNTIME_VERSION", "2.7.5"),
        |context| {
            assert_contains!(
                context.pack_stdout,
                "Resolved Ruby version 2.7.5 (from GOOGLE_RUNTIME_VERSION)"
            );
        },
    );
}

#[test]
#[ignore = "integration test"]
fn rejects_unknown_version() {
    TestRunner::default().build(
        BuildConfig::new("heroku/builder:24", "tests/fixtures/version-unlocked")
            .env("GOOGLE_RUNTIME_VERSION", "BAD_NEWS_BEARS")
            .expected_pack_result(PackResult::Failure),
        |context| {
            assert_contains!(
                context.pack_stderr,
                "Runtime version BAD_NEWS_BEARS does not exist"
            );
        },
    );
}

#[test]
#[ignore = "integration test"]
fn rejects_override_of_locked_version() {
    TestRunner::default().build(
        BuildConfig::new("heroku/builder:24", "tests/fixtures/simple")
            .env("GOOGLE_RUNTIME_VERSION", "2.7.5")
            .expected_pack_result(PackResult::Failure),
        |context| {
            assert_contains!(
                context.pack_stderr,
                r#"Ruby version "3.0.3" in Gemfile.lock can't be overriden to "2.7.5" using GOOGLE_RUNTIME_VERSION environment variable"#
            );
        },
    );
}
