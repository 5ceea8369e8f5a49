//! All integration tests are skipped by default (using the `ignore` attribute)
//! since performing builds is slow. To run them use: `cargo test -- --ignored`.

// Required due to: https://github.com/rust-lang/rust/issues/95513
#![allow(unused_crate_dependencies)]

use libcnb_test::{assert_contains, BuildConfig, BuildpackReference, TestRunner};

fn build_config() -> BuildConfig {
    let mut config = BuildConfig::new("heroku/builder:24", "tests/fixtures/pnpm-app");
    config.buildpacks([
        BuildpackReference::WorkspaceBuildpack(libcnb::data::buildpack_id!("runtime/nodejs")),
        BuildpackReference::CurrentCrate,
    ]);
    config
}

#[test]
#[ignore = "integration test"]
fn installs_pinned_pnpm_and_dependencies() {
    TestRunner::default().build(build_config(), |context| {
        assert_contains!(
            context.pack_stdout,
            "Resolved pnpm version 8.15.4 (from package.json (packageManager))"
        );
        assert_contains!(context.pack_stdout, "Installing pnpm 8.15.4");
        assert_contains!(context.pack_stdout, "is-number 7.0.0");
    });
}

#[test]
#[ignore = "integration test"]
fn reuses_cached_pnpm() {
    let config = build_config();

    TestRunner::default().build(&config, |context| {
        context.rebuild(&config, |context| {
            assert_contains!(context.pack_stdout, "Reusing cached pnpm 8.15.4");
        });
    });
}
