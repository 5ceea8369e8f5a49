//! Node.js application files: `package.json` and the lockfiles of npm, Yarn and pnpm.

mod lockfile;
mod package_json;

pub use lockfile::{locked_version, Lockfile, LockfileError};
pub use package_json::{Engines, PackageJson, PackageJsonError, PackageManager};
