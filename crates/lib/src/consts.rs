//! Shared constants for the packforge working tree layout.

/// Environment variable overriding the working tree root.
pub const WORK_DIR_ENV: &str = "PACKFORGE_WORK_DIR";

/// Project configuration file name.
pub const PROJECT_FILENAME: &str = "packforge.yaml";

/// Directory holding per-part working directories.
pub const PARTS_DIR: &str = "parts";

/// Shared staging area merged across parts.
pub const STAGE_DIR: &str = "stage";

/// Final packaging-ready layout.
pub const PRIME_DIR: &str = "prime";

/// Durable state database root.
pub const STATE_DIR: &str = "state";

/// Per-part source checkout directory.
pub const PART_SRC_DIR: &str = "src";

/// Per-part build scratch directory.
pub const PART_BUILD_DIR: &str = "build";

/// Per-part install output directory (input to staging).
pub const PART_INSTALL_DIR: &str = "install";

/// Project record file name within the state directory.
pub const PROJECT_STATE_FILENAME: &str = "project.json";

/// Metadata directory within the prime area.
pub const META_DIR: &str = "meta";

/// Final package metadata file name.
pub const PACKAGE_METADATA_FILENAME: &str = "package.yaml";

/// File scriptlets write metadata to (exposed via `PACKFORGE_METADATA`).
pub const SCRIPTLET_METADATA_FILENAME: &str = "scriptlet-metadata.yaml";
