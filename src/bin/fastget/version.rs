use std::fmt;

/// Version metadata printed by `fastget -v`.
///
/// `FASTGET_BUILD` may be set at compile time to stamp a build id or date.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build: &'static str,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            build: match option_env!("FASTGET_BUILD") {
                Some(build) => build,
                None => "dev",
            },
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fastget version {} ({})", self.version, self.build)
    }
}
