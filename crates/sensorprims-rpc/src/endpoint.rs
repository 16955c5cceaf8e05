//! Remote object paths below the RPC API root.
//!
//! The device exposes one XML-RPC object per configuration level; each level's
//! path extends its parent's.

use std::fmt;

/// Path of one remote object, relative to the API root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    /// Path of the device's main object.
    pub const MAIN_PATH: &'static str = "com.ifm.efector/";

    /// The main (device) level.
    pub fn main() -> Self {
        Self(Self::MAIN_PATH.to_string())
    }

    /// Session level below this endpoint.
    pub fn session(&self, session_id: &str) -> Self {
        self.child(&format!("session_{session_id}/"))
    }

    /// Edit-mode level below a session.
    pub fn edit(&self) -> Self {
        self.child("edit/")
    }

    /// Device configuration (password, persistent save) below the edit level.
    pub fn device(&self) -> Self {
        self.child("device/")
    }

    /// Currently edited application below the edit level.
    pub fn application(&self) -> Self {
        self.child("application/")
    }

    /// Imager configuration `index` below the application level.
    pub fn imager(&self, index: u32) -> Self {
        self.child(&format!("imager_{index:03}/"))
    }

    /// The relative path, always ending in `/`.
    pub fn path(&self) -> &str {
        &self.0
    }

    fn child(&self, segment: &str) -> Self {
        Self(format!("{}{segment}", self.0))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_nest_per_level() {
        let session = Endpoint::main().session("0123abcd");
        assert_eq!(session.path(), "com.ifm.efector/session_0123abcd/");

        let imager = session.edit().application().imager(1);
        assert_eq!(
            imager.path(),
            "com.ifm.efector/session_0123abcd/edit/application/imager_001/"
        );
        assert_eq!(imager.to_string(), imager.path());
    }

    #[test]
    fn device_config_sits_below_edit() {
        let device = Endpoint::main().session("s").edit().device();
        assert_eq!(device.path(), "com.ifm.efector/session_s/edit/device/");
    }

    #[test]
    fn imager_index_is_zero_padded() {
        let app = Endpoint::main().session("s").edit().application();
        assert!(app.imager(12).path().ends_with("imager_012/"));
        assert!(app.imager(999).path().ends_with("imager_999/"));
    }
}
