//! Visualization process models.

use serde::{Deserialize, Serialize};

/// Kind of visualization session.
///
/// At most one session per kind is alive at any time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DisplayKind {
    /// Viewer for the dense point cloud (`scene_dense.ply`).
    Cloud,

    /// Viewer for the reconstructed mesh (`scene_dense_mesh.ply`).
    Mesh,
}

impl DisplayKind {
    pub const ALL: [DisplayKind; 2] = [DisplayKind::Cloud, DisplayKind::Mesh];

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayKind::Cloud => "cloud",
            DisplayKind::Mesh => "mesh",
        }
    }
}

impl std::fmt::Display for DisplayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle describing a freshly registered visualization process.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayHandle {
    pub kind: DisplayKind,

    /// Operating-system process id, if the process reported one.
    pub pid: Option<u32>,

    /// Process id of the session this one replaced.
    pub replaced: Option<u32>,
}
