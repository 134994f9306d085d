//! Port → root mount binding of a virtual host.

use crate::hosting::tree::MountId;

/// Port number of the "any port" entry.
pub const ANY_PORT: u16 = 0;

/// Binds one port of a virtual host to the root of a mount tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMount {
    pub(crate) port: u16,
    pub(crate) root_mount: Option<MountId>,
}

impl PortMount {
    pub fn new(port: u16, root_mount: Option<MountId>) -> Self {
        Self { port, root_mount }
    }

    pub fn port_number(&self) -> u16 {
        self.port
    }

    /// Root of the mount tree; `None` means this entry cannot be used
    /// for resolution.
    pub fn root_mount_id(&self) -> Option<MountId> {
        self.root_mount
    }

    pub fn is_any_port(&self) -> bool {
        self.port == ANY_PORT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_port() {
        assert!(PortMount::new(0, None).is_any_port());
        let pm = PortMount::new(8080, Some(MountId(3)));
        assert!(!pm.is_any_port());
        assert_eq!(pm.root_mount_id(), Some(MountId(3)));
    }
}
