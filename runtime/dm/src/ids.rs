//! Identifiers and URI paths
//!
//! LwM2M addresses the data model with up to four 16-bit identifiers:
//! `/OID/IID/RID/RIID`. The value `0xFFFF` is reserved and never names an
//! existing entity.

use core::fmt;
use core::str::FromStr;

use static_assertions::const_assert_eq;

use crate::error::DmError;

pub type Oid = u16;
pub type Iid = u16;
pub type Rid = u16;
pub type Riid = u16;
pub type Ssid = u16;

/// Reserved identifier value
pub const ID_INVALID: u16 = u16::MAX;

/// Wildcard SSID; as an ACL Resource Instance ID it marks the default entry
pub const SSID_ANY: Ssid = 0;

/// SSID of the Bootstrap Server, also the "owned by bootstrap" sentinel
pub const SSID_BOOTSTRAP: Ssid = u16::MAX;

const_assert_eq!(SSID_BOOTSTRAP, ID_INVALID);

/// Object IDs the core gives special treatment to
pub mod oid {
    use super::Oid;

    pub const SECURITY: Oid = 0;
    pub const SERVER: Oid = 1;
    pub const ACCESS_CONTROL: Oid = 2;
    pub const OSCORE: Oid = 21;
}

/// Resource IDs of the objects the core reads directly
pub mod rid {
    pub mod security {
        use crate::ids::Rid;

        pub const BOOTSTRAP: Rid = 1;
        pub const SSID: Rid = 10;
    }

    pub mod server {
        use crate::ids::Rid;

        pub const SSID: Rid = 0;
    }

    pub mod access_control {
        use crate::ids::Rid;

        pub const OID: Rid = 0;
        pub const OIID: Rid = 1;
        pub const ACL: Rid = 2;
        pub const OWNER: Rid = 3;
    }
}

/// Objects no LwM2M Server may ever operate on
#[inline]
pub fn is_restricted_oid(oid: Oid) -> bool {
    oid == oid::SECURITY || oid == oid::OSCORE
}

/// Depth of a [`UriPath`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathLevel {
    Root = 0,
    Object = 1,
    Instance = 2,
    Resource = 3,
    ResourceInstance = 4,
}

/// Data model path of 0 to 4 identifiers
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UriPath {
    ids: [u16; 4],
    len: u8,
}

impl UriPath {
    pub const fn root() -> Self {
        Self { ids: [ID_INVALID; 4], len: 0 }
    }

    pub const fn object(oid: Oid) -> Self {
        Self { ids: [oid, ID_INVALID, ID_INVALID, ID_INVALID], len: 1 }
    }

    pub const fn instance(oid: Oid, iid: Iid) -> Self {
        Self { ids: [oid, iid, ID_INVALID, ID_INVALID], len: 2 }
    }

    pub const fn resource(oid: Oid, iid: Iid, rid: Rid) -> Self {
        Self { ids: [oid, iid, rid, ID_INVALID], len: 3 }
    }

    pub const fn resource_instance(oid: Oid, iid: Iid, rid: Rid, riid: Riid) -> Self {
        Self { ids: [oid, iid, rid, riid], len: 4 }
    }

    /// Build a path from raw identifiers
    ///
    /// # Errors
    /// `BadRequest` if there are more than four identifiers or any of them
    /// is the reserved `0xFFFF`
    pub fn from_ids(ids: &[u16]) -> Result<Self, DmError> {
        if ids.len() > 4 || ids.contains(&ID_INVALID) {
            return Err(DmError::BadRequest);
        }
        let mut path = Self::root();
        path.ids[..ids.len()].copy_from_slice(ids);
        path.len = ids.len() as u8;
        Ok(path)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.len == 0
    }

    pub fn level(&self) -> PathLevel {
        match self.len {
            0 => PathLevel::Root,
            1 => PathLevel::Object,
            2 => PathLevel::Instance,
            3 => PathLevel::Resource,
            _ => PathLevel::ResourceInstance,
        }
    }

    /// Identifiers present in this path
    pub fn ids(&self) -> &[u16] {
        &self.ids[..self.len()]
    }

    fn id(&self, index: usize) -> Option<u16> {
        (index < self.len()).then(|| self.ids[index])
    }

    #[inline]
    pub fn oid(&self) -> Option<Oid> {
        self.id(0)
    }

    #[inline]
    pub fn iid(&self) -> Option<Iid> {
        self.id(1)
    }

    #[inline]
    pub fn rid(&self) -> Option<Rid> {
        self.id(2)
    }

    #[inline]
    pub fn riid(&self) -> Option<Riid> {
        self.id(3)
    }

    #[inline]
    pub fn has_iid(&self) -> bool {
        self.len >= 2
    }

    #[inline]
    pub fn has_rid(&self) -> bool {
        self.len >= 3
    }

    #[inline]
    pub fn has_riid(&self) -> bool {
        self.len >= 4
    }

    /// Path truncated to `len` identifiers (no-op if already shorter)
    pub fn truncated(&self, len: usize) -> Self {
        let mut path = *self;
        for id in path.ids.iter_mut().skip(len) {
            *id = ID_INVALID;
        }
        path.len = path.len.min(len as u8);
        path
    }

    /// True if `prefix` addresses this path or one of its ancestors
    pub fn starts_with(&self, prefix: &UriPath) -> bool {
        prefix.len <= self.len && self.ids[..prefix.len()] == prefix.ids[..prefix.len()]
    }
}

impl Default for UriPath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for UriPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for id in self.ids() {
            write!(f, "/{}", id)?;
        }
        Ok(())
    }
}

impl fmt::Debug for UriPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UriPath({})", self)
    }
}

impl FromStr for UriPath {
    type Err = DmError;

    /// Parse `/`, `/3`, `/3/0`, `/3/0/1` or `/3/0/1/2`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix('/').ok_or(DmError::BadRequest)?;
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut ids = [0u16; 4];
        let mut len = 0;
        for segment in trimmed.split('/') {
            if len == ids.len() {
                return Err(DmError::BadRequest);
            }
            ids[len] = segment.parse().map_err(|_| DmError::BadRequest)?;
            len += 1;
        }
        Self::from_ids(&ids[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_accessors() {
        let path = UriPath::resource_instance(3, 0, 7, 1);
        assert_eq!(path.len(), 4);
        assert_eq!(path.oid(), Some(3));
        assert_eq!(path.iid(), Some(0));
        assert_eq!(path.rid(), Some(7));
        assert_eq!(path.riid(), Some(1));
        assert_eq!(path.level(), PathLevel::ResourceInstance);

        let object = UriPath::object(3);
        assert_eq!(object.iid(), None);
        assert!(!object.has_iid());
        assert!(UriPath::root().is_root());
    }

    #[test]
    fn test_path_display_and_parse() {
        assert_eq!(UriPath::root().to_string(), "/");
        assert_eq!(UriPath::resource(10, 0, 5).to_string(), "/10/0/5");
        assert_eq!("/10/0/5".parse::<UriPath>().unwrap(), UriPath::resource(10, 0, 5));
        assert_eq!("/".parse::<UriPath>().unwrap(), UriPath::root());
        assert!("10/0".parse::<UriPath>().is_err());
        assert!("/1/2/3/4/5".parse::<UriPath>().is_err());
        assert!("/65535".parse::<UriPath>().is_err());
        assert!("/1/x".parse::<UriPath>().is_err());
    }

    #[test]
    fn test_path_prefix() {
        let path = UriPath::resource(10, 1, 2);
        assert!(path.starts_with(&UriPath::root()));
        assert!(path.starts_with(&UriPath::instance(10, 1)));
        assert!(path.starts_with(&path));
        assert!(!path.starts_with(&UriPath::instance(10, 2)));
        assert!(!UriPath::object(10).starts_with(&path));
        assert_eq!(path.truncated(2), UriPath::instance(10, 1));
        assert_eq!(path.truncated(8), path);
    }

    #[test]
    fn test_restricted_objects() {
        assert!(is_restricted_oid(oid::SECURITY));
        assert!(is_restricted_oid(oid::OSCORE));
        assert!(!is_restricted_oid(oid::ACCESS_CONTROL));
    }
}
