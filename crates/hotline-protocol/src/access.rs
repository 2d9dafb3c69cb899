//! Account access bitmap.
//!
//! Accounts carry 39 capability bits in an 8-byte big-endian bitmap. Bit
//! index `i` lives in byte `i / 8` under mask `1 << (7 - i % 8)`, so bit 0
//! is the high bit of the first byte.

use serde::{Deserialize, Serialize};

/// Named capability bits, in classic wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Access {
    DeleteFile = 0,
    UploadFile = 1,
    DownloadFile = 2,
    RenameFile = 3,
    MoveFile = 4,
    CreateFolder = 5,
    DeleteFolder = 6,
    RenameFolder = 7,
    MoveFolder = 8,
    ReadChat = 9,
    SendChat = 10,
    OpenChat = 11,
    CloseChat = 12,
    ShowInList = 13,
    CreateUser = 14,
    DeleteUser = 15,
    OpenUser = 16,
    ModifyUser = 17,
    ChangeOwnPassword = 18,
    SendPrivMsg = 19,
    NewsReadArt = 20,
    NewsPostArt = 21,
    DisconnectUser = 22,
    CannotBeDisconnected = 23,
    GetClientInfo = 24,
    UploadAnywhere = 25,
    AnyName = 26,
    NoAgreement = 27,
    SetFileComment = 28,
    SetFolderComment = 29,
    ViewDropBoxes = 30,
    MakeAlias = 31,
    Broadcast = 32,
    NewsDeleteArt = 33,
    NewsCreateCat = 34,
    NewsDeleteCat = 35,
    NewsCreateFolder = 36,
    NewsDeleteFolder = 37,
    UploadFolder = 38,
}

/// The 39-bit capability set attached to an account, in wire form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessBitmap(pub [u8; 8]);

impl AccessBitmap {
    /// Empty bitmap (no capabilities)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bitmap from raw wire bytes
    #[must_use]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Wire bytes
    #[must_use]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0
    }

    /// Grant a capability
    pub fn set(&mut self, bit: Access) {
        let i = bit as usize;
        self.0[i / 8] |= 1 << (7 - i % 8);
    }

    /// Revoke a capability
    pub fn clear(&mut self, bit: Access) {
        let i = bit as usize;
        self.0[i / 8] &= !(1 << (7 - i % 8));
    }

    /// Check a capability
    #[must_use]
    pub fn contains(&self, bit: Access) -> bool {
        let i = bit as usize;
        self.0[i / 8] & (1 << (7 - i % 8)) != 0
    }

    /// Builder-style grant
    #[must_use]
    pub fn with(mut self, bit: Access) -> Self {
        self.set(bit);
        self
    }

    /// Union of two bitmaps (effective access = account | per-session grants)
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        let mut out = [0u8; 8];
        for (i, b) in out.iter_mut().enumerate() {
            *b = self.0[i] | other.0[i];
        }
        Self(out)
    }

    /// Intersection with a policy mask
    #[must_use]
    pub fn intersect(self, mask: Self) -> Self {
        let mut out = [0u8; 8];
        for (i, b) in out.iter_mut().enumerate() {
            *b = self.0[i] & mask.0[i];
        }
        Self(out)
    }

    /// Every defined capability set; the admin default and the policy mask
    /// that passes everything through
    #[must_use]
    pub fn all() -> Self {
        let mut bm = Self::new();
        for i in 0..=Access::UploadFolder as u8 {
            bm.0[usize::from(i) / 8] |= 1 << (7 - i % 8);
        }
        bm
    }
}
