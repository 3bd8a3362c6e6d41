pub mod blkid;
pub mod blockdev;
pub mod dependencies;
pub mod df;
pub mod errors;
pub mod filesystems;
pub mod host;
pub mod lsblk;
pub mod mkfs;
pub mod resize2fs;
pub mod uname;
pub mod wipefs;

#[cfg(any(test, feature = "test-utilities"))]
pub mod testutils;
