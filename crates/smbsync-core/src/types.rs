//! Owned result payload shapes.
//!
//! Replies arrive as pointers into engine-owned memory, valid only until
//! the caller finishes consuming them. The engine's payload readers
//! decode them into these plain owned values before the bridge returns.

/// What a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Link,
}

/// Result of a `stat` operation. Times are seconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub file_type: FileType,
    pub size: u64,
    pub nlink: u32,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
}

/// Result of a `statvfs` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStat {
    pub block_size: u32,
    pub blocks: u64,
    pub free_blocks: u64,
    pub avail_blocks: u64,
}

/// Kind of a server-side share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    DiskTree,
    PrintQueue,
    Device,
    Ipc,
}

/// One entry from a share enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareInfo {
    pub name: String,
    pub kind: ShareKind,
    /// Administrative/hidden share (trailing `$`).
    pub hidden: bool,
}
