//! Signals exchanged over the bus.
//!
//! Every [`Signal`] variant carries exactly one payload type and maps to one
//! [`SignalKind`]. Consumers subscribe by kind.

use std::fmt;

use nsync_core::{FolderRejection, FolderRequest, LocalFile, RemoteFile, SyncFolder, TransferStatus};

/// Discriminant used to route signals to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalKind {
    FolderAdded,
    FileModified,
    FileDeleted,
    TransferFile,
    DeleteFile,
    ChangeStatus,
    AddFolder,
    FolderRejected,
    Stop,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A broadcast message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// A folder was registered, or resumed at startup.
    FolderAdded(SyncFolder),
    /// A file was created, modified, or found by a scan.
    FileModified(LocalFile),
    /// A file was removed.
    FileDeleted(LocalFile),
    /// A file must be copied to its remote destination.
    TransferFile(RemoteFile),
    /// A file must be removed from its remote destination.
    DeleteFile(RemoteFile),
    /// A driver reports progress on a transfer.
    ChangeStatus(TransferStatus),
    /// Request to register a folder.
    AddFolder(FolderRequest),
    /// A folder request was refused.
    FolderRejected(FolderRejection),
    /// Terminate the dispatch loop once delivered.
    Stop,
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::FolderAdded(_) => SignalKind::FolderAdded,
            Signal::FileModified(_) => SignalKind::FileModified,
            Signal::FileDeleted(_) => SignalKind::FileDeleted,
            Signal::TransferFile(_) => SignalKind::TransferFile,
            Signal::DeleteFile(_) => SignalKind::DeleteFile,
            Signal::ChangeStatus(_) => SignalKind::ChangeStatus,
            Signal::AddFolder(_) => SignalKind::AddFolder,
            Signal::FolderRejected(_) => SignalKind::FolderRejected,
            Signal::Stop => SignalKind::Stop,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::FolderAdded(folder) => write!(f, "FolderAdded({})", folder.folder_id()),
            Signal::FileModified(file) | Signal::FileDeleted(file) => {
                write!(f, "{}({})", self.kind(), file.path.display())
            }
            Signal::TransferFile(file) | Signal::DeleteFile(file) => {
                write!(f, "{}({})", self.kind(), file.path.display())
            }
            Signal::ChangeStatus(status) => {
                write!(f, "ChangeStatus({} {})", status.path.display(), status.status)
            }
            Signal::AddFolder(req) => write!(f, "AddFolder({} -> {})", req.local_uri, req.remote_uri),
            Signal::FolderRejected(rej) => write!(f, "FolderRejected({})", rej.request.remote_uri),
            Signal::Stop => f.write_str("Stop"),
        }
    }
}
