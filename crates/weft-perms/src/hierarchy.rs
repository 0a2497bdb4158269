//! Hierarchy snapshots.
//!
//! Collaborators push complete folder and document lists; each push
//! rebuilds the corresponding half of the snapshot. A Blake3 fingerprint
//! over the sorted links tells the service whether anything that affects
//! resolution actually changed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use weft_core::EntityId;

/// A folder as supplied by the folder collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    pub id: EntityId,
    #[serde(default)]
    pub parent_id: Option<EntityId>,
    #[serde(default)]
    pub workspace_id: Option<EntityId>,
}

impl FolderRecord {
    /// A top-level folder of `workspace`.
    pub fn root(id: impl Into<EntityId>, workspace: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            workspace_id: Some(workspace.into()),
        }
    }

    /// A folder nested under `parent`.
    pub fn child(
        id: impl Into<EntityId>,
        parent: impl Into<EntityId>,
        workspace: impl Into<EntityId>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: Some(parent.into()),
            workspace_id: Some(workspace.into()),
        }
    }
}

/// A document as supplied by the document collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: EntityId,
    #[serde(default)]
    pub folder_id: Option<EntityId>,
    /// Workspace used when the document sits outside any folder.
    #[serde(default)]
    pub workspace_id: Option<EntityId>,
}

impl DocumentRecord {
    pub fn in_folder(id: impl Into<EntityId>, folder: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            folder_id: Some(folder.into()),
            workspace_id: None,
        }
    }

    pub fn unfiled(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            folder_id: None,
            workspace_id: None,
        }
    }
}

/// Parent and workspace links of one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderLink {
    pub parent_id: Option<EntityId>,
    pub workspace_id: Option<EntityId>,
}

/// Folder and workspace links of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    pub folder_id: Option<EntityId>,
    pub workspace_id: Option<EntityId>,
}

type Fingerprint = [u8; 32];

/// Immutable-per-update view of the folder and document links.
#[derive(Debug, Clone, Default)]
pub struct HierarchySnapshot {
    folders: HashMap<EntityId, FolderLink>,
    documents: HashMap<EntityId, DocumentLink>,
    folder_fingerprint: Fingerprint,
    document_fingerprint: Fingerprint,
}

impl HierarchySnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the folder half of the snapshot.
    ///
    /// Returns `true` if the folder topology differs from the previous one.
    /// Later duplicates of an id win.
    pub fn replace_folders(&mut self, folders: &[FolderRecord]) -> bool {
        let fingerprint = fingerprint(folders.iter().map(|f| {
            [
                Some(&f.id),
                f.parent_id.as_ref(),
                f.workspace_id.as_ref(),
            ]
        }));

        self.folders = folders
            .iter()
            .map(|f| {
                (
                    f.id.clone(),
                    FolderLink {
                        parent_id: f.parent_id.clone(),
                        workspace_id: f.workspace_id.clone(),
                    },
                )
            })
            .collect();

        let changed = fingerprint != self.folder_fingerprint;
        self.folder_fingerprint = fingerprint;
        changed
    }

    /// Rebuild the document half of the snapshot.
    ///
    /// Returns `true` if any document moved, appeared or disappeared.
    pub fn replace_documents(&mut self, documents: &[DocumentRecord]) -> bool {
        let fingerprint = fingerprint(documents.iter().map(|d| {
            [
                Some(&d.id),
                d.folder_id.as_ref(),
                d.workspace_id.as_ref(),
            ]
        }));

        self.documents = documents
            .iter()
            .map(|d| {
                (
                    d.id.clone(),
                    DocumentLink {
                        folder_id: d.folder_id.clone(),
                        workspace_id: d.workspace_id.clone(),
                    },
                )
            })
            .collect();

        let changed = fingerprint != self.document_fingerprint;
        self.document_fingerprint = fingerprint;
        changed
    }

    /// Links of a folder, if it has ever been pushed.
    pub fn folder(&self, id: &EntityId) -> Option<&FolderLink> {
        self.folders.get(id)
    }

    /// Links of a document, if it has ever been pushed.
    pub fn document(&self, id: &EntityId) -> Option<&DocumentLink> {
        self.documents.get(id)
    }

    /// Number of distinct folders in the snapshot.
    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    /// Number of distinct documents in the snapshot.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

/// Order-independent Blake3 digest over `[id, link, link]` triples.
///
/// The empty list hashes to all zeroes so that pushing an empty list into
/// an empty snapshot is not a change.
fn fingerprint<'a>(records: impl Iterator<Item = [Option<&'a EntityId>; 3]>) -> Fingerprint {
    let mut rows: Vec<[Option<&EntityId>; 3]> = records.collect();
    if rows.is_empty() {
        return [0u8; 32];
    }
    rows.sort();

    let mut hasher = blake3::Hasher::new();
    for row in rows {
        for field in row {
            match field {
                Some(id) => {
                    hasher.update(&[1]);
                    hasher.update(&(id.as_str().len() as u64).to_le_bytes());
                    hasher.update(id.as_str().as_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
    }
    *hasher.finalize().as_bytes()
}
