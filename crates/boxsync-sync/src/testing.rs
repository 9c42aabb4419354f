//! In-memory remote tree for engine tests
//!
//! Behaves like the Box API where it matters to the engine: names are
//! unique within a folder regardless of kind, creating a taken name is a
//! conflict, and deleting a non-empty folder needs `recursive`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use sha1::{Digest, Sha1};

use boxsync_core::domain::{
    ContentHash, NodeKind, RemoteError, RemoteId, RemoteNode, RemoteResult,
};
use boxsync_core::ports::IRemoteTree;

#[derive(Debug, Clone)]
struct FakeItem {
    name: String,
    kind: NodeKind,
    parent: Option<RemoteId>,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<RemoteId, FakeItem>,
    next_id: u64,
    mutations: Vec<String>,
    listings: usize,
    create_conflicts: HashSet<String>,
    failing_uploads: HashSet<String>,
    failing_listings: HashSet<RemoteId>,
    download_names: HashMap<RemoteId, String>,
}

impl State {
    fn allocate(&mut self, name: &str, kind: NodeKind, parent: &RemoteId, content: Vec<u8>) -> RemoteId {
        self.next_id += 1;
        let id = RemoteId::new(format!("{}", 1000 + self.next_id)).expect("numeric id");
        self.items.insert(
            id.clone(),
            FakeItem {
                name: name.to_string(),
                kind,
                parent: Some(parent.clone()),
                content,
            },
        );
        id
    }

    fn children_of(&self, parent: &RemoteId) -> Vec<(RemoteId, FakeItem)> {
        let mut children: Vec<_> = self
            .items
            .iter()
            .filter(|(_, item)| item.parent.as_ref() == Some(parent))
            .map(|(id, item)| (id.clone(), item.clone()))
            .collect();
        children.sort_by(|a, b| a.1.name.cmp(&b.1.name));
        children
    }

    fn child_named(&self, parent: &RemoteId, name: &str) -> Option<(RemoteId, FakeItem)> {
        self.children_of(parent)
            .into_iter()
            .find(|(_, item)| item.name == name)
    }

    fn node(&self, id: &RemoteId) -> RemoteResult<RemoteNode> {
        let item = self
            .items
            .get(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        Ok(to_node(id, item))
    }

    fn remove_subtree(&mut self, id: &RemoteId) {
        for (child, _) in self.children_of(id) {
            self.remove_subtree(&child);
        }
        self.items.remove(id);
    }
}

fn digest(content: &[u8]) -> ContentHash {
    ContentHash::from_digest(&Sha1::digest(content)).expect("sha1 digest")
}

fn to_node(id: &RemoteId, item: &FakeItem) -> RemoteNode {
    match item.kind {
        NodeKind::File => RemoteNode {
            size: Some(item.content.len() as u64),
            ..RemoteNode::file(id.clone(), item.name.clone(), digest(&item.content))
        },
        NodeKind::Folder => RemoteNode::folder(id.clone(), item.name.clone()),
    }
}

/// Fake [`IRemoteTree`] that records every mutation
pub struct FakeTree {
    state: Mutex<State>,
}

impl FakeTree {
    pub fn new() -> Self {
        let mut state = State::default();
        state.items.insert(
            RemoteId::root(),
            FakeItem {
                name: "All Files".to_string(),
                kind: NodeKind::Folder,
                parent: None,
                content: Vec::new(),
            },
        );
        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake tree lock")
    }

    pub fn add_folder(&self, parent: &RemoteId, name: &str) -> RemoteId {
        self.state()
            .allocate(name, NodeKind::Folder, parent, Vec::new())
    }

    pub fn add_file(&self, parent: &RemoteId, name: &str, content: &[u8]) -> RemoteId {
        self.state()
            .allocate(name, NodeKind::File, parent, content.to_vec())
    }

    /// The root folder without children
    pub fn root_node(&self) -> RemoteNode {
        self.node(&RemoteId::root())
    }

    pub fn node(&self, id: &RemoteId) -> RemoteNode {
        self.state().node(id).expect("known id")
    }

    /// Finds a child by name
    pub fn child(&self, parent: &RemoteId, name: &str) -> Option<RemoteNode> {
        self.state()
            .child_named(parent, name)
            .map(|(id, item)| to_node(&id, &item))
    }

    /// Contents of a remote file
    pub fn content(&self, id: &RemoteId) -> Vec<u8> {
        self.state().items[id].content.clone()
    }

    /// Mutation calls in the order they were issued
    pub fn mutations(&self) -> Vec<String> {
        self.state().mutations.clone()
    }

    /// Number of `list_children` calls served
    pub fn listings(&self) -> usize {
        self.state().listings
    }

    /// The next `create_folder(name)` creates the folder out of band and
    /// reports a conflict, as if another client had just created it
    pub fn inject_create_conflict(&self, name: &str) {
        self.state().create_conflicts.insert(name.to_string());
    }

    /// Uploads of files named `name` fail with HTTP 500
    pub fn fail_upload(&self, name: &str) {
        self.state().failing_uploads.insert(name.to_string());
    }

    /// Downloads of `id` are named `name`, as a `Content-Disposition`
    /// header might
    pub fn serve_download_as(&self, id: &RemoteId, name: &str) {
        self.state().download_names.insert(id.clone(), name.to_string());
    }

    /// Listing this folder fails with HTTP 500
    pub fn fail_listing(&self, id: &RemoteId) {
        self.state().failing_listings.insert(id.clone());
    }
}

fn server_error(what: &str) -> RemoteError {
    RemoteError::Http {
        status: 500,
        message: what.to_string(),
    }
}

#[async_trait]
impl IRemoteTree for FakeTree {
    async fn list_children(&self, folder_id: &RemoteId) -> RemoteResult<Vec<RemoteNode>> {
        let mut state = self.state();
        state.listings += 1;
        if state.failing_listings.contains(folder_id) {
            return Err(server_error("listing failed"));
        }
        if !state.items.contains_key(folder_id) {
            return Err(RemoteError::NotFound(folder_id.to_string()));
        }
        Ok(state
            .children_of(folder_id)
            .iter()
            .map(|(id, item)| to_node(id, item))
            .collect())
    }

    async fn get_info(&self, id: &RemoteId, kind: NodeKind) -> RemoteResult<RemoteNode> {
        if !id.is_numeric() {
            return Err(RemoteError::Parameter(format!("id({id}) is ill-formed")));
        }
        let state = self.state();
        let mut node = state.node(id)?;
        if node.kind != kind {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        if node.is_folder() {
            node.children = Some(
                state
                    .children_of(id)
                    .iter()
                    .map(|(id, item)| to_node(id, item))
                    .collect(),
            );
        }
        Ok(node)
    }

    async fn create_folder(&self, name: &str, parent_id: &RemoteId) -> RemoteResult<RemoteNode> {
        let mut state = self.state();
        state.mutations.push(format!("create_folder {name}"));

        if state.create_conflicts.remove(name) {
            state.allocate(name, NodeKind::Folder, parent_id, Vec::new());
            return Err(RemoteError::Conflict(name.to_string()));
        }
        if state.child_named(parent_id, name).is_some() {
            return Err(RemoteError::Conflict(name.to_string()));
        }

        let id = state.allocate(name, NodeKind::Folder, parent_id, Vec::new());
        state.node(&id)
    }

    async fn delete(&self, id: &RemoteId, kind: NodeKind, recursive: bool) -> RemoteResult<()> {
        let mut state = self.state();
        let node = state.node(id)?;
        state
            .mutations
            .push(format!("delete {} {}", kind, node.name));

        if kind == NodeKind::Folder && !recursive && !state.children_of(id).is_empty() {
            return Err(RemoteError::BadRequest("folder_not_empty".to_string()));
        }
        state.remove_subtree(id);
        Ok(())
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        parent_id: &RemoteId,
        existing: Option<&RemoteId>,
    ) -> RemoteResult<RemoteNode> {
        let content = tokio::fs::read(local_path).await?;
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut state = self.state();
        match existing {
            Some(_) => state.mutations.push(format!("upload_version {name}")),
            None => state.mutations.push(format!("upload {name}")),
        }

        if state.failing_uploads.contains(&name) {
            return Err(server_error("upload failed"));
        }

        match existing {
            Some(id) => {
                let item = state
                    .items
                    .get_mut(id)
                    .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
                item.content = content;
                state.node(id)
            }
            None => {
                if state.child_named(parent_id, &name).is_some() {
                    return Err(RemoteError::Conflict(name));
                }
                let id = state.allocate(&name, NodeKind::File, parent_id, content);
                state.node(&id)
            }
        }
    }

    async fn rename(&self, id: &RemoteId, _kind: NodeKind, new_name: &str) -> RemoteResult<RemoteNode> {
        let mut state = self.state();
        state.mutations.push(format!("rename {new_name}"));
        let item = state
            .items
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        item.name = new_name.to_string();
        state.node(id)
    }

    async fn move_to(
        &self,
        id: &RemoteId,
        _kind: NodeKind,
        new_parent_id: &RemoteId,
    ) -> RemoteResult<RemoteNode> {
        let mut state = self.state();
        state.mutations.push(format!("move {id}"));
        let item = state
            .items
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        item.parent = Some(new_parent_id.clone());
        state.node(id)
    }

    async fn download_file(&self, id: &RemoteId, dest_dir: &Path) -> RemoteResult<PathBuf> {
        let (name, content) = {
            let state = self.state();
            let item = state
                .items
                .get(id)
                .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
            let name = state
                .download_names
                .get(id)
                .cloned()
                .unwrap_or_else(|| item.name.clone());
            (name, item.content.clone())
        };
        tokio::fs::create_dir_all(dest_dir).await?;
        let target = dest_dir.join(name);
        tokio::fs::write(&target, content).await?;
        Ok(target)
    }
}

/// Creates a local tree; `None` marks a directory, parents are created
pub fn write_local(root: &Path, entries: &[(&str, Option<&str>)]) {
    for (path, content) in entries {
        let full = root.join(path);
        match content {
            None => std::fs::create_dir_all(&full).expect("create dir"),
            Some(content) => {
                if let Some(parent) = full.parent() {
                    std::fs::create_dir_all(parent).expect("create parent");
                }
                std::fs::write(&full, content).expect("write file");
            }
        }
    }
}
