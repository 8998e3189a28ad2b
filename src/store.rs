use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::person::Person;
use crate::tree::FamilyTree;
use crate::utils::now_iso;

/// Tree served when no id is given.
pub const DEFAULT_TREE_ID: &str = "tree_00000";

/// Allocated ids start here and grow with the number of stored files.
const TREE_ID_BASE: usize = 10_000;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tree '{0}' not found")]
    NotFound(String),
    #[error("tree '{0}' already exists")]
    Conflict(String),
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("malformed tree file '{}'", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Fields accepted when creating a tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTree {
    #[serde(default)]
    pub tree_name: String,
    #[serde(default)]
    pub creator_email_id: String,
    #[serde(default)]
    pub tree_data: Vec<Person>,
}

/// Fields accepted when updating a tree. Absent fields keep their
/// stored value; the id and the create stamp can never change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreePatch {
    #[serde(default)]
    pub tree_name: Option<String>,
    #[serde(default)]
    pub creator_email_id: Option<String>,
    #[serde(default)]
    pub tree_data: Option<Vec<Person>>,
}

/// One row of the tree listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeSummary {
    pub tree_id: String,
    pub name: String,
    pub creator_email_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modify_date: Option<String>,
    pub member_count: usize,
}

/// On disk layout: one `<treeId>.json` document per tree inside a
/// `trees/` directory under the data dir.
#[derive(Debug, Clone)]
pub struct TreeStore {
    trees_dir: PathBuf,
}

impl TreeStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let trees_dir = data_dir.as_ref().join("trees");
        fs::create_dir_all(&trees_dir)?;
        Ok(Self { trees_dir })
    }

    /// `$KINTREE_DATA_DIR` when set, otherwise the platform's local
    /// data directory, falling back to `./data`.
    pub fn default_data_dir() -> PathBuf {
        if let Ok(custom) = std::env::var("KINTREE_DATA_DIR") {
            if !custom.trim().is_empty() {
                return PathBuf::from(custom);
            }
        }
        if let Some(dirs) = ProjectDirs::from("", "", "kintree") {
            return dirs.data_local_dir().to_path_buf();
        }
        PathBuf::from("data")
    }

    pub fn trees_dir(&self) -> &Path {
        &self.trees_dir
    }

    pub fn tree_path(&self, tree_id: &str) -> PathBuf {
        self.trees_dir.join(format!("{tree_id}.json"))
    }

    pub fn exists(&self, tree_id: &str) -> bool {
        self.tree_path(tree_id).is_file()
    }

    pub fn file_size(&self, tree_id: &str) -> Result<u64, StoreError> {
        Ok(fs::metadata(self.tree_path(tree_id))?.len())
    }

    pub fn load(&self, tree_id: &str) -> Result<FamilyTree, StoreError> {
        let path = self.tree_path(tree_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(tree_id.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        let mut tree = parse_tree(&contents).map_err(|source| StoreError::Malformed {
            path: path.clone(),
            source,
        })?;
        if tree.tree_id.is_empty() {
            tree.tree_id = tree_id.to_string();
        }
        info!("loaded {} ({} persons)", tree.tree_id, tree.tree_data.len());
        Ok(tree)
    }

    /// Validate and persist a new tree under a freshly allocated id.
    pub fn create(&self, new_tree: NewTree) -> Result<FamilyTree, StoreError> {
        let errors = validate_new_tree(&new_tree);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }

        let tree_id = self.next_tree_id()?;
        if self.exists(&tree_id) {
            return Err(StoreError::Conflict(tree_id));
        }

        let tree = FamilyTree {
            tree_id: tree_id.clone(),
            tree_name: new_tree.tree_name.trim().to_string(),
            creator_email_id: new_tree.creator_email_id.trim().to_string(),
            create_date: Some(now_iso()),
            modify_date: None,
            tree_data: new_tree.tree_data,
        };
        self.write(&tree)?;
        info!("created {} ({} persons)", tree.tree_id, tree.tree_data.len());
        Ok(tree)
    }

    /// Merge a patch into a stored tree. The create stamp survives and
    /// the modify stamp is refreshed.
    pub fn update(&self, tree_id: &str, patch: TreePatch) -> Result<FamilyTree, StoreError> {
        let errors = validate_patch(&patch);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }

        let mut tree = self.load(tree_id)?;
        if let Some(tree_name) = patch.tree_name {
            tree.tree_name = tree_name;
        }
        if let Some(creator_email_id) = patch.creator_email_id {
            tree.creator_email_id = creator_email_id;
        }
        if let Some(tree_data) = patch.tree_data {
            tree.tree_data = tree_data;
        }
        tree.tree_id = tree_id.to_string();
        tree.modify_date = Some(now_iso());
        self.write(&tree)?;
        info!("updated {}", tree.tree_id);
        Ok(tree)
    }

    /// Write a document as is, creating the file when needed. Callers
    /// own any stamping.
    pub fn save(&self, tree: &FamilyTree) -> Result<(), StoreError> {
        self.write(tree)?;
        info!("saved {} ({} persons)", tree.tree_id, tree.tree_data.len());
        Ok(())
    }

    /// Summaries of every stored tree, sorted by id. Files that no
    /// longer parse are skipped with a warning rather than failing the
    /// whole listing.
    pub fn list(&self) -> Result<Vec<TreeSummary>, StoreError> {
        let mut summaries = Vec::new();
        for tree_id in self.tree_ids()? {
            let tree = match self.load(&tree_id) {
                Ok(tree) => tree,
                Err(StoreError::Malformed { path, .. }) => {
                    warn!("skipping malformed tree file {}", path.display());
                    continue;
                }
                Err(err) => return Err(err),
            };
            summaries.push(TreeSummary {
                tree_id: tree.tree_id.clone(),
                name: tree.tree_name.clone(),
                creator_email_id: tree.creator_email_id.clone(),
                create_date: tree.create_date.clone(),
                modify_date: tree.modify_date.clone(),
                member_count: tree.tree_data.len(),
            });
        }
        summaries.sort_by(|a, b| a.tree_id.cmp(&b.tree_id));
        Ok(summaries)
    }

    fn tree_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in WalkDir::new(&self.trees_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with("tree_") && name.ends_with(".json") {
                ids.push(name.trim_end_matches(".json").to_string());
            }
        }
        Ok(ids)
    }

    fn next_tree_id(&self) -> Result<String, StoreError> {
        let count = self.tree_ids()?.len();
        Ok(format!("tree_{}", TREE_ID_BASE + count))
    }

    fn write(&self, tree: &FamilyTree) -> Result<(), StoreError> {
        let payload = serde_json::to_string_pretty(tree)?;
        fs::write(self.tree_path(&tree.tree_id), payload)?;
        Ok(())
    }
}

/// Parse tree JSON. Accepts the full document form and, for files that
/// predate the metadata envelope, a bare person array.
pub fn parse_tree(contents: &str) -> Result<FamilyTree, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StoredTree {
        Document(FamilyTree),
        People(Vec<Person>),
    }

    Ok(match serde_json::from_str(contents)? {
        StoredTree::Document(tree) => tree,
        StoredTree::People(people) => FamilyTree {
            tree_data: people,
            ..FamilyTree::default()
        },
    })
}

fn is_valid_email(raw: &str) -> bool {
    if let Ok(re) = regex::Regex::new(EMAIL_PATTERN) {
        re.is_match(raw)
    } else {
        false
    }
}

fn validate_new_tree(new_tree: &NewTree) -> Vec<String> {
    let mut errors = Vec::new();
    if new_tree.tree_name.trim().is_empty() {
        errors.push("treeName is required and must be a non-empty string".to_string());
    }
    if new_tree.creator_email_id.trim().is_empty() {
        errors.push("creatorEmailId is required and must be a non-empty string".to_string());
    } else if !is_valid_email(new_tree.creator_email_id.trim()) {
        errors.push("creatorEmailId must be a valid email address".to_string());
    }
    validate_people(&new_tree.tree_data, &mut errors);
    errors
}

fn validate_patch(patch: &TreePatch) -> Vec<String> {
    let mut errors = Vec::new();
    if let Some(tree_name) = &patch.tree_name {
        if tree_name.trim().is_empty() {
            errors.push("treeName must be a non-empty string".to_string());
        }
    }
    if let Some(creator) = &patch.creator_email_id {
        if creator.trim().is_empty() {
            errors.push("creatorEmailId must be a non-empty string".to_string());
        } else if !is_valid_email(creator.trim()) {
            errors.push("creatorEmailId must be a valid email address".to_string());
        }
    }
    if let Some(tree_data) = &patch.tree_data {
        validate_people(tree_data, &mut errors);
    }
    errors
}

fn validate_people(people: &[Person], errors: &mut Vec<String>) {
    if people.is_empty() {
        errors.push("treeData must contain at least one person".to_string());
        return;
    }
    for (index, person) in people.iter().enumerate() {
        if person.person_id.trim().is_empty() {
            errors.push(format!("treeData[{index}] must have a valid personId"));
        }
        if person.first_name.trim().is_empty() {
            errors.push(format!("treeData[{index}] must have a valid firstName"));
        }
        if person.last_name.trim().is_empty() {
            errors.push(format!("treeData[{index}] must have a valid lastName"));
        }
    }
}
