use crate::declarations::TypeDeclaration;
use crate::error::{RepositoryError, Result};
use crate::repository::{DeclarationRepository, Lookup};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// On-disk form of an [`InMemoryRepository`].
#[derive(Serialize, Deserialize, Debug, Clone, Default, JsonSchema)]
pub struct DeclarationFile {
    #[serde(default)]
    pub types: Vec<TypeDeclaration>,
    /// Names that a later round will generate; lookups report them as not yet available.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<String>,
}

/// A repository backed by plain declaration values.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    types: Vec<TypeDeclaration>,
    index: HashMap<String, usize>,
    pending: HashSet<String>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(file: DeclarationFile) -> Result<Self> {
        let mut repo = Self::new();
        for decl in file.types {
            repo.insert(decl)?;
        }
        repo.pending.extend(file.pending);
        Ok(repo)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_file(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn insert(&mut self, decl: TypeDeclaration) -> Result<()> {
        if self.index.contains_key(&decl.name) {
            return Err(RepositoryError::DuplicateType(decl.name));
        }
        self.pending.remove(&decl.name);
        self.index.insert(decl.name.clone(), self.types.len());
        self.types.push(decl);
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert) for tests.
    pub fn with(mut self, decl: TypeDeclaration) -> Result<Self> {
        self.insert(decl)?;
        Ok(self)
    }

    pub fn mark_pending(&mut self, name: impl Into<String>) {
        self.pending.insert(name.into());
    }

    pub fn to_file(&self) -> DeclarationFile {
        let mut pending: Vec<String> = self.pending.iter().cloned().collect();
        pending.sort();
        DeclarationFile {
            types: self.types.clone(),
            pending,
        }
    }
}

impl DeclarationRepository for InMemoryRepository {
    fn type_declaration(&self, name: &str) -> Lookup<&TypeDeclaration> {
        if let Some(&idx) = self.index.get(name) {
            return Lookup::Found(&self.types[idx]);
        }
        if self.pending.contains(name) {
            Lookup::NotYetGenerated
        } else {
            Lookup::Missing
        }
    }

    fn type_names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }
}
