use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::types::{Language, Scene, SceneIndex, Tutor, TutorId};

const DEMO_SCRIPT: &str = include_str!("../../assets/demo_script.json");

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to read dialogue script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dialogue script: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("tutor '{tutor}' has an invalid scene index 0 (scenes start at 1)")]
    ZeroScene { tutor: TutorId },
}

/// Read-only dialogue script: every tutor with its scene tree, fully in memory.
#[derive(Debug, Clone, Default)]
pub struct ScriptRepository {
    tutors: BTreeMap<TutorId, Tutor>,
}

impl ScriptRepository {
    pub fn new(tutors: BTreeMap<TutorId, Tutor>) -> Result<Self, ScriptError> {
        for (id, tutor) in &tutors {
            if tutor.scenes.contains_key(&0) {
                return Err(ScriptError::ZeroScene { tutor: id.clone() });
            }
        }
        Ok(Self { tutors })
    }

    /// Parses a JSON object keyed by tutor id.
    pub fn from_json_str(json: &str) -> Result<Self, ScriptError> {
        let tutors: BTreeMap<TutorId, Tutor> = serde_json::from_str(json)?;
        Self::new(tutors)
    }

    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let content = fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let repo = Self::from_json_str(&content)?;
        info!("Loaded dialogue script from {} ({} tutors)", path.display(), repo.len());
        Ok(repo)
    }

    /// Script bundled with the binary.
    pub fn demo() -> Result<Self, ScriptError> {
        Self::from_json_str(DEMO_SCRIPT)
    }

    pub fn tutor(&self, id: &str) -> Option<&Tutor> {
        self.tutors.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tutors.contains_key(id)
    }

    pub fn scene(&self, id: &str, index: SceneIndex) -> Option<&Scene> {
        self.tutor(id).and_then(|t| t.scene(index))
    }

    pub fn tutors(&self) -> impl Iterator<Item = (&TutorId, &Tutor)> {
        self.tutors.iter()
    }

    /// Tutors teaching `language`, ordered by id.
    pub fn tutors_for(&self, language: Language) -> Vec<(&TutorId, &Tutor)> {
        self.tutors
            .iter()
            .filter(|(_, tutor)| tutor.language == language)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tutors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tutors.is_empty()
    }
}
