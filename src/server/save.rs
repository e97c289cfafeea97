//! JSON save files under a sandboxed root directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

use log::{info, warn};
use serde::Deserialize;

use super::collab::{SaveError, SaveGame, SavePreview, SaveStore};

const SAVE_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct JsonSaveStore {
    root: PathBuf,
}

/// Reads only the preview out of a save file.
#[derive(Deserialize)]
struct PreviewHeader {
    preview: SavePreview,
}

/// Paths that stay inside the root: relative, no `..`, no prefixes.
fn is_contained(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl JsonSaveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonSaveStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn save_path(&self, name: &str) -> Result<PathBuf, SaveError> {
        let relative = Path::new(name);
        if name.is_empty() || !is_contained(relative) {
            return Err(SaveError::InvalidName(name.to_string()));
        }
        let mut path = self.root.join(relative);
        if path.extension().map_or(true, |e| e != SAVE_EXTENSION) {
            path.set_extension(SAVE_EXTENSION);
        }
        Ok(path)
    }

    /// The directory to list for `directory`. Anything that escapes the
    /// root, lexically or through a symlink, is replaced by the root.
    fn preview_dir(&self, directory: &str) -> PathBuf {
        if !is_contained(Path::new(directory)) {
            warn!("preview directory '{}' is outside the save root", directory);
            return self.root.clone();
        }
        let dir = self.root.join(directory);
        let (Ok(real_root), Ok(real_dir)) = (self.root.canonicalize(), dir.canonicalize()) else {
            return dir;
        };
        if real_dir.starts_with(&real_root) {
            dir
        } else {
            warn!("preview directory '{}' resolves outside the save root", directory);
            self.root.clone()
        }
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SaveError + '_ {
        move |source| SaveError::Io { path: path.to_path_buf(), source }
    }
}

impl SaveStore for JsonSaveStore {
    fn save_game(&mut self, name: &str, save: &SaveGame) -> Result<PathBuf, SaveError> {
        let path = self.save_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Self::io_error(parent))?;
        }
        let text = serde_json::to_string(save)?;
        fs::write(&path, text).map_err(Self::io_error(&path))?;
        info!("saved turn {} to {}", save.preview.turn, path.display());
        Ok(path)
    }

    fn load_game(&self, name: &str) -> Result<SaveGame, SaveError> {
        let path = self.save_path(name)?;
        let text = fs::read_to_string(&path).map_err(Self::io_error(&path))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Directories escaping the root are replaced by the root itself.
    /// Saves that cannot be read or parsed are skipped.
    fn list_previews(&self, directory: &str) -> Result<Vec<SavePreview>, SaveError> {
        let dir = self.preview_dir(directory);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut previews = Vec::new();
        for entry in fs::read_dir(&dir).map_err(Self::io_error(&dir))? {
            let path = entry.map_err(Self::io_error(&dir))?.path();
            if path.extension().map_or(true, |e| e != SAVE_EXTENSION) {
                continue;
            }
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!("skipping unreadable save {}: {}", path.display(), e);
                    continue;
                }
            };
            match serde_json::from_str::<PreviewHeader>(&text) {
                Ok(header) => previews.push(header.preview),
                Err(e) => warn!("skipping unreadable save {}: {}", path.display(), e),
            }
        }
        previews.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(previews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::content::GameRules;
    use crate::server::state::GameState;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("duration")
            .as_nanos();
        std::env::temp_dir().join(format!("starlane-save-tests-{prefix}-{unique}"))
    }

    fn save(name: &str, turn: i32) -> SaveGame {
        let mut state = GameState::new(GameRules::default(), ServerConfig::default());
        state.current_turn = turn;
        SaveGame {
            preview: SavePreview { name: name.to_string(), turn, players: vec!["alice".to_string()] },
            players: Vec::new(),
            state,
        }
    }

    #[test]
    fn save_then_load() {
        let root = temp_dir("roundtrip");
        let mut store = JsonSaveStore::new(&root);
        let path = store.save_game("first", &save("first", 4)).unwrap();
        assert_eq!(path, root.join("first.json"));
        let loaded = store.load_game("first").unwrap();
        assert_eq!(loaded.state.current_turn, 4);
        assert_eq!(loaded.preview.players, vec!["alice".to_string()]);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn names_cannot_escape_the_root() {
        let root = temp_dir("escape");
        let mut store = JsonSaveStore::new(&root);
        assert!(matches!(store.save_game("../evil", &save("x", 1)), Err(SaveError::InvalidName(_))));
        assert!(matches!(store.save_game("/tmp/evil", &save("x", 1)), Err(SaveError::InvalidName(_))));
        assert!(matches!(store.load_game(""), Err(SaveError::InvalidName(_))));
    }

    #[test]
    fn previews_are_sorted_and_sandboxed() {
        let root = temp_dir("previews");
        let mut store = JsonSaveStore::new(&root);
        store.save_game("b", &save("b", 2)).unwrap();
        store.save_game("a", &save("a", 1)).unwrap();
        fs::write(root.join("notes.txt"), "ignored").unwrap();

        let names: Vec<String> = store.list_previews("").unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        let escaped = store.list_previews("../..").unwrap();
        assert_eq!(escaped.len(), 2);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn missing_directory_has_no_previews() {
        let store = JsonSaveStore::new(temp_dir("missing"));
        assert!(store.list_previews("nowhere").unwrap().is_empty());
    }

    #[test]
    fn unreadable_saves_are_skipped() {
        let root = temp_dir("unreadable");
        let mut store = JsonSaveStore::new(&root);
        store.save_game("good", &save("good", 3)).unwrap();
        fs::create_dir_all(root.join("folder.json")).unwrap();
        fs::write(root.join("broken.json"), "{ not json").unwrap();

        let names: Vec<String> = store.list_previews("").unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["good".to_string()]);
        let _ = fs::remove_dir_all(root);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_out_of_the_root_fall_back_to_it() {
        let root = temp_dir("symlink-root");
        let outside = temp_dir("symlink-outside");
        let mut inside_store = JsonSaveStore::new(&root);
        let mut outside_store = JsonSaveStore::new(&outside);
        inside_store.save_game("home", &save("home", 1)).unwrap();
        outside_store.save_game("stray", &save("stray", 1)).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let names: Vec<String> = inside_store
            .list_previews("link")
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["home".to_string()]);
        let _ = fs::remove_dir_all(root);
        let _ = fs::remove_dir_all(outside);
    }
}
