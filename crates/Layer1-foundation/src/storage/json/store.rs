//! JSON 파일 저장소
//!
//! 설정 디렉토리 하나에 JSON 문서들을 이름으로 저장한다.
//! 저장은 임시 파일에 쓴 뒤 rename 하므로 읽는 쪽이 반쯤 쓰인 파일을 보지 않는다.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// JSON 설정 저장소
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 글로벌 설정 (~/.config/tsp/)
    pub fn global() -> Result<Self> {
        dirs::config_dir()
            .map(|dir| Self::new(dir.join("tsp")))
            .ok_or_else(|| Error::Config("Cannot find config directory".to_string()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// 문서 로드, 파일이 없으면 `None`
    pub fn load_optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.path_of(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid JSON in {}: {}", path.display(), e)))
    }

    /// 문서 로드, 파일이 없으면 에러
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        self.load_optional(name)?.ok_or_else(|| {
            Error::Config(format!("{} does not exist", self.path_of(name).display()))
        })
    }

    /// 문서 저장 (임시 파일 + rename)
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Config(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        let mut content = serde_json::to_string_pretty(value)?;
        content.push('\n');

        let path = self.path_of(name);
        let tmp = self.path_of(&format!(".{}.tmp", name));
        std::fs::write(&tmp, content)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| Error::Config(format!("Failed to write {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("tsp"));

        let mut data = BTreeMap::new();
        data.insert("pollIntervalMs".to_string(), 250);
        store.save("config.json", &data).unwrap();

        let loaded: BTreeMap<String, i32> = store.load("config.json").unwrap();
        assert_eq!(loaded, data);
        // no temp file left behind
        assert!(!store.path_of(".config.json.tmp").exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let loaded: Option<BTreeMap<String, i32>> = store.load_optional("nope.json").unwrap();
        assert!(loaded.is_none());
        assert!(matches!(
            store.load::<BTreeMap<String, i32>>("nope.json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        std::fs::write(store.path_of("bad.json"), "{ not json").unwrap();

        let err = store.load::<BTreeMap<String, i32>>("bad.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
