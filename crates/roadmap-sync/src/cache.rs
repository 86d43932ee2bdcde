//! Local cache
//!
//! String-keyed, string-valued persistence with a fixed key set. A missing
//! key is always reported as `None`; typed readers never substitute a
//! default for an absent or undecodable entry.

use crate::error::{CacheError, SyncError};
use crate::remote::{AuthGrant, SessionToken, SessionUser};
use parking_lot::Mutex;
use roadmap_core::{Step, SurveyAnswers};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Every key the sync layer persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    /// Survey answers (JSON)
    Answers,
    /// Step/todo tree (JSON)
    Steps,
    /// Saved amount (decimal)
    SavedAmount,
    /// Committed timeline (plain text)
    CommittedTimeline,
    /// Survey completed flag (`"true"` or absent)
    SurveyCompleted,
    /// Bearer token
    SessionToken,
    /// Session user (JSON)
    SessionUser,
}

impl CacheKey {
    /// All keys
    pub const ALL: [CacheKey; 7] = [
        CacheKey::Answers,
        CacheKey::Steps,
        CacheKey::SavedAmount,
        CacheKey::CommittedTimeline,
        CacheKey::SurveyCompleted,
        CacheKey::SessionToken,
        CacheKey::SessionUser,
    ];

    /// Storage name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Answers => "homeapp_survey",
            Self::Steps => "homeapp_steps",
            Self::SavedAmount => "homeapp_saved",
            Self::CommittedTimeline => "homeapp_timeline_commit",
            Self::SurveyCompleted => "homeapp_surveyed",
            Self::SessionToken => "auth_token",
            Self::SessionUser => "auth_user",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value persistence backend
pub trait LocalCache: Send + Sync {
    /// Store a value
    fn save(&self, key: CacheKey, value: &str) -> Result<(), CacheError>;

    /// Read a value; `None` when absent
    fn load(&self, key: CacheKey) -> Result<Option<String>, CacheError>;

    /// Delete a value
    fn remove(&self, key: CacheKey) -> Result<(), CacheError>;

    /// Delete every key
    fn clear_all(&self) -> Result<(), CacheError> {
        CacheKey::ALL.into_iter().try_for_each(|key| self.remove(key))
    }
}

/// In-process cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, String>>,
}

impl MemoryCache {
    /// Create empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl LocalCache for MemoryCache {
    fn save(&self, key: CacheKey, value: &str) -> Result<(), CacheError> {
        self.entries.lock().insert(key, value.to_string());
        Ok(())
    }

    fn load(&self, key: CacheKey) -> Result<Option<String>, CacheError> {
        Ok(self.entries.lock().get(&key).cloned())
    }

    fn remove(&self, key: CacheKey) -> Result<(), CacheError> {
        self.entries.lock().remove(&key);
        Ok(())
    }

    fn clear_all(&self) -> Result<(), CacheError> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// Cache persisted as a JSON object in a single file
///
/// Every write rewrites the file through a sibling temp file and a rename,
/// so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileCache {
    /// Open (or lazily create) the cache file
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = read_entries(&path)?;
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Open the cache file, replacing it with an empty one if it cannot be
    /// decoded
    ///
    /// Io errors are still returned.
    pub fn open_or_reset(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        match read_entries(&path) {
            Ok(entries) => Ok(Self {
                path,
                entries: Mutex::new(entries),
            }),
            Err(CacheError::Corrupt { message, .. }) => {
                tracing::warn!(path = %path.display(), error = %message, "cache file unreadable; starting empty");
                let cache = Self {
                    path,
                    entries: Mutex::new(BTreeMap::new()),
                };
                cache.flush(&BTreeMap::new())?;
                Ok(cache)
            }
            Err(e) => Err(e),
        }
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), CacheError> {
        let body = serde_json::to_string_pretty(entries).map_err(|e| CacheError::Corrupt {
            key: "<file>",
            message: e.to_string(),
        })?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, &e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(|e| CacheError::io(&tmp, &e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| CacheError::io(&self.path, &e))
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>, CacheError> {
    match std::fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
        Ok(raw) => serde_json::from_str(&raw).map_err(|e| CacheError::Corrupt {
            key: "<file>",
            message: e.to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(CacheError::io(path, &e)),
    }
}

impl LocalCache for FileCache {
    fn save(&self, key: CacheKey, value: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        entries.insert(key.as_str().to_string(), value.to_string());
        self.flush(&entries)
    }

    fn load(&self, key: CacheKey) -> Result<Option<String>, CacheError> {
        Ok(self.entries.lock().get(key.as_str()).cloned())
    }

    fn remove(&self, key: CacheKey) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        if entries.remove(key.as_str()).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn clear_all(&self) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        entries.clear();
        self.flush(&entries)
    }
}

/// Typed view over a [`LocalCache`]
#[derive(Clone)]
pub struct ProgressCache {
    inner: Arc<dyn LocalCache>,
}

impl fmt::Debug for ProgressCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressCache").finish_non_exhaustive()
    }
}

impl ProgressCache {
    /// Wrap a backend
    #[inline]
    #[must_use]
    pub fn new(inner: Arc<dyn LocalCache>) -> Self {
        Self { inner }
    }

    /// Stored answers, validated against the option sets
    pub fn load_answers(&self) -> Result<Option<SurveyAnswers>, SyncError> {
        let Some(raw) = self.inner.load(CacheKey::Answers)? else {
            return Ok(None);
        };
        let answers: SurveyAnswers = decode(CacheKey::Answers, &raw)?;
        answers
            .validate()
            .map_err(|e| SyncError::ValidationFailure(format!("cached answers: {e}")))?;
        Ok(Some(answers))
    }

    /// Persist answers
    pub fn save_answers(&self, answers: &SurveyAnswers) -> Result<(), SyncError> {
        self.save_json(CacheKey::Answers, answers)
    }

    /// Stored step tree
    pub fn load_steps(&self) -> Result<Option<Vec<Step>>, SyncError> {
        match self.inner.load(CacheKey::Steps)? {
            Some(raw) => decode(CacheKey::Steps, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Persist the step tree
    pub fn save_steps(&self, steps: &[Step]) -> Result<(), SyncError> {
        self.save_json(CacheKey::Steps, &steps)
    }

    /// Stored saved amount; negative or non-numeric values are rejected
    pub fn load_saved_amount(&self) -> Result<Option<f64>, SyncError> {
        let Some(raw) = self.inner.load(CacheKey::SavedAmount)? else {
            return Ok(None);
        };
        match raw.trim().parse::<f64>() {
            Ok(amount) if amount.is_finite() && amount >= 0.0 => Ok(Some(amount)),
            _ => Err(SyncError::ValidationFailure(format!(
                "cached saved amount is not a non-negative number: {raw:?}"
            ))),
        }
    }

    /// Persist the saved amount
    pub fn save_saved_amount(&self, amount: f64) -> Result<(), SyncError> {
        Ok(self.inner.save(CacheKey::SavedAmount, &amount.to_string())?)
    }

    /// Stored committed timeline
    pub fn load_committed_timeline(&self) -> Result<Option<String>, SyncError> {
        Ok(self.inner.load(CacheKey::CommittedTimeline)?)
    }

    /// Persist the committed timeline
    pub fn save_committed_timeline(&self, timeline: &str) -> Result<(), SyncError> {
        Ok(self.inner.save(CacheKey::CommittedTimeline, timeline)?)
    }

    /// Survey completed flag
    pub fn survey_completed(&self) -> Result<bool, SyncError> {
        Ok(self.inner.load(CacheKey::SurveyCompleted)?.as_deref() == Some("true"))
    }

    /// Set or clear the survey completed flag
    pub fn set_survey_completed(&self, completed: bool) -> Result<(), SyncError> {
        if completed {
            self.inner.save(CacheKey::SurveyCompleted, "true")?;
        } else {
            self.inner.remove(CacheKey::SurveyCompleted)?;
        }
        Ok(())
    }

    /// Stored session, present only when both token and user are stored
    pub fn load_session(&self) -> Result<Option<AuthGrant>, SyncError> {
        let token = self.inner.load(CacheKey::SessionToken)?;
        let user = self.inner.load(CacheKey::SessionUser)?;
        match (token, user) {
            (Some(token), Some(user)) => Ok(Some(AuthGrant {
                token: SessionToken::new(token),
                user: decode::<SessionUser>(CacheKey::SessionUser, &user)?,
            })),
            _ => Ok(None),
        }
    }

    /// Persist token and user
    pub fn save_session(&self, grant: &AuthGrant) -> Result<(), SyncError> {
        self.inner.save(CacheKey::SessionToken, grant.token.as_str())?;
        self.save_json(CacheKey::SessionUser, &grant.user)
    }

    /// Drop a single entry
    pub fn remove(&self, key: CacheKey) -> Result<(), SyncError> {
        Ok(self.inner.remove(key)?)
    }

    /// Drop everything
    pub fn clear_all(&self) -> Result<(), SyncError> {
        Ok(self.inner.clear_all()?)
    }

    fn save_json<T: serde::Serialize + ?Sized>(&self, key: CacheKey, value: &T) -> Result<(), SyncError> {
        let raw = serde_json::to_string(value).map_err(|e| CacheError::Corrupt {
            key: key.as_str(),
            message: e.to_string(),
        })?;
        Ok(self.inner.save(key, &raw)?)
    }
}

fn decode<T: serde::de::DeserializeOwned>(key: CacheKey, raw: &str) -> Result<T, SyncError> {
    serde_json::from_str(raw).map_err(|e| {
        SyncError::Cache(CacheError::Corrupt {
            key: key.as_str(),
            message: e.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadmap_core::{default_steps, AnswerKey};

    fn memory() -> (Arc<MemoryCache>, ProgressCache) {
        let backend = Arc::new(MemoryCache::new());
        let cache = ProgressCache::new(backend.clone());
        (backend, cache)
    }

    #[test]
    fn missing_keys_are_absent() {
        let (_, cache) = memory();
        assert!(cache.load_answers().unwrap().is_none());
        assert!(cache.load_steps().unwrap().is_none());
        assert!(cache.load_saved_amount().unwrap().is_none());
        assert!(cache.load_committed_timeline().unwrap().is_none());
        assert!(cache.load_session().unwrap().is_none());
        assert!(!cache.survey_completed().unwrap());
    }

    #[test]
    fn typed_values_round_trip() {
        let (_, cache) = memory();
        let answers = SurveyAnswers::new().with(AnswerKey::Housing, "Renting").unwrap();
        cache.save_answers(&answers).unwrap();
        cache.save_saved_amount(2500.0).unwrap();
        cache.save_committed_timeline("6-12 months").unwrap();

        assert_eq!(cache.load_answers().unwrap(), Some(answers));
        assert_eq!(cache.load_saved_amount().unwrap(), Some(2500.0));
        assert_eq!(cache.load_committed_timeline().unwrap().as_deref(), Some("6-12 months"));
    }

    #[test]
    fn saved_amount_is_stored_as_plain_decimal() {
        let (backend, cache) = memory();
        cache.save_saved_amount(2500.0).unwrap();
        assert_eq!(backend.load(CacheKey::SavedAmount).unwrap().as_deref(), Some("2500"));

        backend.save(CacheKey::SavedAmount, "-4").unwrap();
        assert!(matches!(cache.load_saved_amount(), Err(SyncError::ValidationFailure(_))));
    }

    #[test]
    fn tampered_answers_fail_validation() {
        let (backend, cache) = memory();
        backend
            .save(
                CacheKey::Answers,
                r#"{"income":"a lot","savings":"","location":"","timeline":"","housing":""}"#,
            )
            .unwrap();
        assert!(matches!(cache.load_answers(), Err(SyncError::ValidationFailure(_))));
    }

    #[test]
    fn clear_all_leaves_nothing() {
        let (backend, cache) = memory();
        cache.save_steps(&default_steps()).unwrap();
        cache.set_survey_completed(true).unwrap();
        cache.save_committed_timeline("3-6 months").unwrap();
        cache.clear_all().unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn survey_flag_is_true_or_absent() {
        let (backend, cache) = memory();
        cache.set_survey_completed(true).unwrap();
        assert_eq!(backend.load(CacheKey::SurveyCompleted).unwrap().as_deref(), Some("true"));
        cache.set_survey_completed(false).unwrap();
        assert!(backend.load(CacheKey::SurveyCompleted).unwrap().is_none());
    }

    #[test]
    fn file_cache_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let cache = FileCache::open(&path).unwrap();
        cache.save(CacheKey::CommittedTimeline, "3-6 months").unwrap();
        cache.save(CacheKey::SavedAmount, "100").unwrap();
        drop(cache);

        let reopened = FileCache::open(&path).unwrap();
        assert_eq!(
            reopened.load(CacheKey::CommittedTimeline).unwrap().as_deref(),
            Some("3-6 months")
        );

        reopened.clear_all().unwrap();
        let again = FileCache::open(&path).unwrap();
        assert!(again.load(CacheKey::SavedAmount).unwrap().is_none());
    }

    #[test]
    fn file_cache_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(FileCache::open(&path), Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn reset_replaces_garbage_with_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();

        let cache = FileCache::open_or_reset(&path).unwrap();
        assert_eq!(cache.load(CacheKey::SessionToken).unwrap(), None);
        cache.clear_all().unwrap();

        let reopened = FileCache::open(&path).unwrap();
        assert_eq!(reopened.load(CacheKey::Answers).unwrap(), None);
    }

    #[test]
    fn reset_keeps_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        FileCache::open(&path)
            .unwrap()
            .save(CacheKey::CommittedTimeline, "6-12 months")
            .unwrap();

        let cache = FileCache::open_or_reset(&path).unwrap();
        assert_eq!(
            cache.load(CacheKey::CommittedTimeline).unwrap().as_deref(),
            Some("6-12 months")
        );
    }
}
