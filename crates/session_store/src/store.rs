use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use agent_provider::Message;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::SessionStoreError;
use crate::paths::{is_session_file_for, is_valid_session_id, session_file_name, session_root};
use crate::schema::{
    SessionHeader, SessionRecord, SessionRecordRef, TitleRecord, SESSION_FORMAT_VERSION,
};
use crate::session::{normalize_title, Session, SessionSummary};

/// Append-only JSONL persistence, one file per session under `root`.
///
/// Resolved session paths are remembered so appends skip the directory scan.
/// Clones share that cache.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
    paths: Arc<Mutex<HashMap<String, PathBuf>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            paths: Arc::default(),
        }
    }

    /// Store rooted at the platform data directory.
    pub fn for_data_dir() -> Result<Self, SessionStoreError> {
        let base = dirs::data_dir().ok_or(SessionStoreError::NoDataDir)?;
        Ok(Self::new(session_root(&base)))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a session and writes its header line.
    pub fn create(&self, title: Option<&str>) -> Result<Session, SessionStoreError> {
        fs::create_dir_all(&self.root).map_err(|source| {
            SessionStoreError::io("creating session directory", &self.root, source)
        })?;

        let session = Session::new(title);
        let created_at = format_rfc3339(session.created_at)?;
        let header = SessionHeader::v1(&session.id, &session.title, &created_at);
        let path = self.root.join(session_file_name(&created_at, &session.id));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| SessionStoreError::io("creating session file", &path, source))?;
        write_record(&mut file, &path, &SessionRecordRef::Session(&header))?;

        tracing::debug!(session_id = %session.id, path = %path.display(), "session created");
        self.cached_paths().insert(session.id.clone(), path);
        Ok(session)
    }

    /// Appends one message line to an existing session file.
    pub fn append(&self, session_id: &str, message: &Message) -> Result<(), SessionStoreError> {
        let path = self.require_session_path(session_id)?;
        let mut file = open_for_append(&path)?;
        write_record(&mut file, &path, &SessionRecordRef::Message(message))
    }

    /// Persists `message` and then pushes it onto the in-memory `session`.
    pub fn record(&self, session: &mut Session, message: Message) -> Result<(), SessionStoreError> {
        self.append(&session.id, &message)?;
        session.push(message);
        Ok(())
    }

    /// Records a new title for `session`.
    pub fn rename(&self, session: &mut Session, title: &str) -> Result<(), SessionStoreError> {
        let path = self.require_session_path(&session.id)?;
        let now = OffsetDateTime::now_utc();
        let record = TitleRecord {
            title: normalize_title(Some(title)),
            ts: format_rfc3339(now)?,
        };

        let mut file = open_for_append(&path)?;
        write_record(&mut file, &path, &SessionRecordRef::Title(&record))?;

        session.title = record.title;
        session.touch(now);
        Ok(())
    }

    /// Replays a session file. Returns `None` when no file exists for `session_id`.
    pub fn load(&self, session_id: &str) -> Result<Option<Session>, SessionStoreError> {
        match self.find_session_path(session_id)? {
            Some(path) => replay_file(&path).map(Some),
            None => Ok(None),
        }
    }

    /// Summaries of every readable session, most recently updated first.
    ///
    /// Files that fail to replay are skipped with a warning.
    pub fn list(&self) -> Result<Vec<SessionSummary>, SessionStoreError> {
        let mut summaries = Vec::new();
        for path in self.session_files()? {
            match replay_file(&path) {
                Ok(session) => summaries.push(session.summary()),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable session file");
                }
            }
        }

        summaries.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
        Ok(summaries)
    }

    fn session_files(&self) -> Result<Vec<PathBuf>, SessionStoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|source| {
            SessionStoreError::io("listing session directory", &self.root, source)
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| {
                SessionStoreError::io("listing session directory", &self.root, source)
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    fn find_session_path(&self, session_id: &str) -> Result<Option<PathBuf>, SessionStoreError> {
        if !is_valid_session_id(session_id) {
            return Err(SessionStoreError::InvalidSessionId {
                id: session_id.to_string(),
            });
        }

        let cached = self.cached_paths().get(session_id).cloned();
        match cached {
            Some(path) if path.is_file() => return Ok(Some(path)),
            Some(_) => {
                self.cached_paths().remove(session_id);
            }
            None => {}
        }

        let found = self.session_files()?.into_iter().find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| is_session_file_for(name, session_id))
        });
        if let Some(path) = &found {
            self.cached_paths().insert(session_id.to_string(), path.clone());
        }
        Ok(found)
    }

    fn cached_paths(&self) -> MutexGuard<'_, HashMap<String, PathBuf>> {
        match self.paths.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn require_session_path(&self, session_id: &str) -> Result<PathBuf, SessionStoreError> {
        self.find_session_path(session_id)?
            .ok_or_else(|| SessionStoreError::UnknownSession {
                root: self.root.clone(),
                id: session_id.to_string(),
            })
    }
}

fn open_for_append(path: &Path) -> Result<File, SessionStoreError> {
    OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|source| SessionStoreError::io("opening session file for append", path, source))
}

fn write_record(
    file: &mut File,
    path: &Path,
    record: &SessionRecordRef<'_>,
) -> Result<(), SessionStoreError> {
    let mut line = serde_json::to_string(record)
        .map_err(|source| SessionStoreError::json_serialize(path, source))?;
    line.push('\n');

    file.write_all(line.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|source| SessionStoreError::io("appending session line", path, source))
}

pub(crate) fn replay_file(path: &Path) -> Result<Session, SessionStoreError> {
    let read_file = File::open(path)
        .map_err(|source| SessionStoreError::io("opening session file", path, source))?;
    let reader = BufReader::new(read_file);

    let mut session: Option<Session> = None;
    let mut seen_ids = HashSet::new();

    for (line_index, line_result) in reader.lines().enumerate() {
        let line_number = line_index + 1;
        let line =
            line_result.map_err(|source| SessionStoreError::io_line(path, line_number, source))?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = parse_json_line(path, line_number, &line)?;

        let Some(current) = session.as_mut() else {
            let SessionRecord::Session(header) = parsed else {
                return Err(SessionStoreError::InvalidHeaderRecord {
                    path: path.to_path_buf(),
                    line: line_number,
                });
            };
            session = Some(session_from_header(path, line_number, header)?);
            continue;
        };

        match parsed {
            SessionRecord::Session(_) => {
                return Err(SessionStoreError::RepeatedHeader {
                    path: path.to_path_buf(),
                    line: line_number,
                });
            }
            SessionRecord::Message(message) => {
                if !seen_ids.insert(message.id.clone()) {
                    return Err(SessionStoreError::DuplicateMessageId {
                        path: path.to_path_buf(),
                        line: line_number,
                        id: message.id,
                    });
                }
                current.push(message);
            }
            SessionRecord::Title(record) => {
                let ts = parse_rfc3339(path, line_number, "ts", &record.ts)?;
                current.title = record.title;
                current.touch(ts);
            }
        }
    }

    session.ok_or_else(|| SessionStoreError::MissingHeader {
        path: path.to_path_buf(),
    })
}

fn session_from_header(
    path: &Path,
    line_number: usize,
    header: SessionHeader,
) -> Result<Session, SessionStoreError> {
    if header.version != SESSION_FORMAT_VERSION {
        return Err(SessionStoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            line: line_number,
            found: header.version,
        });
    }

    let created_at = parse_rfc3339(path, line_number, "created_at", &header.created_at)?;
    Ok(Session::with_identity(
        header.session_id,
        header.title,
        created_at,
    ))
}

pub(crate) fn parse_json_line(
    path: &Path,
    line_number: usize,
    line: &str,
) -> Result<SessionRecord, SessionStoreError> {
    serde_json::from_str::<SessionRecord>(line)
        .map_err(|source| SessionStoreError::json_line(path, line_number, source))
}

pub(crate) fn parse_rfc3339(
    path: &Path,
    line_number: usize,
    field: &'static str,
    value: &str,
) -> Result<OffsetDateTime, SessionStoreError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|_| SessionStoreError::InvalidTimestamp {
        path: path.to_path_buf(),
        line: line_number,
        field,
        value: value.to_string(),
    })
}

fn format_rfc3339(at: OffsetDateTime) -> Result<String, SessionStoreError> {
    at.format(&Rfc3339).map_err(SessionStoreError::ClockFormat)
}
