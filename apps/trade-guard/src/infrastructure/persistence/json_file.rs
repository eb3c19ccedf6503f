//! JSON file position store.
//!
//! Layout, one directory per exchange account:
//!
//! ```text
//! {data_dir}/{exchange}/positions.json   active snapshot (atomic replace)
//! {data_dir}/{exchange}/closed.jsonl     archived positions, append-only
//! {data_dir}/{exchange}/trades.jsonl     trade journal, append-only
//! ```
//!
//! The snapshot is written to `positions.json.tmp` and renamed into place,
//! so a crash mid-write leaves the previous snapshot intact.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::application::ports::{PersistenceError, PositionStore};
use crate::domain::position::{Position, TradeRecord};
use crate::domain::shared::{ExchangeId, Timestamp};

const POSITIONS_FILE: &str = "positions.json";
const CLOSED_FILE: &str = "closed.jsonl";
const TRADES_FILE: &str = "trades.jsonl";

#[derive(Debug, Serialize, Deserialize)]
struct PositionsFile {
    exchange: ExchangeId,
    saved_at: Timestamp,
    positions: Vec<Position>,
}

/// File-backed implementation of `PositionStore`.
#[derive(Debug)]
pub struct JsonFilePositionStore {
    data_dir: PathBuf,
    // Serializes writers inside this process.
    write_lock: Mutex<()>,
}

impl JsonFilePositionStore {
    /// Create a store rooted at `data_dir`. Directories are created lazily.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Root directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn exchange_dir(&self, exchange: &ExchangeId) -> PathBuf {
        self.data_dir.join(exchange.as_str())
    }

    async fn append_line<T: Serialize + Sync>(
        &self,
        exchange: &ExchangeId,
        file: &str,
        value: &T,
    ) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');

        let dir = self.exchange_dir(exchange);
        let path = dir.join(file);
        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&dir).await?;
        drop_torn_tail(&path).await?;
        let mut handle = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        handle.write_all(&line).await?;
        handle.flush().await?;
        Ok(())
    }
}

/// Cut a partial final line left by a crash mid-append, so the next record
/// starts on a line of its own.
async fn drop_torn_tail(path: &Path) -> Result<(), PersistenceError> {
    let mut file = match fs::OpenOptions::new().read(true).write(true).open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let len = file.metadata().await?.len();
    if len == 0 {
        return Ok(());
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0_u8; 1];
    file.read_exact(&mut last).await?;
    if last[0] == b'\n' {
        return Ok(());
    }

    file.seek(SeekFrom::Start(0)).await?;
    let mut bytes = Vec::with_capacity(len as usize);
    file.read_to_end(&mut bytes).await?;
    let keep = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1) as u64;
    file.set_len(keep).await?;
    tracing::warn!(
        path = %path.display(),
        dropped_bytes = len - keep,
        "Dropped torn trailing line before append"
    );
    Ok(())
}

#[async_trait]
impl PositionStore for JsonFilePositionStore {
    async fn load_positions(&self, exchange: &ExchangeId) -> Result<Vec<Position>, PersistenceError> {
        let path = self.exchange_dir(exchange).join(POSITIONS_FILE);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let file: PositionsFile = serde_json::from_slice(&bytes)?;
        if &file.exchange != exchange {
            return Err(PersistenceError::Corrupt {
                exchange: exchange.clone(),
                message: format!("{} belongs to {}", path.display(), file.exchange),
            });
        }
        if let Some(stray) = file.positions.iter().find(|p| p.exchange() != exchange) {
            return Err(PersistenceError::Corrupt {
                exchange: exchange.clone(),
                message: format!("position {} belongs to {}", stray.id(), stray.exchange()),
            });
        }
        tracing::debug!(
            exchange = %exchange,
            count = file.positions.len(),
            saved_at = %file.saved_at,
            "Loaded persisted positions"
        );
        Ok(file.positions)
    }

    async fn save_positions(
        &self,
        exchange: &ExchangeId,
        positions: &[Position],
    ) -> Result<(), PersistenceError> {
        let file = PositionsFile {
            exchange: exchange.clone(),
            saved_at: Timestamp::now(),
            positions: positions.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;

        let dir = self.exchange_dir(exchange);
        let path = dir.join(POSITIONS_FILE);
        let tmp = dir.join(format!("{POSITIONS_FILE}.tmp"));

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&dir).await?;
        fs::write(&tmp, &bytes).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn archive_position(&self, position: &Position) -> Result<(), PersistenceError> {
        self.append_line(position.exchange(), CLOSED_FILE, position)
            .await
    }

    async fn append_trade(&self, record: &TradeRecord) -> Result<(), PersistenceError> {
        self.append_line(&record.exchange, TRADES_FILE, record).await
    }

    async fn load_trades(&self, exchange: &ExchangeId) -> Result<Vec<TradeRecord>, PersistenceError> {
        let path = self.exchange_dir(exchange).join(TRADES_FILE);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        for (index, line) in lines.iter().enumerate() {
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                // A torn final line from a crash mid-append is dropped.
                Err(e) if index + 1 == lines.len() => {
                    tracing::warn!(
                        exchange = %exchange,
                        error = %e,
                        "Ignoring truncated last journal line"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(records)
    }
}
