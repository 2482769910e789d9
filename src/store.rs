//! Directory of account records, one `<username>.txt` file per account
//!
//! There is no index: every lookup other than by username lists the directory and decodes each
//! record. Records are replaced through a temporary file and a rename so concurrent readers
//! always see either the old or the new record, never a partial one.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use rand::Rng;
use tokio::{fs, io::AsyncWriteExt};
use tokio_stream::{wrappers::ReadDirStream, StreamExt};
use tracing::{debug, warn};

use crate::{
    account::{record, Account, Profile, StoredAccount},
    errors::{LedgerErr, RecordErr},
    AccountNumber,
};

const RECORD_EXT: &str = ".txt";
const LOG_SUFFIX: &str = "_transactions";

/// Account records stored in one directory
#[derive(Debug, Clone)]
pub struct AccountStore {
    dir: PathBuf,
}

impl AccountStore {
    /// Store over existing directory `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{username}{RECORD_EXT}"))
    }

    fn tmp_path(&self, username: &str) -> PathBuf {
        let nonce: u64 = rand::thread_rng().gen();
        self.dir
            .join(format!("{username}{RECORD_EXT}.{nonce:016x}.tmp"))
    }

    /// Persist new account under `username` with freshly generated account number and zero
    /// balance. Fails with [`LedgerErr::AlreadyExists`] when a record for `username` is present.
    pub async fn create(
        &self,
        username: &str,
        profile: Profile,
        password: String,
    ) -> Result<AccountNumber, LedgerErr> {
        check_username(username)?;

        let account = Account::open(profile, generate_account_number(), password);
        let tmp = self.tmp_path(username);
        write_file(&tmp, record::encode(&account).as_bytes()).await?;

        // hard link fails when the target exists, so the record appears complete and only once
        let linked = fs::hard_link(&tmp, self.record_path(username)).await;
        fs::remove_file(&tmp).await?;
        match linked {
            Ok(()) => {
                debug!(username, account_number = %account.account_number, "record created");
                Ok(account.account_number)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(LedgerErr::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Load record of `username`. Returns `None` if there is no such record.
    pub async fn load_by_username(&self, username: &str) -> Result<Option<Account>, LedgerErr> {
        check_username(username)?;

        let corrupt = |source| LedgerErr::Corrupt {
            username: username.to_owned(),
            source,
        };
        let raw = match fs::read_to_string(self.record_path(username)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(corrupt(RecordErr::NotUtf8))
            }
            Err(e) => return Err(e.into()),
        };

        record::decode(&raw).map(Some).map_err(corrupt)
    }

    /// Overwrite record of `username` with `account`
    pub async fn save(&self, username: &str, account: &Account) -> Result<(), LedgerErr> {
        check_username(username)?;

        let tmp = self.tmp_path(username);
        write_file(&tmp, record::encode(account).as_bytes()).await?;
        fs::rename(&tmp, self.record_path(username)).await?;
        Ok(())
    }

    /// Decode every record in the directory, ordered by username. Records that fail to decode
    /// are skipped.
    pub async fn scan(&self) -> Result<Vec<StoredAccount>, LedgerErr> {
        let mut entries = ReadDirStream::new(fs::read_dir(&self.dir).await?);

        let mut usernames = Vec::new();
        while let Some(entry) = entries.next().await {
            let entry = entry?;
            // directories and sockets named `*.txt` are not records
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(username) = entry.file_name().to_str().and_then(username_of_record) {
                usernames.push(username.to_owned());
            }
        }
        usernames.sort();

        let mut accounts = Vec::with_capacity(usernames.len());
        for username in usernames {
            match self.load_by_username(&username).await {
                Ok(Some(account)) => accounts.push(StoredAccount { username, account }),
                // removed between listing and reading
                Ok(None) => (),
                Err(LedgerErr::Corrupt { username, source }) => {
                    warn!(%username, error = %source, "skipping corrupt account record");
                }
                Err(LedgerErr::InvalidUsername(_)) => (),
                Err(e) => return Err(e),
            }
        }

        Ok(accounts)
    }

    /// First record (by username order) with `account_number`
    pub async fn find_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Option<StoredAccount>, LedgerErr> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .find(|s| s.account.account_number == account_number))
    }

    /// First record (by username order) whose `name` equals `name`. Surname is not considered,
    /// so accounts sharing a first name are ambiguous.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<StoredAccount>, LedgerErr> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .find(|s| s.account.name == name))
    }
}

async fn write_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut f = fs::File::create(path).await?;
    f.write_all(content).await?;
    f.sync_all().await
}

/// Uniform random number in `100000..=999999`. Collisions with existing accounts are not checked.
pub fn generate_account_number() -> AccountNumber {
    rand::thread_rng().gen_range(100_000..=999_999u32).to_string()
}

/// Usernames become file stems, so they can not contain path components or collide with
/// transaction log names.
pub(crate) fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\', '\0'])
}

fn check_username(username: &str) -> Result<(), LedgerErr> {
    if is_valid_key(username) && !username.ends_with(LOG_SUFFIX) {
        Ok(())
    } else {
        Err(LedgerErr::InvalidUsername(username.to_owned()))
    }
}

fn username_of_record(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(RECORD_EXT)
        .filter(|stem| !stem.ends_with(LOG_SUFFIX))
}
