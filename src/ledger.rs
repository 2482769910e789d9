//! Ledger operations composed from [`AccountStore`] and [`TransactionLog`]
//!
//! Operations changing a balance hold the account lock (see [`AccountLocks`]) from reading the
//! record until both the record and the log line are written. The record is re-read after the
//! lock is taken, the lookup scan before it only resolves account number to username.
//!
//! The locked part runs on its own task. Dropping the caller's future (request timeout, client
//! gone) does not stop it half way between two writes.

use std::{future::Future, path::PathBuf, sync::Arc};

use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::{
    account::{password, Account, Profile, StoredAccount},
    amount::Amount,
    errors::LedgerErr,
    locks::AccountLocks,
    store::AccountStore,
    transactions::{TransactionKind, TransactionLog},
    AccountNumber,
};

/// What dashboard shows for one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    /// Current balance
    pub balance: Decimal,
    /// Always empty, history is served by [`Ledger::transactions`]
    pub transactions: Vec<String>,
}

/// Accounts, their transaction logs and the locks guarding them. Clones share the locks.
#[derive(Debug, Clone)]
pub struct Ledger {
    accounts: AccountStore,
    log: TransactionLog,
    locks: Arc<AccountLocks>,
}

impl Ledger {
    /// Ledger keeping records and logs in existing directory `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let dir = data_dir.into();
        Self {
            accounts: AccountStore::new(dir.clone()),
            log: TransactionLog::new(dir),
            locks: Arc::default(),
        }
    }

    /// Transaction logs
    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    /// Create account for `username` and return its new account number
    pub async fn register(
        &self,
        username: &str,
        profile: Profile,
        password: &str,
    ) -> Result<AccountNumber, LedgerErr> {
        let hashed = password::hash(password)?;
        let account_number = self.accounts.create(username, profile, hashed).await?;

        info!(username, %account_number, "account registered");
        Ok(account_number)
    }

    /// Check credentials and return account number of `username`
    pub async fn login(&self, username: &str, password: &str) -> Result<AccountNumber, LedgerErr> {
        let account = match self.accounts.load_by_username(username).await {
            Ok(Some(account)) => account,
            Ok(None) | Err(LedgerErr::InvalidUsername(_)) => {
                return Err(LedgerErr::InvalidCredentials)
            }
            Err(e) => return Err(e),
        };

        if !password::verify(&account.password, password) {
            debug!(username, "password mismatch");
            return Err(LedgerErr::InvalidCredentials);
        }

        Ok(account.account_number)
    }

    /// Balance of `account_number`. Transaction list is intentionally left empty.
    pub async fn dashboard(&self, account_number: &str) -> Result<Dashboard, LedgerErr> {
        let found = self.find(account_number).await?;

        Ok(Dashboard {
            balance: found.account.balance(),
            transactions: Vec::new(),
        })
    }

    /// Add `amount` to `account_number` and return new balance
    pub async fn deposit(
        &self,
        account_number: &str,
        amount: &Amount,
    ) -> Result<Decimal, LedgerErr> {
        let username = self.find(account_number).await?.username;

        let ledger = self.clone();
        let (account_number, amount) = (account_number.to_owned(), amount.clone());
        run_detached(async move {
            let _guard = ledger.locks.lock(&account_number).await;

            let mut account = ledger.reload(&username, LedgerErr::NotFound).await?;
            account.deposit(&amount)?;
            ledger.accounts.save(&username, &account).await?;
            ledger
                .log
                .append(&account_number, TransactionKind::Deposit, &amount)
                .await?;

            info!(%account_number, %amount, "deposit");
            Ok(account.balance())
        })
        .await
    }

    /// Take `amount` from `account_number` and return new balance. Fails when balance is lower
    /// than `amount`, leaving the account untouched.
    pub async fn withdraw(
        &self,
        account_number: &str,
        amount: &Amount,
    ) -> Result<Decimal, LedgerErr> {
        let username = self.find(account_number).await?.username;

        let ledger = self.clone();
        let (account_number, amount) = (account_number.to_owned(), amount.clone());
        run_detached(async move {
            let _guard = ledger.locks.lock(&account_number).await;

            let mut account = ledger.reload(&username, LedgerErr::NotFound).await?;
            account.try_withdraw(&amount)?;
            ledger.accounts.save(&username, &account).await?;
            ledger
                .log
                .append(&account_number, TransactionKind::Withdrawal, &amount)
                .await?;

            info!(%account_number, %amount, "withdrawal");
            Ok(account.balance())
        })
        .await
    }

    /// Move `amount` from `source_account_number` to the first account (by username) named
    /// `recipient_name`. Both accounts stay locked until both records and both log lines are
    /// written.
    pub async fn transfer(
        &self,
        source_account_number: &str,
        recipient_name: &str,
        amount: &Amount,
    ) -> Result<(), LedgerErr> {
        let mut source = None;
        let mut recipient = None;
        for stored in self.accounts.scan().await? {
            if stored.account.account_number == source_account_number {
                source.get_or_insert(stored);
            } else if stored.account.name == recipient_name {
                recipient.get_or_insert(stored);
            }
        }

        let source: StoredAccount = source.ok_or(LedgerErr::SourceNotFound)?;
        let recipient: StoredAccount = recipient.ok_or(LedgerErr::RecipientNotFound)?;

        let ledger = self.clone();
        let amount = amount.clone();
        run_detached(async move {
            ledger.move_funds(source, recipient, &amount).await
        })
        .await
    }

    /// Raw log lines of `account_number` in append order
    pub async fn transactions(&self, account_number: &str) -> Result<Vec<String>, LedgerErr> {
        self.log.read_all(account_number).await
    }

    async fn move_funds(
        &self,
        source: StoredAccount,
        recipient: StoredAccount,
        amount: &Amount,
    ) -> Result<(), LedgerErr> {
        let (source, from_number) = (source.username, source.account.account_number);
        let (recipient, to_number) = (recipient.username, recipient.account.account_number);
        let _guards = self
            .locks
            .lock_many(&[from_number.as_str(), to_number.as_str()])
            .await;

        let before = self.reload(&source, LedgerErr::SourceNotFound).await?;
        let mut to = self.reload(&recipient, LedgerErr::RecipientNotFound).await?;

        let mut from = before.clone();
        from.try_withdraw(amount)?;
        to.deposit(amount)?;

        self.accounts.save(&source, &from).await?;
        if let Err(e) = self.accounts.save(&recipient, &to).await {
            if let Err(restore) = self.accounts.save(&source, &before).await {
                error!(%source, error = %restore, "could not restore transfer source");
            }
            return Err(e);
        }
        self.log
            .append(&from_number, TransactionKind::TransferOut, amount)
            .await?;
        self.log
            .append(&to_number, TransactionKind::TransferIn, amount)
            .await?;

        info!(from = %from_number, to = %to_number, %amount, "transfer");
        Ok(())
    }

    async fn find(&self, account_number: &str) -> Result<StoredAccount, LedgerErr> {
        self.accounts
            .find_by_account_number(account_number)
            .await?
            .ok_or(LedgerErr::NotFound)
    }

    async fn reload(&self, username: &str, missing: LedgerErr) -> Result<Account, LedgerErr> {
        self.accounts
            .load_by_username(username)
            .await?
            .ok_or(missing)
    }
}

/// Run `op` on its own task and wait for it. The task keeps going when the returned future is
/// dropped.
async fn run_detached<T, F>(op: F) -> Result<T, LedgerErr>
where
    T: Send + 'static,
    F: Future<Output = Result<T, LedgerErr>> + Send + 'static,
{
    match tokio::spawn(op).await {
        Ok(res) => res,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(LedgerErr::Aborted),
    }
}

#[cfg(test)]
mod test {
    use super::Ledger;
    use crate::{
        account::Profile,
        amount::Amount,
        errors::{BalanceErr, LedgerErr},
        transactions::TransactionKind,
    };
    use rust_decimal::Decimal;
    use std::{sync::Arc, time::Duration};
    use tokio::time::timeout;

    fn profile(name: &str, surname: &str) -> Profile {
        Profile {
            name: name.to_owned(),
            surname: surname.to_owned(),
            phone_number: "555-1234".to_owned(),
            id_number: "ID1".to_owned(),
        }
    }

    async fn balance(ledger: &Ledger, account_number: &str) -> Decimal {
        ledger.dashboard(account_number).await.unwrap().balance
    }

    #[tokio::test]
    async fn alice_walkthrough() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = Ledger::new(dir.path());

        let an = ledger
            .register("alice", profile("Alice", "Smith"), "pw1")
            .await?;
        assert_eq!(an.len(), 6);
        assert!(an.chars().all(|c| c.is_ascii_digit()));

        assert_eq!(ledger.login("alice", "pw1").await?, an);
        assert!(matches!(
            ledger.login("alice", "nope").await,
            Err(LedgerErr::InvalidCredentials)
        ));
        assert!(matches!(
            ledger.login("bob", "pw1").await,
            Err(LedgerErr::InvalidCredentials)
        ));

        assert_eq!(
            ledger.deposit(&an, &Amount::new(100, 0)).await?,
            Decimal::new(100, 0)
        );

        let e = ledger.withdraw(&an, &Amount::new(150, 0)).await.unwrap_err();
        assert!(matches!(
            e,
            LedgerErr::Balance(BalanceErr::InsufficientFunds)
        ));
        assert_eq!(balance(&ledger, &an).await, Decimal::new(100, 0));

        // failed withdraw is not logged
        assert_eq!(ledger.transactions(&an).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn second_registration_fails() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = Ledger::new(dir.path());

        ledger.register("alice", profile("Alice", "Smith"), "pw1").await?;
        let e = ledger
            .register("alice", profile("Alice", "Jones"), "pw2")
            .await
            .unwrap_err();
        assert!(matches!(e, LedgerErr::AlreadyExists));
        // first registration still owns the username
        ledger.login("alice", "pw1").await?;
        Ok(())
    }

    #[tokio::test]
    async fn legacy_plaintext_record_can_login() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(
            dir.path().join("carol.txt"),
            "Name: Carol\nSurname: White\nPhone Number: 1\nID Number: 2\nAccount Number: 314159\nPassword: secret\nBalance: 42.5\n",
        )?;
        let ledger = Ledger::new(dir.path());

        assert_eq!(ledger.login("carol", "secret").await?, "314159");
        assert_eq!(balance(&ledger, "314159").await, Decimal::new(425, 1));
        Ok(())
    }

    #[tokio::test]
    async fn deposit_then_withdraw_restores_balance() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = Ledger::new(dir.path());
        let an = ledger.register("a", profile("A", "A"), "pw").await?;

        ledger.deposit(&an, &Amount::new(1, 1)).await?;
        let before = balance(&ledger, &an).await;

        for amount in [Amount::new(2, 1), Amount::new(333, 2), Amount::new(7, 0)] {
            ledger.deposit(&an, &amount).await?;
            ledger.withdraw(&an, &amount).await?;
            assert_eq!(balance(&ledger, &an).await, before);
        }
        Ok(())
    }

    #[tokio::test]
    async fn unknown_account() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = Ledger::new(dir.path());

        let one = Amount::new(1, 0);
        assert!(matches!(
            ledger.dashboard("000000").await,
            Err(LedgerErr::NotFound)
        ));
        assert!(matches!(
            ledger.deposit("000000", &one).await,
            Err(LedgerErr::NotFound)
        ));
        assert!(matches!(
            ledger.withdraw("000000", &one).await,
            Err(LedgerErr::NotFound)
        ));
        assert!(ledger.transactions("000000").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn dashboard_never_lists_transactions() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = Ledger::new(dir.path());
        let an = ledger.register("a", profile("A", "A"), "pw").await?;

        ledger.deposit(&an, &Amount::new(10, 0)).await?;
        let dashboard = ledger.dashboard(&an).await?;

        assert_eq!(dashboard.balance, Decimal::new(10, 0));
        assert!(dashboard.transactions.is_empty());
        assert_eq!(ledger.transactions(&an).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn transfer_moves_money_and_logs_both_sides() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = Ledger::new(dir.path());
        let x = ledger.register("x", profile("Xena", "X"), "pw").await?;
        let y = ledger.register("y", profile("Yuri", "Y"), "pw").await?;
        ledger.deposit(&x, &Amount::new(100, 0)).await?;
        ledger.deposit(&y, &Amount::new(5, 0)).await?;

        ledger.transfer(&x, "Yuri", &Amount::new(305, 1)).await?;

        assert_eq!(balance(&ledger, &x).await, Decimal::new(695, 1));
        assert_eq!(balance(&ledger, &y).await, Decimal::new(355, 1));

        let x_log = ledger.log().read_entries(&x).await?;
        let y_log = ledger.log().read_entries(&y).await?;
        assert_eq!(x_log.len(), 2);
        assert_eq!(y_log.len(), 2);
        assert_eq!(x_log[1].kind, TransactionKind::TransferOut);
        assert_eq!(y_log[1].kind, TransactionKind::TransferIn);
        assert_eq!(x_log[1].amount, Decimal::new(305, 1));
        assert_eq!(y_log[1].amount, Decimal::new(305, 1));
        Ok(())
    }

    #[tokio::test]
    async fn failed_transfers_change_nothing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = Ledger::new(dir.path());
        let x = ledger.register("x", profile("Xena", "X"), "pw").await?;
        let y = ledger.register("y", profile("Yuri", "Y"), "pw").await?;
        ledger.deposit(&x, &Amount::new(10, 0)).await?;

        let big = Amount::new(11, 0);
        assert!(matches!(
            ledger.transfer(&x, "Yuri", &big).await,
            Err(LedgerErr::Balance(BalanceErr::InsufficientFunds))
        ));
        assert!(matches!(
            ledger.transfer("000000", "Yuri", &big).await,
            Err(LedgerErr::SourceNotFound)
        ));
        assert!(matches!(
            ledger.transfer(&x, "Nobody", &big).await,
            Err(LedgerErr::RecipientNotFound)
        ));
        // sending to own name does not pick the source record
        assert!(matches!(
            ledger.transfer(&x, "Xena", &Amount::new(1, 0)).await,
            Err(LedgerErr::RecipientNotFound)
        ));

        assert_eq!(balance(&ledger, &x).await, Decimal::new(10, 0));
        assert_eq!(balance(&ledger, &y).await, Decimal::ZERO);
        assert_eq!(ledger.transactions(&x).await?.len(), 1);
        assert!(ledger.transactions(&y).await?.is_empty());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deposits_are_not_lost() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = Arc::new(Ledger::new(dir.path()));
        let an = ledger.register("a", profile("A", "A"), "pw").await?;

        let n = 50;
        let mut tasks = Vec::with_capacity(n);
        for _ in 0..n {
            let ledger = ledger.clone();
            let an = an.clone();
            tasks.push(tokio::spawn(async move {
                ledger.deposit(&an, &Amount::new(25, 1)).await
            }));
        }
        for task in futures::future::join_all(tasks).await {
            task??;
        }

        assert_eq!(balance(&ledger, &an).await, Decimal::new(25 * n as i64, 1));
        assert_eq!(ledger.transactions(&an).await?.len(), n);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_transfers_keep_total() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = Arc::new(Ledger::new(dir.path()));
        let x = ledger.register("x", profile("Xena", "X"), "pw").await?;
        let y = ledger.register("y", profile("Yuri", "Y"), "pw").await?;
        ledger.deposit(&x, &Amount::new(10, 0)).await?;
        ledger.deposit(&y, &Amount::new(10, 0)).await?;

        let mut tasks = Vec::new();
        for i in 0..40 {
            let ledger = ledger.clone();
            let (source, to) = if i % 2 == 0 {
                (x.clone(), "Yuri")
            } else {
                (y.clone(), "Xena")
            };
            tasks.push(tokio::spawn(async move {
                ledger.transfer(&source, to, &Amount::new(1, 0)).await
            }));
        }
        for task in futures::future::join_all(tasks).await {
            // transfers may fail on funds, never on lost records
            match task? {
                Ok(()) | Err(LedgerErr::Balance(_)) => (),
                Err(e) => return Err(e.into()),
            }
        }

        let total = balance(&ledger, &x).await + balance(&ledger, &y).await;
        assert_eq!(total, Decimal::new(20, 0));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancelled_transfers_keep_books_consistent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = Ledger::new(dir.path());
        let x = ledger.register("x", profile("Xena", "X"), "pw").await?;
        let y = ledger.register("y", profile("Yuri", "Y"), "pw").await?;
        let start = Decimal::new(1000, 0);
        ledger.deposit(&x, &Amount::try_from(start)?).await?;

        for us in (0..2000).step_by(50) {
            let one = Amount::new(1, 0);
            let transfer = ledger.transfer(&x, "Yuri", &one);
            let _ = timeout(Duration::from_micros(us), transfer).await;

            // no update is in flight while both locks are held
            let _guards = ledger.locks.lock_many(&[x.as_str(), y.as_str()]).await;
            let (bx, by) = (balance(&ledger, &x).await, balance(&ledger, &y).await);
            assert_eq!(bx + by, start, "after cancel at {us}us");

            let sent = ledger
                .log()
                .read_entries(&x)
                .await?
                .iter()
                .filter(|e| e.kind == TransactionKind::TransferOut)
                .count();
            let received = ledger.log().read_entries(&y).await?.len();
            assert_eq!(Decimal::from(sent), start - bx, "after cancel at {us}us");
            assert_eq!(received, sent, "after cancel at {us}us");
        }
        Ok(())
    }

    #[tokio::test]
    async fn foreign_files_do_not_hide_accounts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = Ledger::new(dir.path());
        let an = ledger.register("a", profile("A", "A"), "pw").await?;
        std::fs::write(dir.path().join("junk.txt"), [0xff, 0xfe, 0, 0x41])?;
        std::fs::create_dir(dir.path().join("notes.txt"))?;

        assert_eq!(ledger.dashboard(&an).await?.balance, Decimal::ZERO);
        assert_eq!(
            ledger.deposit(&an, &Amount::new(5, 0)).await?,
            Decimal::new(5, 0)
        );
        Ok(())
    }

    #[tokio::test]
    async fn overflowing_deposit_is_refused() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = Ledger::new(dir.path());
        let an = ledger.register("a", profile("A", "A"), "pw").await?;
        let huge = Amount::try_from(Decimal::from_scientific("5e28")?)?;

        ledger.deposit(&an, &huge).await?;
        assert!(matches!(
            ledger.deposit(&an, &huge).await,
            Err(LedgerErr::Balance(BalanceErr::Overflow))
        ));
        assert_eq!(balance(&ledger, &an).await, *huge);
        assert_eq!(ledger.transactions(&an).await?.len(), 1);
        Ok(())
    }
}
