//! Command router.
//!
//! The single state-transition surface: maps a decoded [CommandInvocation] to
//! one engine operation, validates its arguments, checks privileges, holds the
//! affected accounts' locks across read-check-write, and persists the result.

use coinhouse_types::{
    ArgValue, BalanceWrite, CommandInvocation, GameKind, CHEST_PRICE, LEADERBOARD_SIZE,
    MAX_CHESTS_PER_PURCHASE, MAX_USER_ID_LENGTH, STARTING_BALANCE,
};
use tracing::{debug, error, info};

use crate::auth::{Authorizer, Capability};
use crate::engine;
use crate::error::{Rejection, StoreError, ValidationError};
use crate::locks::AccountLocks;
use crate::loot::LootTable;
use crate::narrative;
use crate::retry::{with_retry, RetryPolicy};
use crate::rng::SampleSource;
use crate::store::LedgerStore;

/// Economy parameters resolved by the host before the router is built.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub starting_balance: i64,
    pub chest_price: i64,
    pub max_chests_per_purchase: i64,
    pub leaderboard_size: usize,
    pub loot_table: LootTable,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_balance: STARTING_BALANCE,
            chest_price: CHEST_PRICE,
            max_chests_per_purchase: MAX_CHESTS_PER_PURCHASE,
            leaderboard_size: LEADERBOARD_SIZE,
            loot_table: LootTable::standard(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Balance,
    Wager(GameKind),
    Chest,
    Leaderboard,
    SetBalance,
    Pay,
    WinRate,
    Unknown,
}

impl Command {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "help" => Command::Help,
            "balance" => Command::Balance,
            "coinflip" => Command::Wager(GameKind::Coinflip),
            "blackjack" => Command::Wager(GameKind::Blackjack),
            "chest" => Command::Chest,
            "leaderboard" => Command::Leaderboard,
            "setbalance" => Command::SetBalance,
            "pay" => Command::Pay,
            "winrate" => Command::WinRate,
            _ => Command::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Balance => "balance",
            Command::Wager(game) => game.as_str(),
            Command::Chest => "chest",
            Command::Leaderboard => "leaderboard",
            Command::SetBalance => "setbalance",
            Command::Pay => "pay",
            Command::WinRate => "winrate",
            Command::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

/// Result of resolving one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub verdict: Verdict,
    pub message: String,
    /// Persisted balance changes, in write order. Empty unless accepted.
    pub changes: Vec<BalanceWrite>,
}

impl Outcome {
    fn accepted(message: String, changes: Vec<BalanceWrite>) -> Self {
        Self {
            verdict: Verdict::Accepted,
            message,
            changes,
        }
    }

    fn rejected(rejection: Rejection) -> Self {
        Self {
            message: narrative::rejection(&rejection),
            verdict: Verdict::Rejected(rejection),
            changes: Vec::new(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match &self.verdict {
            Verdict::Accepted => None,
            Verdict::Rejected(rejection) => Some(rejection),
        }
    }

    /// Net change to `user` across all writes.
    pub fn delta_for(&self, user: &str) -> i64 {
        self.changes
            .iter()
            .filter(|change| change.user == user)
            .map(BalanceWrite::delta)
            .sum()
    }

    /// Balance of `user` after the last write to it.
    pub fn balance_of(&self, user: &str) -> Option<i64> {
        self.changes
            .iter()
            .rev()
            .find(|change| change.user == user)
            .map(|change| change.after)
    }
}

/// Handler failures. Rejections become outcomes, store errors escape.
enum Failure {
    Rejected(Rejection),
    Store(StoreError),
}

impl From<Rejection> for Failure {
    fn from(rejection: Rejection) -> Self {
        Failure::Rejected(rejection)
    }
}

impl From<ValidationError> for Failure {
    fn from(err: ValidationError) -> Self {
        Failure::Rejected(err.into())
    }
}

impl From<StoreError> for Failure {
    fn from(err: StoreError) -> Self {
        Failure::Store(err)
    }
}

type Handled = Result<Outcome, Failure>;

pub struct CommandRouter<S, A> {
    store: S,
    policy: A,
    config: EngineConfig,
    locks: AccountLocks,
}

impl<S: LedgerStore, A: Authorizer> CommandRouter<S, A> {
    pub fn new(store: S, policy: A) -> Self {
        Self::with_config(store, policy, EngineConfig::default())
    }

    pub fn with_config(store: S, policy: A, config: EngineConfig) -> Self {
        Self {
            store,
            policy,
            config,
            locks: AccountLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve one invocation.
    ///
    /// Validation, funds, authorization, and unknown-command failures are
    /// returned as a rejected [Outcome]. Only a ledger failure that outlived
    /// its retries is an `Err`.
    pub async fn resolve<R>(
        &self,
        invocation: &CommandInvocation,
        rng: &mut R,
    ) -> Result<Outcome, StoreError>
    where
        R: SampleSource + Send,
    {
        let command = Command::parse(&invocation.name);
        let caller = invocation.caller.as_str();
        let handled = match command {
            Command::Help => Ok(Outcome::accepted(narrative::help(), Vec::new())),
            Command::Balance => self.balance(invocation).await,
            Command::Wager(game) => self.wager(invocation, game, rng).await,
            Command::Chest => self.chest(invocation, rng).await,
            Command::Leaderboard => self.leaderboard().await,
            Command::SetBalance => self.set_balance(invocation).await,
            Command::Pay => self.pay(invocation).await,
            Command::WinRate => self.win_rate(invocation).await,
            Command::Unknown => Err(Rejection::UnknownCommand(invocation.name.clone()).into()),
        };

        match handled {
            Ok(outcome) => {
                debug!(
                    command = command.name(),
                    caller,
                    changes = outcome.changes.len(),
                    "command accepted"
                );
                Ok(outcome)
            }
            Err(Failure::Rejected(rejection)) => {
                debug!(command = command.name(), caller, %rejection, "command rejected");
                Ok(Outcome::rejected(rejection))
            }
            Err(Failure::Store(err)) => {
                error!(command = command.name(), caller, ?err, "ledger failure");
                Err(err)
            }
        }
    }

    async fn balance(&self, invocation: &CommandInvocation) -> Handled {
        let user = match invocation.arg("user") {
            Some(value) => identity(value)?,
            None => match &invocation.target {
                Some(target) if target.len() > MAX_USER_ID_LENGTH => {
                    return Err(ValidationError::InvalidUser.into())
                }
                Some(target) => target.clone(),
                None => invocation.caller.clone(),
            },
        };
        let balance = self.read_balance(&user).await?;
        Ok(Outcome::accepted(
            narrative::balance(&user, balance),
            Vec::new(),
        ))
    }

    async fn wager<R: SampleSource + Send>(
        &self,
        invocation: &CommandInvocation,
        game: GameKind,
        rng: &mut R,
    ) -> Handled {
        let amount = positive_amount(invocation)?;
        let user = invocation.caller.as_str();

        let _guard = self.locks.acquire(&[user]).await;
        let balance = self.read_balance(user).await?;
        let win_rate = self.read_win_rate(game).await?;
        let outcome = engine::resolve_wager(balance, amount, game, win_rate, rng)?;

        let changes = vec![BalanceWrite {
            user: user.to_string(),
            before: outcome.balance_before,
            after: outcome.balance_after,
        }];
        self.commit(&changes).await?;
        Ok(Outcome::accepted(narrative::wager(user, &outcome), changes))
    }

    async fn chest<R: SampleSource + Send>(
        &self,
        invocation: &CommandInvocation,
        rng: &mut R,
    ) -> Handled {
        let count = positive_amount(invocation)?;
        let max = self.config.max_chests_per_purchase;
        if count > max {
            return Err(ValidationError::TooManyChests { max }.into());
        }
        let user = invocation.caller.as_str();

        let _guard = self.locks.acquire(&[user]).await;
        let balance = self.read_balance(user).await?;
        let outcome = engine::open_chests(
            balance,
            count,
            self.config.chest_price,
            &self.config.loot_table,
            rng,
        )?;

        let changes = vec![BalanceWrite {
            user: user.to_string(),
            before: outcome.balance_before,
            after: outcome.balance_after,
        }];
        self.commit(&changes).await?;
        Ok(Outcome::accepted(narrative::chests(user, &outcome), changes))
    }

    async fn leaderboard(&self) -> Handled {
        let size = self.config.leaderboard_size;
        let board = with_retry(&self.config.retry, "top_n_by_balance", || {
            self.store.top_n_by_balance(size)
        })
        .await?;
        Ok(Outcome::accepted(narrative::leaderboard(&board), Vec::new()))
    }

    async fn set_balance(&self, invocation: &CommandInvocation) -> Handled {
        let caller = invocation.caller.as_str();
        self.authorize(caller, Capability::SetBalance)?;

        let user = match invocation.arg("user") {
            Some(value) => identity(value)?,
            None => caller.to_string(),
        };
        let amount = amount(invocation)?;

        let _guard = self.locks.acquire(&[user.as_str()]).await;
        let current = self.read_balance(&user).await?;
        let outcome = engine::override_balance(current, amount)?;

        let changes = vec![BalanceWrite {
            user: user.clone(),
            before: outcome.balance_before,
            after: outcome.balance_after,
        }];
        self.commit(&changes).await?;
        info!(
            admin = caller,
            user = %user,
            before = outcome.balance_before,
            after = outcome.balance_after,
            "balance overridden"
        );
        Ok(Outcome::accepted(
            narrative::balance_override(&user, &outcome),
            changes,
        ))
    }

    async fn pay(&self, invocation: &CommandInvocation) -> Handled {
        let sender = invocation.caller.as_str();
        let receiver = identity(
            invocation
                .arg("user")
                .ok_or(ValidationError::MissingArgument("user"))?,
        )?;
        let amount = positive_amount(invocation)?;
        if receiver == sender {
            return Err(ValidationError::SelfTransfer.into());
        }

        let _guard = self.locks.acquire(&[sender, receiver.as_str()]).await;
        let sender_balance = self.read_balance(sender).await?;
        let receiver_balance = self.read_balance(&receiver).await?;
        let outcome = engine::transfer(sender_balance, receiver_balance, amount)?;

        let changes = vec![
            BalanceWrite {
                user: sender.to_string(),
                before: outcome.sender_before,
                after: outcome.sender_after,
            },
            BalanceWrite {
                user: receiver.clone(),
                before: outcome.receiver_before,
                after: outcome.receiver_after,
            },
        ];
        self.commit(&changes).await?;
        Ok(Outcome::accepted(
            narrative::transfer(sender, &receiver, &outcome),
            changes,
        ))
    }

    async fn win_rate(&self, invocation: &CommandInvocation) -> Handled {
        let caller = invocation.caller.as_str();
        self.authorize(caller, Capability::TuneWinRate)?;

        let raw = invocation
            .arg("game")
            .ok_or(ValidationError::MissingArgument("game"))?
            .as_text()
            .unwrap_or_default();
        let game = GameKind::from_name(raw)
            .ok_or_else(|| ValidationError::UnknownGame(raw.trim().to_string()))?;

        let rate = match invocation.arg("rate") {
            None => {
                let current = self.read_win_rate(game).await?;
                return Ok(Outcome::accepted(
                    narrative::winrate_current(game, current),
                    Vec::new(),
                ));
            }
            Some(value) => value
                .as_number()
                .filter(|rate| (0.0..=1.0).contains(rate))
                .ok_or(ValidationError::InvalidWinRate)?,
        };

        let previous = self.read_win_rate(game).await?;
        with_retry(&self.config.retry, "set_winrate", || {
            self.store.set_winrate(game.as_str(), rate)
        })
        .await?;
        info!(admin = caller, %game, previous, rate, "win rate updated");
        Ok(Outcome::accepted(
            narrative::winrate_updated(game, previous, rate),
            Vec::new(),
        ))
    }

    fn authorize(&self, caller: &str, capability: Capability) -> Result<(), Rejection> {
        if self.policy.allows(caller, capability) {
            Ok(())
        } else {
            Err(Rejection::Unauthorized)
        }
    }

    async fn read_balance(&self, user: &str) -> Result<i64, StoreError> {
        let default = self.config.starting_balance;
        with_retry(&self.config.retry, "get_or_create", || {
            self.store.get_or_create(user, default)
        })
        .await
    }

    async fn read_win_rate(&self, game: GameKind) -> Result<f64, StoreError> {
        with_retry(&self.config.retry, "get_or_create_winrate", || {
            self.store
                .get_or_create_winrate(game.as_str(), game.default_win_rate())
        })
        .await
    }

    async fn commit(&self, changes: &[BalanceWrite]) -> Result<(), StoreError> {
        match changes {
            [] => Ok(()),
            [single] => {
                with_retry(&self.config.retry, "upsert_balance", || {
                    self.store.upsert_balance(&single.user, single.after)
                })
                .await
            }
            many => {
                with_retry(&self.config.retry, "upsert_balances", || {
                    self.store.upsert_balances(many)
                })
                .await
            }
        }
    }
}

fn identity(value: &ArgValue) -> Result<String, ValidationError> {
    value.as_identity().ok_or(ValidationError::InvalidUser)
}

fn amount(invocation: &CommandInvocation) -> Result<i64, ValidationError> {
    invocation
        .arg("amount")
        .and_then(ArgValue::as_integer)
        .ok_or(ValidationError::InvalidAmount)
}

fn positive_amount(invocation: &CommandInvocation) -> Result<i64, ValidationError> {
    match amount(invocation)? {
        value if value > 0 => Ok(value),
        _ => Err(ValidationError::NonPositiveAmount),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names_are_case_insensitive() {
        assert_eq!(Command::parse(" CoinFlip "), Command::Wager(GameKind::Coinflip));
        assert_eq!(Command::parse("BLACKJACK"), Command::Wager(GameKind::Blackjack));
        assert_eq!(Command::parse("setBalance"), Command::SetBalance);
        assert_eq!(Command::parse("dance"), Command::Unknown);
        assert_eq!(Command::parse(""), Command::Unknown);
    }

    #[test]
    fn test_amount_parsing() {
        let inv = CommandInvocation::new("coinflip", "1");
        assert_eq!(amount(&inv), Err(ValidationError::InvalidAmount));
        assert_eq!(
            amount(&inv.clone().with_empty_arg("amount")),
            Err(ValidationError::InvalidAmount)
        );
        assert_eq!(
            amount(&inv.clone().with_arg("amount", "abc")),
            Err(ValidationError::InvalidAmount)
        );
        assert_eq!(
            amount(&inv.clone().with_arg("amount", 1.5)),
            Err(ValidationError::InvalidAmount)
        );
        assert_eq!(amount(&inv.clone().with_arg("amount", "75")), Ok(75));
        assert_eq!(
            positive_amount(&inv.clone().with_arg("amount", 0)),
            Err(ValidationError::NonPositiveAmount)
        );
        assert_eq!(positive_amount(&inv.with_arg("amount", 5)), Ok(5));
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = Outcome::accepted(
            String::new(),
            vec![
                BalanceWrite {
                    user: "a".to_string(),
                    before: 1_000,
                    after: 700,
                },
                BalanceWrite {
                    user: "b".to_string(),
                    before: 1_000,
                    after: 1_300,
                },
            ],
        );
        assert!(outcome.is_accepted());
        assert_eq!(outcome.delta_for("a"), -300);
        assert_eq!(outcome.delta_for("b"), 300);
        assert_eq!(outcome.delta_for("c"), 0);
        assert_eq!(outcome.balance_of("b"), Some(1_300));
        assert_eq!(outcome.balance_of("c"), None);

        let rejected = Outcome::rejected(Rejection::Unauthorized);
        assert_eq!(rejected.rejection(), Some(&Rejection::Unauthorized));
        assert!(rejected.changes.is_empty());
    }
}
