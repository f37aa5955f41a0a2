//! Response text.
//!
//! Every user-facing string the router produces is built here. Mentions use
//! the `<@id>` token verbatim so the calling platform can render them.

use coinhouse_types::{GameKind, Leaderboard};

use crate::engine::{ChestOutcome, OverrideOutcome, TransferOutcome, WagerOutcome};
use crate::error::Rejection;

pub const UNKNOWN_COMMAND: &str = "Command not recognized.";
pub const EMPTY_LEADERBOARD: &str = "The leaderboard is empty.";
pub const UNAUTHORIZED: &str = "You are not allowed to use this command.";
pub const STORE_FAILURE: &str = "Something went wrong while updating the ledger. Please try again.";

pub fn mention(user: &str) -> String {
    format!("<@{user}>")
}

/// Integer with `,` thousands separators.
pub fn format_coins(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Per-game wording for a wager result.
struct WagerTemplate {
    icon: &'static str,
    verb: &'static str,
    win_face: &'static str,
    loss_face: &'static str,
}

fn wager_template(game: GameKind) -> WagerTemplate {
    match game {
        GameKind::Coinflip => WagerTemplate {
            icon: "🪙",
            verb: "flipped",
            win_face: "Heads",
            loss_face: "Tails",
        },
        GameKind::Blackjack => WagerTemplate {
            icon: "🃏",
            verb: "played blackjack and drew",
            win_face: "21",
            loss_face: "a bust",
        },
    }
}

pub fn wager(user: &str, outcome: &WagerOutcome) -> String {
    let template = wager_template(outcome.game);
    let (face, result) = if outcome.won {
        (template.win_face, "won")
    } else {
        (template.loss_face, "lost")
    };
    format!(
        "{} {} {} **{}** and {} {} coins! Balance: {}",
        template.icon,
        mention(user),
        template.verb,
        face,
        result,
        format_coins(outcome.amount),
        format_coins(outcome.balance_after),
    )
}

pub fn chests(user: &str, outcome: &ChestOutcome) -> String {
    let noun = if outcome.count == 1 { "chest" } else { "chests" };
    format!(
        "🎁 {} opened {} {} for {} coins and found {} coins (best drop: {}). Balance: {}",
        mention(user),
        format_coins(outcome.count),
        noun,
        format_coins(outcome.cost),
        format_coins(outcome.total_reward),
        format_coins(outcome.best_reward()),
        format_coins(outcome.balance_after),
    )
}

pub fn transfer(sender: &str, receiver: &str, outcome: &TransferOutcome) -> String {
    format!(
        "💸 {} paid {} {} coins. {} now has {} coins.",
        mention(sender),
        mention(receiver),
        format_coins(outcome.amount),
        mention(sender),
        format_coins(outcome.sender_after),
    )
}

pub fn balance(user: &str, balance: i64) -> String {
    format!("💰 {} has {} coins.", mention(user), format_coins(balance))
}

pub fn leaderboard(board: &Leaderboard) -> String {
    if board.is_empty() {
        return EMPTY_LEADERBOARD.to_string();
    }
    let mut lines = vec!["🏆 **Leaderboard**".to_string()];
    for entry in &board.entries {
        lines.push(format!(
            "{}. {} {} coins",
            entry.rank,
            mention(&entry.user),
            format_coins(entry.balance)
        ));
    }
    lines.join("\n")
}

pub fn balance_override(user: &str, outcome: &OverrideOutcome) -> String {
    format!(
        "🛠️ Set {}'s balance to {} coins (was {}).",
        mention(user),
        format_coins(outcome.balance_after),
        format_coins(outcome.balance_before),
    )
}

pub fn winrate_updated(game: GameKind, previous: f64, rate: f64) -> String {
    format!("🎯 Win rate for {game} set to {rate} (was {previous}).")
}

pub fn winrate_current(game: GameKind, rate: f64) -> String {
    format!("🎯 Win rate for {game} is {rate}.")
}

pub fn help() -> String {
    [
        "**Commands**",
        "`/balance [user]` show a balance",
        "`/coinflip amount` flip a coin for coins",
        "`/blackjack amount` play a hand of blackjack",
        "`/chest amount` buy chests at 10,000,000 coins each",
        "`/pay user amount` send coins to another user",
        "`/leaderboard` show the richest users",
        "`/setbalance [user] amount` set a balance (admin)",
        "`/winrate game [rate]` show or set a game's win rate (admin)",
    ]
    .join("\n")
}

pub fn rejection(rejection: &Rejection) -> String {
    match rejection {
        Rejection::Validation(err) => format!("❌ Invalid input: {err}."),
        Rejection::InsufficientFunds {
            required,
            available,
        } => format!(
            "❌ Insufficient balance: need {} coins but only have {}.",
            format_coins(*required),
            format_coins(*available)
        ),
        Rejection::Unauthorized => UNAUTHORIZED.to_string(),
        Rejection::UnknownCommand(_) => UNKNOWN_COMMAND.to_string(),
    }
}
