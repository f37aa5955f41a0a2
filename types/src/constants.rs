/// Starting balance for accounts created on first reference.
pub const STARTING_BALANCE: i64 = 1_000;

/// Win rate stored for a game nobody has configured yet.
pub const DEFAULT_WIN_RATE: f64 = 0.5;

/// Win rate seeded for the wager games (coinflip, blackjack) on first read.
///
/// Below 0.5 on purpose: the house keeps an edge.
pub const DEFAULT_WAGER_WIN_RATE: f64 = 0.4;

/// Price of a single loot chest.
pub const CHEST_PRICE: i64 = 10_000_000;

/// Upper bound on chests opened by one command.
pub const MAX_CHESTS_PER_PURCHASE: i64 = 10_000;

/// Number of entries rendered by the leaderboard command.
pub const LEADERBOARD_SIZE: usize = 10;

/// Maximum length of a user identifier accepted from the wire.
pub const MAX_USER_ID_LENGTH: usize = 64;
