//! Coinpurse command-line front end
//!
//! Stands in for the chat dispatch layer: each subcommand maps to one engine
//! operation against the configured ledger file.

use clap::{Parser, Subcommand};
use coinpurse::{
    challenge::{Actor, ChallengeEvent, MoveReceipt, Settlement},
    config::{ConfigLoader, EconomyConfig, StorageBackendKind},
    errors::{EconomyError, EconomyResult},
    games::{CoinSide, Move},
    Economy, UserId,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Coinpurse economy CLI
#[derive(Parser)]
#[command(name = "coinpurse")]
#[command(about = "Virtual-currency ledger with wagering minigames")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ledger JSON file (overrides the configuration)
    #[arg(short, long)]
    data_file: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a user's balance
    Balance { user: UserId },

    /// Claim the daily reward
    Daily { user: UserId },

    /// Pay coins to another player
    Pay {
        from: UserId,
        to: UserId,
        amount: i64,
        /// Treat the recipient as a bot account
        #[arg(long)]
        to_bot: bool,
    },

    /// Grant coins (administrative)
    AddCoins { user: UserId, amount: i64 },

    /// Remove coins, never below zero (administrative)
    RemoveCoins { user: UserId, amount: i64 },

    /// Richest users first
    Leaderboard {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Bet on heads or tails
    Coinflip { user: UserId, call: CoinSide, bet: i64 },

    /// Straight-up roulette bet on a number from 0 to 36
    Roulette { user: UserId, number: i64, bet: i64 },

    /// Cast a line and reel in when a fish bites
    Fish { user: UserId },

    /// List caught items by rarity
    FishList { user: UserId },

    /// Play a full rock-paper-scissors duel between two users
    Duel {
        challenger: UserId,
        opponent: UserId,
        bet: i64,
        /// Challenger's move (rock, paper, scissors or emoji)
        challenger_move: Move,
        /// Opponent's move
        opponent_move: Move,
    },

    /// Print engine counters
    Stats,
}

#[tokio::main]
async fn main() -> EconomyResult<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConfigLoader::new().with_path(path).load()?,
        None => ConfigLoader::new().load()?,
    };
    if let Some(data_file) = cli.data_file {
        config.storage.backend = StorageBackendKind::Json;
        config.storage.data_file = data_file;
    }

    init_logging(&config, cli.verbose);

    let economy = Economy::open(config).await?;

    match cli.command {
        Commands::Balance { user } => {
            println!("💰 {} has {} coins", user, economy.balance(user));
        }
        Commands::Daily { user } => match economy
            .ledger()
            .claim_daily(user, chrono::Utc::now())
            .await
        {
            Ok(claim) => println!(
                "🎁 {} claimed {} coins (balance {})",
                user, claim.reward, claim.balance
            ),
            Err(EconomyError::ClaimCooldown { remaining_secs }) => {
                println!(
                    "⏳ Already claimed; come back in {}h {}m",
                    remaining_secs / 3600,
                    (remaining_secs % 3600) / 60
                );
            }
            Err(e) => return Err(e),
        },
        Commands::Pay {
            from,
            to,
            amount,
            to_bot,
        } => {
            let recipient = if to_bot { Actor::bot(to) } else { Actor::player(to) };
            let receipt = economy.pay(Actor::player(from), recipient, amount).await?;
            println!(
                "💸 {} paid {} coins to {} ({} left)",
                from, receipt.amount, to, receipt.from_balance
            );
        }
        Commands::AddCoins { user, amount } => {
            let balance = economy.admin_add(user, amount).await?;
            println!("➕ {} now has {} coins", user, balance);
        }
        Commands::RemoveCoins { user, amount } => {
            let result = economy.admin_remove(user, amount).await?;
            println!(
                "➖ Removed {} of {} coins from {} ({} left)",
                result.removed, result.requested, user, result.balance
            );
        }
        Commands::Leaderboard { limit } => {
            println!("🏆 Leaderboard");
            for (rank, (user, coins)) in economy.leaderboard(limit).into_iter().enumerate() {
                println!("{:>3}. {} - {} coins", rank + 1, user, coins);
            }
        }
        Commands::Coinflip { user, call, bet } => {
            let play = economy.games().resolve_coin_flip(user, call, bet).await?;
            let verdict = if play.outcome.won { "won" } else { "lost" };
            println!(
                "🪙 The coin landed on {}; {} {} {} coins (balance {})",
                play.outcome.draw, user, verdict, play.bet, play.balance
            );
        }
        Commands::Roulette { user, number, bet } => {
            let play = economy.games().resolve_roulette(user, number, bet).await?;
            if play.spin.won {
                println!(
                    "🎰 {} {}! {} wins {} coins (balance {})",
                    play.spin.result, play.spin.color, user, play.winnings, play.balance
                );
            } else {
                println!(
                    "🎰 {} {}; {} loses {} coins (balance {})",
                    play.spin.result, play.spin.color, user, play.bet, play.balance
                );
            }
        }
        Commands::Fish { user } => {
            let games = economy.games();
            let cast = games.cast_line(user)?;
            println!("🎣 {} cast a line...", user);
            cast.wait_for_bite().await;
            let catch = games.catch(user).await?;
            println!("🐟 {} caught a {} ({})", user, catch.item.name, catch.item.tier);
        }
        Commands::FishList { user } => {
            let inventory = economy.inventory_by_rarity(user);
            if inventory.is_empty() {
                println!("🪣 {} has not caught anything yet", user);
            }
            for (tier, names) in inventory {
                println!("{}: {}", tier, names.join(", "));
            }
        }
        Commands::Duel {
            challenger,
            opponent,
            bet,
            challenger_move,
            opponent_move,
        } => run_duel(&economy, challenger, opponent, bet, challenger_move, opponent_move).await?,
        Commands::Stats => {
            let snapshot = serde_json::to_string_pretty(&economy.metrics())
                .map_err(|e| EconomyError::Internal(e.to_string()))?;
            println!("{}", snapshot);
        }
    }

    Ok(())
}

fn init_logging(config: &EconomyConfig, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        config.monitoring.log_level.as_filter()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_duel(
    economy: &Economy,
    challenger: UserId,
    opponent: UserId,
    bet: i64,
    challenger_move: Move,
    opponent_move: Move,
) -> EconomyResult<()> {
    let manager = economy.challenges();
    let mut events = manager.subscribe();

    let challenge = manager
        .propose(Actor::player(challenger), Actor::player(opponent), bet)
        .await?;
    println!("⚔️ {} challenged {} for {} coins", challenger, opponent, challenge.bet);

    manager.accept(challenge.id, opponent).await?;

    let submissions = futures::future::join_all([
        manager.submit_move(challenge.id, challenger, challenger_move),
        manager.submit_move(challenge.id, opponent, opponent_move),
    ])
    .await;

    for receipt in submissions {
        if let MoveReceipt::Resolved(resolution) = receipt? {
            println!(
                "{} {} vs {} {}",
                challenger,
                resolution.challenger_move.emoji(),
                resolution.opponent_move.emoji(),
                opponent
            );
            match (resolution.winner, &resolution.settlement) {
                (None, _) => println!("🤝 It's a tie, no coins move"),
                (Some(winner), Settlement::Paid(receipt)) => {
                    println!("🏅 {} wins {} coins", winner, receipt.amount)
                }
                (Some(winner), _) => println!("🏅 {} wins, but the loser cannot pay", winner),
            }
        }
    }

    while let Ok(event) = events.try_recv() {
        if event.challenge_id() != challenge.id {
            continue;
        }
        if let ChallengeEvent::Expired { moves_received, .. } = event {
            println!("⌛ Challenge expired with {} of 2 moves", moves_received);
        }
    }

    Ok(())
}
