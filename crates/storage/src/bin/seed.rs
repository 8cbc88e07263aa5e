use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rehab_core::model::{
    Condition, Difficulty, Feedback, GameSession, GameType, Movement, Performance, Profile,
    ProgressDelta, SessionData, SessionValidationError, User, UserId,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    user_id: Option<UserId>,
    username: String,
    condition: Condition,
    sessions: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidUserId { raw: String },
    InvalidCondition { raw: String },
    InvalidSessions { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUserId { raw } => {
                write!(f, "invalid --user-id value (expected UUID): {raw}")
            }
            ArgsError::InvalidCondition { raw } => write!(f, "invalid --condition value: {raw}"),
            ArgsError::InvalidSessions { raw } => write!(f, "invalid --sessions value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("REHAB_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut user_id: Option<UserId> = std::env::var("REHAB_USER_ID")
            .ok()
            .and_then(|value| UserId::from_str(&value).ok());
        let mut username = std::env::var("REHAB_USERNAME").unwrap_or_else(|_| "demo".into());
        let mut condition = std::env::var("REHAB_CONDITION")
            .ok()
            .and_then(|value| Condition::from_str(&value).ok())
            .unwrap_or_default();
        let mut sessions = std::env::var("REHAB_SESSIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(10);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user-id" => {
                    let value = require_value(&mut args, "--user-id")?;
                    let parsed = UserId::from_str(&value)
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user_id = Some(parsed);
                }
                "--username" => {
                    let value = require_value(&mut args, "--username")?;
                    username = value;
                }
                "--condition" => {
                    let value = require_value(&mut args, "--condition")?;
                    condition = Condition::from_str(&value)
                        .map_err(|_| ArgsError::InvalidCondition { raw: value.clone() })?;
                }
                "--sessions" => {
                    let value = require_value(&mut args, "--sessions")?;
                    sessions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidSessions { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            username,
            condition,
            sessions,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --user-id <uuid>          Reuse an existing user (default: generate one)");
    eprintln!("  --username <name>         Username for a newly created user (default: demo)");
    eprintln!("  --condition <name>        hand | leg | walking | general (default: general)");
    eprintln!("  --sessions <n>            Sessions to record, one per day back (default: 10)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  REHAB_DB_URL, REHAB_USER_ID, REHAB_USERNAME, REHAB_CONDITION, REHAB_SESSIONS");
}

fn build_session(
    user_id: UserId,
    index: u32,
    created_at: DateTime<Utc>,
) -> Result<GameSession, SessionValidationError> {
    let game_type = GameType::ALL[(index as usize) % GameType::ALL.len()];
    let duration_secs = 180 + (index % 4) * 60;
    let score = 400 + (index % 5) * 150;
    let accuracy = 70 + u8::try_from(index % 4).unwrap_or(0) * 5;

    let movements = vec![
        Movement::new("rep", created_at - Duration::seconds(30), true),
        Movement::new("rep", created_at - Duration::seconds(10), index % 3 != 0),
    ];
    let data = SessionData::new(duration_secs, score, accuracy, Difficulty::Medium, movements)?;
    let performance = Performance::new(
        created_at - Duration::seconds(i64::from(duration_secs)),
        created_at,
        vec![],
        Some(6),
        Some(3),
    )?;
    let feedback = Feedback::new(Some(4), Some(3), None)?;

    Ok(GameSession::from_parts(
        user_id,
        game_type,
        data,
        performance,
        feedback,
        created_at,
    ))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let user_id = args.user_id.unwrap_or_else(UserId::generate);
    let user = match storage.users.get_user(user_id).await? {
        Some(existing) => existing,
        None => {
            let profile = Profile {
                condition: args.condition,
                ..Profile::default()
            };
            let user = User::register(user_id, args.username.clone(), profile, now)?;
            storage.users.insert_user(&user).await?;
            user
        }
    };

    // Oldest first so the final last_active lands on the newest session.
    for index in (0..args.sessions).rev() {
        let created_at = now - Duration::days(i64::from(index));
        let session = build_session(user.id(), index, created_at)?;
        storage.sessions.insert_session(&session).await?;
        storage
            .users
            .apply_progress(
                user.id(),
                &ProgressDelta::for_session(session.session_data()),
                created_at,
            )
            .await?;
    }

    if args.sessions > 0 {
        let _ = storage
            .users
            .add_achievement(user.id(), "getting-started", now)
            .await?;
    }

    println!(
        "Seeded user {} with {} sessions into {}",
        user.id(),
        args.sessions,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
