//! SQL DDL for the application tables.
//! SQLite-first; uniqueness rules live in the constraints, not in handlers.

/// Tables:
/// - `user_profiles`: one row per user (`user_id` PRIMARY KEY)
/// - `interest_categories`: `name` UNIQUE
/// - `user_onboarding_responses`: UNIQUE(`user_id`, `version`)
/// - `user_interests`: PRIMARY KEY(`user_id`, `category_id`)
/// - `user_interest_analysis`: one per user and one per onboarding response
/// - `daily_facts`: UNIQUE(`user_id`, `fact_date`)
/// - `user_daily_facts`: delivery records, UNIQUE(`user_id`, `daily_fact_id`)
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS user_profiles (
    user_id TEXT PRIMARY KEY NOT NULL,
    experience_level TEXT NOT NULL DEFAULT 'beginner',
    preferred_fact_length TEXT NOT NULL DEFAULT 'medium',
    language TEXT NOT NULL DEFAULT 'English',
    daily_notification_enabled INTEGER NOT NULL DEFAULT 0,
    notification_time TEXT NULL, -- HH:MM
    timezone TEXT NOT NULL DEFAULT 'UTC',
    push_subscription TEXT NULL, -- JSON
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS interest_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT NULL
);

CREATE TABLE IF NOT EXISTS user_onboarding_responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    response_data TEXT NOT NULL, -- JSON
    completed_at TEXT NOT NULL,
    version TEXT NOT NULL,
    UNIQUE (user_id, version)
);

CREATE TABLE IF NOT EXISTS user_interests (
    user_id TEXT NOT NULL,
    category_id INTEGER NOT NULL REFERENCES interest_categories(id) ON DELETE CASCADE,
    interest_level INTEGER NOT NULL,
    PRIMARY KEY (user_id, category_id)
);

CREATE TABLE IF NOT EXISTS user_interest_analysis (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL UNIQUE,
    onboarding_response_id INTEGER NOT NULL UNIQUE REFERENCES user_onboarding_responses(id) ON DELETE CASCADE,
    analysis_prompt TEXT NOT NULL,
    ai_response TEXT NOT NULL,
    ai_model TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS daily_facts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    fact_date TEXT NOT NULL, -- YYYY-MM-DD, user's local date
    fact_heading TEXT NOT NULL,
    fact_content TEXT NOT NULL,
    source_prompt TEXT NOT NULL,
    llm_model TEXT NOT NULL,
    is_verified INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE (user_id, fact_date)
);

CREATE TABLE IF NOT EXISTS user_daily_facts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    daily_fact_id INTEGER NOT NULL REFERENCES daily_facts(id) ON DELETE CASCADE,
    delivered_at TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,
    read_at TEXT NULL,
    UNIQUE (user_id, daily_fact_id)
);

CREATE INDEX IF NOT EXISTS idx_user_daily_facts_delivered_at ON user_daily_facts(delivered_at);
CREATE INDEX IF NOT EXISTS idx_daily_facts_fact_date ON daily_facts(fact_date)
"#;

/// Topics offered by the questionnaire. Descriptions name periods and regions
/// so that period/region answers can raise the interest level of a category.
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    (
        "Wars & Conflicts",
        "Battles, sieges and campaigns from Ancient History to the 20th Century",
    ),
    (
        "Politics & Leaders",
        "Rulers, revolutions and intrigue across Europe, Asia and the Middle East",
    ),
    (
        "Science & Inventions",
        "Discoveries of the Early Modern Period, the 19th Century and the Modern Era",
    ),
    (
        "Art & Culture",
        "Painters, poets and scandals of the Medieval Period and the Renaissance in Europe",
    ),
    (
        "Religion & Mythology",
        "Gods, cults and schisms of Ancient History and the Middle East",
    ),
    (
        "Daily Life",
        "Food, fashion and hygiene through every era",
    ),
    (
        "Exploration & Discovery",
        "Voyages to the Americas, Africa and Oceania in the Early Modern Period",
    ),
    (
        "Economics & Trade",
        "Silk roads, bubbles and banks from Asia to North America",
    ),
];
