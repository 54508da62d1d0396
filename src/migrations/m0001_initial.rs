use super::Migration;

pub fn migration() -> Migration {
    Migration {
        name: "0001_initial_schema",
        statements: &[
            r#"CREATE TABLE venues (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    nickname TEXT NOT NULL,
    is_open BOOLEAN NOT NULL DEFAULT 0,
    occupancy INTEGER NOT NULL DEFAULT 0,
    latitude DOUBLE,
    longitude DOUBLE,
    address TEXT,
    phone TEXT,
    updated_at TEXT NOT NULL
)"#,
            r#"CREATE TABLE meals (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    venue_id TEXT NOT NULL REFERENCES venues(id),
    name TEXT NOT NULL,
    date TEXT NOT NULL,
    start_time TEXT,
    end_time TEXT,
    UNIQUE (venue_id, name, date)
)"#,
            "CREATE INDEX idx_meals_venue_date ON meals(venue_id, date)",
            r#"CREATE TABLE items (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    name TEXT NOT NULL,
    ingredients TEXT NOT NULL,
    course TEXT NOT NULL,
    meat BOOLEAN NOT NULL DEFAULT 0,
    animal_products BOOLEAN NOT NULL DEFAULT 0,
    alcohol BOOLEAN NOT NULL DEFAULT 0,
    tree_nut BOOLEAN NOT NULL DEFAULT 0,
    shellfish BOOLEAN NOT NULL DEFAULT 0,
    peanuts BOOLEAN NOT NULL DEFAULT 0,
    dairy BOOLEAN NOT NULL DEFAULT 0,
    egg BOOLEAN NOT NULL DEFAULT 0,
    pork BOOLEAN NOT NULL DEFAULT 0,
    fish BOOLEAN NOT NULL DEFAULT 0,
    soy BOOLEAN NOT NULL DEFAULT 0,
    wheat BOOLEAN NOT NULL DEFAULT 0,
    gluten BOOLEAN NOT NULL DEFAULT 0,
    coconut BOOLEAN NOT NULL DEFAULT 0
)"#,
            "CREATE INDEX idx_items_identity ON items(name, course)",
            r#"CREATE TABLE meal_items (
    meal_id INTEGER NOT NULL REFERENCES meals(id) ON DELETE CASCADE,
    item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    PRIMARY KEY (meal_id, item_id)
)"#,
        ],
    }
}
