use super::Migration;

pub fn migration() -> Migration {
    Migration {
        name: "0002_nutrition",
        statements: &[
            r#"CREATE TABLE nutrition (
    item_id INTEGER PRIMARY KEY NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    serving_size TEXT,
    calories INTEGER
)"#,
            // one row per nutrient key
            r#"CREATE TABLE nutrition_values (
    item_id INTEGER NOT NULL REFERENCES nutrition(item_id) ON DELETE CASCADE,
    nutrient TEXT NOT NULL,
    amount TEXT NOT NULL,
    percent_daily_value INTEGER,
    PRIMARY KEY (item_id, nutrient)
)"#,
        ],
    }
}
