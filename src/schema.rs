// Kept in sync with src/migrations by hand.

diesel::table! {
    venues (id) {
        id -> Text,
        name -> Text,
        nickname -> Text,
        is_open -> Bool,
        occupancy -> Integer,
        latitude -> Nullable<Double>,
        longitude -> Nullable<Double>,
        address -> Nullable<Text>,
        phone -> Nullable<Text>,
        updated_at -> Text,
    }
}

diesel::table! {
    meals (id) {
        id -> Integer,
        venue_id -> Text,
        name -> Text,
        date -> Text,
        start_time -> Nullable<Text>,
        end_time -> Nullable<Text>,
    }
}

diesel::table! {
    items (id) {
        id -> Integer,
        name -> Text,
        ingredients -> Text,
        course -> Text,
        meat -> Bool,
        animal_products -> Bool,
        alcohol -> Bool,
        tree_nut -> Bool,
        shellfish -> Bool,
        peanuts -> Bool,
        dairy -> Bool,
        egg -> Bool,
        pork -> Bool,
        fish -> Bool,
        soy -> Bool,
        wheat -> Bool,
        gluten -> Bool,
        coconut -> Bool,
    }
}

diesel::table! {
    meal_items (meal_id, item_id) {
        meal_id -> Integer,
        item_id -> Integer,
    }
}

diesel::table! {
    nutrition (item_id) {
        item_id -> Integer,
        serving_size -> Nullable<Text>,
        calories -> Nullable<Integer>,
    }
}

diesel::table! {
    nutrition_values (item_id, nutrient) {
        item_id -> Integer,
        nutrient -> Text,
        amount -> Text,
        percent_daily_value -> Nullable<Integer>,
    }
}

diesel::joinable!(meals -> venues (venue_id));
diesel::joinable!(meal_items -> meals (meal_id));
diesel::joinable!(meal_items -> items (item_id));
diesel::joinable!(nutrition -> items (item_id));

diesel::allow_tables_to_appear_in_same_query!(
    venues,
    meals,
    items,
    meal_items,
    nutrition,
    nutrition_values,
);
