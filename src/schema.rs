diesel::table! {
    messages (id) {
        id -> Integer,
        message -> Text,
        vote_count -> Integer,
        tg_id -> BigInt,
        tg_name -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    omikujis (id) {
        id -> Integer,
        photo -> Nullable<Text>,
        message -> Text,
        vote_count -> Integer,
        tg_id -> BigInt,
        tg_name -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::allow_tables_to_appear_in_same_query!(messages, omikujis);
