diesel::table! {
    notes (id) {
        id -> Varchar,
        user_id -> Varchar,
        title -> Varchar,
        content -> Text,
        #[sql_name = "order"]
        sort_order -> Int4,
        pinned -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    users (id) {
        id -> Varchar,
        email -> Varchar,
        name -> Nullable<Varchar>,
        password_hash -> Varchar,
        created_at -> Timestamp,
    }
}

diesel::joinable!(notes -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(notes, users);
