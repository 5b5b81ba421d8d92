diesel::table! {
    Photo (photo_id) {
        photo_id -> Text,
        source -> Integer,
        account_name -> Text,
        file_name -> Text,
        taken_date -> BigInt,
        file_size -> BigInt,
        content_hash -> Nullable<Text>,
        added_at -> BigInt,
        last_scanned_at -> BigInt,
        archive_path -> Nullable<Text>,
        album_name -> Nullable<Text>,
        is_backed_up -> Nullable<Integer>,
        can_be_removed -> Nullable<Integer>,
        remote_path -> Nullable<Text>,
        remote_photo_id -> Nullable<Text>,
    }
}

diesel::table! {
    Album (album_id) {
        album_id -> BigInt,
        account_name -> Text,
        name -> Text,
        remote_album_id -> Nullable<Text>,
        created_at -> BigInt,
        last_synced_at -> Nullable<BigInt>,
    }
}

diesel::table! {
    AlbumMembership (membership_id) {
        membership_id -> BigInt,
        album_id -> BigInt,
        photo_id -> Text,
        added_at -> BigInt,
    }
}

diesel::joinable!(AlbumMembership -> Album (album_id));
diesel::joinable!(AlbumMembership -> Photo (photo_id));

diesel::allow_tables_to_appear_in_same_query!(Photo, Album, AlbumMembership);
