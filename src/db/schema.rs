diesel::table! {
    users (id) {
        id -> Integer,
        name -> Text,
    }
}

diesel::table! {
    articles (id) {
        id -> Integer,
        title -> Text,
        user_id -> Integer,
        content -> Text,
    }
}

diesel::table! {
    favorites (id) {
        id -> Integer,
        article_id -> Integer,
        user_id -> Integer,
    }
}

diesel::table! {
    followings (id) {
        id -> Integer,
        from_id -> Integer,
        to_id -> Integer,
    }
}
