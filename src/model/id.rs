crate::define_id! {
    /// Identifier of a published video, shared by the counter keys and the durable `videos` table.
    VideoId, ParseVideoId, "video id"
}

crate::define_id! {
    /// Identifier of whoever is watching. Authenticated users and anonymous sessions both fit here.
    ViewerId, ParseViewerId, "viewer id"
}
