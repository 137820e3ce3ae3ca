use crate::prelude::*;

/// The durable record of a published video. `views` is the cumulative count that the sweeper
/// folds drained deltas into; nothing else writes to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct Video {
    pub id: Record<Video>,
    pub title: String,
    #[new(default)]
    #[serde(default)]
    pub views: u64,
}

crate::define_table!("videos" : Video = id);

crate::define_relation! {
    Video > publish(id: Record<Video>, title: String) > Option<Video>
        where "CREATE $id SET title = $title, views = 0 RETURN AFTER"
}

crate::define_relation! {
    Video > get(id: Record<Video>) > Option<Video>
        where "SELECT * FROM $id"
}

// Addresses the record directly. The condition keeps the update from creating a missing video.
crate::define_relation! {
    Video > add_views(id: Record<Video>, delta: u64) > Option<Video>
        where "UPDATE $id SET views += $delta WHERE views != NONE RETURN AFTER"
}

impl Video {
    pub fn record(video: &VideoId) -> Record<Video> {
        Record::new(video.as_str())
    }
}
