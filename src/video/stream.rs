//! Dispatch of streaming requests onto files of a lesson's HLS export.

use crate::model::entity::LessonVideo;
use crate::storage::{Disk, Storage, sibling_of};

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const KEY_CONTENT_TYPE: &str = "application/octet-stream";
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

/// What a streaming request asks for. Exactly one variant matches any input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    MasterPlaylist,
    MediaPlaylist(String),
    Key(String),
    Segment(String),
    Unknown,
}

impl StreamTarget {
    /// Checked in order: master playlist flag, `.m3u8`, `.key`, `.ts`.
    pub fn resolve(playlist: bool, file: Option<&str>) -> Self {
        let Some(name) = file.filter(|f| !f.is_empty()) else {
            return if playlist {
                Self::MasterPlaylist
            } else {
                Self::Unknown
            };
        };

        if !is_plain_file_name(name) {
            return Self::Unknown;
        }

        if name.ends_with(".m3u8") {
            Self::MediaPlaylist(name.to_string())
        } else if name.ends_with(".key") {
            Self::Key(name.to_string())
        } else if name.ends_with(".ts") {
            Self::Segment(name.to_string())
        } else {
            Self::Unknown
        }
    }

    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::MasterPlaylist | Self::MediaPlaylist(_) => Some(PLAYLIST_CONTENT_TYPE),
            Self::Key(_) => Some(KEY_CONTENT_TYPE),
            Self::Segment(_) => Some(SEGMENT_CONTENT_TYPE),
            Self::Unknown => None,
        }
    }

    pub fn cache_control(&self) -> &'static str {
        match self {
            Self::Key(_) => "no-store",
            _ => "private, max-age=60",
        }
    }

    fn file_name(&self) -> Option<&str> {
        match self {
            Self::MediaPlaylist(name) | Self::Key(name) | Self::Segment(name) => Some(name),
            Self::MasterPlaylist | Self::Unknown => None,
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.contains('/') && !name.contains('\\') && !name.contains("..")
}

/// A file ready to be served.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamAsset {
    pub disk: Disk,
    pub path: String,
    pub content_type: &'static str,
    pub cache_control: &'static str,
}

/// Maps `target` onto an existing file of the lesson's export.
///
/// `None` when the lesson has no processed video, the target is unknown, or the
/// file is absent on the recorded disk.
pub async fn locate_asset(
    storage: &Storage,
    video: &LessonVideo,
    target: &StreamTarget,
) -> Option<StreamAsset> {
    let (disk, master) = video.processed()?;
    let content_type = target.content_type()?;

    let path = match target {
        StreamTarget::MasterPlaylist => master.to_string(),
        other => sibling_of(master, other.file_name()?)?,
    };

    if !storage.is_file(disk, &path).await {
        return None;
    }

    Some(StreamAsset {
        disk,
        path,
        content_type,
        cache_control: target.cache_control(),
    })
}
