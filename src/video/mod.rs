//! Lesson video pipeline: HLS transcoding and stream dispatch.

mod error;
pub use error::{TranscodeError, TranscodeResult};

mod transcoder;
pub use transcoder::{HlsExport, HlsTranscoder, LESSONS_DIR, build_args};

mod stream;
pub use stream::{StreamAsset, StreamTarget, locate_asset};
