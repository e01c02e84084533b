//! Streaming over remote cursors

mod cursor;
mod cursor_stream;

pub use cursor::{collect_rows, Cursor};
pub use cursor_stream::{CursorStream, StreamEvent, StreamOptions};
