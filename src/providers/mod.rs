//! Frame source implementations

pub mod live;
pub mod replay;
pub mod text;

pub use live::{LiveProvider, auto_select_port, open_serial};
pub use replay::ReplayProvider;
pub use text::TextProvider;
