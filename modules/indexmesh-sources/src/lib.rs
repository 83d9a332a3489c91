pub mod adapter;
pub mod groupchat;
pub mod microblog;
pub mod mock;

pub use adapter::{FetchOutcome, RawRecord, SourceAdapter};
pub use groupchat::GroupchatAdapter;
pub use microblog::MicroblogAdapter;
pub use mock::MockAdapter;
