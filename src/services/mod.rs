pub mod export;
pub mod import;
pub mod retry;
pub mod ytmusic;
