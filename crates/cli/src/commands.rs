pub mod deploy;
pub mod graph;
pub mod init;
pub mod plan;
pub mod post_receive;
pub mod schema;
