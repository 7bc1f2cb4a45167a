pub mod generate;
pub mod init;
pub mod migrate;
pub mod status;
pub mod unlock;
pub mod view;

pub use generate::cmd_generate;
pub use init::cmd_init;
pub use migrate::{cmd_down, cmd_up};
pub use status::cmd_status;
pub use unlock::cmd_unlock;
pub use view::cmd_view;
