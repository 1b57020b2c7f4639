pub mod commands;
pub mod handlers;

pub use commands::{CLAP_STYLING, command_argument_builder};
pub use handlers::{load_urls_from_file, parse_url_line, scan_request_from_args};
