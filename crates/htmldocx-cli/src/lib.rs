//! htmldocx CLI - Command-line interface library
//!
//! This library provides the CLI functionality for htmldocx:
//! - Convert: HTML (or a JSON element tree) to DOCX
//! - Init-config: print the default conversion options
//!
//! # Binary Usage
//!
//! ```bash
//! # Convert with default options
//! htmldocx convert report.html --output report.docx
//!
//! # Convert with a header, a footer and custom options
//! htmldocx convert report.html --header header.html --footer footer.html --config htmldocx.toml
//!
//! # Start a config file from the defaults
//! htmldocx init-config --output htmldocx.toml
//! ```

pub mod app;

pub use app::{convert_command, init_config_command, load_nodes, load_options, run_cli, ConvertArgs};
