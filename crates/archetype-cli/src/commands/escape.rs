use anyhow::Result;

use archetype_core::config::EscapeOptions;
use archetype_core::escape::Direction;
use archetype_core::prepare;

use crate::output;
use crate::EscapeArgs;

/// Escape or unescape explicit files, in order.
///
/// Every file is attempted; all failures are reported together.
pub fn run(args: &EscapeArgs, direction: Direction) -> Result<()> {
    let verb = match direction {
        Direction::Escape => "escape",
        Direction::Unescape => "unescape",
    };
    output::print_header(&format!("archetype {verb}: {} file(s)", args.files.len()));

    let options = EscapeOptions::new(direction).with_output_dir(&args.directory);
    match prepare::process_files(&args.files, &options) {
        Ok(modified) => {
            output::print_success(&format!(
                "{} file(s) written to {}, {modified} modified",
                args.files.len(),
                args.directory.display()
            ));
            Ok(())
        }
        Err(error) => {
            output::print_error(&error.to_string());
            Err(error.into())
        }
    }
}
